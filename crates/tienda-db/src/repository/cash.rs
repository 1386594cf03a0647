//! # Cash Session Repository
//!
//! One register shift at a time: open with a float, record manual
//! movements, close with the counted cash.
//!
//! ## Session States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Cash Session Lifecycle                              │
//! │                                                                         │
//! │   (none open) ──open(float)──► OPEN ──close(counted)──► CLOSED         │
//! │        ▲                        │                          │            │
//! │        └────────────────────────┼──────────────────────────┘            │
//! │                                 │                                       │
//! │                     add_movement(withdrawal | deposit)                  │
//! │                     status() → live tally                               │
//! │                                                                         │
//! │  open() while OPEN     → Conflict (pre-check, then the partial         │
//! │                          unique index for a racing second request)     │
//! │  close() with none     → Conflict                                      │
//! │                                                                         │
//! │  Sales belong to the session by time: created_at >= opened_at.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use tienda_core::cash::{CashTally, CategoryBreakdown, SessionSale};
use tienda_core::validation::{validate_non_negative_amount, validate_positive_amount};
use tienda_core::{CashMovement, CashSession, Money, MovementKind, PaymentCategory};

const SESSION_COLUMNS: &str = r#"
    id, opened_at, opening_float_cents, closed_at, status,
    system_total_cents, counted_total_cents, variance_cents
"#;

/// Closed sessions returned by `list_closed`.
pub const CLOSED_SESSION_LIMIT: i64 = 20;

// =============================================================================
// Shapes
// =============================================================================

/// Input of `POST /api/sales/caja/movement`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMovement {
    #[serde(default)]
    pub kind: MovementKind,
    pub amount_cents: i64,
    pub description: Option<String>,
}

/// Expected end-of-shift totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpectedTotals {
    pub cash_in_drawer: Money,
    pub digital: Money,
}

/// Live state of the register.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CashStatus {
    Closed,
    Open {
        session: CashSession,
        sales_total: Money,
        sale_count: i64,
        withdrawals: Money,
        deposits: Money,
        breakdown: CategoryBreakdown,
        expected: ExpectedTotals,
        movements: Vec<CashMovement>,
    },
}

/// Result of closing the register.
#[derive(Debug, Clone, Serialize)]
pub struct CloseSummary {
    pub session_id: i64,
    pub expected_cash: Money,
    pub counted_cash: Money,
    pub variance: Money,
    pub breakdown: CategoryBreakdown,
    pub system_total: Money,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for cash register sessions.
#[derive(Debug, Clone)]
pub struct CashRepository {
    pool: SqlitePool,
}

impl CashRepository {
    /// Creates a new CashRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CashRepository { pool }
    }

    /// Opens a session with `opening_float_cents` in the drawer.
    ///
    /// ## Errors
    /// - `Conflict` when a session is already open
    pub async fn open(&self, opening_float_cents: i64) -> DbResult<CashSession> {
        validate_non_negative_amount("opening_float_cents", opening_float_cents)?;

        if let Some(open) = self.current().await? {
            return Err(DbError::conflict(format!(
                "Cash session {} is already open",
                open.id
            )));
        }

        let session = sqlx::query_as::<_, CashSession>(&format!(
            r#"
            INSERT INTO cash_sessions (opened_at, opening_float_cents, status)
            VALUES (?1, ?2, 'open')
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(Utc::now())
        .bind(opening_float_cents)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => {
                DbError::conflict("A cash session is already open")
            }
            other => other,
        })?;

        info!(session_id = session.id, float = opening_float_cents, "Cash session opened");
        Ok(session)
    }

    /// The open session, if any.
    pub async fn current(&self) -> DbResult<Option<CashSession>> {
        let mut conn = self.pool.acquire().await?;
        open_session(&mut conn).await
    }

    /// Records a withdrawal or deposit in the open session.
    pub async fn add_movement(&self, input: NewMovement) -> DbResult<CashMovement> {
        validate_positive_amount("amount_cents", input.amount_cents)?;

        let session = self
            .current()
            .await?
            .ok_or_else(|| DbError::conflict("No open cash session"))?;

        let movement = sqlx::query_as::<_, CashMovement>(
            r#"
            INSERT INTO cash_movements (session_id, kind, amount_cents, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, session_id, kind, amount_cents, description, created_at
            "#,
        )
        .bind(session.id)
        .bind(input.kind)
        .bind(input.amount_cents)
        .bind(input.description.as_deref().map(str::trim))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        info!(
            session_id = session.id,
            kind = ?movement.kind,
            amount = movement.amount_cents,
            "Cash movement recorded"
        );
        Ok(movement)
    }

    /// Live tally of the open session, or `Closed`.
    pub async fn status(&self) -> DbResult<CashStatus> {
        let mut conn = self.pool.acquire().await?;

        let Some(session) = open_session(&mut conn).await? else {
            return Ok(CashStatus::Closed);
        };

        let (tally, movements) = tally_session(&mut conn, &session).await?;

        Ok(CashStatus::Open {
            sales_total: tally.sales_total,
            sale_count: tally.sale_count,
            withdrawals: tally.withdrawals,
            deposits: tally.deposits,
            breakdown: tally.breakdown,
            expected: ExpectedTotals {
                cash_in_drawer: tally.expected_cash(),
                digital: tally.breakdown.digital(),
            },
            movements,
            session,
        })
    }

    /// Closes the open session against the counted cash.
    ///
    /// ## What This Does
    /// 1. Loads every completed sale since `opened_at`
    /// 2. Buckets tender by payment category
    /// 3. `expected = float + cash − withdrawals + deposits`
    /// 4. `variance = counted − expected`
    /// 5. Persists totals and marks the session closed
    pub async fn close(&self, counted_cents: i64) -> DbResult<CloseSummary> {
        validate_non_negative_amount("counted_cash", counted_cents)?;
        let counted = Money::from_cents(counted_cents);

        let mut tx = self.pool.begin().await?;

        let session = open_session(&mut tx)
            .await?
            .ok_or_else(|| DbError::conflict("No open cash session"))?;

        let (tally, _) = tally_session(&mut tx, &session).await?;
        let variance = tally.variance(counted);

        sqlx::query(
            r#"
            UPDATE cash_sessions SET
                closed_at = ?1,
                status = 'closed',
                system_total_cents = ?2,
                counted_total_cents = ?3,
                variance_cents = ?4
            WHERE id = ?5 AND status = 'open'
            "#,
        )
        .bind(Utc::now())
        .bind(tally.sales_total.cents())
        .bind(counted.cents())
        .bind(variance.cents())
        .bind(session.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            session_id = session.id,
            expected = %tally.expected_cash(),
            counted = %counted,
            variance = %variance,
            "Cash session closed"
        );

        Ok(CloseSummary {
            session_id: session.id,
            expected_cash: tally.expected_cash(),
            counted_cash: counted,
            variance,
            breakdown: tally.breakdown,
            system_total: tally.sales_total,
        })
    }

    /// The most recent closed sessions, newest first.
    pub async fn list_closed(&self, limit: i64) -> DbResult<Vec<CashSession>> {
        let sessions = sqlx::query_as::<_, CashSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS} FROM cash_sessions
            WHERE status = 'closed'
            ORDER BY closed_at DESC, id DESC
            LIMIT ?1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn open_session(conn: &mut SqliteConnection) -> DbResult<Option<CashSession>> {
    let session = sqlx::query_as::<_, CashSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM cash_sessions WHERE status = 'open'"
    ))
    .fetch_optional(&mut *conn)
    .await?;
    Ok(session)
}

/// Completed sales since `since`, with their tender by category.
pub(crate) async fn session_sales(
    conn: &mut SqliteConnection,
    since: DateTime<Utc>,
) -> DbResult<Vec<SessionSale>> {
    let headers: Vec<(i64, i64, Option<PaymentCategory>)> = sqlx::query_as(
        r#"
        SELECT s.id, s.total_cents, pm.category
        FROM sales s
        LEFT JOIN payment_methods pm ON pm.id = s.payment_method_id
        WHERE s.created_at >= ?1 AND s.status = 'completed'
        ORDER BY s.id
        "#,
    )
    .bind(since)
    .fetch_all(&mut *conn)
    .await?;

    let payment_rows: Vec<(i64, PaymentCategory, i64)> = sqlx::query_as(
        r#"
        SELECT sp.sale_id, pm.category, sp.amount_cents
        FROM sale_payments sp
        JOIN payment_methods pm ON pm.id = sp.payment_method_id
        JOIN sales s ON s.id = sp.sale_id
        WHERE s.created_at >= ?1 AND s.status = 'completed'
        ORDER BY sp.id
        "#,
    )
    .bind(since)
    .fetch_all(&mut *conn)
    .await?;

    let mut payments: HashMap<i64, Vec<(PaymentCategory, Money)>> = HashMap::new();
    for (sale_id, category, amount) in payment_rows {
        payments
            .entry(sale_id)
            .or_default()
            .push((category, Money::from_cents(amount)));
    }

    Ok(headers
        .into_iter()
        .map(|(id, total, category)| SessionSale {
            total: Money::from_cents(total),
            method_category: category,
            payments: payments.remove(&id).unwrap_or_default(),
        })
        .collect())
}

async fn tally_session(
    conn: &mut SqliteConnection,
    session: &CashSession,
) -> DbResult<(CashTally, Vec<CashMovement>)> {
    let mut tally = CashTally::new(Money::from_cents(session.opening_float_cents));

    for sale in session_sales(conn, session.opened_at).await? {
        tally.add_sale(&sale);
    }

    let movements = sqlx::query_as::<_, CashMovement>(
        r#"
        SELECT id, session_id, kind, amount_cents, description, created_at
        FROM cash_movements WHERE session_id = ?1 ORDER BY id
        "#,
    )
    .bind(session.id)
    .fetch_all(&mut *conn)
    .await?;

    for movement in &movements {
        tally.add_movement(movement.kind, Money::from_cents(movement.amount_cents));
    }

    debug!(
        session_id = session.id,
        sales = tally.sale_count,
        expected = %tally.expected_cash(),
        "Session tallied"
    );
    Ok((tally, movements))
}

// =============================================================================
// Unit Tests
// =============================================================================
