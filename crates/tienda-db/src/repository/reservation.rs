//! # Reservation Repository
//!
//! Layaway: stock is held physically at creation and comes back on cancel.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Reservation Lifecycle                               │
//! │                                                                         │
//! │  create(items, deposit)                                                │
//! │    ├── decrement_checked() per line      (stock held)                  │
//! │    ├── balance_due = total − deposit                                    │
//! │    └── deposit > 0 → deposit Sale        (shows up in the register)    │
//! │             │                                                           │
//! │             ▼                                                           │
//! │         PENDING ───withdraw(method)───► WITHDRAWN                      │
//! │             │        balance > 0 → balance Sale                        │
//! │             │                                                           │
//! │             └──────cancel()───────────► CANCELLED                      │
//! │                      adjust(+qty) per line (stock released)            │
//! │                                                                         │
//! │  delete() is refused while PENDING so held stock is never orphaned.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::inventory;
use crate::repository::sale::{catalog_line, insert_line, insert_sale, LineRecord, SaleRecord};
use tienda_core::pricing::{reservation_balance, Totals};
use tienda_core::validation::{validate_cart_size, validate_name, validate_quantity};
use tienda_core::{
    CoreError, Money, Percentage, Reservation, ReservationStatus, StockChange,
};

const RESERVATION_COLUMNS: &str = r#"
    id, customer_name, phone, total_cents, deposit_cents, balance_due_cents,
    created_at, expires_at, status
"#;

fn one() -> i64 {
    1
}

// =============================================================================
// Shapes
// =============================================================================

/// A line to hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationLine {
    pub variant_id: i64,
    #[serde(default = "one")]
    pub quantity: i64,
}

/// Input of `POST /api/sales/reservas/crear`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewReservation {
    pub customer_name: String,
    pub phone: Option<String>,
    pub items: Vec<ReservationLine>,
    #[serde(default)]
    pub deposit_cents: i64,
    /// Required when `deposit_cents > 0`.
    pub payment_method_id: Option<i64>,
    /// Total shown by the client. Only compared.
    pub total_cents: Option<i64>,
}

/// A held line with its product.
///
/// `variant_id` is `None` once the product was deleted after the
/// reservation settled.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReservationLineDetail {
    pub id: i64,
    pub variant_id: Option<i64>,
    pub product_name: Option<String>,
    pub size: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

/// A reservation with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationDetail {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub is_expired: bool,
    pub items: Vec<ReservationLineDetail>,
}

/// Result of a committed creation.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationCreated {
    pub reservation: ReservationDetail,
    pub deposit_sale_id: Option<i64>,
    #[serde(skip)]
    pub stock_changes: Vec<StockChange>,
}

/// Result of a withdrawal.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WithdrawOutcome {
    pub reservation_id: i64,
    pub balance_sale_id: Option<i64>,
}

/// Result of a cancellation.
#[derive(Debug, Clone, Serialize)]
pub struct CancelOutcome {
    pub reservation_id: i64,
    #[serde(skip)]
    pub stock_changes: Vec<StockChange>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for layaway reservations.
#[derive(Debug, Clone)]
pub struct ReservationRepository {
    pool: SqlitePool,
}

impl ReservationRepository {
    /// Creates a new ReservationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReservationRepository { pool }
    }

    /// Creates a reservation expiring `expiry_days` from now.
    ///
    /// ## Errors
    /// - `Validation` for a malformed request or a negative deposit
    /// - `Rule` when the deposit exceeds the total, or a deposit has no method
    /// - `InsufficientStock` when a line cannot be held
    pub async fn create(
        &self,
        input: NewReservation,
        expiry_days: i64,
    ) -> DbResult<ReservationCreated> {
        let customer = validate_name("customer_name", &input.customer_name)?;
        validate_cart_size(input.items.len())?;
        for line in &input.items {
            validate_quantity(line.quantity)?;
        }
        let deposit = Money::from_cents(input.deposit_cents);

        let mut tx = self.pool.begin().await?;

        let mut priced = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let (_, price) = catalog_line(&mut tx, line.variant_id).await?;
            priced.push((line, price));
        }

        let totals = Totals::from_lines(
            priced.iter().map(|(line, price)| (*price, line.quantity)),
            Percentage::zero(),
        )?;
        if totals.differs_from(input.total_cents.map(Money::from_cents)) {
            warn!(computed = %totals.total, client = ?input.total_cents, "Reservation total differs from client");
        }
        let balance = reservation_balance(totals.total, deposit)?;
        if deposit.is_positive() && input.payment_method_id.is_none() {
            return Err(CoreError::PaymentMethodRequired {
                amount_cents: deposit.cents(),
            }
            .into());
        }

        let now = Utc::now();
        let expires_at = now + Duration::days(expiry_days);

        let reservation_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO reservations (
                customer_name, phone, total_cents, deposit_cents, balance_due_cents,
                created_at, expires_at, status
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending')
            RETURNING id
            "#,
        )
        .bind(&customer)
        .bind(input.phone.as_deref().map(str::trim))
        .bind(totals.total.cents())
        .bind(deposit.cents())
        .bind(balance.cents())
        .bind(now)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        let mut stock_changes = Vec::with_capacity(priced.len());
        for (line, price) in &priced {
            sqlx::query(
                r#"
                INSERT INTO reservation_items (reservation_id, variant_id, quantity, unit_price_cents, subtotal_cents)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(reservation_id)
            .bind(line.variant_id)
            .bind(line.quantity)
            .bind(price.cents())
            .bind(price.multiply_quantity(line.quantity).cents())
            .execute(&mut *tx)
            .await?;

            stock_changes
                .push(inventory::decrement_checked(&mut tx, line.variant_id, line.quantity).await?);
        }

        let deposit_sale_id = if deposit.is_positive() {
            let label = format!("Reservation #{} deposit", reservation_id);
            Some(
                record_payment(
                    &mut tx,
                    &label,
                    &customer,
                    deposit,
                    input.payment_method_id,
                )
                .await?,
            )
        } else {
            None
        };

        tx.commit().await?;

        info!(
            reservation_id,
            customer = %customer,
            total = %totals.total,
            deposit = %deposit,
            "Reservation created"
        );

        Ok(ReservationCreated {
            reservation: self.get(reservation_id).await?,
            deposit_sale_id,
            stock_changes,
        })
    }

    /// Hands the goods over, collecting any balance due.
    pub async fn withdraw(
        &self,
        id: i64,
        payment_method_id: Option<i64>,
    ) -> DbResult<WithdrawOutcome> {
        let mut tx = self.pool.begin().await?;

        let reservation = load(&mut tx, id).await?;
        require_pending(&reservation, "withdrawn")?;

        let balance = Money::from_cents(reservation.balance_due_cents);
        let balance_sale_id = if balance.is_positive() {
            if payment_method_id.is_none() {
                return Err(CoreError::PaymentMethodRequired {
                    amount_cents: balance.cents(),
                }
                .into());
            }
            let label = format!("Reservation #{} balance", id);
            Some(
                record_payment(
                    &mut tx,
                    &label,
                    &reservation.customer_name,
                    balance,
                    payment_method_id,
                )
                .await?,
            )
        } else {
            None
        };

        set_status(&mut tx, id, ReservationStatus::Withdrawn).await?;
        tx.commit().await?;

        info!(reservation_id = id, ?balance_sale_id, "Reservation withdrawn");
        Ok(WithdrawOutcome {
            reservation_id: id,
            balance_sale_id,
        })
    }

    /// Cancels a pending reservation and releases its stock.
    pub async fn cancel(&self, id: i64) -> DbResult<CancelOutcome> {
        let mut tx = self.pool.begin().await?;

        let reservation = load(&mut tx, id).await?;
        require_pending(&reservation, "cancelled")?;

        let lines: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT variant_id, quantity FROM reservation_items
            WHERE reservation_id = ?1 AND variant_id IS NOT NULL
            ORDER BY id
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let mut stock_changes = Vec::with_capacity(lines.len());
        for (variant_id, quantity) in lines {
            stock_changes.push(inventory::adjust(&mut tx, variant_id, quantity).await?);
        }

        set_status(&mut tx, id, ReservationStatus::Cancelled).await?;
        tx.commit().await?;

        info!(reservation_id = id, lines = stock_changes.len(), "Reservation cancelled");
        Ok(CancelOutcome {
            reservation_id: id,
            stock_changes,
        })
    }

    /// Deletes a reservation that is no longer pending.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let reservation = load(&mut tx, id).await?;
        if reservation.status == ReservationStatus::Pending {
            return Err(DbError::conflict(format!(
                "Reservation {} is pending; cancel or withdraw it first",
                id
            )));
        }

        sqlx::query("DELETE FROM reservations WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(reservation_id = id, "Reservation deleted");
        Ok(())
    }

    /// One reservation with its lines.
    pub async fn get(&self, id: i64) -> DbResult<ReservationDetail> {
        let mut conn = self.pool.acquire().await?;
        let reservation = load(&mut conn, id).await?;
        detail(&mut conn, reservation).await
    }

    /// Pending first, then newest.
    pub async fn list(&self) -> DbResult<Vec<ReservationDetail>> {
        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query_as::<_, Reservation>(&format!(
            r#"
            SELECT {RESERVATION_COLUMNS} FROM reservations
            ORDER BY CASE status WHEN 'pending' THEN 0 ELSE 1 END, created_at DESC, id DESC
            "#
        ))
        .fetch_all(&mut *conn)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for reservation in rows {
            out.push(detail(&mut conn, reservation).await?);
        }
        Ok(out)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn load(conn: &mut SqliteConnection, id: i64) -> DbResult<Reservation> {
    sqlx::query_as::<_, Reservation>(&format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Reservation", id))
}

fn require_pending(reservation: &Reservation, action: &str) -> DbResult<()> {
    if reservation.status != ReservationStatus::Pending {
        return Err(DbError::conflict(format!(
            "Reservation {} cannot be {}: status is {:?}",
            reservation.id, action, reservation.status
        )));
    }
    Ok(())
}

async fn set_status(conn: &mut SqliteConnection, id: i64, status: ReservationStatus) -> DbResult<()> {
    sqlx::query("UPDATE reservations SET status = ?1 WHERE id = ?2")
        .bind(status)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Records a deposit or balance payment as a one-line sale.
async fn record_payment(
    conn: &mut SqliteConnection,
    label: &str,
    customer: &str,
    amount: Money,
    payment_method_id: Option<i64>,
) -> DbResult<i64> {
    let record = SaleRecord {
        totals: Totals::from_subtotal(amount, Percentage::zero()),
        payment_method_id,
        notes: Some(format!("{} - {}", label, customer)),
        ..Default::default()
    };
    let sale_id = insert_sale(conn, &record).await?;
    insert_line(
        conn,
        sale_id,
        &LineRecord {
            variant_id: None,
            item_name: label.to_string(),
            quantity: 1,
            unit_price: amount,
            settled: None,
        },
    )
    .await?;
    Ok(sale_id)
}

async fn detail(conn: &mut SqliteConnection, reservation: Reservation) -> DbResult<ReservationDetail> {
    let items = sqlx::query_as::<_, ReservationLineDetail>(
        r#"
        SELECT ri.id, ri.variant_id, p.name AS product_name, v.size,
               ri.quantity, ri.unit_price_cents, ri.subtotal_cents
        FROM reservation_items ri
        LEFT JOIN variants v ON v.id = ri.variant_id
        LEFT JOIN products p ON p.id = v.product_id
        WHERE ri.reservation_id = ?1
        ORDER BY ri.id
        "#,
    )
    .bind(reservation.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ReservationDetail {
        is_expired: reservation.is_expired(Utc::now()),
        reservation,
        items,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
