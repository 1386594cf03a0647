//! # Credit Note Repository
//!
//! Store credit issued by returns (or by hand) and burned once at checkout.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Credit Note Lifecycle                               │
//! │                                                                         │
//! │  return with balance < 0  ──┐                                          │
//! │  POST /notas-credito/crear ─┴──► issue() → NC-3F9A12BC  status=active  │
//! │                                        │                                │
//! │                                        ▼                                │
//! │  checkout(credit_note_code) ──► redeem() inside the sale transaction   │
//! │                                        │                                │
//! │                                        ▼                                │
//! │                              status=used, used_in_sale_id = sale       │
//! │                                                                         │
//! │  validate(code): active → Ok(note)   used → Conflict   unknown → 404   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tienda_core::validation::validate_positive_amount;
use tienda_core::{CreditNote, CreditNoteStatus, Money};

/// Attempts at finding a free code before giving up.
const CODE_ATTEMPTS: usize = 10;

const CREDIT_NOTE_COLUMNS: &str =
    "id, code, amount_cents, created_at, status, notes, used_in_sale_id";

/// `NC-` followed by 8 uppercase hex characters.
fn generate_code() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("NC-{}", hex[..8].to_uppercase())
}

/// Issues a new active note on the caller's connection.
pub(crate) async fn issue(
    conn: &mut SqliteConnection,
    amount: Money,
    notes: Option<&str>,
) -> DbResult<CreditNote> {
    validate_positive_amount("amount_cents", amount.cents())?;

    for _ in 0..CODE_ATTEMPTS {
        let code = generate_code();
        let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM credit_notes WHERE code = ?1")
            .bind(&code)
            .fetch_one(&mut *conn)
            .await?;
        if taken > 0 {
            warn!(code = %code, "Credit note code collision, retrying");
            continue;
        }

        let note = sqlx::query_as::<_, CreditNote>(&format!(
            r#"
            INSERT INTO credit_notes (code, amount_cents, created_at, status, notes)
            VALUES (?1, ?2, ?3, 'active', ?4)
            RETURNING {CREDIT_NOTE_COLUMNS}
            "#
        ))
        .bind(&code)
        .bind(amount.cents())
        .bind(Utc::now())
        .bind(notes)
        .fetch_one(&mut *conn)
        .await?;

        info!(code = %note.code, amount = %amount, "Credit note issued");
        return Ok(note);
    }

    Err(DbError::Internal(
        "could not generate a unique credit note code".to_string(),
    ))
}

/// Loads a note by code and checks it can still be spent.
pub(crate) async fn find_active(conn: &mut SqliteConnection, code: &str) -> DbResult<CreditNote> {
    let code = code.trim().to_uppercase();
    let note = sqlx::query_as::<_, CreditNote>(&format!(
        "SELECT {CREDIT_NOTE_COLUMNS} FROM credit_notes WHERE code = ?1"
    ))
    .bind(&code)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Credit note", &code))?;

    if note.status != CreditNoteStatus::Active {
        return Err(DbError::conflict(format!(
            "Credit note {} was already used",
            note.code
        )));
    }
    Ok(note)
}

/// Marks an active note used by `sale_id`.
///
/// The status guard makes a concurrent second redemption affect no row.
pub(crate) async fn redeem(conn: &mut SqliteConnection, note_id: i64, sale_id: i64) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE credit_notes SET status = 'used', used_in_sale_id = ?1 WHERE id = ?2 AND status = 'active'",
    )
    .bind(sale_id)
    .bind(note_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict(format!(
            "Credit note {} was already used",
            note_id
        )));
    }
    Ok(())
}

/// Repository for credit notes.
#[derive(Debug, Clone)]
pub struct CreditNoteRepository {
    pool: SqlitePool,
}

impl CreditNoteRepository {
    /// Creates a new CreditNoteRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CreditNoteRepository { pool }
    }

    /// Issues a note by hand.
    pub async fn create(&self, amount_cents: i64, notes: Option<&str>) -> DbResult<CreditNote> {
        let mut conn = self.pool.acquire().await?;
        issue(&mut conn, Money::from_cents(amount_cents), notes).await
    }

    /// All notes, newest first.
    pub async fn list(&self) -> DbResult<Vec<CreditNote>> {
        let notes = sqlx::query_as::<_, CreditNote>(&format!(
            "SELECT {CREDIT_NOTE_COLUMNS} FROM credit_notes ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(notes)
    }

    /// Checks that a code exists and is still active.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown code
    /// - `Conflict` for a used note
    pub async fn validate(&self, code: &str) -> DbResult<CreditNote> {
        let mut conn = self.pool.acquire().await?;
        find_active(&mut conn, code).await
    }
}
