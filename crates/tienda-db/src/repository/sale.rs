//! # Sale Repository
//!
//! Checkout, void and sales history.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Checkout (one transaction)                        │
//! │                                                                         │
//! │  1. VALIDATE      cart size, quantities, tender present                │
//! │  2. CREDIT NOTE   find_active(code) → NotFound / Conflict              │
//! │  3. PRICE         variant lines: catalog price                         │
//! │                   manual lines: declared name + price                  │
//! │  4. TOTALS        Totals::from_lines(..., discount %)                  │
//! │                   client total is a hint; mismatch → warn!             │
//! │  5. HEADER        INSERT sales                                         │
//! │  6. TENDER        INSERT sale_payments (list, or one synthesized row)  │
//! │  7. LINES         decrement_checked() then INSERT sale_items          │
//! │  8. REDEEM        credit note → used, used_in_sale_id                  │
//! │  9. COMMIT                                                             │
//! │                                                                         │
//! │  Any error before 9 drops the transaction: no header, no lines,        │
//! │  no stock moved, the credit note stays active.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::stats::start_of_today;
use crate::repository::{credit_note, inventory};
use tienda_core::pricing::{discount_rate, Totals};
use tienda_core::validation::{
    validate_cart_size, validate_name, validate_positive_amount, validate_price_cents,
    validate_quantity,
};
use tienda_core::{
    Money, PaymentCategory, Sale, SaleItem, SaleStatus, StockChange, ValidationError,
};

pub(crate) const SALE_COLUMNS: &str = r#"
    id, created_at, subtotal_cents, discount_cents, total_cents,
    payment_method_id, customer_id, notes, status, remote_order_id
"#;

/// Sales returned by the unscoped history view.
const HISTORY_LIMIT: i64 = 100;

fn one() -> i64 {
    1
}

// =============================================================================
// Shapes
// =============================================================================

/// One cart line: an inventory line (`variant_id`) or a manual line
/// (`name` + `unit_price_cents`, no stock effect).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub variant_id: Option<i64>,
    pub name: Option<String>,
    #[serde(default = "one")]
    pub quantity: i64,
    /// Only read for manual lines; inventory lines use the catalog price.
    pub unit_price_cents: Option<i64>,
}

/// One split-tender allocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PaymentAllocation {
    pub payment_method_id: i64,
    pub amount_cents: i64,
}

/// Input of `POST /api/sales/checkout`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutInput {
    pub items: Vec<CheckoutLine>,
    /// Single-method tender; also the sale's primary method.
    pub payment_method_id: Option<i64>,
    /// Split tender. Wins over `payment_method_id` for the payment rows.
    #[serde(default)]
    pub payments: Vec<PaymentAllocation>,
    pub customer_id: Option<i64>,
    pub credit_note_code: Option<String>,
    #[serde(default)]
    pub discount_percent: i64,
    /// Total shown by the client. Only compared, never stored.
    pub total_cents: Option<i64>,
    pub notes: Option<String>,
}

/// Result of a committed checkout.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub sale_id: i64,
    pub totals: Totals,
    pub credit_note_code: Option<String>,
    #[serde(skip)]
    pub stock_changes: Vec<StockChange>,
}

/// Result of a committed void.
#[derive(Debug, Clone, Serialize)]
pub struct VoidOutcome {
    pub sale_id: i64,
    pub restored_lines: usize,
    #[serde(skip)]
    pub stock_changes: Vec<StockChange>,
}

/// A payment row with its method.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentLine {
    pub payment_method_id: i64,
    pub method_name: String,
    pub category: PaymentCategory,
    pub amount_cents: i64,
}

/// A sale with its lines and payments.
#[derive(Debug, Clone, Serialize)]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub payment_method_name: Option<String>,
    pub items: Vec<SaleItem>,
    pub payments: Vec<PaymentLine>,
}

/// Today's completed sales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodaySummary {
    pub total_cents: i64,
    pub count: i64,
}

/// Payload of `GET /api/sales/history`.
#[derive(Debug, Clone, Serialize)]
pub struct SalesHistory {
    pub sales: Vec<SaleDetail>,
    pub today_summary: TodaySummary,
}

// =============================================================================
// Shared Writers
// =============================================================================

/// Header of a sale written by any workflow.
#[derive(Debug, Clone, Default)]
pub(crate) struct SaleRecord {
    pub totals: Totals,
    pub payment_method_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub notes: Option<String>,
    pub remote_order_id: Option<i64>,
    pub payments: Vec<(i64, Money)>,
}

/// A priced line ready to persist.
#[derive(Debug, Clone)]
pub(crate) struct LineRecord {
    pub variant_id: Option<i64>,
    pub item_name: String,
    pub quantity: i64,
    pub unit_price: Money,
    /// Settled amount of the line when it differs from price × quantity.
    pub settled: Option<Money>,
}

impl LineRecord {
    fn subtotal(&self) -> Money {
        self.settled
            .unwrap_or_else(|| self.unit_price.multiply_quantity(self.quantity))
    }
}

/// Inserts the header and its payment rows. Returns the sale id.
///
/// Without explicit payments, a primary method yields one row for the
/// whole total so split and single tender read the same way.
pub(crate) async fn insert_sale(conn: &mut SqliteConnection, record: &SaleRecord) -> DbResult<i64> {
    let sale_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO sales (
            created_at, subtotal_cents, discount_cents, total_cents,
            payment_method_id, customer_id, notes, status, remote_order_id
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        RETURNING id
        "#,
    )
    .bind(Utc::now())
    .bind(record.totals.subtotal.cents())
    .bind(record.totals.discount.cents())
    .bind(record.totals.total.cents())
    .bind(record.payment_method_id)
    .bind(record.customer_id)
    .bind(&record.notes)
    .bind(SaleStatus::Completed)
    .bind(record.remote_order_id)
    .fetch_one(&mut *conn)
    .await?;

    let synthesized;
    let payments: &[(i64, Money)] = match (record.payments.is_empty(), record.payment_method_id) {
        (true, Some(method)) => {
            synthesized = [(method, record.totals.total)];
            &synthesized
        }
        _ => &record.payments,
    };

    for &(method, amount) in payments {
        sqlx::query(
            "INSERT INTO sale_payments (sale_id, payment_method_id, amount_cents) VALUES (?1, ?2, ?3)",
        )
        .bind(sale_id)
        .bind(method)
        .bind(amount.cents())
        .execute(&mut *conn)
        .await?;
    }

    Ok(sale_id)
}

/// Inserts one sale line. Stock is the caller's business.
pub(crate) async fn insert_line(
    conn: &mut SqliteConnection,
    sale_id: i64,
    line: &LineRecord,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_items (sale_id, variant_id, item_name, quantity, unit_price_cents, subtotal_cents)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(sale_id)
    .bind(line.variant_id)
    .bind(&line.item_name)
    .bind(line.quantity)
    .bind(line.unit_price.cents())
    .bind(line.subtotal().cents())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Catalog name (`"Product (size)"`) and price of a variant.
pub(crate) async fn catalog_line(
    conn: &mut SqliteConnection,
    variant_id: i64,
) -> DbResult<(String, Money)> {
    let row: Option<(String, String, i64)> = sqlx::query_as(
        r#"
        SELECT p.name, v.size, p.price_cents
        FROM variants v
        JOIN products p ON p.id = v.product_id
        WHERE v.id = ?1
        "#,
    )
    .bind(variant_id)
    .fetch_optional(&mut *conn)
    .await?;

    let (name, size, price) = row.ok_or_else(|| DbError::not_found("Variant", variant_id))?;
    Ok((format!("{} ({})", name, size), Money::from_cents(price)))
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Records a sale atomically. See the module docs for the steps.
    ///
    /// ## Errors
    /// - `Validation` for a malformed cart or missing tender
    /// - `NotFound` for an unknown variant or credit note
    /// - `Conflict` for a used credit note
    /// - `InsufficientStock` when a line asks for more than is on hand
    pub async fn checkout(&self, input: CheckoutInput) -> DbResult<Receipt> {
        validate_cart_size(input.items.len())?;
        for line in &input.items {
            validate_quantity(line.quantity)?;
        }
        for payment in &input.payments {
            validate_positive_amount("amount_cents", payment.amount_cents)?;
        }
        let has_code = input
            .credit_note_code
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        if input.payments.is_empty() && input.payment_method_id.is_none() && !has_code {
            return Err(ValidationError::required("payment_method_id").into());
        }
        let rate = discount_rate(input.discount_percent)?;

        let mut tx = self.pool.begin().await?;

        let note = match input.credit_note_code.as_deref() {
            Some(code) if !code.trim().is_empty() => {
                Some(credit_note::find_active(&mut tx, code).await?)
            }
            _ => None,
        };

        let mut lines = Vec::with_capacity(input.items.len());
        for item in &input.items {
            lines.push(price_line(&mut tx, item).await?);
        }

        let totals = Totals::from_lines(lines.iter().map(|l| (l.unit_price, l.quantity)), rate)?;
        let client_total = input.total_cents.map(Money::from_cents);
        if totals.differs_from(client_total) {
            warn!(
                computed = %totals.total,
                client = ?input.total_cents,
                "Client total differs from computed total; storing computed"
            );
        }

        let notes = match (&note, input.notes.as_deref()) {
            (Some(n), Some(extra)) => Some(format!("{} | Paid with credit note {}", extra, n.code)),
            (Some(n), None) => Some(format!("Paid with credit note {}", n.code)),
            (None, extra) => extra.map(str::to_string),
        };

        let record = SaleRecord {
            totals,
            payment_method_id: input
                .payment_method_id
                .or_else(|| input.payments.first().map(|p| p.payment_method_id)),
            customer_id: input.customer_id,
            notes,
            remote_order_id: None,
            payments: input
                .payments
                .iter()
                .map(|p| (p.payment_method_id, Money::from_cents(p.amount_cents)))
                .collect(),
        };
        let sale_id = insert_sale(&mut tx, &record).await?;

        let mut stock_changes = Vec::new();
        for line in &lines {
            if let Some(variant_id) = line.variant_id {
                let change = inventory::decrement_checked(&mut tx, variant_id, line.quantity).await?;
                stock_changes.push(change);
            }
            insert_line(&mut tx, sale_id, line).await?;
        }

        if let Some(note) = &note {
            credit_note::redeem(&mut tx, note.id, sale_id).await?;
        }

        tx.commit().await?;

        info!(
            sale_id,
            total = %totals.total,
            lines = lines.len(),
            credit_note = note.as_ref().map(|n| n.code.as_str()),
            "Checkout committed"
        );

        Ok(Receipt {
            sale_id,
            totals,
            credit_note_code: note.map(|n| n.code),
            stock_changes,
        })
    }

    /// Voids a sale: restores stock of its inventory lines and deletes
    /// lines, payments and header in one transaction.
    pub async fn void(&self, id: i64) -> DbResult<VoidOutcome> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM sales WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Sale", id));
        }

        let lines: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT variant_id, quantity FROM sale_items WHERE sale_id = ?1 AND variant_id IS NOT NULL",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let mut stock_changes = Vec::with_capacity(lines.len());
        for (variant_id, quantity) in &lines {
            stock_changes.push(inventory::adjust(&mut tx, *variant_id, *quantity).await?);
        }

        sqlx::query("DELETE FROM sale_items WHERE sale_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sale_payments WHERE sale_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(sale_id = id, restored = lines.len(), "Sale voided");
        Ok(VoidOutcome {
            sale_id: id,
            restored_lines: lines.len(),
            stock_changes,
        })
    }

    /// A sale with its lines and payments.
    pub async fn get(&self, id: i64) -> DbResult<SaleDetail> {
        let sale = sqlx::query_as::<_, Sale>(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))?;
        self.detail(sale).await
    }

    /// Sales history, newest first.
    ///
    /// `current_session` restricts to sales since the open cash session
    /// and yields nothing when the register is closed.
    pub async fn history(&self, current_session: bool) -> DbResult<SalesHistory> {
        let sales: Vec<Sale> = if current_session {
            let opened_at: Option<DateTime<Utc>> =
                sqlx::query_scalar("SELECT opened_at FROM cash_sessions WHERE status = 'open'")
                    .fetch_optional(&self.pool)
                    .await?;
            match opened_at {
                Some(since) => self.recent(Some(since), None).await?,
                None => Vec::new(),
            }
        } else {
            self.recent(None, Some(HISTORY_LIMIT)).await?
        };

        let mut details = Vec::with_capacity(sales.len());
        for sale in sales {
            details.push(self.detail(sale).await?);
        }

        Ok(SalesHistory {
            sales: details,
            today_summary: self.today_summary().await?,
        })
    }

    /// Totals of completed sales since UTC midnight.
    pub async fn today_summary(&self) -> DbResult<TodaySummary> {
        let (total_cents, count): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(total_cents), 0), COUNT(*) FROM sales WHERE created_at >= ?1 AND status = 'completed'",
        )
        .bind(start_of_today())
        .fetch_one(&self.pool)
        .await?;
        Ok(TodaySummary { total_cents, count })
    }

    /// Latest sales, optionally bounded by time and count.
    pub async fn recent(
        &self,
        since: Option<DateTime<Utc>>,
        limit: Option<i64>,
    ) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            r#"
            SELECT {SALE_COLUMNS} FROM sales
            WHERE (?1 IS NULL OR created_at >= ?1)
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#
        ))
        .bind(since)
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;
        Ok(sales)
    }

    async fn detail(&self, sale: Sale) -> DbResult<SaleDetail> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, variant_id, item_name, quantity, unit_price_cents, subtotal_cents
            FROM sale_items WHERE sale_id = ?1 ORDER BY id
            "#,
        )
        .bind(sale.id)
        .fetch_all(&self.pool)
        .await?;

        let payments = sqlx::query_as::<_, PaymentLine>(
            r#"
            SELECT sp.payment_method_id, pm.name AS method_name, pm.category, sp.amount_cents
            FROM sale_payments sp
            JOIN payment_methods pm ON pm.id = sp.payment_method_id
            WHERE sp.sale_id = ?1
            ORDER BY sp.id
            "#,
        )
        .bind(sale.id)
        .fetch_all(&self.pool)
        .await?;

        let payment_method_name: Option<String> = match sale.payment_method_id {
            Some(method) => {
                sqlx::query_scalar("SELECT name FROM payment_methods WHERE id = ?1")
                    .bind(method)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => None,
        };

        Ok(SaleDetail {
            sale,
            payment_method_name,
            items,
            payments,
        })
    }
}

/// Prices one cart line against the catalog.
async fn price_line(conn: &mut SqliteConnection, item: &CheckoutLine) -> DbResult<LineRecord> {
    match item.variant_id {
        Some(variant_id) => {
            let (item_name, unit_price) = catalog_line(conn, variant_id).await?;
            debug!(variant_id, price = %unit_price, "Priced inventory line");
            Ok(LineRecord {
                variant_id: Some(variant_id),
                item_name,
                quantity: item.quantity,
                unit_price,
                settled: None,
            })
        }
        None => {
            let name = validate_name("name", item.name.as_deref().unwrap_or(""))?;
            let price = item
                .unit_price_cents
                .ok_or_else(|| ValidationError::required("unit_price_cents"))?;
            validate_price_cents(price)?;
            Ok(LineRecord {
                variant_id: None,
                item_name: name,
                quantity: item.quantity,
                unit_price: Money::from_cents(price),
                settled: None,
            })
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::returns::{ExchangedItem, ReturnInput, ReturnedItem};
    use crate::repository::test_support::{method_id, seed_product, test_db};

    fn inventory_line(variant_id: i64, quantity: i64) -> CheckoutLine {
        CheckoutLine {
            variant_id: Some(variant_id),
            name: None,
            quantity,
            unit_price_cents: None,
        }
    }

    async fn cash_checkout(db: &Database, items: Vec<CheckoutLine>) -> DbResult<Receipt> {
        let cash = method_id(db, "Efectivo").await;
        db.sales()
            .checkout(CheckoutInput {
                items,
                payment_method_id: Some(cash),
                ..Default::default()
            })
            .await
    }

    async fn count(db: &Database, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_checkout_prices_from_catalog_and_decrements() {
        let db = test_db().await;
        let (_, variants) = seed_product(&db, "Camiseta", 10_000, "M", 5).await;

        let receipt = cash_checkout(&db, vec![inventory_line(variants[0], 2)])
            .await
            .unwrap();
        assert_eq!(receipt.totals.total.cents(), 20_000);
        assert_eq!(receipt.stock_changes[0].new_stock, 3);
        assert_eq!(db.inventory().stock_of(variants[0]).await.unwrap(), 3);

        let detail = db.sales().get(receipt.sale_id).await.unwrap();
        assert_eq!(detail.items[0].item_name, "Camiseta (M)");
        assert_eq!(detail.payments.len(), 1);
        assert_eq!(detail.payments[0].category, PaymentCategory::Cash);
        assert_eq!(detail.payments[0].amount_cents, 20_000);
    }

    #[tokio::test]
    async fn test_checkout_insufficient_stock_rolls_back() {
        let db = test_db().await;
        let (_, a) = seed_product(&db, "Camiseta", 10_000, "M", 5).await;
        let (_, b) = seed_product(&db, "Short", 5_000, "M", 1).await;

        let err = cash_checkout(&db, vec![inventory_line(a[0], 2), inventory_line(b[0], 3)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::InsufficientStock {
                available: 1,
                requested: 3,
                ..
            }
        ));

        assert_eq!(db.inventory().stock_of(a[0]).await.unwrap(), 5);
        assert_eq!(db.inventory().stock_of(b[0]).await.unwrap(), 1);
        assert_eq!(count(&db, "sales").await, 0);
        assert_eq!(count(&db, "sale_items").await, 0);
        assert_eq!(count(&db, "sale_payments").await, 0);
    }

    #[tokio::test]
    async fn test_checkout_ignores_client_total_and_applies_discount() {
        let db = test_db().await;
        let (_, variants) = seed_product(&db, "Buzo", 30_000, "L", 2).await;
        let card = method_id(&db, "Tarjeta Débito").await;

        let receipt = db
            .sales()
            .checkout(CheckoutInput {
                items: vec![
                    inventory_line(variants[0], 1),
                    CheckoutLine {
                        variant_id: None,
                        name: Some("Estampado".into()),
                        quantity: 1,
                        unit_price_cents: Some(5_000),
                    },
                ],
                payment_method_id: Some(card),
                discount_percent: 10,
                total_cents: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(receipt.totals.subtotal.cents(), 35_000);
        assert_eq!(receipt.totals.discount.cents(), 3_500);
        assert_eq!(receipt.totals.total.cents(), 31_500);
        // manual line has no stock effect
        assert_eq!(receipt.stock_changes.len(), 1);

        let sale = db.sales().get(receipt.sale_id).await.unwrap();
        assert_eq!(sale.sale.total_cents, 31_500);
        assert_eq!(sale.items[1].variant_id, None);
    }

    #[tokio::test]
    async fn test_checkout_split_tender() {
        let db = test_db().await;
        let (_, variants) = seed_product(&db, "Campera", 50_000, "M", 1).await;
        let cash = method_id(&db, "Efectivo").await;
        let transfer = method_id(&db, "Transferencia").await;

        let receipt = db
            .sales()
            .checkout(CheckoutInput {
                items: vec![inventory_line(variants[0], 1)],
                payments: vec![
                    PaymentAllocation {
                        payment_method_id: cash,
                        amount_cents: 20_000,
                    },
                    PaymentAllocation {
                        payment_method_id: transfer,
                        amount_cents: 30_000,
                    },
                ],
                ..Default::default()
            })
            .await
            .unwrap();

        let sale = db.sales().get(receipt.sale_id).await.unwrap();
        assert_eq!(sale.sale.payment_method_id, Some(cash));
        assert_eq!(sale.payments.len(), 2);
        assert_eq!(sale.payments[1].category, PaymentCategory::Transfer);
    }

    #[tokio::test]
    async fn test_checkout_requires_tender() {
        let db = test_db().await;
        let (_, variants) = seed_product(&db, "Media", 1_000, "U", 1).await;
        let err = db
            .sales()
            .checkout(CheckoutInput {
                items: vec![inventory_line(variants[0], 1)],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_credit_note_round_trip() {
        let db = test_db().await;
        let (_, variants) = seed_product(&db, "Gorra", 4_000, "U", 3).await;
        let note = db.credit_notes().create(4_000, None).await.unwrap();

        let valid = db.credit_notes().validate(&note.code).await.unwrap();
        assert_eq!(valid.amount_cents, 4_000);

        let receipt = db
            .sales()
            .checkout(CheckoutInput {
                items: vec![inventory_line(variants[0], 1)],
                credit_note_code: Some(note.code.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(receipt.credit_note_code.as_deref(), Some(note.code.as_str()));

        assert!(matches!(
            db.credit_notes().validate(&note.code).await,
            Err(DbError::Conflict(_))
        ));

        let sale = db.sales().get(receipt.sale_id).await.unwrap();
        assert_eq!(
            sale.sale.notes.as_deref(),
            Some(format!("Paid with credit note {}", note.code).as_str())
        );

        // spending it again fails and leaves stock alone
        let err = db
            .sales()
            .checkout(CheckoutInput {
                items: vec![inventory_line(variants[0], 1)],
                credit_note_code: Some(note.code),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        assert_eq!(db.inventory().stock_of(variants[0]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_void_restores_stock_and_deletes() {
        let db = test_db().await;
        let (_, variants) = seed_product(&db, "Camiseta", 10_000, "M", 5).await;
        let receipt = cash_checkout(&db, vec![inventory_line(variants[0], 2)])
            .await
            .unwrap();

        let outcome = db.sales().void(receipt.sale_id).await.unwrap();
        assert_eq!(outcome.restored_lines, 1);
        assert_eq!(outcome.stock_changes[0].new_stock, 5);
        assert_eq!(count(&db, "sales").await, 0);
        assert_eq!(count(&db, "sale_items").await, 0);

        assert!(matches!(
            db.sales().void(receipt.sale_id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_stock_law_over_checkouts_and_voids() {
        let db = test_db().await;
        let (_, variants) = seed_product(&db, "Pelota", 2_000, "U", 10).await;
        let v = variants[0];

        let first = cash_checkout(&db, vec![inventory_line(v, 3)]).await.unwrap();
        cash_checkout(&db, vec![inventory_line(v, 2)]).await.unwrap();
        db.sales().void(first.sale_id).await.unwrap();

        assert_eq!(db.inventory().stock_of(v).await.unwrap(), 10 - 3 - 2 + 3);
    }

    #[tokio::test]
    async fn test_stock_law_over_checkouts_and_returns() {
        let db = test_db().await;
        let (_, variants) = seed_product(&db, "Pelota", 2_000, "U,XL", 10).await;
        let (v, other) = (variants[0], variants[1]);

        cash_checkout(&db, vec![inventory_line(v, 3)]).await.unwrap();
        cash_checkout(&db, vec![inventory_line(v, 2)]).await.unwrap();

        // plain return of one unit
        db.returns()
            .process(ReturnInput {
                items_in: vec![ReturnedItem {
                    variant_id: v,
                    quantity: 1,
                    unit_price_cents: None,
                }],
                ..Default::default()
            })
            .await
            .unwrap();

        // even exchange: two units of `v` back, two of `other` out
        db.returns()
            .process(ReturnInput {
                items_in: vec![ReturnedItem {
                    variant_id: v,
                    quantity: 2,
                    unit_price_cents: None,
                }],
                items_out: vec![ExchangedItem {
                    variant_id: other,
                    quantity: 2,
                }],
                payment_method_id: None,
            })
            .await
            .unwrap();

        cash_checkout(&db, vec![inventory_line(v, 4)]).await.unwrap();

        assert_eq!(db.inventory().stock_of(v).await.unwrap(), 10 - 3 - 2 + 1 + 2 - 4);
        assert_eq!(db.inventory().stock_of(other).await.unwrap(), 10 - 2);
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_cannot_oversell_last_unit() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("race.db")).max_connections(4))
            .await
            .unwrap();
        let (_, variants) = seed_product(&db, "Camiseta", 10_000, "M", 1).await;

        let (first, second) = tokio::join!(
            cash_checkout(&db, vec![inventory_line(variants[0], 1)]),
            cash_checkout(&db, vec![inventory_line(variants[0], 1)]),
        );

        let sold = [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(sold, 1);
        assert_eq!(db.inventory().stock_of(variants[0]).await.unwrap(), 0);
        assert_eq!(count(&db, "sales").await, 1);
        assert_eq!(count(&db, "sale_items").await, 1);
    }

    #[tokio::test]
    async fn test_oversized_manual_price_is_rejected() {
        let db = test_db().await;
        let err = cash_checkout(
            &db,
            vec![CheckoutLine {
                variant_id: None,
                name: Some("Servicio".into()),
                quantity: 3,
                unit_price_cents: Some(i64::MAX / 2),
            }],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DbError::Validation(ValidationError::OutOfRange { .. })));
        assert_eq!(count(&db, "sales").await, 0);
    }

    #[tokio::test]
    async fn test_history_and_today_summary() {
        let db = test_db().await;
        let (_, variants) = seed_product(&db, "Remera", 7_000, "S", 4).await;
        cash_checkout(&db, vec![inventory_line(variants[0], 1)]).await.unwrap();
        cash_checkout(&db, vec![inventory_line(variants[0], 1)]).await.unwrap();

        let history = db.sales().history(false).await.unwrap();
        assert_eq!(history.sales.len(), 2);
        assert!(history.sales[0].sale.id > history.sales[1].sale.id);
        assert_eq!(history.today_summary.count, 2);
        assert_eq!(history.today_summary.total_cents, 14_000);

        // register closed: scoped view is empty
        let scoped = db.sales().history(true).await.unwrap();
        assert!(scoped.sales.is_empty());
    }
}
