//! # Quote Repository
//!
//! Price quotes (presupuestos). Informational only: no stock effect.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;
use crate::repository::sale::catalog_line;
use tienda_core::pricing::{discount_rate, Totals};
use tienda_core::validation::{
    validate_cart_size, validate_name, validate_price_cents, validate_quantity,
};
use tienda_core::{Money, Quote, QuoteItem, ValidationError};

/// Quotes returned by `list`.
pub const QUOTE_LIST_LIMIT: i64 = 50;

fn one() -> i64 {
    1
}

/// One quoted line. A variant line defaults to the catalog price.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteLine {
    pub variant_id: Option<i64>,
    pub name: Option<String>,
    pub size: Option<String>,
    #[serde(default = "one")]
    pub quantity: i64,
    pub unit_price_cents: Option<i64>,
}

/// Input of `POST /api/sales/presupuestos`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewQuote {
    pub customer_name: String,
    pub items: Vec<QuoteLine>,
    #[serde(default)]
    pub discount_percent: i64,
}

/// A quote with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteDetail {
    #[serde(flatten)]
    pub quote: Quote,
    pub items: Vec<QuoteItem>,
}

/// Repository for price quotes.
#[derive(Debug, Clone)]
pub struct QuoteRepository {
    pool: SqlitePool,
}

impl QuoteRepository {
    /// Creates a new QuoteRepository.
    pub fn new(pool: SqlitePool) -> Self {
        QuoteRepository { pool }
    }

    /// Prices and stores a quote.
    ///
    /// `total = subtotal − subtotal × discount%`, rounded half away from zero.
    pub async fn create(&self, input: NewQuote) -> DbResult<QuoteDetail> {
        let customer = validate_name("customer_name", &input.customer_name)?;
        validate_cart_size(input.items.len())?;
        let rate = discount_rate(input.discount_percent)?;

        let mut tx = self.pool.begin().await?;

        // (variant, name, size, qty, unit price)
        let mut lines: Vec<(Option<i64>, String, Option<String>, i64, Money)> =
            Vec::with_capacity(input.items.len());
        for item in &input.items {
            validate_quantity(item.quantity)?;
            let line = match item.variant_id {
                Some(variant_id) => {
                    let (catalog_name, catalog_price) = catalog_line(&mut tx, variant_id).await?;
                    let price = match item.unit_price_cents {
                        Some(cents) => {
                            validate_price_cents(cents)?;
                            Money::from_cents(cents)
                        }
                        None => catalog_price,
                    };
                    let name = item
                        .name
                        .as_deref()
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .map(str::to_string)
                        .unwrap_or(catalog_name);
                    (Some(variant_id), name, item.size.clone(), item.quantity, price)
                }
                None => {
                    let name = validate_name("name", item.name.as_deref().unwrap_or(""))?;
                    let cents = item
                        .unit_price_cents
                        .ok_or_else(|| ValidationError::required("unit_price_cents"))?;
                    validate_price_cents(cents)?;
                    (None, name, item.size.clone(), item.quantity, Money::from_cents(cents))
                }
            };
            lines.push(line);
        }

        let totals = Totals::from_lines(lines.iter().map(|l| (l.4, l.3)), rate)?;

        let quote_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO quotes (customer_name, created_at, discount_percent, subtotal_cents, total_cents)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id
            "#,
        )
        .bind(&customer)
        .bind(Utc::now())
        .bind(input.discount_percent)
        .bind(totals.subtotal.cents())
        .bind(totals.total.cents())
        .fetch_one(&mut *tx)
        .await?;

        for (variant_id, name, size, quantity, price) in &lines {
            sqlx::query(
                r#"
                INSERT INTO quote_items (quote_id, variant_id, item_name, size, quantity, unit_price_cents, subtotal_cents)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(quote_id)
            .bind(variant_id)
            .bind(name)
            .bind(size)
            .bind(quantity)
            .bind(price.cents())
            .bind(price.multiply_quantity(*quantity).cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(quote_id, customer = %customer, total = %totals.total, "Quote created");
        self.get(quote_id).await
    }

    /// One quote with its lines.
    pub async fn get(&self, id: i64) -> DbResult<QuoteDetail> {
        let quote = sqlx::query_as::<_, Quote>(
            "SELECT id, customer_name, created_at, discount_percent, subtotal_cents, total_cents FROM quotes WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| crate::error::DbError::not_found("Quote", id))?;
        self.with_items(quote).await
    }

    /// The latest quotes, newest first.
    pub async fn list(&self, limit: i64) -> DbResult<Vec<QuoteDetail>> {
        let quotes = sqlx::query_as::<_, Quote>(
            r#"
            SELECT id, customer_name, created_at, discount_percent, subtotal_cents, total_cents
            FROM quotes ORDER BY created_at DESC, id DESC LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(quotes.len());
        for quote in quotes {
            out.push(self.with_items(quote).await?);
        }
        Ok(out)
    }

    async fn with_items(&self, quote: Quote) -> DbResult<QuoteDetail> {
        let items = sqlx::query_as::<_, QuoteItem>(
            r#"
            SELECT id, quote_id, variant_id, item_name, size, quantity, unit_price_cents, subtotal_cents
            FROM quote_items WHERE quote_id = ?1 ORDER BY id
            "#,
        )
        .bind(quote.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(QuoteDetail { quote, items })
    }
}
