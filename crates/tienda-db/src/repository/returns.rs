//! # Return Repository
//!
//! Returns and exchanges in one transaction.
//!
//! ## Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  items_in  ──► adjust(+qty)            total_in  += price × qty      │
//! │  items_out ──► decrement_checked(qty)  total_out += price × qty      │
//! │                                                                      │
//! │  balance = total_out − total_in                                      │
//! │     < 0  ──► credit note for |balance|                               │
//! │     > 0  ──► supplementary sale (needs payment_method_id)            │
//! │     = 0  ──► stock moves only                                        │
//! │                                                                      │
//! │  Any failure rolls back every stock move of the request.             │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::DbResult;
use crate::repository::sale::{catalog_line, insert_line, insert_sale, LineRecord, SaleRecord};
use crate::repository::{credit_note, inventory};
use tienda_core::pricing::{allocate, line_sum, Settlement, Totals};
use tienda_core::validation::{validate_cart_size, validate_price_cents, validate_quantity};
use tienda_core::{CreditNote, Money, StockChange, ValidationError};

fn one() -> i64 {
    1
}

/// A returned item. `unit_price_cents` is what the customer paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnedItem {
    pub variant_id: i64,
    #[serde(default = "one")]
    pub quantity: i64,
    pub unit_price_cents: Option<i64>,
}

/// An item taken in exchange, priced from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangedItem {
    pub variant_id: i64,
    #[serde(default = "one")]
    pub quantity: i64,
}

/// Input of `POST /api/returns/process`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReturnInput {
    #[serde(default)]
    pub items_in: Vec<ReturnedItem>,
    #[serde(default)]
    pub items_out: Vec<ExchangedItem>,
    pub payment_method_id: Option<i64>,
}

/// What a processed return did.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnOutcome {
    pub total_in_cents: i64,
    pub total_out_cents: i64,
    /// `total_out − total_in`.
    pub balance_cents: i64,
    pub credit_note: Option<CreditNote>,
    pub sale_id: Option<i64>,
    #[serde(skip)]
    pub stock_changes: Vec<StockChange>,
}

/// Repository for returns and exchanges.
#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    /// Creates a new ReturnRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    /// Moves stock both ways and settles the difference.
    ///
    /// ## Errors
    /// - `Validation` when both lists are empty, or a quantity/price is bad
    /// - `Rule(PaymentMethodRequired)` when the customer owes money and no
    ///   method was given
    /// - `InsufficientStock` for an exchanged item
    /// - `NotFound` for an unknown variant
    pub async fn process(&self, input: ReturnInput) -> DbResult<ReturnOutcome> {
        if input.items_in.is_empty() && input.items_out.is_empty() {
            return Err(ValidationError::Empty {
                field: "items".to_string(),
            }
            .into());
        }
        validate_cart_size(input.items_in.len() + input.items_out.len())?;
        for item in &input.items_in {
            validate_quantity(item.quantity)?;
            if let Some(cents) = item.unit_price_cents {
                validate_price_cents(cents)?;
            }
        }
        for item in &input.items_out {
            validate_quantity(item.quantity)?;
        }

        let mut tx = self.pool.begin().await?;
        let mut stock_changes = Vec::new();

        let mut returned = Vec::with_capacity(input.items_in.len());
        for item in &input.items_in {
            let (_, catalog_price) = catalog_line(&mut tx, item.variant_id).await?;
            let price = item
                .unit_price_cents
                .map(Money::from_cents)
                .unwrap_or(catalog_price);
            returned.push((price, item.quantity));
            stock_changes.push(inventory::adjust(&mut tx, item.variant_id, item.quantity).await?);
        }
        let total_in = line_sum("total_in", returned)?;

        let mut exchange_lines = Vec::with_capacity(input.items_out.len());
        for item in &input.items_out {
            let (name, price) = catalog_line(&mut tx, item.variant_id).await?;
            stock_changes
                .push(inventory::decrement_checked(&mut tx, item.variant_id, item.quantity).await?);
            exchange_lines.push(LineRecord {
                variant_id: Some(item.variant_id),
                item_name: format!("Exchange: {}", name),
                quantity: item.quantity,
                unit_price: price,
                settled: None,
            });
        }
        let total_out = line_sum(
            "total_out",
            exchange_lines.iter().map(|l| (l.unit_price, l.quantity)),
        )?;

        let settlement = Settlement::from_totals(total_in, total_out);
        let method = settlement.require_method(input.payment_method_id)?;

        let mut credit_note = None;
        let mut sale_id = None;
        match settlement {
            Settlement::CreditNote(amount) => {
                credit_note =
                    Some(credit_note::issue(&mut tx, amount, Some("Return balance")).await?);
            }
            Settlement::SupplementarySale(amount) => {
                sale_id = Some(
                    record_difference(&mut tx, total_in, total_out, amount, method, exchange_lines)
                        .await?,
                );
            }
            Settlement::Even => {}
        }

        tx.commit().await?;

        let balance = total_out - total_in;
        info!(
            total_in = %total_in,
            total_out = %total_out,
            balance = %balance,
            credit_note = credit_note.as_ref().map(|n| n.code.as_str()),
            sale_id,
            "Return processed"
        );

        Ok(ReturnOutcome {
            total_in_cents: total_in.cents(),
            total_out_cents: total_out.cents(),
            balance_cents: balance.cents(),
            credit_note,
            sale_id,
            stock_changes,
        })
    }
}

/// Sale for what the customer owes. Returned goods count as the discount,
/// so `subtotal − discount = total` still holds on the header.
///
/// Line subtotals carry each line's share of `amount`, so per-product
/// revenue only counts what was actually collected.
async fn record_difference(
    conn: &mut SqliteConnection,
    total_in: Money,
    total_out: Money,
    amount: Money,
    method: Option<i64>,
    mut lines: Vec<LineRecord>,
) -> DbResult<i64> {
    let catalog: Vec<Money> = lines
        .iter()
        .map(|l| l.unit_price.multiply_quantity(l.quantity))
        .collect();
    for (line, share) in lines.iter_mut().zip(allocate(amount, &catalog)) {
        line.settled = Some(share);
    }

    let record = SaleRecord {
        totals: Totals {
            subtotal: total_out,
            discount: total_in,
            total: amount,
        },
        payment_method_id: method,
        notes: Some("Exchange difference".to_string()),
        ..Default::default()
    };
    let sale_id = insert_sale(conn, &record).await?;
    // Stock already moved with the exchange
    for line in &lines {
        insert_line(conn, sale_id, line).await?;
    }
    Ok(sale_id)
}
