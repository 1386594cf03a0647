//! # Cloud Order Repository
//!
//! Mirrors cloud store orders as local sales.
//!
//! ## Idempotency
//! ```text
//! webhook delivery (order 991)
//!      │
//!      ▼
//! SELECT id FROM sales WHERE remote_order_id = 991
//!      │
//!      ├── found ──► Duplicate { sale_id }          (no stock moves)
//!      │
//!      └── none ──► one transaction:
//!                   INSERT sale (remote_order_id = 991)   ◄── UNIQUE
//!                   per line: resolve variant, adjust(−qty)
//!                   COMMIT
//!
//! Two racing deliveries: the loser hits the UNIQUE index, rolls back
//! and reports Duplicate for the winner's sale.
//! ```
//!
//! Cloud sales are accepted even when local stock would go negative: the
//! platform already took the customer's money.

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::inventory;
use crate::repository::sale::{insert_line, insert_sale, LineRecord, SaleRecord};
use tienda_core::pricing::Totals;
use tienda_core::validation::{validate_price_cents, validate_quantity};
use tienda_core::{RemoteOrder, RemoteOrderLine, StockChange, CLOUD_PAYMENT_METHOD_NAME};

/// Result of ingesting one remote order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// A sale already mirrors this order.
    Duplicate { sale_id: i64 },
    /// A new sale was recorded.
    Processed {
        sale_id: i64,
        #[serde(skip)]
        stock_changes: Vec<StockChange>,
    },
}

impl IngestOutcome {
    pub fn sale_id(&self) -> i64 {
        match self {
            IngestOutcome::Duplicate { sale_id } | IngestOutcome::Processed { sale_id, .. } => {
                *sale_id
            }
        }
    }
}

/// Repository for cloud store orders.
#[derive(Debug, Clone)]
pub struct CloudOrderRepository {
    pool: SqlitePool,
}

impl CloudOrderRepository {
    /// Creates a new CloudOrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CloudOrderRepository { pool }
    }

    /// Local sale mirroring `remote_order_id`, if any.
    pub async fn find(&self, remote_order_id: i64) -> DbResult<Option<i64>> {
        let id = sqlx::query_scalar("SELECT id FROM sales WHERE remote_order_id = ?1")
            .bind(remote_order_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    /// Records `order` as a sale unless one already mirrors it.
    ///
    /// Lines are checked before any row is touched: a zero or negative
    /// quantity would otherwise turn the stock decrement into an increment.
    pub async fn ingest(&self, order: &RemoteOrder) -> DbResult<IngestOutcome> {
        for line in &order.lines {
            validate_quantity(line.quantity)?;
            validate_price_cents(line.unit_price.cents())?;
        }

        if let Some(sale_id) = self.find(order.id).await? {
            debug!(remote_order_id = order.id, sale_id, "Cloud order already recorded");
            return Ok(IngestOutcome::Duplicate { sale_id });
        }

        match self.record(order).await {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.is_unique_violation() => {
                // Lost the race against a concurrent delivery
                let sale_id = self
                    .find(order.id)
                    .await?
                    .ok_or_else(|| DbError::Internal(format!("order {} vanished", order.id)))?;
                warn!(remote_order_id = order.id, sale_id, "Concurrent cloud order delivery");
                Ok(IngestOutcome::Duplicate { sale_id })
            }
            Err(err) => Err(err),
        }
    }

    async fn record(&self, order: &RemoteOrder) -> DbResult<IngestOutcome> {
        let mut tx = self.pool.begin().await?;

        let method_id = cloud_payment_method(&mut tx).await?;
        let record = SaleRecord {
            totals: Totals {
                subtotal: order.subtotal,
                discount: order.discount,
                total: order.total,
            },
            payment_method_id: Some(method_id),
            notes: Some(format!("Cloud order #{}", order.id)),
            remote_order_id: Some(order.id),
            ..Default::default()
        };
        let sale_id = insert_sale(&mut tx, &record).await?;

        let mut stock_changes = Vec::new();
        let mut unresolved = 0usize;
        for line in &order.lines {
            let variant_id = resolve_variant(&mut tx, line).await?;
            match variant_id {
                Some(id) => stock_changes.push(inventory::adjust(&mut tx, id, -line.quantity).await?),
                None => unresolved += 1,
            }
            insert_line(
                &mut tx,
                sale_id,
                &LineRecord {
                    variant_id,
                    item_name: line.name.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    settled: None,
                },
            )
            .await?;
        }

        tx.commit().await?;

        if unresolved > 0 {
            warn!(
                remote_order_id = order.id,
                unresolved, "Cloud order lines without a local variant"
            );
        }
        info!(
            remote_order_id = order.id,
            sale_id,
            total = %order.total,
            "Cloud order recorded"
        );
        Ok(IngestOutcome::Processed {
            sale_id,
            stock_changes,
        })
    }
}

/// Id of the cloud payment method, created on first use.
async fn cloud_payment_method(conn: &mut SqliteConnection) -> DbResult<i64> {
    sqlx::query("INSERT OR IGNORE INTO payment_methods (name, category) VALUES (?1, 'other')")
        .bind(CLOUD_PAYMENT_METHOD_NAME)
        .execute(&mut *conn)
        .await?;
    let id = sqlx::query_scalar("SELECT id FROM payment_methods WHERE name = ?1")
        .bind(CLOUD_PAYMENT_METHOD_NAME)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

/// Local variant of a remote line: by cloud variant id, then by SKU.
async fn resolve_variant(
    conn: &mut SqliteConnection,
    line: &RemoteOrderLine,
) -> DbResult<Option<i64>> {
    if let Some(cloud_id) = line.cloud_variant_id {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM variants WHERE cloud_variant_id = ?1 LIMIT 1")
                .bind(cloud_id)
                .fetch_optional(&mut *conn)
                .await?;
        if found.is_some() {
            return Ok(found);
        }
    }

    match line.sku.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(sku) => {
            let found = sqlx::query_scalar("SELECT id FROM variants WHERE sku = ?1")
                .bind(sku)
                .fetch_optional(&mut *conn)
                .await?;
            Ok(found)
        }
        None => Ok(None),
    }
}
