//! # Inventory Ledger
//!
//! The only code that writes `inventory.stock_on_hand`.
//!
//! ## Ledger Functions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Stock Mutations                                   │
//! │                                                                         │
//! │  checkout / reservation / exchange-out                                 │
//! │       └── decrement_checked(conn, variant, qty)                        │
//! │             UPDATE ... SET stock = stock - qty                         │
//! │             WHERE variant_id = ? AND stock >= qty                      │
//! │             0 rows → InsufficientStock (nothing written)               │
//! │                                                                         │
//! │  return-in / cancel / void / cloud order                               │
//! │       └── adjust(conn, variant, delta)                                 │
//! │             INSERT ... ON CONFLICT DO UPDATE SET stock = stock + delta │
//! │             missing row → created with max(0, delta)                   │
//! │                                                                         │
//! │  manual count / bulk stock                                             │
//! │       └── set_absolute(conn, variant, count)                           │
//! │                                                                         │
//! │  Each call is one statement on the caller's transaction, so two       │
//! │  concurrent checkouts cannot both pass a stale read.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function returns a [`StockChange`] carrying the variant's cloud
//! link. Callers collect them and push to the cloud store after commit.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tienda_core::{CloudLink, Inventory, StockChange, DEFAULT_STOCK_MINIMUM};

// =============================================================================
// Ledger Functions
// =============================================================================

/// Cloud link of a variant. Fails with `NotFound` for an unknown variant.
pub async fn variant_link(
    conn: &mut SqliteConnection,
    variant_id: i64,
) -> DbResult<Option<CloudLink>> {
    let row: Option<(Option<i64>, Option<i64>)> = sqlx::query_as(
        r#"
        SELECT p.cloud_product_id, v.cloud_variant_id
        FROM variants v
        JOIN products p ON p.id = v.product_id
        WHERE v.id = ?1
        "#,
    )
    .bind(variant_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some((product, variant)) => Ok(CloudLink::from_parts(product, variant)),
        None => Err(DbError::not_found("Variant", variant_id)),
    }
}

/// Removes `qty` units, failing if fewer are on hand.
///
/// ## Errors
/// - `NotFound` for an unknown variant
/// - `InsufficientStock` when `stock_on_hand < qty` (also when the variant
///   has no inventory row yet, which counts as zero)
pub async fn decrement_checked(
    conn: &mut SqliteConnection,
    variant_id: i64,
    qty: i64,
) -> DbResult<StockChange> {
    let cloud = variant_link(conn, variant_id).await?;

    let new_stock: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE inventory
        SET stock_on_hand = stock_on_hand - ?1
        WHERE variant_id = ?2 AND stock_on_hand >= ?1
        RETURNING stock_on_hand
        "#,
    )
    .bind(qty)
    .bind(variant_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(new_stock) = new_stock else {
        let available: Option<i64> =
            sqlx::query_scalar("SELECT stock_on_hand FROM inventory WHERE variant_id = ?1")
                .bind(variant_id)
                .fetch_optional(&mut *conn)
                .await?;
        return Err(DbError::InsufficientStock {
            variant_id,
            available: available.unwrap_or(0),
            requested: qty,
        });
    };

    debug!(variant_id, qty, new_stock, "Stock decremented");
    Ok(StockChange {
        variant_id,
        new_stock,
        cloud,
    })
}

/// Applies a signed delta with no floor check.
///
/// Creates the inventory row with `max(0, delta)` if it does not exist.
pub async fn adjust(
    conn: &mut SqliteConnection,
    variant_id: i64,
    delta: i64,
) -> DbResult<StockChange> {
    let cloud = variant_link(conn, variant_id).await?;

    let new_stock: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO inventory (variant_id, stock_on_hand, stock_minimum)
        VALUES (?1, MAX(0, ?2), ?3)
        ON CONFLICT (variant_id) DO UPDATE
            SET stock_on_hand = stock_on_hand + ?2
        RETURNING stock_on_hand
        "#,
    )
    .bind(variant_id)
    .bind(delta)
    .bind(DEFAULT_STOCK_MINIMUM)
    .fetch_one(&mut *conn)
    .await?;

    debug!(variant_id, delta, new_stock, "Stock adjusted");
    Ok(StockChange {
        variant_id,
        new_stock,
        cloud,
    })
}

/// Overwrites the counter with an absolute count.
pub async fn set_absolute(
    conn: &mut SqliteConnection,
    variant_id: i64,
    count: i64,
) -> DbResult<StockChange> {
    let cloud = variant_link(conn, variant_id).await?;

    let new_stock: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO inventory (variant_id, stock_on_hand, stock_minimum)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (variant_id) DO UPDATE
            SET stock_on_hand = excluded.stock_on_hand
        RETURNING stock_on_hand
        "#,
    )
    .bind(variant_id)
    .bind(count)
    .bind(DEFAULT_STOCK_MINIMUM)
    .fetch_one(&mut *conn)
    .await?;

    debug!(variant_id, new_stock, "Stock set");
    Ok(StockChange {
        variant_id,
        new_stock,
        cloud,
    })
}

// =============================================================================
// Repository
// =============================================================================

/// A variant at or below its minimum.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LowStockItem {
    pub variant_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub size: String,
    pub sku: String,
    pub stock_on_hand: i64,
    pub stock_minimum: i64,
}

/// Stock reads plus single-variant adjustments outside a larger workflow.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Inventory row of a variant, if one was ever written.
    pub async fn get(&self, variant_id: i64) -> DbResult<Option<Inventory>> {
        let row = sqlx::query_as::<_, Inventory>(
            "SELECT variant_id, stock_on_hand, stock_minimum FROM inventory WHERE variant_id = ?1",
        )
        .bind(variant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Stock on hand, zero when no row exists.
    pub async fn stock_of(&self, variant_id: i64) -> DbResult<i64> {
        Ok(self
            .get(variant_id)
            .await?
            .map(|inv| inv.stock_on_hand)
            .unwrap_or(0))
    }

    /// Variants with `stock_on_hand <= stock_minimum`, lowest first.
    pub async fn low_stock(&self, limit: i64) -> DbResult<Vec<LowStockItem>> {
        let items = sqlx::query_as::<_, LowStockItem>(
            r#"
            SELECT
                v.id AS variant_id,
                p.id AS product_id,
                p.name AS product_name,
                v.size,
                v.sku,
                i.stock_on_hand,
                i.stock_minimum
            FROM inventory i
            JOIN variants v ON v.id = i.variant_id
            JOIN products p ON p.id = v.product_id
            WHERE i.stock_on_hand <= i.stock_minimum
            ORDER BY i.stock_on_hand ASC, p.name ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Manual signed adjustment of one variant.
    pub async fn adjust(&self, variant_id: i64, delta: i64) -> DbResult<StockChange> {
        let mut tx = self.pool.begin().await?;
        let change = adjust(&mut tx, variant_id, delta).await?;
        tx.commit().await?;
        Ok(change)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
