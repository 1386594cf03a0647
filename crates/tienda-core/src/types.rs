//! # Domain Types
//!
//! Core domain types used throughout Tienda POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │1─n│    Variant      │1─1│   Inventory     │       │
//! │  │  name, price    │   │  size, sku      │   │  stock_on_hand  │       │
//! │  │  cloud_product  │   │  cloud_variant  │   │  stock_minimum  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Sale       │1─n│    SaleItem     │   │  SalePayment    │       │
//! │  │  totals, status │   │  variant_id?    │   │  method, amount │       │
//! │  │  remote_order?  │1─n└─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  CashSession    │1─n│  CashMovement   │   │   CreditNote    │       │
//! │  │  open / closed  │   │ withdrawal/dep. │   │ active / used   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                              │
//! │  │  Reservation    │   │     Quote       │   (each owns its lines)      │
//! │  │ pending/withdr. │   │ discount %      │                              │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Rows use integer primary keys. Human-facing identifiers are derived from
//! them (variant SKU `P{product_id}-{size}`, scan by numeric variant id).
//! Every monetary column is stored and serialized in cents (`*_cents`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Status Enums
// =============================================================================

/// Stable tender classification of a payment method.
///
/// Cash-session bucketing reads this column, never the display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentCategory {
    /// Physical cash that ends up in the drawer.
    Cash,
    /// Debit or credit card.
    Card,
    /// Bank transfer.
    Transfer,
    /// Anything else (cloud store orders, vouchers).
    Other,
}

impl PaymentCategory {
    /// Lowercase label as stored in the database.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentCategory::Cash => "cash",
            PaymentCategory::Card => "card",
            PaymentCategory::Transfer => "transfer",
            PaymentCategory::Other => "other",
        }
    }
}

/// The status of a sale.
///
/// A void deletes the sale outright, so stored rows are always `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale has been paid and finalized.
    Completed,
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Completed
    }
}

/// Register session state. Strictly alternates `closed → open → closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CashSessionStatus {
    Open,
    Closed,
}

/// Direction of a manual cash movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Cash taken out of the drawer.
    Withdrawal,
    /// Cash put into the drawer.
    Deposit,
}

impl Default for MovementKind {
    fn default() -> Self {
        MovementKind::Withdrawal
    }
}

/// Credit note lifecycle. A note is redeemable exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CreditNoteStatus {
    Active,
    Used,
}

/// Layaway lifecycle.
///
/// ```text
///            withdraw
///  pending ───────────► withdrawn
///     │
///     │ cancel (restores stock)
///     ▼
///  cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Withdrawn,
    Cancelled,
}

// =============================================================================
// Catalog
// =============================================================================

/// A configured way of paying.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentMethod {
    pub id: i64,
    /// Display name ("Efectivo", "Tarjeta Débito", ...).
    pub name: String,
    pub category: PaymentCategory,
}

/// A product category or a specific category (league/type tag).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// A product. Prices live here; stock lives on each variant.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Local selling price in cents.
    pub price_cents: i64,
    pub category_id: Option<i64>,
    pub specific_category_id: Option<i64>,
    /// Id of the mirrored product in the cloud store.
    pub cloud_product_id: Option<i64>,
    pub cloud_synced: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// A sellable size of a product. Inventory is tracked per variant.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Variant {
    pub id: i64,
    pub product_id: i64,
    pub size: String,
    pub sku: String,
    pub color: Option<String>,
    pub cloud_variant_id: Option<i64>,
}

/// Stock counter of one variant.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Inventory {
    pub variant_id: i64,
    pub stock_on_hand: i64,
    pub stock_minimum: i64,
}

impl Inventory {
    /// True when the counter is at or below its threshold.
    pub fn is_low(&self) -> bool {
        self.stock_on_hand <= self.stock_minimum
    }
}

// =============================================================================
// Stock Change
// =============================================================================

/// Cloud store identity of a variant. Both ids are needed to address it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CloudLink {
    pub product_id: i64,
    pub variant_id: i64,
}

impl CloudLink {
    /// Builds a link only when both remote ids are present.
    pub fn from_parts(product_id: Option<i64>, variant_id: Option<i64>) -> Option<Self> {
        match (product_id, variant_id) {
            (Some(product_id), Some(variant_id)) => Some(CloudLink {
                product_id,
                variant_id,
            }),
            _ => None,
        }
    }
}

/// Outcome of one inventory mutation.
///
/// Workflows collect these inside their transaction and hand them to the
/// cloud pusher only after commit, so a rolled back sale never leaks a
/// stock update to the cloud store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockChange {
    pub variant_id: i64,
    pub new_stock: i64,
    pub cloud: Option<CloudLink>,
}

// =============================================================================
// Sales
// =============================================================================

/// A sale header.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    /// Primary method; kept for single-tender sales and reporting.
    pub payment_method_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub notes: Option<String>,
    pub status: SaleStatus,
    /// Cloud store order this sale mirrors (unique).
    pub remote_order_id: Option<i64>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line of a sale. `variant_id` is `None` for manual lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: i64,
    pub sale_id: i64,
    pub variant_id: Option<i64>,
    /// Name frozen at time of sale.
    pub item_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

/// One tender allocation of a sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalePayment {
    pub id: i64,
    pub sale_id: i64,
    pub payment_method_id: i64,
    pub amount_cents: i64,
}

// =============================================================================
// Cash Register
// =============================================================================

/// One register shift.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashSession {
    pub id: i64,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    pub opening_float_cents: i64,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    pub status: CashSessionStatus,
    pub system_total_cents: Option<i64>,
    pub counted_total_cents: Option<i64>,
    pub variance_cents: Option<i64>,
}

/// A manual withdrawal or deposit inside a session.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashMovement {
    pub id: i64,
    pub session_id: i64,
    pub kind: MovementKind,
    pub amount_cents: i64,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Credit Notes, Reservations, Quotes
// =============================================================================

/// Store credit issued when a return favors the customer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CreditNote {
    pub id: i64,
    /// `NC-` followed by 8 uppercase hex digits.
    pub code: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub status: CreditNoteStatus,
    pub notes: Option<String>,
    pub used_in_sale_id: Option<i64>,
}

/// A layaway hold.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Reservation {
    pub id: i64,
    pub customer_name: String,
    pub phone: Option<String>,
    pub total_cents: i64,
    pub deposit_cents: i64,
    pub balance_due_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub expires_at: DateTime<Utc>,
    pub status: ReservationStatus,
}

impl Reservation {
    /// A pending reservation past its expiry date.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && self.expires_at < now
    }
}

/// A held line of a reservation, priced at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReservationItem {
    pub id: i64,
    pub reservation_id: i64,
    pub variant_id: i64,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

/// An informational price quote. Never touches inventory.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Quote {
    pub id: i64,
    pub customer_name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub discount_percent: i64,
    pub subtotal_cents: i64,
    pub total_cents: i64,
}

/// A quote line. Manual lines carry no variant.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct QuoteItem {
    pub id: i64,
    pub quote_id: i64,
    pub variant_id: Option<i64>,
    pub item_name: String,
    pub size: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

// =============================================================================
// Remote Orders
// =============================================================================

/// An order placed on the cloud store, already parsed into local money.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RemoteOrder {
    pub id: i64,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub lines: Vec<RemoteOrderLine>,
}

/// One product line of a remote order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RemoteOrderLine {
    /// Resolved first.
    pub cloud_variant_id: Option<i64>,
    /// Fallback when the cloud variant id is unknown locally.
    pub sku: Option<String>,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_cloud_link_requires_both_ids() {
        assert_eq!(
            CloudLink::from_parts(Some(10), Some(20)),
            Some(CloudLink {
                product_id: 10,
                variant_id: 20
            })
        );
        assert_eq!(CloudLink::from_parts(Some(10), None), None);
        assert_eq!(CloudLink::from_parts(None, Some(20)), None);
    }

    #[test]
    fn test_inventory_is_low() {
        let inv = Inventory {
            variant_id: 1,
            stock_on_hand: 2,
            stock_minimum: 2,
        };
        assert!(inv.is_low());

        let inv = Inventory {
            stock_on_hand: 3,
            ..inv
        };
        assert!(!inv.is_low());
    }

    #[test]
    fn test_reservation_expiry_only_applies_to_pending() {
        let now = Utc::now();
        let mut reservation = Reservation {
            id: 1,
            customer_name: "Ana".to_string(),
            phone: None,
            total_cents: 10_000,
            deposit_cents: 2_000,
            balance_due_cents: 8_000,
            created_at: now - Duration::days(20),
            expires_at: now - Duration::days(5),
            status: ReservationStatus::Pending,
        };
        assert!(reservation.is_expired(now));

        reservation.status = ReservationStatus::Withdrawn;
        assert!(!reservation.is_expired(now));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&PaymentCategory::Transfer).unwrap(),
            "\"transfer\""
        );
        assert_eq!(
            serde_json::to_string(&MovementKind::Withdrawal).unwrap(),
            "\"withdrawal\""
        );
        let kind: MovementKind = serde_json::from_str("\"deposit\"").unwrap();
        assert_eq!(kind, MovementKind::Deposit);
        assert_eq!(SaleStatus::default(), SaleStatus::Completed);
    }
}
