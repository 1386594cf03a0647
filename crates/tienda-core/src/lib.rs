//! # tienda-core: Pure Business Logic for Tienda POS
//!
//! Everything in this crate is deterministic arithmetic and rule checking.
//! The database layer loads rows, hands them to these functions, and persists
//! whatever comes back.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tienda POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/api (axum)                              │   │
//! │  │    /api/products  /api/sales  /api/returns  /api/webhooks       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tienda-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   cash    │  │  pricing  │  │   │
//! │  │   │  Variant  │  │   Money   │  │ breakdown │  │  totals   │  │   │
//! │  │   │   Sale    │  │Percentage │  │ variance  │  │ returns   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          tienda-db (SQLite)      tienda-cloud (Tiendanube)      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Variant, Sale, CashSession, Reservation, ...)
//! - [`money`] - Integer `Money` and basis-point `Percentage`
//! - [`cash`] - Cash-session breakdown and variance
//! - [`pricing`] - Checkout/quote totals, return settlement, price adjustments
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use tienda_core::money::{Money, Percentage};
//!
//! let price = Money::from_cents(10_000);
//! let web_price = price.apply_markup(Percentage::from_bps(1500));
//! assert_eq!(web_price.cents(), 11_500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cash;
pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Percentage};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single checkout, reservation or quote.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum unit price accepted from any input, in cents.
///
/// With [`MAX_ITEM_QUANTITY`] and [`MAX_CART_ITEMS`] this keeps every line
/// and cart total far inside i64 cents.
pub const MAX_PRICE_CENTS: i64 = 100_000_000_000;

/// Minimum stock threshold given to every variant created from a size list.
pub const DEFAULT_STOCK_MINIMUM: i64 = 2;

/// Default layaway window in days.
pub const DEFAULT_RESERVATION_EXPIRY_DAYS: i64 = 15;

/// Size assigned when a product is created without a size list.
pub const DEFAULT_SIZE: &str = "U";

/// Name of the payment method recorded on sales ingested from the cloud store.
pub const CLOUD_PAYMENT_METHOD_NAME: &str = "Tienda Nube";
