//! # Repository Module
//!
//! Database repository implementations for Tienda POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  axum handler                                                          │
//! │       │                                                                 │
//! │       │  state.db.sales().checkout(input)                              │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── checkout(&self, input)      one transaction                       │
//! │  ├── void(&self, id)             one transaction                       │
//! │  └── history(&self, ...)         plain reads                           │
//! │       │                                                                 │
//! │       │  every stock move goes through inventory::{decrement_checked,  │
//! │       │  adjust, set_absolute} on the caller's transaction             │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Workflows return StockChange values; the API pushes them to the      │
//! │  cloud store only after the transaction committed.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`catalog::CategoryRepository`] - Categories and specific categories
//! - [`product::ProductRepository`] - Products, variants, bulk edits, scan
//! - [`inventory::InventoryRepository`] - Stock reads; ledger functions
//! - [`sale::SaleRepository`] - Checkout, void, history
//! - [`cash::CashRepository`] - Cash register sessions
//! - [`credit_note::CreditNoteRepository`] - Store credit
//! - [`reservation::ReservationRepository`] - Layaway
//! - [`quote::QuoteRepository`] - Price quotes
//! - [`returns::ReturnRepository`] - Returns and exchanges
//! - [`cloud_order::CloudOrderRepository`] - Cloud store order ingestion
//! - [`payment_method::PaymentMethodRepository`] - Payment methods
//! - [`stats::StatsRepository`] - Dashboard and reports

pub mod cash;
pub mod catalog;
pub mod cloud_order;
pub mod credit_note;
pub mod inventory;
pub mod payment_method;
pub mod product;
pub mod quote;
pub mod reservation;
pub mod returns;
pub mod sale;
pub mod stats;

#[cfg(test)]
pub(crate) mod test_support;
