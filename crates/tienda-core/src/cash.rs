//! # Cash Session Reconciliation
//!
//! Pure arithmetic behind `GET /caja/status` and `POST /caja/close`.
//!
//! ## Close Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sales since opened_at ──► tender() ──► CategoryBreakdown               │
//! │                                              │ cash bucket              │
//! │                                              ▼                          │
//! │  opening float ──────────────────► expected = float + cash              │
//! │  movements ──► withdrawals / deposits        − withdrawals + deposits   │
//! │                                              │                          │
//! │  counted cash ─────────────────────► variance = counted − expected      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Classification uses [`PaymentCategory`], a stable column on the payment
//! method. A method named "Tarjeta Transferencia" lands in exactly one bucket.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{MovementKind, PaymentCategory};

// =============================================================================
// Breakdown
// =============================================================================

/// Sales totals split by tender category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryBreakdown {
    pub cash: Money,
    pub card: Money,
    pub transfer: Money,
    pub other: Money,
}

impl CategoryBreakdown {
    /// Adds `amount` to the bucket of `category`.
    pub fn add(&mut self, category: PaymentCategory, amount: Money) {
        match category {
            PaymentCategory::Cash => self.cash += amount,
            PaymentCategory::Card => self.card += amount,
            PaymentCategory::Transfer => self.transfer += amount,
            PaymentCategory::Other => self.other += amount,
        }
    }

    /// Everything that does not sit in the drawer.
    pub fn digital(&self) -> Money {
        self.card + self.transfer + self.other
    }

    /// Sum of all buckets.
    pub fn total(&self) -> Money {
        self.cash + self.digital()
    }
}

// =============================================================================
// Session Sale
// =============================================================================

/// A sale as seen by the register: its total, the category of its primary
/// method and any split-tender allocations.
#[derive(Debug, Clone, Default)]
pub struct SessionSale {
    pub total: Money,
    pub method_category: Option<PaymentCategory>,
    pub payments: Vec<(PaymentCategory, Money)>,
}

impl SessionSale {
    /// Tender allocations of this sale.
    ///
    /// Recorded payments win. A sale without payment rows counts its whole
    /// total against its primary method, or `Other` when it has none.
    pub fn tender(&self) -> Vec<(PaymentCategory, Money)> {
        if !self.payments.is_empty() {
            return self.payments.clone();
        }
        vec![(
            self.method_category.unwrap_or(PaymentCategory::Other),
            self.total,
        )]
    }
}

// =============================================================================
// Tally
// =============================================================================

/// Running totals of one open session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashTally {
    pub opening_float: Money,
    /// Sum of every sale total regardless of tender.
    pub sales_total: Money,
    pub sale_count: i64,
    pub breakdown: CategoryBreakdown,
    pub withdrawals: Money,
    pub deposits: Money,
}

impl CashTally {
    /// Starts a tally for a session opened with `opening_float`.
    pub fn new(opening_float: Money) -> Self {
        CashTally {
            opening_float,
            ..Default::default()
        }
    }

    /// Folds a sale into the tally.
    pub fn add_sale(&mut self, sale: &SessionSale) {
        self.sales_total += sale.total;
        self.sale_count += 1;
        for (category, amount) in sale.tender() {
            self.breakdown.add(category, amount);
        }
    }

    /// Folds a manual movement into the tally.
    pub fn add_movement(&mut self, kind: MovementKind, amount: Money) {
        match kind {
            MovementKind::Withdrawal => self.withdrawals += amount,
            MovementKind::Deposit => self.deposits += amount,
        }
    }

    /// `opening_float + cash − withdrawals + deposits`.
    pub fn expected_cash(&self) -> Money {
        self.opening_float + self.breakdown.cash - self.withdrawals + self.deposits
    }

    /// `counted − expected`. Positive means the drawer has extra cash.
    pub fn variance(&self, counted: Money) -> Money {
        counted - self.expected_cash()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
