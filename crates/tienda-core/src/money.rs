//! # Money Module
//!
//! Provides the `Money` type for monetary values and `Percentage` for
//! discounts, markups and price increases.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Cash close with floats:                                                │
//! │    opening 1000.10 + cash 0.20 - withdrawal 0.30 = 999.9999999999999    │
//! │    counted 1000.00 → variance 0.0000000000001  ❌ "non-zero"            │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    100010 + 20 - 30 = 100000 → variance 0  ✅                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tienda_core::money::{Money, Percentage};
//!
//! let price = Money::from_cents(1099);
//! let line = price * 3_i64;
//! assert_eq!(line.cents(), 3297);
//!
//! let discounted = line.apply_percentage_discount(Percentage::from_bps(1000));
//! assert_eq!(discounted.cents(), 2967);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: return balances and cash variances can be negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Serialized as a plain integer**: the frontend receives cents
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price_cents ──► SaleItem.unit_price ──► Sale.subtotal          │
/// │                                                       │                 │
/// │                             discount_percent ─────────┤                 │
/// │                                                       ▼                 │
/// │  SalePayment.amount ◄──────────────────────────── Sale.total            │
/// │         │                                                               │
/// │         ▼                                                               │
/// │  CashBreakdown (cash/card/transfer/other) ──► expected cash ──► variance│
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole currency units.
    ///
    /// ```rust
    /// use tienda_core::money::Money;
    /// assert_eq!(Money::from_units(15).cents(), 1500);
    /// ```
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Money(units.saturating_mul(100))
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit portion.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is greater than zero.
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is less than zero.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.saturating_abs())
    }

    /// Clamps negative values to zero.
    #[inline]
    pub const fn floor_zero(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Multiplies money by a quantity, saturating at the i64 bounds.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Multiplies money by a quantity, `None` on overflow.
    ///
    /// ```rust
    /// use tienda_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(250).checked_multiply_quantity(4), Some(Money::from_cents(1000)));
    /// assert_eq!(Money::from_cents(i64::MAX / 2).checked_multiply_quantity(3), None);
    /// ```
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Subtracts `other`, `None` on overflow.
    #[inline]
    pub const fn checked_sub(&self, other: Money) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Sums `(price, quantity)` pairs, `None` if any product or the running
    /// total overflows.
    pub fn checked_line_sum<I>(lines: I) -> Option<Money>
    where
        I: IntoIterator<Item = (Money, i64)>,
    {
        lines.into_iter().try_fold(Money::zero(), |acc, (price, qty)| {
            acc.checked_add(price.checked_multiply_quantity(qty)?)
        })
    }

    /// Returns `rate` of this amount, rounded half away from zero.
    ///
    /// ## Implementation
    /// Integer math on basis points: `(amount * bps ± 5000) / 10000`.
    /// i128 keeps large amounts from overflowing.
    ///
    /// ```rust
    /// use tienda_core::money::{Money, Percentage};
    ///
    /// let amount = Money::from_cents(1000);
    /// // 8.25% of 10.00 = 0.825 → 0.83
    /// assert_eq!(amount.percentage_of(Percentage::from_bps(825)).cents(), 83);
    /// ```
    pub fn percentage_of(&self, rate: Percentage) -> Money {
        let product = self.0 as i128 * rate.bps() as i128;
        let rounded = if product >= 0 {
            (product + 5000) / 10000
        } else {
            (product - 5000) / 10000
        };
        Money::from_cents(rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// Subtracts `discount` of this amount.
    pub fn apply_percentage_discount(&self, discount: Percentage) -> Money {
        *self - self.percentage_of(discount)
    }

    /// Adds `markup` of this amount (used when mirroring prices to the cloud store).
    pub fn apply_markup(&self, markup: Percentage) -> Money {
        *self + self.percentage_of(markup)
    }

    /// Formats as a plain decimal string (`"1500.50"`), the shape the cloud
    /// store API expects for prices.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, self.units().abs(), self.cents_part())
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================
//
// Operators saturate instead of wrapping or panicking. Totals built from
// untrusted prices go through the checked helpers above.

/// Display for logs and generated notes.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.units().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(self.0.saturating_neg())
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Percentage
// =============================================================================

/// A rate in basis points (1 bps = 0.01%).
///
/// ## Why Basis Points?
/// Discounts ("10% off"), bulk price increases ("+7.5%") and the cloud markup
/// all need fractional percents without floats. 750 bps = 7.5%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Percentage(u32);

impl Percentage {
    /// 100% in basis points.
    pub const FULL_BPS: u32 = 10_000;

    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percentage(bps)
    }

    /// Creates a rate from a whole percent (`10` → 10%).
    #[inline]
    pub const fn from_whole(percent: u32) -> Self {
        Percentage(percent * 100)
    }

    /// Creates a rate from a decimal percent (`7.5` → 750 bps).
    ///
    /// Negative or non-finite input yields zero.
    pub fn from_percent(percent: f64) -> Self {
        if !percent.is_finite() || percent <= 0.0 {
            return Percentage(0);
        }
        Percentage((percent * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percent (display only).
    #[inline]
    pub fn percent(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Percentage(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents_and_parts() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.units(), 10);
        assert_eq!(money.cents_part(), 99);
        assert_eq!(Money::from_units(7).cents(), 700);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::zero()), "$0.00");
    }

    #[test]
    fn test_decimal_string() {
        assert_eq!(Money::from_cents(150050).to_decimal_string(), "1500.50");
        assert_eq!(Money::from_cents(5).to_decimal_string(), "0.05");
        assert_eq!(Money::from_cents(-250).to_decimal_string(), "-2.50");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3_i64).cents(), 3000);
        assert_eq!((-a).cents(), -1000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_percentage_of_rounds_half_away_from_zero() {
        let amount = Money::from_cents(1000);
        assert_eq!(amount.percentage_of(Percentage::from_bps(825)).cents(), 83);
        assert_eq!(amount.percentage_of(Percentage::from_whole(10)).cents(), 100);

        let refund = Money::from_cents(-1000);
        assert_eq!(refund.percentage_of(Percentage::from_bps(825)).cents(), -83);
    }

    #[test]
    fn test_discount_and_markup() {
        let subtotal = Money::from_cents(10_000);
        assert_eq!(
            subtotal
                .apply_percentage_discount(Percentage::from_whole(10))
                .cents(),
            9_000
        );
        assert_eq!(
            subtotal.apply_markup(Percentage::from_whole(15)).cents(),
            11_500
        );
        assert_eq!(subtotal.apply_markup(Percentage::zero()), subtotal);
    }

    #[test]
    fn test_floor_zero() {
        assert_eq!(Money::from_cents(-1).floor_zero(), Money::zero());
        assert_eq!(Money::from_cents(5).floor_zero().cents(), 5);
    }

    #[test]
    fn test_checked_arithmetic_reports_overflow() {
        let huge = Money::from_cents(i64::MAX / 2);
        assert_eq!(huge.checked_multiply_quantity(3), None);
        assert_eq!(huge.checked_add(huge), Some(Money::from_cents(i64::MAX - 1)));
        assert_eq!(huge.checked_add(huge).and_then(|m| m.checked_add(Money::from_cents(2))), None);
        assert_eq!(Money::from_cents(i64::MIN).checked_sub(Money::from_cents(1)), None);

        let lines = [(Money::from_cents(1500), 2), (Money::from_cents(999), 1)];
        assert_eq!(Money::checked_line_sum(lines), Some(Money::from_cents(3999)));
        assert_eq!(Money::checked_line_sum([(huge, 1), (huge, 2)]), None);
    }

    #[test]
    fn test_operators_saturate() {
        let max = Money::from_cents(i64::MAX);
        assert_eq!(max + Money::from_cents(1), max);
        assert_eq!((max * 2_i64).cents(), i64::MAX);
        assert_eq!(Money::from_cents(i64::MIN) - Money::from_cents(1), Money::from_cents(i64::MIN));
        let total: Money = [max, max].into_iter().sum();
        assert_eq!(total, max);
    }

    #[test]
    fn test_percentage_constructors() {
        assert_eq!(Percentage::from_percent(7.5).bps(), 750);
        assert_eq!(Percentage::from_percent(-3.0).bps(), 0);
        assert_eq!(Percentage::from_percent(f64::NAN).bps(), 0);
        assert_eq!(Percentage::from_whole(20).bps(), 2000);
        assert!((Percentage::from_bps(825).percent() - 8.25).abs() < 0.001);
    }
}
