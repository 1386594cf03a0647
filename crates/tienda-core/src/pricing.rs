//! # Pricing
//!
//! Server-side totals for checkouts, reservations and quotes, the balance
//! rule for returns/exchanges, and bulk price adjustments.
//!
//! ## Authoritative Totals
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lines (catalog or declared price × qty) ──► subtotal                   │
//! │                                                 │                       │
//! │                         discount % ─────────────┤                       │
//! │                                                 ▼                       │
//! │                          total = subtotal − round(subtotal × pct)       │
//! │                                                                         │
//! │  A client-sent total is compared against this and only logged.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, Percentage};

// =============================================================================
// Totals
// =============================================================================

/// Subtotal, discount and total of a priced set of lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Totals {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
}

impl Totals {
    /// Computes totals from `(unit_price, quantity)` pairs.
    ///
    /// ```rust
    /// use tienda_core::money::{Money, Percentage};
    /// use tienda_core::pricing::Totals;
    ///
    /// let lines = [(Money::from_cents(1500), 2), (Money::from_cents(999), 1)];
    /// let totals = Totals::from_lines(lines, Percentage::from_whole(10)).unwrap();
    /// assert_eq!(totals.subtotal.cents(), 3999);
    /// assert_eq!(totals.discount.cents(), 400);
    /// assert_eq!(totals.total.cents(), 3599);
    /// ```
    ///
    /// Fails with [`CoreError::AmountOverflow`] when a line or the subtotal
    /// does not fit in cents.
    pub fn from_lines<I>(lines: I, discount: Percentage) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (Money, i64)>,
    {
        let subtotal = line_sum("subtotal", lines)?;
        Ok(Totals::from_subtotal(subtotal, discount))
    }

    /// Applies `discount` to an already summed subtotal.
    pub fn from_subtotal(subtotal: Money, discount: Percentage) -> Self {
        let discount = subtotal.percentage_of(discount);
        Totals {
            subtotal,
            discount,
            total: subtotal - discount,
        }
    }

    /// True when a client-supplied total disagrees with the computed one.
    pub fn differs_from(&self, client_total: Option<Money>) -> bool {
        matches!(client_total, Some(t) if t != self.total)
    }
}

/// Checked sum of `(price, quantity)` pairs, naming `field` on overflow.
pub fn line_sum<I>(field: &str, lines: I) -> CoreResult<Money>
where
    I: IntoIterator<Item = (Money, i64)>,
{
    Money::checked_line_sum(lines).ok_or_else(|| CoreError::AmountOverflow {
        field: field.to_string(),
    })
}

/// Converts a whole discount percent (0..=100) into a [`Percentage`].
pub fn discount_rate(percent: i64) -> Result<Percentage, ValidationError> {
    if !(0..=100).contains(&percent) {
        return Err(ValidationError::OutOfRange {
            field: "discount_percent".to_string(),
            min: 0,
            max: 100,
        });
    }
    Ok(Percentage::from_whole(percent as u32))
}

// =============================================================================
// Return Settlement
// =============================================================================

/// What a return/exchange does with its money difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum Settlement {
    /// The store owes the customer: issue a credit note.
    CreditNote(Money),
    /// The customer owes the store: record a supplementary sale.
    SupplementarySale(Money),
    /// Even exchange: only stock moves.
    Even,
}

impl Settlement {
    /// `balance = total_out − total_in`.
    ///
    /// ```rust
    /// use tienda_core::money::Money;
    /// use tienda_core::pricing::Settlement;
    ///
    /// let s = Settlement::from_totals(Money::from_cents(5000), Money::from_cents(3000));
    /// assert_eq!(s, Settlement::CreditNote(Money::from_cents(2000)));
    /// ```
    pub fn from_totals(total_in: Money, total_out: Money) -> Self {
        let balance = total_out - total_in;
        if balance.is_negative() {
            Settlement::CreditNote(balance.abs())
        } else if balance.is_positive() {
            Settlement::SupplementarySale(balance)
        } else {
            Settlement::Even
        }
    }
}

impl Settlement {
    /// Payment method needed to collect a supplementary sale.
    ///
    /// Returns `Ok(None)` when nothing is owed.
    pub fn require_method(&self, method_id: Option<i64>) -> CoreResult<Option<i64>> {
        match (self, method_id) {
            (Settlement::SupplementarySale(amount), None) => {
                Err(CoreError::PaymentMethodRequired {
                    amount_cents: amount.cents(),
                })
            }
            (Settlement::SupplementarySale(_), Some(id)) => Ok(Some(id)),
            _ => Ok(None),
        }
    }
}

/// Splits `amount` across lines in proportion to `weights`.
///
/// Shares are rounded down and the last line takes the remainder, so the
/// result always sums to `amount`. Zero total weight puts everything on
/// the last line.
///
/// ```rust
/// use tienda_core::money::Money;
/// use tienda_core::pricing::allocate;
///
/// let shares = allocate(Money::from_cents(1000), &[Money::from_cents(3000), Money::from_cents(1000)]);
/// assert_eq!(shares, vec![Money::from_cents(750), Money::from_cents(250)]);
/// ```
pub fn allocate(amount: Money, weights: &[Money]) -> Vec<Money> {
    let total: i128 = weights.iter().map(|w| w.cents() as i128).sum();
    let mut shares = Vec::with_capacity(weights.len());
    let mut given: i128 = 0;
    for (i, weight) in weights.iter().enumerate() {
        let share = if i + 1 == weights.len() {
            amount.cents() as i128 - given
        } else if total == 0 {
            0
        } else {
            amount.cents() as i128 * weight.cents() as i128 / total
        };
        given += share;
        shares.push(Money::from_cents(share as i64));
    }
    shares
}

/// Balance due of a layaway: `total − deposit`.
pub fn reservation_balance(total: Money, deposit: Money) -> CoreResult<Money> {
    if deposit.is_negative() {
        return Err(ValidationError::Negative {
            field: "deposit_cents".to_string(),
        }
        .into());
    }
    if deposit > total {
        return Err(CoreError::DepositExceedsTotal {
            deposit_cents: deposit.cents(),
            total_cents: total.cents(),
        });
    }
    Ok(total - deposit)
}

// =============================================================================
// Bulk Price Adjustment
// =============================================================================

/// A bulk price action.
///
/// Wire shape: `{"action": "percent_inc", "value": 10}`. Percent values are
/// percents; fixed and set values are cents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "action", content = "value")]
pub enum PriceAdjustment {
    #[serde(rename = "percent_inc")]
    PercentIncrease(f64),
    #[serde(rename = "fixed_inc")]
    FixedIncrease(i64),
    #[serde(rename = "set_value")]
    SetValue(i64),
}

impl PriceAdjustment {
    /// Rejects negative values.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let negative = match *self {
            PriceAdjustment::PercentIncrease(p) => !p.is_finite() || p < 0.0,
            PriceAdjustment::FixedIncrease(c) | PriceAdjustment::SetValue(c) => c < 0,
        };
        if negative {
            return Err(ValidationError::Negative {
                field: "value".to_string(),
            });
        }
        Ok(())
    }

    /// New price for `current`, never below zero.
    pub fn apply(&self, current: Money) -> Money {
        let next = match *self {
            PriceAdjustment::PercentIncrease(p) => {
                current.apply_markup(Percentage::from_percent(p))
            }
            PriceAdjustment::FixedIncrease(c) => current + Money::from_cents(c),
            PriceAdjustment::SetValue(c) => Money::from_cents(c),
        };
        next.floor_zero()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_without_discount() {
        let totals =
            Totals::from_lines([(Money::from_cents(2500), 3)], Percentage::zero()).unwrap();
        assert_eq!(totals.subtotal.cents(), 7500);
        assert_eq!(totals.discount, Money::zero());
        assert_eq!(totals.total.cents(), 7500);
    }

    #[test]
    fn test_totals_overflow_is_an_error() {
        let lines = [(Money::from_cents(i64::MAX / 2), 3)];
        assert!(matches!(
            Totals::from_lines(lines, Percentage::zero()),
            Err(CoreError::AmountOverflow { ref field }) if field == "subtotal"
        ));

        let lines = [(Money::from_cents(i64::MAX / 2), 1), (Money::from_cents(i64::MAX / 2), 2)];
        assert!(line_sum("total_in", lines).is_err());
    }

    #[test]
    fn test_quote_discount_rounds_half_up() {
        // 333 × 15% = 49.95 → 50
        let totals = Totals::from_subtotal(Money::from_cents(333), Percentage::from_whole(15));
        assert_eq!(totals.discount.cents(), 50);
        assert_eq!(totals.total.cents(), 283);
    }

    #[test]
    fn test_client_total_mismatch() {
        let totals = Totals::from_subtotal(Money::from_cents(1000), Percentage::zero());
        assert!(!totals.differs_from(None));
        assert!(!totals.differs_from(Some(Money::from_cents(1000))));
        assert!(totals.differs_from(Some(Money::from_cents(900))));
    }

    #[test]
    fn test_discount_rate_bounds() {
        assert_eq!(discount_rate(0).unwrap(), Percentage::zero());
        assert_eq!(discount_rate(100).unwrap().bps(), 10_000);
        assert!(discount_rate(101).is_err());
        assert!(discount_rate(-1).is_err());
    }

    #[test]
    fn test_settlement_balance_law() {
        let in_ = Money::from_cents(3000);
        assert_eq!(
            Settlement::from_totals(in_, Money::from_cents(4500)),
            Settlement::SupplementarySale(Money::from_cents(1500))
        );
        assert_eq!(
            Settlement::from_totals(in_, Money::from_cents(1000)),
            Settlement::CreditNote(Money::from_cents(2000))
        );
        assert_eq!(Settlement::from_totals(in_, in_), Settlement::Even);
    }

    #[test]
    fn test_settlement_requires_method_only_when_owed() {
        let owed = Settlement::SupplementarySale(Money::from_cents(500));
        assert!(matches!(
            owed.require_method(None),
            Err(CoreError::PaymentMethodRequired { amount_cents: 500 })
        ));
        assert_eq!(owed.require_method(Some(3)).unwrap(), Some(3));
        assert_eq!(Settlement::Even.require_method(None).unwrap(), None);
        assert_eq!(
            Settlement::CreditNote(Money::from_cents(1)).require_method(Some(3)).unwrap(),
            None
        );
    }

    #[test]
    fn test_allocate_sums_to_amount() {
        let weights = [Money::from_cents(1000), Money::from_cents(1000), Money::from_cents(1000)];
        let shares = allocate(Money::from_cents(100), &weights);
        assert_eq!(shares, vec![Money::from_cents(33), Money::from_cents(33), Money::from_cents(34)]);

        let shares = allocate(Money::from_cents(500), &[Money::zero(), Money::zero()]);
        assert_eq!(shares, vec![Money::zero(), Money::from_cents(500)]);

        assert!(allocate(Money::from_cents(500), &[]).is_empty());
    }

    #[test]
    fn test_reservation_balance() {
        let total = Money::from_cents(10_000);
        assert_eq!(
            reservation_balance(total, Money::from_cents(3_000)).unwrap().cents(),
            7_000
        );
        assert!(matches!(
            reservation_balance(total, Money::from_cents(12_000)),
            Err(CoreError::DepositExceedsTotal { .. })
        ));
        assert!(reservation_balance(total, Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_price_adjustments() {
        let price = Money::from_cents(10_000);
        assert_eq!(
            PriceAdjustment::PercentIncrease(7.5).apply(price).cents(),
            10_750
        );
        assert_eq!(PriceAdjustment::FixedIncrease(250).apply(price).cents(), 10_250);
        assert_eq!(PriceAdjustment::SetValue(0).apply(price), Money::zero());
    }

    #[test]
    fn test_price_adjustment_wire_shape() {
        let action: PriceAdjustment =
            serde_json::from_str(r#"{"action":"percent_inc","value":10}"#).unwrap();
        assert_eq!(action, PriceAdjustment::PercentIncrease(10.0));

        let action: PriceAdjustment =
            serde_json::from_str(r#"{"action":"set_value","value":1999}"#).unwrap();
        assert_eq!(action, PriceAdjustment::SetValue(1999));

        assert!(PriceAdjustment::FixedIncrease(-5).validate().is_err());
        assert!(PriceAdjustment::PercentIncrease(5.0).validate().is_ok());
    }
}
