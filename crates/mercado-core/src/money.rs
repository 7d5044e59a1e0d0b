//! # Money Module
//!
//! Provides the `Money` type and the single totals computation shared by
//! carts, quotes and orders.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  0.1 + 0.2 = 0.30000000000000004  ❌                                    │
//! │                                                                         │
//! │  A quote re-read at conversion time must produce the SAME totals as    │
//! │  when it was saved. Binary floats drift; integer cents do not.         │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units + basis-point rates                  │
//! │    subtotal 10_000_000 cents × 1900 bps = 1_900_000 cents of tax        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use mercado_core::money::Money;
//!
//! let price = Money::from_major(50_000);
//! let doubled = price * 2;
//! assert_eq!(doubled, Money::from_major(100_000));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::{LineItem, TaxRate};
use crate::VAT_RATE;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Where Money Flows
/// ```text
/// LineItemInput.unit_price ──► LineItem.subtotal ──► Totals.subtotal
///                                                        │
///                                         VAT (19%) ◄────┤
///                                                        ▼
///             Order.total ◄── Quote.total ◄──────── Totals.total
///                  │
///                  ├──► credit applied (all-or-nothing)
///                  └──► verified paid (accumulated proofs)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use mercado_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole currency units.
    ///
    /// ```rust
    /// use mercado_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(119_000).cents(), 11_900_000);
    /// ```
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * 100)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor-unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns `self - other`, floored at zero.
    ///
    /// ```rust
    /// use mercado_core::money::Money;
    ///
    /// let limit = Money::from_cents(100);
    /// assert_eq!(limit.saturating_sub(Money::from_cents(150)), Money::zero());
    /// ```
    #[inline]
    pub fn saturating_sub(self, other: Money) -> Money {
        if other.0 >= self.0 {
            Money::zero()
        } else {
            Money(self.0 - other.0)
        }
    }

    /// Calculates tax, rounding half up on the minor unit.
    ///
    /// ## Implementation
    /// `(amount × bps + 5000) / 10000` in i128 so large subtotals cannot
    /// overflow.
    ///
    /// ```rust
    /// use mercado_core::money::Money;
    /// use mercado_core::types::TaxRate;
    ///
    /// let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
    /// assert_eq!(tax.cents(), 83);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }

    /// `self + other`, or `None` on i64 overflow.
    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Subtotal, tax and total derived from a list of line items.
///
/// ## Invariant
/// `total == subtotal + tax` and `tax == round(subtotal × 19%)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Totals {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

impl Totals {
    /// Derives totals from a subtotal using the fixed VAT rate.
    pub fn from_subtotal(subtotal: Money) -> Self {
        let tax = subtotal.calculate_tax(VAT_RATE);
        Totals {
            subtotal,
            tax,
            total: subtotal + tax,
        }
    }
}

/// Computes subtotal, 19% tax and total for a list of line items.
///
/// Deterministic: the same line list always yields the same totals, which is
/// what lets a quote be converted to an order without re-pricing drift.
///
/// ```rust
/// use mercado_core::money::{compute_totals, Money};
///
/// let totals = compute_totals(&[]);
/// assert_eq!(totals.total, Money::zero());
/// ```
pub fn compute_totals(items: &[LineItem]) -> Totals {
    let subtotal = items
        .iter()
        .fold(Money::zero(), |acc, item| acc + item.subtotal());
    Totals::from_subtotal(subtotal)
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly rendering. Locale formatting belongs to the UI.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.major().abs(), self.cents_part())
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
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LineItemInput;

    fn line(unit_cents: i64, quantity: i64) -> LineItem {
        LineItem::snapshot(&LineItemInput {
            product_ref: "SKU".to_string(),
            name: "Item".to_string(),
            quantity,
            unit_price_cents: unit_cents,
        })
    }

    #[test]
    fn test_from_major() {
        let money = Money::from_major(119_000);
        assert_eq!(money.cents(), 11_900_000);
        assert_eq!(money.major(), 119_000);
        assert_eq!(money.cents_part(), 0);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::zero()), "$0.00");
    }

    #[test]
    fn test_saturating_sub_never_negative() {
        let a = Money::from_cents(500);
        assert_eq!(a.saturating_sub(Money::from_cents(200)).cents(), 300);
        assert_eq!(a.saturating_sub(Money::from_cents(500)), Money::zero());
        assert_eq!(a.saturating_sub(Money::from_cents(900)), Money::zero());
    }

    #[test]
    fn test_vat_on_round_amount() {
        let totals = Totals::from_subtotal(Money::from_major(100_000));
        assert_eq!(totals.tax, Money::from_major(19_000));
        assert_eq!(totals.total, Money::from_major(119_000));
    }

    #[test]
    fn test_vat_rounds_half_up() {
        // 3 cents × 19% = 0.57 → 1
        assert_eq!(Totals::from_subtotal(Money::from_cents(3)).tax.cents(), 1);
        // 1 cent × 19% = 0.19 → 0
        assert_eq!(Totals::from_subtotal(Money::from_cents(1)).tax.cents(), 0);
        // 50 cents × 19% = 9.5 → 10
        assert_eq!(Totals::from_subtotal(Money::from_cents(50)).tax.cents(), 10);
    }

    #[test]
    fn test_compute_totals_sums_lines() {
        let items = vec![line(12_345, 3), line(99, 7), line(1, 1)];
        let totals = compute_totals(&items);

        assert_eq!(totals.subtotal.cents(), 12_345 * 3 + 99 * 7 + 1);
        assert_eq!(totals.total, totals.subtotal + totals.tax);
        assert_eq!(
            totals.tax,
            totals.subtotal.calculate_tax(TaxRate::from_bps(1900))
        );
    }

    #[test]
    fn test_compute_totals_is_deterministic() {
        let items: Vec<LineItem> = (1..=40).map(|i| line(i * 333, i % 7 + 1)).collect();
        let first = compute_totals(&items);
        for _ in 0..10 {
            assert_eq!(compute_totals(&items), first);
        }

        let mut reversed = items.clone();
        reversed.reverse();
        assert_eq!(compute_totals(&reversed), first);
    }

    #[test]
    fn test_large_subtotal_does_not_overflow_tax() {
        let subtotal = Money::from_cents(i64::MAX / 2);
        let tax = subtotal.calculate_tax(TaxRate::from_bps(1900));
        assert!(tax.is_positive());
    }
}
