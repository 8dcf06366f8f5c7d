//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Minor Units                                      │
//! │    Every price, line total and order total is an i64 count of the      │
//! │    smallest currency unit. Which currency that is does not matter.      │
//! │                                                                         │
//! │  The only rounding points are explicit:                                 │
//! │    unit price × quantity   → round half up to a minor unit              │
//! │    amount ÷ price per unit → round half up to 0.001 of a unit (fuel)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::Money;
//! use tally_core::quantity::Quantity;
//!
//! let price = Money::from_cents(100);
//! let total = price.multiply_quantity(Quantity::from_units(3)).unwrap();
//! assert_eq!(total.cents(), 300);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use ts_rs::TS;

use crate::quantity::{Quantity, MILLIS_PER_UNIT};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: variant offsets may be negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - Serialized as a plain JSON integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
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

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Adds two values, returning `None` on overflow.
    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Multiplies a unit price by a fixed-point quantity.
    ///
    /// ## Rounding
    /// The product is computed in i128 and rounded half away from zero to
    /// a whole minor unit. Returns `None` if the result does not fit in i64.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    /// use tally_core::quantity::Quantity;
    ///
    /// // 2.99 per kg × 1.5 kg = 4.485 → 4.49
    /// let total = Money::from_cents(299)
    ///     .multiply_quantity(Quantity::from_millis(1500))
    ///     .unwrap();
    /// assert_eq!(total.cents(), 449);
    /// ```
    ///
    /// ## User Workflow
    /// ```text
    /// Product: Rice, 2.99 / kg
    /// Scale reads: 1.500 kg
    ///      │
    ///      ▼
    /// multiply_quantity(1.500) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// Line Total: 4.49
    /// ```
    pub fn multiply_quantity(&self, qty: Quantity) -> Option<Money> {
        let product = self.0 as i128 * qty.millis() as i128;
        let rounded = div_round_half_away(product, MILLIS_PER_UNIT as i128)?;
        i64::try_from(rounded).ok().map(Money)
    }

    /// Divides a paid amount by a price per unit, giving the metered quantity.
    ///
    /// Used for fuel: the customer asks for an amount of money, the pump
    /// dispenses whatever volume that buys. The quantity is rounded half away
    /// from zero to three decimals. Returns `None` when `price_per_unit` is
    /// not positive or the result overflows.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let litres = Money::from_cents(1000)
    ///     .divide_by_unit_price(Money::from_cents(600))
    ///     .unwrap();
    /// assert_eq!(litres.millis(), 1667);
    /// ```
    pub fn divide_by_unit_price(&self, price_per_unit: Money) -> Option<Quantity> {
        if !price_per_unit.is_positive() {
            return None;
        }
        let scaled = self.0 as i128 * MILLIS_PER_UNIT as i128;
        let rounded = div_round_half_away(scaled, price_per_unit.0 as i128)?;
        i64::try_from(rounded).ok().map(Quantity::from_millis)
    }
}

/// Integer division rounding half away from zero. `None` if `d == 0`.
fn div_round_half_away(n: i128, d: i128) -> Option<i128> {
    if d == 0 {
        return None;
    }
    let q = n / d;
    let r = n % d;
    // |2r| >= |d| means the remainder is at least half
    if r != 0 && (r.abs() * 2) >= d.abs() {
        if (n < 0) != (d < 0) {
            Some(q - 1)
        } else {
            Some(q + 1)
        }
    } else {
        Some(q)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows the value with two decimals. Debugging only: the currency and its
/// exponent are not known to this crate.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
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

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_multiply_whole_quantity() {
        let unit_price = Money::from_cents(100);
        let line_total = unit_price.multiply_quantity(Quantity::from_units(3)).unwrap();
        assert_eq!(line_total.cents(), 300);
    }

    #[test]
    fn test_multiply_fractional_quantity_rounds_half_up() {
        // 10 × 0.25 = 2.5 → 3
        let total = Money::from_cents(10)
            .multiply_quantity(Quantity::from_millis(250))
            .unwrap();
        assert_eq!(total.cents(), 3);

        // 10 × 0.249 = 2.49 → 2
        let total = Money::from_cents(10)
            .multiply_quantity(Quantity::from_millis(249))
            .unwrap();
        assert_eq!(total.cents(), 2);
    }

    #[test]
    fn test_multiply_overflow_is_none() {
        let huge = Money::from_cents(i64::MAX);
        assert!(huge.multiply_quantity(Quantity::from_units(2)).is_none());
    }

    #[test]
    fn test_fuel_division() {
        // 1000 / 600 = 1.6666… → 1.667
        let qty = Money::from_cents(1000)
            .divide_by_unit_price(Money::from_cents(600))
            .unwrap();
        assert_eq!(qty.millis(), 1667);

        // exact division keeps every digit
        let qty = Money::from_cents(1500)
            .divide_by_unit_price(Money::from_cents(500))
            .unwrap();
        assert_eq!(qty.millis(), 3000);
    }

    #[test]
    fn test_fuel_division_rejects_non_positive_price() {
        assert!(Money::from_cents(1000)
            .divide_by_unit_price(Money::zero())
            .is_none());
        assert!(Money::from_cents(1000)
            .divide_by_unit_price(Money::from_cents(-5))
            .is_none());
    }

    #[test]
    fn test_round_half_away_negative() {
        assert_eq!(div_round_half_away(-25, 10), Some(-3));
        assert_eq!(div_round_half_away(-24, 10), Some(-2));
        assert_eq!(div_round_half_away(25, 10), Some(3));
        assert_eq!(div_round_half_away(1, 0), None);
    }

    #[test]
    fn test_checked_add() {
        assert_eq!(
            Money::from_cents(1).checked_add(Money::from_cents(2)),
            Some(Money::from_cents(3))
        );
        assert!(Money::from_cents(i64::MAX)
            .checked_add(Money::from_cents(1))
            .is_none());
    }
}
