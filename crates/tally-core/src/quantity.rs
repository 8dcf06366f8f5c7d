//! # Quantity Module
//!
//! Fixed-point quantities with three decimal places.
//!
//! A quantity is stored as an i64 count of thousandths of a unit. The same
//! type carries discrete counts (`3` cans), weights (`1.250` kg), volumes and
//! metered fuel (`1.667` litres), and the stock level of every product.
//!
//! ```text
//!   wire (JSON)      Quantity        millis
//!   ───────────      ────────        ──────
//!   3                3.000           3000
//!   1.25             1.250           1250
//!   0.0004           0.000           0      (rounded to 3 dp)
//! ```

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Number of millis in one whole unit.
pub const MILLIS_PER_UNIT: i64 = 1000;

/// A non-currency amount with three fixed decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Quantity(i64);

impl Quantity {
    /// Creates a quantity from thousandths of a unit.
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Quantity(millis)
    }

    /// Creates a quantity of whole units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * MILLIS_PER_UNIT)
    }

    /// Converts a decimal number, rounding half away from zero to three
    /// decimals. Returns `None` for NaN, infinities, and out-of-range values.
    ///
    /// ```rust
    /// use tally_core::quantity::Quantity;
    ///
    /// assert_eq!(Quantity::from_decimal(1.2345).unwrap().millis(), 1235);
    /// assert!(Quantity::from_decimal(f64::NAN).is_none());
    /// ```
    pub fn from_decimal(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * MILLIS_PER_UNIT as f64).round();
        if scaled.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Quantity(scaled as i64))
    }

    #[inline]
    pub const fn millis(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// True when there is no fractional part.
    #[inline]
    pub const fn is_whole(&self) -> bool {
        self.0 % MILLIS_PER_UNIT == 0
    }

    #[inline]
    pub fn checked_add(self, other: Quantity) -> Option<Quantity> {
        self.0.checked_add(other.0).map(Quantity)
    }

    /// The value as a float, for formula scopes and display.
    #[inline]
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / MILLIS_PER_UNIT as f64
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / MILLIS_PER_UNIT as u64;
        let frac = abs % MILLIS_PER_UNIT as u64;
        if frac == 0 {
            write!(f, "{}{}", sign, whole)
        } else {
            let digits = format!("{:03}", frac);
            write!(f, "{}{}.{}", sign, whole, digits.trim_end_matches('0'))
        }
    }
}

impl Add for Quantity {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Quantity(self.0 + other.0)
    }
}

impl AddAssign for Quantity {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Quantity {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Quantity(self.0 - other.0)
    }
}

// =============================================================================
// Serde: plain JSON numbers
// =============================================================================

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_whole() {
            serializer.serialize_i64(self.0 / MILLIS_PER_UNIT)
        } else {
            serializer.serialize_f64(self.as_f64())
        }
    }
}

struct QuantityVisitor;

impl<'de> Visitor<'de> for QuantityVisitor {
    type Value = Quantity;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a finite number")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Quantity, E> {
        v.checked_mul(MILLIS_PER_UNIT)
            .map(Quantity)
            .ok_or_else(|| E::custom("quantity out of range"))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Quantity, E> {
        i64::try_from(v)
            .ok()
            .and_then(|v| v.checked_mul(MILLIS_PER_UNIT))
            .map(Quantity)
            .ok_or_else(|| E::custom("quantity out of range"))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Quantity, E> {
        Quantity::from_decimal(v).ok_or_else(|| E::custom("quantity must be a finite number"))
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(QuantityVisitor)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
