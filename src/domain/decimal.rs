//! Lossless decimal numeric type backed by rust_decimal.
//!
//! Monetary amounts and ratios are held as `Decimal`; the return solver works in
//! `f64`, so conversion helpers live here as well.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lossless decimal numeric type for prices, quantities and ratios.
///
/// Serializes to a JSON number (not string).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    /// Parse a Decimal from a string, accepting plain and scientific notation.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        let s = s.trim();
        RustDecimal::from_str(s)
            .or_else(|_| RustDecimal::from_scientific(s))
            .map(Decimal)
    }

    /// Convert from `f64`. Returns `None` for NaN, infinities and out-of-range values.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        RustDecimal::from_f64(value).map(Decimal)
    }

    /// Format without exponent notation and without trailing zeros.
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    /// Lossy conversion for floating-point consumers (the return solver).
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn hundred() -> Self {
        Decimal(RustDecimal::ONE_HUNDRED)
    }

    /// Division that yields `None` instead of panicking on a zero divisor or overflow.
    pub fn checked_div(&self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_div(rhs.0).map(Decimal)
    }

    pub fn checked_add(&self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_add(rhs.0).map(Decimal)
    }

    pub fn checked_sub(&self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_sub(rhs.0).map(Decimal)
    }

    pub fn checked_mul(&self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_mul(rhs.0).map(Decimal)
    }

    /// Addition clamped to the representable range.
    pub fn saturating_add(&self, rhs: Decimal) -> Decimal {
        self.checked_add(rhs)
            .unwrap_or_else(|| Self::bound(self.is_negative()))
    }

    /// Subtraction clamped to the representable range.
    pub fn saturating_sub(&self, rhs: Decimal) -> Decimal {
        self.checked_sub(rhs)
            .unwrap_or_else(|| Self::bound(self.is_negative()))
    }

    /// Multiplication clamped to the representable range.
    pub fn saturating_mul(&self, rhs: Decimal) -> Decimal {
        self.checked_mul(rhs)
            .unwrap_or_else(|| Self::bound(self.is_negative() != rhs.is_negative()))
    }

    /// `self / base * 100` as a float. `None` on a zero base or overflow.
    pub fn percent_of(&self, base: Decimal) -> Option<f64> {
        self.checked_div(base)?
            .checked_mul(Self::hundred())
            .map(|p| p.to_f64())
    }

    fn bound(negative: bool) -> Decimal {
        if negative {
            Decimal(RustDecimal::MIN)
        } else {
            Decimal(RustDecimal::MAX)
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }
}

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

impl std::iter::Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), |acc, d| acc.saturating_add(d))
    }
}
