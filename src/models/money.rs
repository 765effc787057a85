//! Money type for representing currency amounts
//!
//! Internally stores amounts in cents (i64) to avoid floating-point precision
//! issues. The API exchanges amounts as integers in the same unit; the
//! conversion helpers at the bottom translate to and from decimal amounts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a monetary amount stored as cents (hundredths of the currency unit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Create a Money amount from cents
    ///
    /// # Examples
    /// ```
    /// use envelope_api::models::Money;
    /// let amount = Money::from_cents(1050); // $10.50
    /// ```
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Create a zero Money amount
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Get the amount in cents
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Check if the amount is zero
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Check if the amount is positive
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Check if the amount is negative
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Addition that reports overflow instead of wrapping
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Subtraction that reports overflow instead of wrapping
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Negation that reports overflow for `i64::MIN`
    pub fn checked_neg(self) -> Option<Self> {
        self.0.checked_neg().map(Self)
    }

    /// Sum of many amounts, `None` if any partial sum overflows
    ///
    /// # Examples
    /// ```
    /// use envelope_api::models::Money;
    /// let parts = [Money::from_cents(i64::MAX), Money::from_cents(1)];
    /// assert_eq!(Money::checked_sum(parts), None);
    /// ```
    pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Self::zero(), |total, amount| total.checked_add(amount))
    }

    /// The larger of two amounts
    pub fn max(self, other: Self) -> Self {
        if self >= other {
            self
        } else {
            other
        }
    }

    /// The smaller of two amounts
    pub fn min(self, other: Self) -> Self {
        if self <= other {
            self
        } else {
            other
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dollars = self.0.unsigned_abs() / 100;
        let cents = self.0.unsigned_abs() % 100;
        if self.is_negative() {
            write!(f, "-${}.{:02}", dollars, cents)
        } else {
            write!(f, "${}.{:02}", dollars, cents)
        }
    }
}

impl From<i64> for Money {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

/// Convert a decimal amount to integer cents
///
/// Rounds half away from zero: `10.555` becomes `1056`, `-0.005` becomes `-1`.
/// Returns `None` when the result is not finite or does not fit in an i64.
pub fn amount_to_integer(amount: f64) -> Option<i64> {
    let cents = (amount * 100.0).round();
    // i64::MIN and i64::MAX + 1 are both exact powers of two in f64
    if !cents.is_finite() || cents < i64::MIN as f64 || cents >= i64::MAX as f64 {
        return None;
    }
    Some(cents as i64)
}

/// Convert integer cents to a decimal amount with two decimal places
///
/// Non-integral input is rounded to the nearest cent first.
pub fn integer_to_amount(value: f64) -> f64 {
    value.round() / 100.0
}
