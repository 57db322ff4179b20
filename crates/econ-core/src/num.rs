//! Fixed-precision decimal arithmetic for economic quantities.
//!
//! Every arithmetic result is rounded to [`SIGNIFICANT_DIGITS`] significant
//! digits with banker's rounding. There is no implicit conversion from binary
//! floating point: [`Num::try_from`] accepts a float only when its binary value
//! equals its decimal literal, and [`Num::from_f64_lossy`] is the explicit,
//! rounding conversion.
//!
//! Division is only exposed as [`Num::checked_div`] / [`Num::try_div`] so every
//! call site has to say what happens on a zero divisor.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{NumError, SimError};

/// Precision of every economic quantity.
pub const SIGNIFICANT_DIGITS: u32 = 8;

fn context(value: Decimal) -> Decimal {
    value.round_sf(SIGNIFICANT_DIGITS).unwrap_or(value)
}

/// A decimal number carrying at most [`SIGNIFICANT_DIGITS`] significant digits.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Num(Decimal);

impl Num {
    /// Zero.
    pub const ZERO: Num = Num(Decimal::ZERO);
    /// One.
    pub const ONE: Num = Num(Decimal::ONE);

    /// Exact literal `num * 10^-scale`, e.g. `Num::new(75, 2)` is 0.75.
    pub fn new(num: i64, scale: u32) -> Self {
        Self::from(Decimal::new(num, scale))
    }

    /// Deliberate conversion from a float, rounding to the fixed precision.
    pub fn from_f64_lossy(value: f64) -> Result<Self, NumError> {
        Decimal::from_f64_retain(value)
            .map(Self::from)
            .ok_or(NumError::Unrepresentable(value))
    }

    /// Underlying decimal.
    pub fn to_decimal(self) -> Decimal {
        self.0
    }

    /// True for zero.
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// True when strictly greater than zero.
    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// True when strictly less than zero.
    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Integer part, rounding toward zero.
    pub fn trunc(self) -> Self {
        Num(self.0.trunc())
    }

    /// Round to `dp` decimal places.
    pub fn round_dp(self, dp: u32) -> Self {
        Self::from(self.0.round_dp(dp))
    }

    /// `self / rhs`, or `None` when `rhs` is zero.
    pub fn checked_div(self, rhs: Num) -> Option<Num> {
        if rhs.is_zero() {
            return None;
        }
        self.0.checked_div(rhs.0).map(Self::from)
    }

    /// `self / rhs`, treating a zero divisor as a fault at `site`.
    pub fn try_div(self, rhs: Num, site: &'static str) -> Result<Num, SimError> {
        self.checked_div(rhs).ok_or(SimError::degenerate(site))
    }

    /// `max(self, 0)`.
    pub fn non_negative(self) -> Self {
        self.max(Num::ZERO)
    }
}

impl From<Decimal> for Num {
    fn from(value: Decimal) -> Self {
        Num(context(value))
    }
}

impl From<Num> for Decimal {
    fn from(value: Num) -> Self {
        value.0
    }
}

impl From<i64> for Num {
    fn from(value: i64) -> Self {
        Self::from(Decimal::from(value))
    }
}

impl From<u64> for Num {
    fn from(value: u64) -> Self {
        Self::from(Decimal::from(value))
    }
}

impl From<usize> for Num {
    fn from(value: usize) -> Self {
        Self::from(Decimal::from(value))
    }
}

impl TryFrom<f64> for Num {
    type Error = NumError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let exact = Decimal::from_f64_retain(value).ok_or(NumError::Unrepresentable(value))?;
        let literal =
            Decimal::from_str(&value.to_string()).map_err(|_| NumError::Unrepresentable(value))?;
        if exact != literal {
            return Err(NumError::FloatContamination(value));
        }
        Ok(Self::from(exact))
    }
}

impl FromStr for Num {
    type Err = NumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s)
            .or_else(|_| Decimal::from_scientific(s))
            .map(Self::from)
            .map_err(|_| NumError::Parse(s.to_string()))
    }
}

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.normalize(), f)
    }
}

impl Add for Num {
    type Output = Num;
    fn add(self, rhs: Num) -> Num {
        Self::from(self.0 + rhs.0)
    }
}

impl Sub for Num {
    type Output = Num;
    fn sub(self, rhs: Num) -> Num {
        Self::from(self.0 - rhs.0)
    }
}

impl Mul for Num {
    type Output = Num;
    fn mul(self, rhs: Num) -> Num {
        Self::from(self.0 * rhs.0)
    }
}

impl Neg for Num {
    type Output = Num;
    fn neg(self) -> Num {
        Num(-self.0)
    }
}

impl AddAssign for Num {
    fn add_assign(&mut self, rhs: Num) {
        *self = *self + rhs;
    }
}

impl SubAssign for Num {
    fn sub_assign(&mut self, rhs: Num) {
        *self = *self - rhs;
    }
}

impl MulAssign for Num {
    fn mul_assign(&mut self, rhs: Num) {
        *self = *self * rhs;
    }
}

impl Sum for Num {
    fn sum<I: Iterator<Item = Num>>(iter: I) -> Num {
        iter.fold(Num::ZERO, |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Num> for Num {
    fn sum<I: Iterator<Item = &'a Num>>(iter: I) -> Num {
        iter.fold(Num::ZERO, |acc, x| acc + *x)
    }
}
