use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------     MinorUnits       --------------------------------------------------------
/// A currency amount in minor units (e.g. cents). All monetary values in the payment core are integers; fractional
/// amounts never appear outside of display formatting.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct MinorUnits(i64);

op!(binary MinorUnits, Add, add);
op!(binary MinorUnits, Sub, sub);
op!(inplace MinorUnits, SubAssign, sub_assign);
op!(unary MinorUnits, Neg, neg);

impl Mul<i64> for MinorUnits {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for MinorUnits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in minor currency units: {0}")]
pub struct MinorUnitsConversionError(String);

impl From<i64> for MinorUnits {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for MinorUnits {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for MinorUnits {}

impl TryFrom<u64> for MinorUnits {
    type Error = MinorUnitsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MinorUnitsConversionError(format!("Value {} is too large to convert to MinorUnits", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for MinorUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl MinorUnits {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// The 11% tax line for this amount, rounded half away from zero.
    pub fn tax_at_11_percent(&self) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        Self((self.0 as f64 * 0.11).round() as i64)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic() {
        let a = MinorUnits::from(100_000);
        let b = MinorUnits::from(25_000);
        assert_eq!((a + b).value(), 125_000);
        assert_eq!((a - b).value(), 75_000);
        assert_eq!((a * 2).value(), 200_000);
        assert_eq!((-b).value(), -25_000);
    }

    #[test]
    fn tax_examples() {
        assert_eq!(MinorUnits::from(100_000).tax_at_11_percent().value(), 11_000);
        assert_eq!(MinorUnits::from(50_000).tax_at_11_percent().value(), 5_500);
        assert_eq!(MinorUnits::from(99).tax_at_11_percent().value(), 11);
    }
}
