use crate::error::{LendingError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A positive monetary value in integer minor currency units (cents).
///
/// All fee and principal arithmetic happens on integers; `Decimal` only
/// appears at the crypto-conversion edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    pub fn new(minor_units: i64) -> Result<Self> {
        if minor_units > 0 {
            Ok(Self(minor_units))
        } else {
            Err(LendingError::validation(
                "amount",
                "must be a positive number of minor units",
            ))
        }
    }

    pub const fn minor_units(&self) -> i64 {
        self.0
    }

    /// Applies a basis-point rate, rounding half-up on the minor unit.
    pub fn percentage(&self, rate_bps: u32) -> Amount {
        let scaled = self.0 as i128 * rate_bps as i128;
        Amount(((scaled + 5_000) / 10_000) as i64)
    }

    /// Decimal major-unit view, e.g. 123_456 minor units -> 1234.56.
    pub fn to_major_units(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }
}

impl TryFrom<i64> for Amount {
    type Error = LendingError;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
