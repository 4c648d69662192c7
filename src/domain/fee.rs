use crate::domain::money::Amount;
use crate::error::{LendingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rate applied when no staff-activated configuration exists yet.
pub const DEFAULT_RATE_BPS: u32 = 200;

/// Staff-configurable percentage range, in basis points.
pub const MIN_RATE_BPS: u32 = 150;
pub const MAX_RATE_BPS: u32 = 250;

/// Fixed-fee range in minor units: 1.50% of the smallest allowed principal
/// up to 2.50% of the largest.
pub const MIN_FIXED_FEE: i64 = 750;
pub const MAX_FIXED_FEE: i64 = 250_000;

/// How the processing fee is derived from the approved amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FeeSchedule {
    Percentage { rate_bps: u32 },
    Fixed { amount: Amount },
}

impl FeeSchedule {
    pub fn percentage(rate_bps: u32) -> Result<Self> {
        let schedule = Self::Percentage { rate_bps };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn fixed(amount: Amount) -> Result<Self> {
        let schedule = Self::Fixed { amount };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Range checks applied whenever a schedule is activated. Deserialized
    /// values pass through here too, so an out-of-range rate can never
    /// become the active configuration.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Percentage { rate_bps } => {
                if !(MIN_RATE_BPS..=MAX_RATE_BPS).contains(rate_bps) {
                    return Err(LendingError::validation(
                        "rate_bps",
                        format!(
                            "percentage rate must be between {MIN_RATE_BPS} and {MAX_RATE_BPS} basis points"
                        ),
                    ));
                }
            }
            Self::Fixed { amount } => {
                let minor = amount.minor_units();
                if !(MIN_FIXED_FEE..=MAX_FIXED_FEE).contains(&minor) {
                    return Err(LendingError::validation(
                        "fixed_fee",
                        format!(
                            "fixed fee must be between {MIN_FIXED_FEE} and {MAX_FIXED_FEE} minor units"
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// The processing fee owed for an approved principal. Pure.
    pub fn fee_for(&self, approved: Amount) -> Amount {
        match self {
            Self::Percentage { rate_bps } => approved.percentage(*rate_bps),
            Self::Fixed { amount } => *amount,
        }
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::Percentage {
            rate_bps: DEFAULT_RATE_BPS,
        }
    }
}

/// A versioned fee-configuration row. The store keeps the full history and
/// flips `is_active` so that exactly one row is active at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeConfiguration {
    pub version: u64,
    pub schedule: FeeSchedule,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
