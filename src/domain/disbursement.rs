use crate::domain::application::ApplicationId;
use crate::domain::money::Amount;
use crate::error::{LendingError, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbursementMethod {
    Ach,
    Wire,
    Check,
    Paycard,
}

impl DisbursementMethod {
    /// Business-day offset added to the initiation date.
    pub fn delivery_days(&self) -> i64 {
        match self {
            Self::Ach => 2,
            Self::Wire => 1,
            Self::Check => 7,
            Self::Paycard => 1,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Ach => "ACH",
            Self::Wire => "WIRE",
            Self::Check => "CHK",
            Self::Paycard => "PAYC",
        }
    }

    /// Checks the method-specific required fields and narrows the free-form
    /// input into a typed destination.
    pub fn validate_destination(&self, details: &DestinationDetails) -> Result<Destination> {
        let require = |field: Option<&String>, name: &'static str| {
            field
                .filter(|value| !value.trim().is_empty())
                .cloned()
                .ok_or(LendingError::MissingDestinationField {
                    method: *self,
                    field: name,
                })
        };
        match self {
            Self::Ach | Self::Wire => Ok(Destination::BankAccount {
                account_holder: require(details.account_holder.as_ref(), "account holder name")?,
                account_number: require(details.account_number.as_ref(), "account number")?,
                routing_number: require(details.routing_number.as_ref(), "routing number")?,
            }),
            Self::Check => Ok(Destination::Mailing {
                payee_name: require(details.payee_name.as_ref(), "payee name")?,
                mailing_address: require(details.mailing_address.as_ref(), "mailing address")?,
            }),
            Self::Paycard => Ok(Destination::Paycard),
        }
    }
}

impl fmt::Display for DisbursementMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ach => "ach",
            Self::Wire => "wire",
            Self::Check => "check",
            Self::Paycard => "paycard",
        })
    }
}

/// Raw destination payload as submitted by staff; which fields are required
/// depends on the method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationDetails {
    #[serde(default)]
    pub account_holder: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub routing_number: Option<String>,
    #[serde(default)]
    pub payee_name: Option<String>,
    #[serde(default)]
    pub mailing_address: Option<String>,
}

/// Validated destination, narrowed per method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    BankAccount {
        account_holder: String,
        account_number: String,
        routing_number: String,
    },
    Mailing {
        payee_name: String,
        mailing_address: String,
    },
    Paycard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbursementStatus {
    Initiated,
    InTransit,
    Settled,
}

/// The single funding record for an application. Created once, never
/// deleted; status may progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disbursement {
    pub application_id: ApplicationId,
    /// Copied from the application's approved amount.
    pub amount: Amount,
    pub method: DisbursementMethod,
    pub destination: Destination,
    pub estimated_delivery_date: NaiveDate,
    pub reference_number: String,
    pub status: DisbursementStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub fn estimated_delivery(method: DisbursementMethod, initiated_on: NaiveDate) -> NaiveDate {
    initiated_on + Duration::days(method.delivery_days())
}

/// Human-readable unique reference, e.g. `DSB-WIRE-20260825-9F41C2`.
pub fn reference_number(method: DisbursementMethod, initiated_on: NaiveDate) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "DSB-{}-{}-{}",
        method.code(),
        initiated_on.format("%Y%m%d"),
        suffix[..6].to_uppercase()
    )
}
