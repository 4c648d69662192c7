use crate::domain::application::{ApplicationId, ApplicationStatus};
use crate::domain::disbursement::DisbursementMethod;
use crate::domain::payment::{PaymentId, PaymentProvider};
use crate::domain::ports::GuardViolation;
use thiserror::Error;

pub type Result<T, E = LendingError> = std::result::Result<T, E>;

/// Error taxonomy for the lending lifecycle.
///
/// Fraud and duplicate-submission variants deliberately render a generic
/// message; the specific trigger stays on the variant for the audit log and
/// server-side logging only.
#[derive(Error, Debug)]
pub enum LendingError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("application cannot be accepted at this time")]
    FraudRejected { detail: String },

    #[error("application cannot be accepted at this time")]
    SubmissionBlocked(GuardViolation),

    #[error("cannot move application from {from} to {to}")]
    IllegalTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("no processing fee has been set for application {0}")]
    FeeNotSet(ApplicationId),

    #[error("no settled fee payment found for application {0}")]
    PaymentNotSettled(ApplicationId),

    #[error("a disbursement already exists for application {0}")]
    AlreadyDisbursed(ApplicationId),

    #[error("{method} disbursement requires {field}")]
    MissingDestinationField {
        method: DisbursementMethod,
        field: &'static str,
    },

    #[error("payment failed, please try again or use a different method")]
    ProviderDeclined {
        provider: PaymentProvider,
        detail: String,
    },

    #[error("payment {0} has not completed at the provider yet")]
    PaymentIncomplete(PaymentId),

    #[error("webhook signature verification failed for {provider}")]
    InvalidSignature { provider: PaymentProvider },

    #[error("concurrent update detected on {entity}, retry the operation")]
    ConcurrentUpdate { entity: &'static str },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl LendingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LendingError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
