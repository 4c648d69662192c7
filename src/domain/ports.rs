use super::application::{ApplicationId, LoanApplication};
use super::disbursement::Disbursement;
use super::fee::{FeeConfiguration, FeeSchedule};
use super::fraud::FraudAuditLog;
use super::payment::{
    ChargeOutcome, ChargeRequest, ChargeResponse, Payment, PaymentId, PaymentProvider,
    PaymentStatus,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which intake guard a concurrent insert tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardViolation {
    DuplicateIdentity,
    RapidResubmission,
}

/// Conditions that must still hold at the moment a new application row is
/// inserted. The fraud screen checks them first, but only the store can
/// re-check them atomically with the insert, so two concurrent submissions
/// cannot both pass.
#[derive(Debug, Clone)]
pub struct SubmissionGuard {
    /// No non-terminal application may carry this identifier.
    pub tax_identifier: String,
    /// The submitting user must have no application created after
    /// `window_start`.
    pub user_id: u64,
    pub window_start: DateTime<Utc>,
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Inserts atomically under the guard, assigning the id and initial
    /// version. A tripped guard surfaces as
    /// [`LendingError::SubmissionBlocked`](crate::error::LendingError).
    async fn create_application(
        &self,
        application: LoanApplication,
        guard: &SubmissionGuard,
    ) -> Result<LoanApplication>;

    async fn application(&self, id: ApplicationId) -> Result<Option<LoanApplication>>;

    /// Compare-and-swap on `version`: the write succeeds only if the stored
    /// version still matches, and the returned copy carries the bumped one.
    async fn update_application(&self, application: &LoanApplication) -> Result<LoanApplication>;

    async fn has_open_application_for_tax_id(&self, tax_identifier: &str) -> Result<bool>;

    async fn last_submission_at(&self, user_id: u64) -> Result<Option<DateTime<Utc>>>;

    async fn all_applications(&self) -> Result<Vec<LoanApplication>>;
}

/// Result of [`PaymentStore::complete_payment`]: either this call moved the
/// row into its terminal status, or an earlier one already had.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentCompletion {
    Completed(Payment),
    AlreadyTerminal(Payment),
}

impl PaymentCompletion {
    pub fn payment(&self) -> &Payment {
        match self {
            Self::Completed(payment) | Self::AlreadyTerminal(payment) => payment,
        }
    }
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create_payment(&self, payment: Payment) -> Result<Payment>;

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>>;

    async fn payment_by_provider_reference(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<Option<Payment>>;

    /// Writes the terminal status exactly once. Concurrent arrivals (sync
    /// confirm racing a webhook) both get the stored row back, but only the
    /// first is `Completed`.
    async fn complete_payment(
        &self,
        id: PaymentId,
        status: PaymentStatus,
        completed_at: DateTime<Utc>,
    ) -> Result<PaymentCompletion>;

    /// The succeeded payment row for an application, if any.
    async fn settled_payment(&self, application_id: ApplicationId) -> Result<Option<Payment>>;
}

#[async_trait]
pub trait DisbursementStore: Send + Sync {
    /// Unique per application; a second insert fails with
    /// [`LendingError::AlreadyDisbursed`](crate::error::LendingError) so
    /// concurrent initiations cannot both fund.
    async fn create_disbursement(&self, disbursement: Disbursement) -> Result<Disbursement>;

    async fn disbursement(&self, application_id: ApplicationId) -> Result<Option<Disbursement>>;
}

#[async_trait]
pub trait FeeConfigStore: Send + Sync {
    async fn active_configuration(&self) -> Result<Option<FeeConfiguration>>;

    /// Deactivates the prior active row and activates the new schedule in
    /// one step; readers never observe zero or two active rows.
    async fn activate_configuration(
        &self,
        schedule: FeeSchedule,
        at: DateTime<Utc>,
    ) -> Result<FeeConfiguration>;
}

#[async_trait]
pub trait FraudLogStore: Send + Sync {
    async fn append_audit(&self, log: FraudAuditLog) -> Result<FraudAuditLog>;

    async fn audit_log(&self, id: u64) -> Result<Option<FraudAuditLog>>;

    async fn annotate_audit(&self, id: u64, reviewer: &str, note: &str) -> Result<FraudAuditLog>;
}

/// Uniform settlement contract. One implementation per rail; orchestration
/// code never branches on the concrete provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeResponse>;

    async fn report_outcome(&self, provider_reference: &str) -> Result<ChargeOutcome>;
}

/// Time source, injectable so lifecycle timestamps and delivery dates are
/// deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests.
pub struct FixedClock {
    now: std::sync::RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|p| p.into_inner()) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.write().unwrap_or_else(|p| p.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|p| p.into_inner())
    }
}

pub type ApplicationStoreRef = Arc<dyn ApplicationStore>;
pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type DisbursementStoreRef = Arc<dyn DisbursementStore>;
pub type FeeConfigStoreRef = Arc<dyn FeeConfigStore>;
pub type FraudLogStoreRef = Arc<dyn FraudLogStore>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
pub type ClockRef = Arc<dyn Clock>;
