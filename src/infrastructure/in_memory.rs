use crate::domain::application::{ApplicationId, LoanApplication};
use crate::domain::disbursement::Disbursement;
use crate::domain::fee::{FeeConfiguration, FeeSchedule};
use crate::domain::fraud::FraudAuditLog;
use crate::domain::payment::{Payment, PaymentId, PaymentProvider, PaymentStatus};
use crate::domain::ports::{
    ApplicationStore, DisbursementStore, FeeConfigStore, FraudLogStore, GuardViolation,
    PaymentCompletion, PaymentStore, SubmissionGuard,
};
use crate::error::{LendingError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    applications: HashMap<u64, LoanApplication>,
    next_application_id: u64,
    payments: HashMap<u64, Payment>,
    next_payment_id: u64,
    /// Keyed by application id; at most one row per application.
    disbursements: HashMap<u64, Disbursement>,
    fee_configurations: Vec<FeeConfiguration>,
    fraud_logs: HashMap<u64, FraudAuditLog>,
    next_fraud_log_id: u64,
}

/// A thread-safe in-memory backend implementing every store port.
///
/// One `Arc<RwLock<_>>` guards all tables, so the guarded application
/// insert, the compare-and-swap update, and the exactly-once payment
/// completion each happen inside a single write-critical section. Ideal for
/// tests and CLI runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApplicationStore for InMemoryStore {
    async fn create_application(
        &self,
        mut application: LoanApplication,
        guard: &SubmissionGuard,
    ) -> Result<LoanApplication> {
        let mut tables = self.tables.write().await;

        // Re-check both intake guards under the write lock; the fraud screen
        // ran them earlier, but only here are they atomic with the insert.
        let duplicate = tables.applications.values().any(|existing| {
            existing.status.is_open() && existing.applicant.tax_identifier == guard.tax_identifier
        });
        if duplicate {
            return Err(LendingError::SubmissionBlocked(
                GuardViolation::DuplicateIdentity,
            ));
        }
        let throttled = tables.applications.values().any(|existing| {
            existing.user_id == guard.user_id && existing.created_at > guard.window_start
        });
        if throttled {
            return Err(LendingError::SubmissionBlocked(
                GuardViolation::RapidResubmission,
            ));
        }

        tables.next_application_id += 1;
        application.id = ApplicationId(tables.next_application_id);
        application.version = 1;
        tables
            .applications
            .insert(application.id.0, application.clone());
        Ok(application)
    }

    async fn application(&self, id: ApplicationId) -> Result<Option<LoanApplication>> {
        Ok(self.tables.read().await.applications.get(&id.0).cloned())
    }

    async fn update_application(&self, application: &LoanApplication) -> Result<LoanApplication> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .applications
            .get_mut(&application.id.0)
            .ok_or_else(|| LendingError::not_found("application", application.id))?;
        if stored.version != application.version {
            return Err(LendingError::ConcurrentUpdate {
                entity: "application",
            });
        }
        let mut updated = application.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn has_open_application_for_tax_id(&self, tax_identifier: &str) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .await
            .applications
            .values()
            .any(|app| app.status.is_open() && app.applicant.tax_identifier == tax_identifier))
    }

    async fn last_submission_at(&self, user_id: u64) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .tables
            .read()
            .await
            .applications
            .values()
            .filter(|app| app.user_id == user_id)
            .map(|app| app.created_at)
            .max())
    }

    async fn all_applications(&self) -> Result<Vec<LoanApplication>> {
        let tables = self.tables.read().await;
        let mut applications: Vec<_> = tables.applications.values().cloned().collect();
        applications.sort_by_key(|app| app.id);
        Ok(applications)
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn create_payment(&self, mut payment: Payment) -> Result<Payment> {
        let mut tables = self.tables.write().await;
        tables.next_payment_id += 1;
        payment.id = PaymentId(tables.next_payment_id);
        tables.payments.insert(payment.id.0, payment.clone());
        Ok(payment)
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.tables.read().await.payments.get(&id.0).cloned())
    }

    async fn payment_by_provider_reference(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<Option<Payment>> {
        Ok(self
            .tables
            .read()
            .await
            .payments
            .values()
            .find(|payment| {
                payment.provider == provider && payment.provider_reference == reference
            })
            .cloned())
    }

    async fn complete_payment(
        &self,
        id: PaymentId,
        status: PaymentStatus,
        completed_at: DateTime<Utc>,
    ) -> Result<PaymentCompletion> {
        let mut tables = self.tables.write().await;
        let current = tables
            .payments
            .get(&id.0)
            .cloned()
            .ok_or_else(|| LendingError::not_found("payment", id))?;
        if current.status.is_terminal() {
            return Ok(PaymentCompletion::AlreadyTerminal(current));
        }

        // A sibling attempt that already settled keeps its claim; this row
        // closes as cancelled so at most one succeeded payment can ever
        // exist per application.
        let status = if status == PaymentStatus::Succeeded
            && tables.payments.values().any(|other| {
                other.application_id == current.application_id
                    && other.status == PaymentStatus::Succeeded
            }) {
            PaymentStatus::Cancelled
        } else {
            status
        };

        let stored = tables
            .payments
            .get_mut(&id.0)
            .ok_or_else(|| LendingError::not_found("payment", id))?;
        stored.status = status;
        stored.completed_at = Some(completed_at);
        Ok(PaymentCompletion::Completed(stored.clone()))
    }

    async fn settled_payment(&self, application_id: ApplicationId) -> Result<Option<Payment>> {
        Ok(self
            .tables
            .read()
            .await
            .payments
            .values()
            .find(|payment| {
                payment.application_id == application_id
                    && payment.status == PaymentStatus::Succeeded
            })
            .cloned())
    }
}

#[async_trait]
impl DisbursementStore for InMemoryStore {
    async fn create_disbursement(&self, disbursement: Disbursement) -> Result<Disbursement> {
        let mut tables = self.tables.write().await;
        if tables
            .disbursements
            .contains_key(&disbursement.application_id.0)
        {
            return Err(LendingError::AlreadyDisbursed(disbursement.application_id));
        }
        tables
            .disbursements
            .insert(disbursement.application_id.0, disbursement.clone());
        Ok(disbursement)
    }

    async fn disbursement(&self, application_id: ApplicationId) -> Result<Option<Disbursement>> {
        Ok(self
            .tables
            .read()
            .await
            .disbursements
            .get(&application_id.0)
            .cloned())
    }
}

#[async_trait]
impl FeeConfigStore for InMemoryStore {
    async fn active_configuration(&self) -> Result<Option<FeeConfiguration>> {
        Ok(self
            .tables
            .read()
            .await
            .fee_configurations
            .iter()
            .find(|configuration| configuration.is_active)
            .cloned())
    }

    async fn activate_configuration(
        &self,
        schedule: FeeSchedule,
        at: DateTime<Utc>,
    ) -> Result<FeeConfiguration> {
        let mut tables = self.tables.write().await;
        for configuration in &mut tables.fee_configurations {
            configuration.is_active = false;
        }
        let configuration = FeeConfiguration {
            version: tables.fee_configurations.len() as u64 + 1,
            schedule,
            is_active: true,
            created_at: at,
        };
        tables.fee_configurations.push(configuration.clone());
        Ok(configuration)
    }
}

#[async_trait]
impl FraudLogStore for InMemoryStore {
    async fn append_audit(&self, mut log: FraudAuditLog) -> Result<FraudAuditLog> {
        let mut tables = self.tables.write().await;
        tables.next_fraud_log_id += 1;
        log.id = tables.next_fraud_log_id;
        tables.fraud_logs.insert(log.id, log.clone());
        Ok(log)
    }

    async fn audit_log(&self, id: u64) -> Result<Option<FraudAuditLog>> {
        Ok(self.tables.read().await.fraud_logs.get(&id).cloned())
    }

    async fn annotate_audit(&self, id: u64, reviewer: &str, note: &str) -> Result<FraudAuditLog> {
        let mut tables = self.tables.write().await;
        let log = tables
            .fraud_logs
            .get_mut(&id)
            .ok_or_else(|| LendingError::not_found("fraud audit log", id))?;
        log.annotate(reviewer, note)?;
        Ok(log.clone())
    }
}
