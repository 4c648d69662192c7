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
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column family for loan applications, keyed by big-endian application id.
pub const CF_APPLICATIONS: &str = "applications";
/// Column family for fee payments, keyed by big-endian payment id.
pub const CF_PAYMENTS: &str = "payments";
/// Column family for disbursements, keyed by big-endian application id.
pub const CF_DISBURSEMENTS: &str = "disbursements";
/// Column family for fee configurations, keyed by big-endian version.
pub const CF_FEE_CONFIGURATIONS: &str = "fee_configurations";
/// Column family for fraud audit rows, keyed by big-endian log id.
pub const CF_FRAUD_LOGS: &str = "fraud_logs";
/// Column family for id counters.
pub const CF_META: &str = "meta";

const COUNTER_APPLICATIONS: &str = "applications";
const COUNTER_PAYMENTS: &str = "payments";
const COUNTER_FRAUD_LOGS: &str = "fraud_logs";

/// A persistent backend using RocksDB, one column family per entity.
///
/// Values are JSON-encoded; keys are big-endian ids so iteration order
/// matches id order. Read-check-write sequences (the guarded application
/// insert, the versioned update, the exactly-once payment completion) are
/// serialized through a process-level gate, matching the single-writer
/// deployment this store is built for.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_gate: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// all required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [
            CF_APPLICATIONS,
            CF_PAYMENTS,
            CF_DISBURSEMENTS,
            CF_FEE_CONFIGURATIONS,
            CF_FRAUD_LOGS,
            CF_META,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;
        Ok(Self {
            db: Arc::new(db),
            write_gate: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LendingError::Storage(format!("column family {name} not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &'static str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, cf: &'static str, key: &[u8], value: &T) -> Result<()> {
        self.db
            .put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf: &'static str) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    /// Allocates the next id from a meta counter. Callers must hold the
    /// write gate.
    fn next_id(&self, counter: &'static str) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        let current = match self.db.get_cf(cf, counter)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| LendingError::Storage(format!("corrupt {counter} counter")))?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let next = current + 1;
        self.db.put_cf(cf, counter, next.to_be_bytes())?;
        Ok(next)
    }
}

#[async_trait]
impl ApplicationStore for RocksDBStore {
    async fn create_application(
        &self,
        mut application: LoanApplication,
        guard: &SubmissionGuard,
    ) -> Result<LoanApplication> {
        let _gate = self.write_gate.lock().await;

        // Same re-check the in-memory store performs under its write lock.
        let applications: Vec<LoanApplication> = self.scan(CF_APPLICATIONS)?;
        if applications.iter().any(|existing| {
            existing.status.is_open() && existing.applicant.tax_identifier == guard.tax_identifier
        }) {
            return Err(LendingError::SubmissionBlocked(
                GuardViolation::DuplicateIdentity,
            ));
        }
        if applications.iter().any(|existing| {
            existing.user_id == guard.user_id && existing.created_at > guard.window_start
        }) {
            return Err(LendingError::SubmissionBlocked(
                GuardViolation::RapidResubmission,
            ));
        }

        let id = self.next_id(COUNTER_APPLICATIONS)?;
        application.id = ApplicationId(id);
        application.version = 1;
        self.put_json(CF_APPLICATIONS, &id.to_be_bytes(), &application)?;
        Ok(application)
    }

    async fn application(&self, id: ApplicationId) -> Result<Option<LoanApplication>> {
        self.get_json(CF_APPLICATIONS, &id.0.to_be_bytes())
    }

    async fn update_application(&self, application: &LoanApplication) -> Result<LoanApplication> {
        let _gate = self.write_gate.lock().await;
        let stored: LoanApplication = self
            .get_json(CF_APPLICATIONS, &application.id.0.to_be_bytes())?
            .ok_or_else(|| LendingError::not_found("application", application.id))?;
        if stored.version != application.version {
            return Err(LendingError::ConcurrentUpdate {
                entity: "application",
            });
        }
        let mut updated = application.clone();
        updated.version += 1;
        self.put_json(CF_APPLICATIONS, &updated.id.0.to_be_bytes(), &updated)?;
        Ok(updated)
    }

    async fn has_open_application_for_tax_id(&self, tax_identifier: &str) -> Result<bool> {
        let applications: Vec<LoanApplication> = self.scan(CF_APPLICATIONS)?;
        Ok(applications
            .iter()
            .any(|app| app.status.is_open() && app.applicant.tax_identifier == tax_identifier))
    }

    async fn last_submission_at(&self, user_id: u64) -> Result<Option<DateTime<Utc>>> {
        let applications: Vec<LoanApplication> = self.scan(CF_APPLICATIONS)?;
        Ok(applications
            .iter()
            .filter(|app| app.user_id == user_id)
            .map(|app| app.created_at)
            .max())
    }

    async fn all_applications(&self) -> Result<Vec<LoanApplication>> {
        // Keys are big-endian ids, so the scan already yields id order.
        self.scan(CF_APPLICATIONS)
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn create_payment(&self, mut payment: Payment) -> Result<Payment> {
        let _gate = self.write_gate.lock().await;
        let id = self.next_id(COUNTER_PAYMENTS)?;
        payment.id = PaymentId(id);
        self.put_json(CF_PAYMENTS, &id.to_be_bytes(), &payment)?;
        Ok(payment)
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.get_json(CF_PAYMENTS, &id.0.to_be_bytes())
    }

    async fn payment_by_provider_reference(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<Option<Payment>> {
        let payments: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        Ok(payments
            .into_iter()
            .find(|payment| payment.provider == provider && payment.provider_reference == reference))
    }

    async fn complete_payment(
        &self,
        id: PaymentId,
        status: PaymentStatus,
        completed_at: DateTime<Utc>,
    ) -> Result<PaymentCompletion> {
        let _gate = self.write_gate.lock().await;
        let mut current: Payment = self
            .get_json(CF_PAYMENTS, &id.0.to_be_bytes())?
            .ok_or_else(|| LendingError::not_found("payment", id))?;
        if current.status.is_terminal() {
            return Ok(PaymentCompletion::AlreadyTerminal(current));
        }

        let siblings: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        let already_settled = siblings.iter().any(|other| {
            other.application_id == current.application_id
                && other.status == PaymentStatus::Succeeded
        });
        current.status = if status == PaymentStatus::Succeeded && already_settled {
            PaymentStatus::Cancelled
        } else {
            status
        };
        current.completed_at = Some(completed_at);
        self.put_json(CF_PAYMENTS, &id.0.to_be_bytes(), &current)?;
        Ok(PaymentCompletion::Completed(current))
    }

    async fn settled_payment(&self, application_id: ApplicationId) -> Result<Option<Payment>> {
        let payments: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        Ok(payments.into_iter().find(|payment| {
            payment.application_id == application_id && payment.status == PaymentStatus::Succeeded
        }))
    }
}

#[async_trait]
impl DisbursementStore for RocksDBStore {
    async fn create_disbursement(&self, disbursement: Disbursement) -> Result<Disbursement> {
        let _gate = self.write_gate.lock().await;
        let key = disbursement.application_id.0.to_be_bytes();
        let existing: Option<Disbursement> = self.get_json(CF_DISBURSEMENTS, &key)?;
        if existing.is_some() {
            return Err(LendingError::AlreadyDisbursed(disbursement.application_id));
        }
        self.put_json(CF_DISBURSEMENTS, &key, &disbursement)?;
        Ok(disbursement)
    }

    async fn disbursement(&self, application_id: ApplicationId) -> Result<Option<Disbursement>> {
        self.get_json(CF_DISBURSEMENTS, &application_id.0.to_be_bytes())
    }
}

#[async_trait]
impl FeeConfigStore for RocksDBStore {
    async fn active_configuration(&self) -> Result<Option<FeeConfiguration>> {
        let configurations: Vec<FeeConfiguration> = self.scan(CF_FEE_CONFIGURATIONS)?;
        Ok(configurations
            .into_iter()
            .find(|configuration| configuration.is_active))
    }

    async fn activate_configuration(
        &self,
        schedule: FeeSchedule,
        at: DateTime<Utc>,
    ) -> Result<FeeConfiguration> {
        let _gate = self.write_gate.lock().await;
        let mut configurations: Vec<FeeConfiguration> = self.scan(CF_FEE_CONFIGURATIONS)?;
        for configuration in configurations.iter_mut().filter(|c| c.is_active) {
            configuration.is_active = false;
            self.put_json(
                CF_FEE_CONFIGURATIONS,
                &configuration.version.to_be_bytes(),
                configuration,
            )?;
        }
        let configuration = FeeConfiguration {
            version: configurations.len() as u64 + 1,
            schedule,
            is_active: true,
            created_at: at,
        };
        self.put_json(
            CF_FEE_CONFIGURATIONS,
            &configuration.version.to_be_bytes(),
            &configuration,
        )?;
        Ok(configuration)
    }
}

#[async_trait]
impl FraudLogStore for RocksDBStore {
    async fn append_audit(&self, mut log: FraudAuditLog) -> Result<FraudAuditLog> {
        let _gate = self.write_gate.lock().await;
        let id = self.next_id(COUNTER_FRAUD_LOGS)?;
        log.id = id;
        self.put_json(CF_FRAUD_LOGS, &id.to_be_bytes(), &log)?;
        Ok(log)
    }

    async fn audit_log(&self, id: u64) -> Result<Option<FraudAuditLog>> {
        self.get_json(CF_FRAUD_LOGS, &id.to_be_bytes())
    }

    async fn annotate_audit(&self, id: u64, reviewer: &str, note: &str) -> Result<FraudAuditLog> {
        let _gate = self.write_gate.lock().await;
        let mut log: FraudAuditLog = self
            .get_json(CF_FRAUD_LOGS, &id.to_be_bytes())?
            .ok_or_else(|| LendingError::not_found("fraud audit log", id))?;
        log.annotate(reviewer, note)?;
        self.put_json(CF_FRAUD_LOGS, &id.to_be_bytes(), &log)?;
        Ok(log)
    }
}
