use crate::application::disbursement::DisbursementOrchestrator;
use crate::application::fees::FeePolicy;
use crate::application::intake::IntakeService;
use crate::application::review::ReviewService;
use crate::application::settlement::{PaymentInitiation, SettlementService};
use crate::domain::application::{ApplicationId, LoanApplication, Submission};
use crate::domain::disbursement::{DestinationDetails, Disbursement, DisbursementMethod};
use crate::domain::fee::{FeeConfiguration, FeeSchedule};
use crate::domain::fraud::FraudAuditLog;
use crate::domain::money::Amount;
use crate::domain::payment::{CryptoCurrency, Payment, PaymentId, PaymentMethod, PaymentProvider};
use crate::domain::ports::{
    ApplicationStoreRef, ClockRef, DisbursementStoreRef, FeeConfigStoreRef, FraudLogStoreRef,
    PaymentGatewayRef, PaymentStoreRef,
};
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// The five store handles the engine is built over. Any combination of
/// backends works as long as each implements its port.
#[derive(Clone)]
pub struct Stores {
    pub applications: ApplicationStoreRef,
    pub payments: PaymentStoreRef,
    pub disbursements: DisbursementStoreRef,
    pub fee_configs: FeeConfigStoreRef,
    pub fraud_logs: FraudLogStoreRef,
}

/// The main entry point for the loan application lifecycle.
///
/// `LendingEngine` owns the services for intake, review, settlement, and
/// disbursement, all wired over injected store handles, payment gateways,
/// and a clock. Each call handles one request; concurrent calls are safe
/// because all cross-request coordination lives in the stores.
pub struct LendingEngine {
    intake: IntakeService,
    review: ReviewService,
    settlement: SettlementService,
    disbursement: DisbursementOrchestrator,
    fee_policy: Arc<FeePolicy>,
    applications: ApplicationStoreRef,
    disbursements: DisbursementStoreRef,
}

impl LendingEngine {
    pub fn new(
        stores: Stores,
        gateways: Vec<PaymentGatewayRef>,
        webhook_keys: HashMap<PaymentProvider, String>,
        clock: ClockRef,
    ) -> Self {
        let fee_policy = Arc::new(FeePolicy::new(stores.fee_configs.clone(), clock.clone()));
        let intake = IntakeService::new(
            stores.applications.clone(),
            stores.fraud_logs.clone(),
            clock.clone(),
        );
        let review = ReviewService::new(
            stores.applications.clone(),
            stores.fraud_logs.clone(),
            fee_policy.clone(),
            clock.clone(),
        );
        let settlement = SettlementService::new(
            stores.applications.clone(),
            stores.payments.clone(),
            gateways,
            webhook_keys,
            clock.clone(),
        );
        let disbursement = DisbursementOrchestrator::new(
            stores.applications.clone(),
            stores.payments.clone(),
            stores.disbursements.clone(),
            clock,
        );
        Self {
            intake,
            review,
            settlement,
            disbursement,
            fee_policy,
            applications: stores.applications,
            disbursements: stores.disbursements,
        }
    }

    pub async fn submit(&self, submission: Submission) -> Result<LoanApplication> {
        self.intake.submit(submission).await
    }

    pub async fn start_review(
        &self,
        id: ApplicationId,
        reviewer: &str,
    ) -> Result<LoanApplication> {
        self.review.start_review(id, reviewer).await
    }

    pub async fn approve(
        &self,
        id: ApplicationId,
        approved_amount: Amount,
        notes: Option<&str>,
    ) -> Result<LoanApplication> {
        self.review.approve(id, approved_amount, notes).await
    }

    pub async fn reject(&self, id: ApplicationId, reason: &str) -> Result<LoanApplication> {
        self.review.reject(id, reason).await
    }

    pub async fn cancel(&self, id: ApplicationId) -> Result<LoanApplication> {
        self.review.cancel(id).await
    }

    pub async fn set_fee_schedule(&self, schedule: FeeSchedule) -> Result<FeeConfiguration> {
        self.fee_policy.update_schedule(schedule).await
    }

    pub async fn begin_payment(
        &self,
        id: ApplicationId,
        method: PaymentMethod,
        provider_hint: Option<PaymentProvider>,
        card_token: Option<String>,
        crypto_currency: Option<CryptoCurrency>,
    ) -> Result<PaymentInitiation> {
        self.settlement
            .begin_payment(id, method, provider_hint, card_token, crypto_currency)
            .await
    }

    pub async fn confirm_payment(&self, payment_id: PaymentId) -> Result<Payment> {
        self.settlement.confirm_payment(payment_id).await
    }

    pub async fn handle_webhook(
        &self,
        provider: PaymentProvider,
        body: &str,
        signature: &str,
    ) -> Result<Option<Payment>> {
        self.settlement.handle_webhook(provider, body, signature).await
    }

    pub async fn disburse(
        &self,
        id: ApplicationId,
        method: DisbursementMethod,
        details: &DestinationDetails,
        notes: Option<String>,
    ) -> Result<Disbursement> {
        self.disbursement.initiate(id, method, details, notes).await
    }

    pub async fn annotate_fraud_log(
        &self,
        log_id: u64,
        reviewer: &str,
        note: &str,
    ) -> Result<FraudAuditLog> {
        self.review.annotate_fraud_log(log_id, reviewer, note).await
    }

    /// All applications, for the final report.
    pub async fn applications(&self) -> Result<Vec<LoanApplication>> {
        self.applications.all_applications().await
    }

    pub async fn disbursement_for(&self, id: ApplicationId) -> Result<Option<Disbursement>> {
        self.disbursements.disbursement(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application::{
        Applicant, ApplicationStatus, ConsentFlags, Employment, EmploymentStatus, LoanType,
    };
    use crate::domain::ports::SystemClock;
    use crate::infrastructure::gateways::{sandbox_gateways, sandbox_webhook_keys};
    use crate::infrastructure::in_memory::InMemoryStore;
    use chrono::NaiveDate;

    fn engine() -> LendingEngine {
        let store = Arc::new(InMemoryStore::new());
        LendingEngine::new(
            Stores {
                applications: store.clone(),
                payments: store.clone(),
                disbursements: store.clone(),
                fee_configs: store.clone(),
                fraud_logs: store,
            },
            sandbox_gateways(),
            sandbox_webhook_keys(),
            Arc::new(SystemClock),
        )
    }

    fn submission() -> Submission {
        Submission {
            user_id: 7,
            applicant: Applicant {
                full_name: "Dana Whitfield".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(1988, 4, 12).unwrap(),
                tax_identifier: "123-45-6789".to_string(),
                government_id: "D1234567".to_string(),
                email: "dana@example.com".to_string(),
                phone: "555-867-5309".to_string(),
                street_address: "41 Birch Lane".to_string(),
                city: "Spokane".to_string(),
                state: "WA".to_string(),
                postal_code: "99201".to_string(),
            },
            employment: Employment {
                employer: "Inland Tooling".to_string(),
                status: EmploymentStatus::Employed,
                annual_income: Amount::new(9_500_000).unwrap(),
                months_employed: 48,
            },
            loan_type: LoanType::Personal,
            requested_amount: Amount::new(2_500_000).unwrap(),
            purpose: "Replace the failed heat pump before winter".to_string(),
            bankruptcy_disclosed: false,
            bankruptcy_date: None,
            consents: ConsentFlags::granted(),
        }
    }

    #[tokio::test]
    async fn full_lifecycle_reaches_disbursed() {
        let engine = engine();
        let created = engine.submit(submission()).await.unwrap();
        engine.start_review(created.id, "rbishop").await.unwrap();
        let approved = engine
            .approve(created.id, Amount::new(2_400_000).unwrap(), None)
            .await
            .unwrap();
        assert_eq!(approved.processing_fee_amount.unwrap().minor_units(), 48_000);

        let initiation = engine
            .begin_payment(
                created.id,
                PaymentMethod::Card,
                None,
                Some("tok_visa_4242".to_string()),
                None,
            )
            .await
            .unwrap();
        engine.confirm_payment(initiation.payment.id).await.unwrap();

        let details = DestinationDetails {
            account_holder: Some("Dana Whitfield".to_string()),
            account_number: Some("000123456789".to_string()),
            routing_number: Some("021000021".to_string()),
            ..DestinationDetails::default()
        };
        let disbursement = engine
            .disburse(created.id, DisbursementMethod::Ach, &details, None)
            .await
            .unwrap();
        assert_eq!(disbursement.amount.minor_units(), 2_400_000);

        let applications = engine.applications().await.unwrap();
        assert_eq!(applications.len(), 1);
        assert_eq!(applications[0].status, ApplicationStatus::Disbursed);
        assert!(
            engine
                .disbursement_for(created.id)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn schedule_updates_flow_into_later_approvals() {
        let engine = engine();
        let created = engine.submit(submission()).await.unwrap();
        engine
            .set_fee_schedule(FeeSchedule::fixed(Amount::new(1_500).unwrap()).unwrap())
            .await
            .unwrap();
        let approved = engine
            .approve(created.id, Amount::new(2_400_000).unwrap(), None)
            .await
            .unwrap();
        assert_eq!(approved.processing_fee_amount.unwrap().minor_units(), 1_500);
    }
}
