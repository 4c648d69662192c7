use crate::application::fees::FeePolicy;
use crate::domain::application::{ApplicationId, LoanApplication};
use crate::domain::fraud::FraudAuditLog;
use crate::domain::money::Amount;
use crate::domain::ports::{ApplicationStoreRef, ClockRef, FraudLogStoreRef};
use crate::error::{LendingError, Result};
use std::sync::Arc;

/// Staff-side operations: moving an application through review, and
/// annotating fraud audit rows after manual inspection.
pub struct ReviewService {
    applications: ApplicationStoreRef,
    fraud_logs: FraudLogStoreRef,
    fee_policy: Arc<FeePolicy>,
    clock: ClockRef,
}

impl ReviewService {
    pub fn new(
        applications: ApplicationStoreRef,
        fraud_logs: FraudLogStoreRef,
        fee_policy: Arc<FeePolicy>,
        clock: ClockRef,
    ) -> Self {
        Self {
            applications,
            fraud_logs,
            fee_policy,
            clock,
        }
    }

    pub async fn start_review(
        &self,
        id: ApplicationId,
        reviewer: &str,
    ) -> Result<LoanApplication> {
        let mut application = self.load(id).await?;
        application.start_review()?;
        let stored = self.applications.update_application(&application).await?;
        tracing::info!(application_id = %id, reviewer, "application moved to review");
        Ok(stored)
    }

    /// Approves with the given principal; the processing fee is computed
    /// from the active schedule and stamped alongside `approved_at`.
    pub async fn approve(
        &self,
        id: ApplicationId,
        approved_amount: Amount,
        notes: Option<&str>,
    ) -> Result<LoanApplication> {
        let mut application = self.load(id).await?;
        let fee = self.fee_policy.compute_fee(approved_amount).await?;
        application.approve(approved_amount, fee, self.clock.now())?;
        let stored = self.applications.update_application(&application).await?;
        tracing::info!(
            application_id = %id,
            approved_amount = %approved_amount,
            processing_fee = %fee,
            notes = notes.unwrap_or_default(),
            "application approved"
        );
        Ok(stored)
    }

    pub async fn reject(&self, id: ApplicationId, reason: &str) -> Result<LoanApplication> {
        if reason.trim().is_empty() {
            return Err(LendingError::validation(
                "reason",
                "a rejection reason is required",
            ));
        }
        let mut application = self.load(id).await?;
        application.reject(reason)?;
        let stored = self.applications.update_application(&application).await?;
        tracing::info!(application_id = %id, reason, "application rejected");
        Ok(stored)
    }

    /// Irrevocable; allowed only while the application is still pending or
    /// under review.
    pub async fn cancel(&self, id: ApplicationId) -> Result<LoanApplication> {
        let mut application = self.load(id).await?;
        application.cancel()?;
        let stored = self.applications.update_application(&application).await?;
        tracing::info!(application_id = %id, "application cancelled");
        Ok(stored)
    }

    pub async fn annotate_fraud_log(
        &self,
        log_id: u64,
        reviewer: &str,
        note: &str,
    ) -> Result<FraudAuditLog> {
        let annotated = self.fraud_logs.annotate_audit(log_id, reviewer, note).await?;
        tracing::info!(log_id, reviewer, "fraud audit log annotated");
        Ok(annotated)
    }

    async fn load(&self, id: ApplicationId) -> Result<LoanApplication> {
        self.applications
            .application(id)
            .await?
            .ok_or_else(|| LendingError::not_found("application", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::intake::IntakeService;
    use crate::domain::application::{
        Applicant, ApplicationStatus, ConsentFlags, Employment, EmploymentStatus, LoanType,
        Submission,
    };
    use crate::domain::fee::FeeSchedule;
    use crate::domain::ports::SystemClock;
    use crate::infrastructure::in_memory::InMemoryStore;
    use chrono::NaiveDate;

    struct Fixture {
        intake: IntakeService,
        review: ReviewService,
        fee_policy: Arc<FeePolicy>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let clock: ClockRef = Arc::new(SystemClock);
        let fee_policy = Arc::new(FeePolicy::new(store.clone(), clock.clone()));
        Fixture {
            intake: IntakeService::new(store.clone(), store.clone(), clock.clone()),
            review: ReviewService::new(store.clone(), store, fee_policy.clone(), clock),
            fee_policy,
        }
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
    async fn approval_computes_the_fee_from_the_active_schedule() {
        let fx = fixture();
        let created = fx.intake.submit(submission()).await.unwrap();

        let approved = fx
            .review
            .approve(created.id, Amount::new(2_400_000).unwrap(), None)
            .await
            .unwrap();
        assert_eq!(approved.status, ApplicationStatus::Approved);
        assert_eq!(approved.approved_amount.unwrap().minor_units(), 2_400_000);
        // Default 200 bps of 2_400_000.
        assert_eq!(
            approved.processing_fee_amount.unwrap().minor_units(),
            48_000
        );
        assert!(approved.approved_at.is_some());
    }

    #[tokio::test]
    async fn approval_honors_an_updated_schedule() {
        let fx = fixture();
        let created = fx.intake.submit(submission()).await.unwrap();
        fx.fee_policy
            .update_schedule(FeeSchedule::percentage(150).unwrap())
            .await
            .unwrap();

        let approved = fx
            .review
            .approve(created.id, Amount::new(2_400_000).unwrap(), None)
            .await
            .unwrap();
        assert_eq!(
            approved.processing_fee_amount.unwrap().minor_units(),
            36_000
        );
    }

    #[tokio::test]
    async fn rejection_requires_a_reason() {
        let fx = fixture();
        let created = fx.intake.submit(submission()).await.unwrap();

        let err = fx.review.reject(created.id, "  ").await.unwrap_err();
        assert!(matches!(
            err,
            LendingError::Validation { field: "reason", .. }
        ));

        let rejected = fx
            .review
            .reject(created.id, "income could not be verified")
            .await
            .unwrap();
        assert_eq!(rejected.status, ApplicationStatus::Rejected);
    }

    #[tokio::test]
    async fn cancel_after_approval_is_illegal() {
        let fx = fixture();
        let created = fx.intake.submit(submission()).await.unwrap();
        fx.review
            .approve(created.id, Amount::new(2_400_000).unwrap(), None)
            .await
            .unwrap();

        let err = fx.review.cancel(created.id).await.unwrap_err();
        assert!(matches!(err, LendingError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn start_review_then_approve() {
        let fx = fixture();
        let created = fx.intake.submit(submission()).await.unwrap();

        let reviewing = fx.review.start_review(created.id, "rbishop").await.unwrap();
        assert_eq!(reviewing.status, ApplicationStatus::UnderReview);

        let approved = fx
            .review
            .approve(created.id, Amount::new(2_000_000).unwrap(), Some("clean file"))
            .await
            .unwrap();
        assert_eq!(approved.status, ApplicationStatus::Approved);
    }

    #[tokio::test]
    async fn unknown_application_is_not_found() {
        let fx = fixture();
        let err = fx
            .review
            .approve(ApplicationId(99), Amount::new(100_000).unwrap(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LendingError::NotFound { .. }));
    }

    #[tokio::test]
    async fn fraud_log_annotation_round_trip() {
        let fx = fixture();
        fx.intake.submit(submission()).await.unwrap();

        let annotated = fx
            .review
            .annotate_fraud_log(1, "rbishop", "reviewed, no concerns")
            .await
            .unwrap();
        assert_eq!(annotated.reviewed_by.as_deref(), Some("rbishop"));

        let err = fx
            .review
            .annotate_fraud_log(1, "mliu", "second pass")
            .await
            .unwrap_err();
        assert!(matches!(err, LendingError::Validation { .. }));
    }
}
