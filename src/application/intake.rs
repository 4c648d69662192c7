use crate::application::fraud_screen::{FraudScreen, ScreeningOutcome};
use crate::domain::application::{LoanApplication, Submission};
use crate::domain::fraud::{self, FraudAuditLog, FraudDecision};
use crate::domain::ports::{
    ApplicationStoreRef, ClockRef, FraudLogStoreRef, GuardViolation, SubmissionGuard,
};
use crate::error::{LendingError, Result};
use chrono::NaiveDate;

/// Requested-amount bounds in minor units: $500 up to $100,000.
pub const MIN_REQUESTED: i64 = 50_000;
pub const MAX_REQUESTED: i64 = 10_000_000;

/// Free-text loan purpose must carry at least this many characters.
pub const MIN_PURPOSE_LEN: usize = 20;

const MIN_APPLICANT_AGE: u32 = 18;

/// Intake: validates a submission, runs the fraud screen, and inserts the
/// application under the store's atomic guard. Every attempt, whatever its
/// outcome, leaves one fraud audit row behind.
pub struct IntakeService {
    applications: ApplicationStoreRef,
    fraud_logs: FraudLogStoreRef,
    screen: FraudScreen,
    clock: ClockRef,
}

impl IntakeService {
    pub fn new(
        applications: ApplicationStoreRef,
        fraud_logs: FraudLogStoreRef,
        clock: ClockRef,
    ) -> Self {
        let screen = FraudScreen::new(applications.clone(), clock.clone());
        Self {
            applications,
            fraud_logs,
            screen,
            clock,
        }
    }

    pub async fn submit(&self, submission: Submission) -> Result<LoanApplication> {
        validate_submission(&submission, self.clock.today())?;

        let outcome = self.screen.screen(&submission).await?;
        match outcome.decision {
            FraudDecision::Rejected => {
                tracing::warn!(
                    user_id = submission.user_id,
                    score = outcome.score,
                    detail = %outcome.detail,
                    "submission rejected by fraud screen"
                );
                self.write_audit(&submission, None, &outcome).await?;
                Err(LendingError::FraudRejected {
                    detail: outcome.detail,
                })
            }
            FraudDecision::Accepted | FraudDecision::Flagged => {
                self.insert_screened(submission, outcome).await
            }
        }
    }

    /// Insert path for submissions that passed the screen. The store
    /// re-checks the guard inside its write boundary, so a race that slipped
    /// past the screen still ends in a single surviving row.
    async fn insert_screened(
        &self,
        submission: Submission,
        outcome: ScreeningOutcome,
    ) -> Result<LoanApplication> {
        let guard = SubmissionGuard {
            tax_identifier: submission.applicant.tax_identifier.clone(),
            user_id: submission.user_id,
            window_start: self.screen.window_start(),
        };
        let application = LoanApplication::from_submission(submission.clone(), self.clock.now());

        match self.applications.create_application(application, &guard).await {
            Ok(created) => {
                if outcome.decision == FraudDecision::Flagged {
                    tracing::info!(
                        application_id = %created.id,
                        score = outcome.score,
                        "application created but flagged for manual review"
                    );
                }
                self.write_audit(&submission, Some(&created), &outcome)
                    .await?;
                Ok(created)
            }
            Err(LendingError::SubmissionBlocked(violation)) => {
                let mut flags = outcome.flags;
                let detail = match violation {
                    GuardViolation::DuplicateIdentity => {
                        flags.duplicate_identity = true;
                        "concurrent submission with the same tax identifier won the insert"
                    }
                    GuardViolation::RapidResubmission => {
                        flags.rapid_resubmission = true;
                        "concurrent submission from the same user won the insert"
                    }
                };
                tracing::warn!(user_id = submission.user_id, detail, "insert guard tripped");
                let rejected = ScreeningOutcome {
                    decision: FraudDecision::Rejected,
                    score: outcome.score,
                    flags,
                    detail: detail.to_string(),
                };
                self.write_audit(&submission, None, &rejected).await?;
                Err(LendingError::SubmissionBlocked(violation))
            }
            Err(other) => Err(other),
        }
    }

    async fn write_audit(
        &self,
        submission: &Submission,
        application: Option<&LoanApplication>,
        outcome: &ScreeningOutcome,
    ) -> Result<()> {
        let log = FraudAuditLog {
            id: 0,
            user_id: submission.user_id,
            application_id: application.map(|app| app.id),
            tax_identifier: submission.applicant.tax_identifier.clone(),
            fraud_score: outcome.score,
            flags: outcome.flags,
            decision: outcome.decision,
            detail: outcome.detail.clone(),
            created_at: self.clock.now(),
            reviewed_by: None,
            review_note: None,
        };
        self.fraud_logs.append_audit(log).await?;
        Ok(())
    }
}

fn validate_submission(submission: &Submission, today: NaiveDate) -> Result<()> {
    if !submission.consents.all_granted() {
        return Err(LendingError::validation(
            "consents",
            "all five consent flags must be granted",
        ));
    }

    let requested = submission.requested_amount.minor_units();
    if !(MIN_REQUESTED..=MAX_REQUESTED).contains(&requested) {
        return Err(LendingError::validation(
            "requested_amount",
            format!("must be between {MIN_REQUESTED} and {MAX_REQUESTED} minor units"),
        ));
    }

    if submission.purpose.trim().chars().count() < MIN_PURPOSE_LEN {
        return Err(LendingError::validation(
            "purpose",
            format!("must be at least {MIN_PURPOSE_LEN} characters"),
        ));
    }

    let applicant = &submission.applicant;
    for (value, field) in [
        (&applicant.full_name, "full_name"),
        (&applicant.government_id, "government_id"),
        (&applicant.street_address, "street_address"),
        (&applicant.city, "city"),
        (&applicant.state, "state"),
        (&applicant.postal_code, "postal_code"),
        (&submission.employment.employer, "employer"),
    ] {
        if value.trim().is_empty() {
            return Err(LendingError::validation(field, "must not be empty"));
        }
    }

    if !has_tax_identifier_shape(&applicant.tax_identifier) {
        return Err(LendingError::validation(
            "tax_identifier",
            "must be nine digits, optionally dash-separated",
        ));
    }

    if !fraud::is_plausible_phone(&applicant.phone) {
        return Err(LendingError::validation(
            "phone",
            "must be a ten digit number, optionally with country code 1",
        ));
    }

    if !has_email_shape(&applicant.email) {
        return Err(LendingError::validation(
            "email",
            "must contain a local part and a domain",
        ));
    }

    match today.years_since(applicant.date_of_birth) {
        None => {
            return Err(LendingError::validation(
                "date_of_birth",
                "must not be in the future",
            ));
        }
        Some(age) if age < MIN_APPLICANT_AGE => {
            return Err(LendingError::validation(
                "date_of_birth",
                format!("applicant must be at least {MIN_APPLICANT_AGE} years old"),
            ));
        }
        Some(_) => {}
    }

    match (submission.bankruptcy_disclosed, submission.bankruptcy_date) {
        (true, None) => Err(LendingError::validation(
            "bankruptcy_date",
            "required when a bankruptcy is disclosed",
        )),
        (false, Some(_)) => Err(LendingError::validation(
            "bankruptcy_date",
            "provided without a bankruptcy disclosure",
        )),
        (true, Some(date)) if date > today => Err(LendingError::validation(
            "bankruptcy_date",
            "must not be in the future",
        )),
        _ => Ok(()),
    }
}

/// Format check only; suspicious-pattern detection belongs to the screen.
fn has_tax_identifier_shape(tax_identifier: &str) -> bool {
    let bytes = tax_identifier.as_bytes();
    match bytes.len() {
        9 => bytes.iter().all(u8::is_ascii_digit),
        11 => {
            bytes[3] == b'-'
                && bytes[6] == b'-'
                && bytes
                    .iter()
                    .enumerate()
                    .all(|(i, b)| matches!(i, 3 | 6) || b.is_ascii_digit())
        }
        _ => false,
    }
}

fn has_email_shape(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application::{
        Applicant, ApplicationStatus, ConsentFlags, Employment, EmploymentStatus, LoanType,
    };
    use crate::domain::money::Amount;
    use crate::domain::ports::{FixedClock, FraudLogStore};
    use crate::infrastructure::in_memory::InMemoryStore;
    use chrono::Duration;
    use std::sync::Arc;

    fn service(store: Arc<InMemoryStore>, clock: Arc<FixedClock>) -> IntakeService {
        IntakeService::new(store.clone(), store, clock)
    }

    fn fixed_clock() -> Arc<FixedClock> {
        let now = NaiveDate::from_ymd_opt(2026, 8, 25)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
            .and_utc();
        Arc::new(FixedClock::at(now))
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
    async fn accepted_submission_creates_a_pending_application() {
        let store = Arc::new(InMemoryStore::new());
        let intake = service(store.clone(), fixed_clock());

        let created = intake.submit(submission()).await.unwrap();
        assert_eq!(created.status, ApplicationStatus::Pending);
        assert!(created.id.0 > 0);

        // One audit row, tied to the created application.
        let log = store.audit_log(1).await.unwrap().unwrap();
        assert_eq!(log.application_id, Some(created.id));
        assert_eq!(log.decision, FraudDecision::Accepted);
    }

    #[tokio::test]
    async fn missing_consent_is_a_validation_error() {
        let store = Arc::new(InMemoryStore::new());
        let intake = service(store, fixed_clock());

        let mut sub = submission();
        sub.consents.credit_check = false;
        let err = intake.submit(sub).await.unwrap_err();
        assert!(matches!(
            err,
            LendingError::Validation {
                field: "consents",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn amount_bounds_are_enforced() {
        let store = Arc::new(InMemoryStore::new());
        let intake = service(store, fixed_clock());

        let mut low = submission();
        low.requested_amount = Amount::new(49_999).unwrap();
        assert!(intake.submit(low).await.is_err());

        let mut high = submission();
        high.requested_amount = Amount::new(10_000_001).unwrap();
        assert!(intake.submit(high).await.is_err());
    }

    #[tokio::test]
    async fn short_purpose_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let intake = service(store, fixed_clock());

        let mut sub = submission();
        sub.purpose = "new roof".to_string();
        let err = intake.submit(sub).await.unwrap_err();
        assert!(matches!(
            err,
            LendingError::Validation { field: "purpose", .. }
        ));
    }

    #[tokio::test]
    async fn disclosed_bankruptcy_requires_a_date() {
        let store = Arc::new(InMemoryStore::new());
        let intake = service(store, fixed_clock());

        let mut sub = submission();
        sub.bankruptcy_disclosed = true;
        let err = intake.submit(sub).await.unwrap_err();
        assert!(matches!(
            err,
            LendingError::Validation {
                field: "bankruptcy_date",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn malformed_identifier_shapes_fail_validation() {
        let store = Arc::new(InMemoryStore::new());
        let intake = service(store, fixed_clock());

        for bad in ["12345678", "1234567890", "123-456-789", "12a-45-6789"] {
            let mut sub = submission();
            sub.applicant.tax_identifier = bad.to_string();
            let err = intake.submit(sub).await.unwrap_err();
            assert!(
                matches!(
                    err,
                    LendingError::Validation {
                        field: "tax_identifier",
                        ..
                    }
                ),
                "expected validation error for {bad}"
            );
        }
    }

    #[tokio::test]
    async fn fraud_rejection_writes_an_audit_row_without_an_application() {
        let store = Arc::new(InMemoryStore::new());
        let intake = service(store.clone(), fixed_clock());

        let mut sub = submission();
        sub.applicant.tax_identifier = "666-12-3456".to_string();
        let err = intake.submit(sub).await.unwrap_err();
        assert!(matches!(err, LendingError::FraudRejected { .. }));
        assert_eq!(err.to_string(), "application cannot be accepted at this time");

        let log = store.audit_log(1).await.unwrap().unwrap();
        assert_eq!(log.application_id, None);
        assert!(log.flags.suspicious_identifier);
        assert_eq!(log.decision, FraudDecision::Rejected);
    }

    #[tokio::test]
    async fn duplicate_identity_rejects_second_submission() {
        let store = Arc::new(InMemoryStore::new());
        let clock = fixed_clock();
        let intake = service(store.clone(), clock.clone());

        intake.submit(submission()).await.unwrap();

        // Another user, same identifier, a day later (clear of the throttle).
        clock.advance(Duration::hours(25));
        let mut second = submission();
        second.user_id = 8;
        let err = intake.submit(second).await.unwrap_err();
        assert!(matches!(err, LendingError::FraudRejected { .. }));
    }

    #[tokio::test]
    async fn throttle_boundary_releases_after_24_hours() {
        let store = Arc::new(InMemoryStore::new());
        let clock = fixed_clock();
        let intake = service(store.clone(), clock.clone());

        intake.submit(submission()).await.unwrap();

        let mut second = submission();
        second.applicant.tax_identifier = "234-56-7890".to_string();

        clock.advance(Duration::hours(24) - Duration::seconds(1));
        let err = intake.submit(second.clone()).await.unwrap_err();
        assert!(matches!(err, LendingError::FraudRejected { .. }));

        clock.advance(Duration::seconds(2));
        assert!(intake.submit(second).await.is_ok());
    }

    #[tokio::test]
    async fn flagged_submission_is_still_created() {
        let store = Arc::new(InMemoryStore::new());
        let intake = service(store.clone(), fixed_clock());

        let mut sub = submission();
        sub.requested_amount = Amount::new(7_600_000).unwrap();
        sub.purpose = "bitcoin mining rig and casino tables".to_string();

        let created = intake.submit(sub).await.unwrap();
        assert_eq!(created.status, ApplicationStatus::Pending);

        let log = store.audit_log(1).await.unwrap().unwrap();
        assert_eq!(log.decision, FraudDecision::Flagged);
        assert_eq!(log.fraud_score, 50);
    }
}
