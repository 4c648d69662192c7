use crate::domain::application::Submission;
use crate::domain::fraud::{
    self, FraudDecision, FraudFlags, assess_risk, decision_for_score,
};
use crate::domain::ports::{ApplicationStoreRef, ClockRef};
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};

/// One application per user per rolling day.
pub fn throttle_window() -> Duration {
    Duration::hours(24)
}

/// What the screen concluded about one submission attempt. The detail string
/// is for the audit log and server logs only.
#[derive(Debug, Clone)]
pub struct ScreeningOutcome {
    pub decision: FraudDecision,
    pub score: u8,
    pub flags: FraudFlags,
    pub detail: String,
}

impl ScreeningOutcome {
    fn rejected(flags: FraudFlags, detail: impl Into<String>) -> Self {
        Self {
            decision: FraudDecision::Rejected,
            score: 0,
            flags,
            detail: detail.into(),
        }
    }
}

/// Runs the fraud pipeline exactly once per submission, before any
/// application row exists: five ordered hard checks, each short-circuiting
/// with a rejection, then the weighted soft score.
pub struct FraudScreen {
    applications: ApplicationStoreRef,
    clock: ClockRef,
}

impl FraudScreen {
    pub fn new(applications: ApplicationStoreRef, clock: ClockRef) -> Self {
        Self {
            applications,
            clock,
        }
    }

    /// The start of the current throttle window; used again by the store's
    /// insert guard so the check and the insert agree on the boundary.
    pub fn window_start(&self) -> DateTime<Utc> {
        self.clock.now() - throttle_window()
    }

    pub async fn screen(&self, submission: &Submission) -> Result<ScreeningOutcome> {
        let mut flags = FraudFlags::default();

        if self
            .applications
            .has_open_application_for_tax_id(&submission.applicant.tax_identifier)
            .await?
        {
            flags.duplicate_identity = true;
            return Ok(ScreeningOutcome::rejected(
                flags,
                "tax identifier already present on a non-terminal application",
            ));
        }

        if let Some(last) = self
            .applications
            .last_submission_at(submission.user_id)
            .await?
            && last > self.window_start()
        {
            flags.rapid_resubmission = true;
            return Ok(ScreeningOutcome::rejected(
                flags,
                format!("previous submission at {last} is inside the 24h window"),
            ));
        }

        if fraud::is_suspicious_tax_identifier(&submission.applicant.tax_identifier) {
            flags.suspicious_identifier = true;
            return Ok(ScreeningOutcome::rejected(
                flags,
                "tax identifier matches a known-invalid pattern",
            ));
        }

        if !fraud::is_plausible_phone(&submission.applicant.phone) {
            flags.implausible_phone = true;
            return Ok(ScreeningOutcome::rejected(
                flags,
                "phone number fails plausibility check",
            ));
        }

        if fraud::is_disposable_email(&submission.applicant.email) {
            flags.disposable_email = true;
            return Ok(ScreeningOutcome::rejected(
                flags,
                "email domain is a known disposable provider",
            ));
        }

        let assessment = assess_risk(submission, self.clock.today());
        flags.high_leverage = assessment.high_leverage;
        flags.recent_bankruptcy = assessment.recent_bankruptcy;
        let decision = decision_for_score(assessment.score);
        let detail = match decision {
            FraudDecision::Rejected => format!(
                "weighted score {} above auto-reject threshold",
                assessment.score
            ),
            FraudDecision::Flagged => {
                format!("weighted score {} flagged for manual review", assessment.score)
            }
            FraudDecision::Accepted => format!("weighted score {}", assessment.score),
        };

        Ok(ScreeningOutcome {
            decision,
            score: assessment.score,
            flags,
            detail,
        })
    }
}
