use crate::domain::money::Amount;
use crate::error::{LendingError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ApplicationId(pub u64);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanType {
    Personal,
    Auto,
    HomeImprovement,
    DebtConsolidation,
    Medical,
    SmallBusiness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    Employed,
    SelfEmployed,
    Retired,
    Unemployed,
}

/// The five disclosures an applicant must accept before intake proceeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentFlags {
    pub terms_of_service: bool,
    pub privacy_policy: bool,
    pub credit_check: bool,
    pub loan_agreement: bool,
    pub electronic_signature: bool,
}

impl ConsentFlags {
    pub fn all_granted(&self) -> bool {
        self.terms_of_service
            && self.privacy_policy
            && self.credit_check
            && self.loan_agreement
            && self.electronic_signature
    }

    pub fn granted() -> Self {
        Self {
            terms_of_service: true,
            privacy_policy: true,
            credit_check: true,
            loan_agreement: true,
            electronic_signature: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    /// Government tax identifier, nine digits, optionally dash-separated.
    pub tax_identifier: String,
    pub government_id: String,
    pub email: String,
    pub phone: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employment {
    pub employer: String,
    pub status: EmploymentStatus,
    pub annual_income: Amount,
    pub months_employed: u32,
}

/// Everything an applicant sends at intake, before any id is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub user_id: u64,
    pub applicant: Applicant,
    pub employment: Employment,
    pub loan_type: LoanType,
    pub requested_amount: Amount,
    pub purpose: String,
    #[serde(default)]
    pub bankruptcy_disclosed: bool,
    #[serde(default)]
    pub bankruptcy_date: Option<NaiveDate>,
    pub consents: ConsentFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    UnderReview,
    Approved,
    FeePending,
    FeePaid,
    Disbursed,
    Rejected,
    Cancelled,
}

impl ApplicationStatus {
    /// Terminal states accept no further events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disbursed | Self::Rejected | Self::Cancelled)
    }

    /// An application that still blocks re-use of its tax identifier.
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
            Self::FeePending => "fee_pending",
            Self::FeePaid => "fee_paid",
            Self::Disbursed => "disbursed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationEvent {
    StartReview,
    Approve,
    Reject,
    Cancel,
    BeginPayment,
    ConfirmPayment,
    Disburse,
}

impl ApplicationEvent {
    /// The state this event lands in when it is legal.
    pub fn target(&self) -> ApplicationStatus {
        match self {
            Self::StartReview => ApplicationStatus::UnderReview,
            Self::Approve => ApplicationStatus::Approved,
            Self::Reject => ApplicationStatus::Rejected,
            Self::Cancel => ApplicationStatus::Cancelled,
            Self::BeginPayment => ApplicationStatus::FeePending,
            Self::ConfirmPayment => ApplicationStatus::FeePaid,
            Self::Disburse => ApplicationStatus::Disbursed,
        }
    }
}

impl fmt::Display for ApplicationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StartReview => "start_review",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
            Self::BeginPayment => "begin_payment",
            Self::ConfirmPayment => "confirm_payment",
            Self::Disburse => "disburse",
        };
        f.write_str(name)
    }
}

/// Every legal `(current state, event) -> next state` edge. All status
/// changes in the crate funnel through [`transition`], so this table is the
/// single authority on the lifecycle.
const TRANSITIONS: &[(ApplicationStatus, ApplicationEvent, ApplicationStatus)] = {
    use ApplicationEvent as E;
    use ApplicationStatus as S;
    &[
        (S::Pending, E::StartReview, S::UnderReview),
        (S::Pending, E::Approve, S::Approved),
        (S::UnderReview, E::Approve, S::Approved),
        (S::Pending, E::Reject, S::Rejected),
        (S::UnderReview, E::Reject, S::Rejected),
        (S::Pending, E::Cancel, S::Cancelled),
        (S::UnderReview, E::Cancel, S::Cancelled),
        (S::Approved, E::BeginPayment, S::FeePending),
        (S::FeePending, E::ConfirmPayment, S::FeePaid),
        (S::FeePaid, E::Disburse, S::Disbursed),
    ]
};

pub fn transition(from: ApplicationStatus, event: ApplicationEvent) -> Result<ApplicationStatus> {
    TRANSITIONS
        .iter()
        .find(|(current, candidate, _)| *current == from && *candidate == event)
        .map(|(_, _, next)| *next)
        .ok_or(LendingError::IllegalTransition {
            from,
            to: event.target(),
        })
}

/// A loan application as stored. `version` backs the compare-and-swap
/// update path; stores bump it on every successful write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: ApplicationId,
    pub user_id: u64,
    pub applicant: Applicant,
    pub employment: Employment,
    pub loan_type: LoanType,
    pub requested_amount: Amount,
    pub purpose: String,
    pub bankruptcy_disclosed: bool,
    pub bankruptcy_date: Option<NaiveDate>,
    pub status: ApplicationStatus,
    pub approved_amount: Option<Amount>,
    pub processing_fee_amount: Option<Amount>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl LoanApplication {
    /// Builds a fresh `pending` application. The store assigns the real id
    /// when the guarded insert succeeds.
    pub fn from_submission(submission: Submission, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ApplicationId(0),
            user_id: submission.user_id,
            applicant: submission.applicant,
            employment: submission.employment,
            loan_type: submission.loan_type,
            requested_amount: submission.requested_amount,
            purpose: submission.purpose,
            bankruptcy_disclosed: submission.bankruptcy_disclosed,
            bankruptcy_date: submission.bankruptcy_date,
            status: ApplicationStatus::Pending,
            approved_amount: None,
            processing_fee_amount: None,
            rejection_reason: None,
            created_at,
            approved_at: None,
            disbursed_at: None,
            version: 0,
        }
    }

    fn apply(&mut self, event: ApplicationEvent) -> Result<()> {
        self.status = transition(self.status, event)?;
        Ok(())
    }

    pub fn start_review(&mut self) -> Result<()> {
        self.apply(ApplicationEvent::StartReview)
    }

    /// Stamps the approved amount and the fee computed from it. Both are
    /// written exactly once, on the transition into `approved`.
    pub fn approve(&mut self, amount: Amount, fee: Amount, at: DateTime<Utc>) -> Result<()> {
        self.apply(ApplicationEvent::Approve)?;
        self.approved_amount = Some(amount);
        self.processing_fee_amount = Some(fee);
        self.approved_at = Some(at);
        Ok(())
    }

    pub fn reject(&mut self, reason: &str) -> Result<()> {
        self.apply(ApplicationEvent::Reject)?;
        self.rejection_reason = Some(reason.to_string());
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.apply(ApplicationEvent::Cancel)
    }

    pub fn begin_payment(&mut self) -> Result<()> {
        self.apply(ApplicationEvent::BeginPayment)
    }

    pub fn confirm_payment(&mut self) -> Result<()> {
        self.apply(ApplicationEvent::ConfirmPayment)
    }

    pub fn disburse(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.apply(ApplicationEvent::Disburse)?;
        self.disbursed_at = Some(at);
        Ok(())
    }
}
