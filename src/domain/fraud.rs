use crate::domain::application::{ApplicationId, Submission};
use crate::error::{LendingError, Result};
use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scores above this auto-reject; 81 rejects, 80 does not.
pub const AUTO_REJECT_THRESHOLD: u8 = 80;

/// Scores from here up to the auto-reject threshold are flagged for manual
/// review but do not block creation.
pub const FLAG_THRESHOLD: u8 = 50;

// Soft-signal weights. The maxima sum to 100 so the score needs no clamp.
const LEVERAGE_EXTREME: u8 = 40; // requested >= 1.00x annual income
const LEVERAGE_SEVERE: u8 = 30; // >= 0.75x
const LEVERAGE_HIGH: u8 = 20; // >= 0.50x
const LEVERAGE_ELEVATED: u8 = 10; // >= 0.35x
const BANKRUPTCY_RECENT: u8 = 30; // discharged within 24 months
const BANKRUPTCY_PRIOR: u8 = 15; // within 60 months
const AGE_OUT_OF_BAND: u8 = 10; // under 21 or over 90
const PURPOSE_TERM: u8 = 10; // per flagged purpose keyword
const PURPOSE_CAP: u8 = 20;

const DISPOSABLE_MAIL_DOMAINS: &[&str] = &[
    "mailinator.com",
    "guerrillamail.com",
    "10minutemail.com",
    "tempmail.com",
    "temp-mail.org",
    "yopmail.com",
    "throwawaymail.com",
    "trashmail.com",
    "getnada.com",
    "sharklasers.com",
    "dispostable.com",
    "maildrop.cc",
];

const PURPOSE_RISK_TERMS: &[&str] = &[
    "crypto",
    "bitcoin",
    "gambling",
    "casino",
    "forex",
    "lottery",
    "sports betting",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudDecision {
    Accepted,
    Flagged,
    Rejected,
}

impl fmt::Display for FraudDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accepted => "accepted",
            Self::Flagged => "flagged",
            Self::Rejected => "rejected",
        })
    }
}

/// Which individual signals tripped, kept verbatim in the audit log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudFlags {
    pub duplicate_identity: bool,
    pub rapid_resubmission: bool,
    pub suspicious_identifier: bool,
    pub implausible_phone: bool,
    pub disposable_email: bool,
    pub high_leverage: bool,
    pub recent_bankruptcy: bool,
}

/// Write-once audit row, one per submission attempt. `application_id` stays
/// empty when the attempt was rejected before a row was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAuditLog {
    pub id: u64,
    pub user_id: u64,
    pub application_id: Option<ApplicationId>,
    pub tax_identifier: String,
    pub fraud_score: u8,
    pub flags: FraudFlags,
    pub decision: FraudDecision,
    /// Full internal detail; never surfaced to the submitting user.
    pub detail: String,
    pub created_at: DateTime<Utc>,
    pub reviewed_by: Option<String>,
    pub review_note: Option<String>,
}

impl FraudAuditLog {
    /// Staff annotation after manual review. A log is annotated at most once.
    pub fn annotate(&mut self, reviewer: &str, note: &str) -> Result<()> {
        if self.reviewed_by.is_some() {
            return Err(LendingError::validation(
                "fraud_log",
                "log entry has already been reviewed",
            ));
        }
        if reviewer.trim().is_empty() || note.trim().is_empty() {
            return Err(LendingError::validation(
                "fraud_log",
                "reviewer and note must be non-empty",
            ));
        }
        self.reviewed_by = Some(reviewer.to_string());
        self.review_note = Some(note.to_string());
        Ok(())
    }
}

/// Known-invalid tax-identifier shapes: an all-zero segment, the reserved
/// 666 area, or an area beginning with 9. Expects a pre-validated nine-digit
/// identifier, dashes optional.
pub fn is_suspicious_tax_identifier(tax_identifier: &str) -> bool {
    let digits: String = tax_identifier.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 9 {
        return true;
    }
    let (area, rest) = digits.split_at(3);
    let (group, serial) = rest.split_at(2);
    area == "000"
        || group == "00"
        || serial == "0000"
        || area == "666"
        || area.starts_with('9')
}

/// Basic shape check: ten digits, or eleven with a leading country code 1,
/// and a plausible leading digit on the area code.
pub fn is_plausible_phone(phone: &str) -> bool {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    let national = match digits.len() {
        10 => &digits[..],
        11 if digits[0] == '1' => &digits[1..],
        _ => return false,
    };
    !matches!(national[0], '0' | '1')
}

pub fn is_disposable_email(email: &str) -> bool {
    let Some((_, domain)) = email.rsplit_once('@') else {
        return false;
    };
    let domain = domain.trim().to_ascii_lowercase();
    DISPOSABLE_MAIL_DOMAINS.iter().any(|known| *known == domain)
}

/// Soft-signal outcome: the 0-100 score plus the flags it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskAssessment {
    pub score: u8,
    pub high_leverage: bool,
    pub recent_bankruptcy: bool,
}

/// Weighted score over the soft signals: leverage, bankruptcy proximity,
/// date-of-birth band, and purpose-text heuristics.
pub fn assess_risk(submission: &Submission, today: NaiveDate) -> RiskAssessment {
    let leverage = leverage_points(
        submission.requested_amount.minor_units(),
        submission.employment.annual_income.minor_units(),
    );
    let bankruptcy = submission
        .bankruptcy_date
        .filter(|_| submission.bankruptcy_disclosed)
        .map_or(0, |date| bankruptcy_points(date, today));
    let age = age_points(submission.applicant.date_of_birth, today);
    let purpose = purpose_points(&submission.purpose);

    RiskAssessment {
        score: leverage + bankruptcy + age + purpose,
        high_leverage: leverage >= LEVERAGE_HIGH,
        recent_bankruptcy: bankruptcy == BANKRUPTCY_RECENT,
    }
}

pub fn decision_for_score(score: u8) -> FraudDecision {
    if score > AUTO_REJECT_THRESHOLD {
        FraudDecision::Rejected
    } else if score >= FLAG_THRESHOLD {
        FraudDecision::Flagged
    } else {
        FraudDecision::Accepted
    }
}

fn leverage_points(requested_minor: i64, income_minor: i64) -> u8 {
    if income_minor <= 0 {
        return LEVERAGE_EXTREME;
    }
    let ratio_bps = requested_minor as i128 * 10_000 / income_minor as i128;
    match ratio_bps {
        r if r >= 10_000 => LEVERAGE_EXTREME,
        r if r >= 7_500 => LEVERAGE_SEVERE,
        r if r >= 5_000 => LEVERAGE_HIGH,
        r if r >= 3_500 => LEVERAGE_ELEVATED,
        _ => 0,
    }
}

fn bankruptcy_points(discharged: NaiveDate, today: NaiveDate) -> u8 {
    let within = |months: u32| {
        today
            .checked_sub_months(Months::new(months))
            .is_none_or(|cutoff| discharged >= cutoff)
    };
    if within(24) {
        BANKRUPTCY_RECENT
    } else if within(60) {
        BANKRUPTCY_PRIOR
    } else {
        0
    }
}

fn age_points(date_of_birth: NaiveDate, today: NaiveDate) -> u8 {
    match today.years_since(date_of_birth) {
        Some(age) if (21..=90).contains(&age) => 0,
        _ => AGE_OUT_OF_BAND,
    }
}

fn purpose_points(purpose: &str) -> u8 {
    let lowered = purpose.to_lowercase();
    let hits = PURPOSE_RISK_TERMS
        .iter()
        .filter(|term| lowered.contains(**term))
        .count() as u8;
    (hits * PURPOSE_TERM).min(PURPOSE_CAP)
}
