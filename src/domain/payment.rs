use crate::domain::application::ApplicationId;
use crate::domain::money::Amount;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PaymentId(pub u64);

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Crypto,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Card => "card",
            Self::Crypto => "crypto",
        })
    }
}

/// The gateways the settlement adapter can route a charge to. Cardpoint and
/// Payline are interchangeable card rails; Coinbridge is the crypto rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    Cardpoint,
    Payline,
    Coinbridge,
}

impl PaymentProvider {
    pub fn method(&self) -> PaymentMethod {
        match self {
            Self::Cardpoint | Self::Payline => PaymentMethod::Card,
            Self::Coinbridge => PaymentMethod::Crypto,
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cardpoint => "cardpoint",
            Self::Payline => "payline",
            Self::Coinbridge => "coinbridge",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CryptoCurrency {
    Btc,
    Eth,
    Usdc,
}

impl CryptoCurrency {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Btc => "BTC",
            Self::Eth => "ETH",
            Self::Usdc => "USDC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    /// Terminal rows never change again; a failed or cancelled row simply
    /// leaves room for a fresh payment attempt.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Crypto-specific charge details captured at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoDetails {
    pub currency: CryptoCurrency,
    pub destination_address: String,
    /// Fee converted into the selected currency at the quoted rate.
    pub crypto_amount: Decimal,
}

/// One settlement attempt for an application's processing fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub application_id: ApplicationId,
    pub amount: Amount,
    pub provider: PaymentProvider,
    pub method: PaymentMethod,
    /// Provider-side transaction id; webhook events are keyed by this.
    pub provider_reference: String,
    pub crypto: Option<CryptoDetails>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// What the settlement service asks a gateway to charge.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount: Amount,
    pub description: String,
    /// Tokenized card payload; card rails require it.
    pub card_token: Option<String>,
    pub crypto_currency: Option<CryptoCurrency>,
}

/// What the client needs in order to complete the charge.
#[derive(Debug, Clone, PartialEq)]
pub enum ChargeInstructions {
    /// Card rails hand back a client secret for the front-end confirm step.
    ClientSecret(String),
    /// The crypto rail hands back a funding address and converted amount.
    CryptoTransfer {
        destination_address: String,
        currency: CryptoCurrency,
        crypto_amount: Decimal,
    },
}

#[derive(Debug, Clone)]
pub struct ChargeResponse {
    pub provider_reference: String,
    pub instructions: ChargeInstructions,
}

/// Provider-side view of a charge. `Pending` covers the crypto rail's
/// intermediate states (`pending`, `delayed`), which neither confirm nor
/// fail the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeOutcome {
    Succeeded,
    Failed,
    Cancelled,
    Pending,
}

impl ChargeOutcome {
    pub fn final_status(&self) -> Option<PaymentStatus> {
        match self {
            Self::Succeeded => Some(PaymentStatus::Succeeded),
            Self::Failed => Some(PaymentStatus::Failed),
            Self::Cancelled => Some(PaymentStatus::Cancelled),
            Self::Pending => None,
        }
    }
}
