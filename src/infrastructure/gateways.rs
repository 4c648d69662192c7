use crate::domain::payment::{
    ChargeInstructions, ChargeOutcome, ChargeRequest, ChargeResponse, CryptoCurrency,
    PaymentProvider,
};
use crate::domain::ports::{PaymentGateway, PaymentGatewayRef};
use crate::error::{LendingError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Shared secret the sandbox providers sign their webhook bodies with.
pub const SANDBOX_WEBHOOK_KEY: &str = "whsec_sandbox_7f3b2c";

/// Card tokens carrying this prefix are declined by the sandbox card rails,
/// e.g. `tok_declined_insufficient`. `tok_void` tokens come back cancelled.
pub const DECLINED_TOKEN_PREFIX: &str = "tok_declined";

const VOIDED_TOKEN_PREFIX: &str = "tok_void";

/// All three sandbox gateways, ready to hand to the settlement service.
pub fn sandbox_gateways() -> Vec<PaymentGatewayRef> {
    vec![
        Arc::new(CardpointGateway::new()),
        Arc::new(PaylineGateway::new()),
        Arc::new(CoinbridgeGateway::new()),
    ]
}

/// Webhook signing keys for the sandbox providers. They all share one key;
/// live deployments would configure one per provider.
pub fn sandbox_webhook_keys() -> HashMap<PaymentProvider, String> {
    [
        PaymentProvider::Cardpoint,
        PaymentProvider::Payline,
        PaymentProvider::Coinbridge,
    ]
    .into_iter()
    .map(|provider| (provider, SANDBOX_WEBHOOK_KEY.to_string()))
    .collect()
}

fn card_outcome(token: &str) -> ChargeOutcome {
    if token.starts_with(DECLINED_TOKEN_PREFIX) {
        ChargeOutcome::Failed
    } else if token.starts_with(VOIDED_TOKEN_PREFIX) {
        ChargeOutcome::Cancelled
    } else {
        ChargeOutcome::Succeeded
    }
}

fn require_card_token(request: &ChargeRequest) -> Result<&str> {
    request
        .card_token
        .as_deref()
        .ok_or_else(|| LendingError::validation("card_token", "card payments require a tokenized card"))
}

/// Cardpoint sandbox: a synchronous card rail. The outcome is decided by the
/// token at charge creation, recorded, and replayed by `report_outcome`.
pub struct CardpointGateway {
    charges: RwLock<HashMap<String, ChargeOutcome>>,
}

impl CardpointGateway {
    pub fn new() -> Self {
        Self {
            charges: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for CardpointGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for CardpointGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Cardpoint
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeResponse> {
        let token = require_card_token(request)?;
        let reference = format!("cp_{}", Uuid::new_v4().simple());
        self.charges
            .write()
            .await
            .insert(reference.clone(), card_outcome(token));
        Ok(ChargeResponse {
            provider_reference: reference,
            instructions: ChargeInstructions::ClientSecret(format!(
                "cs_{}",
                Uuid::new_v4().simple()
            )),
        })
    }

    async fn report_outcome(&self, provider_reference: &str) -> Result<ChargeOutcome> {
        self.charges
            .read()
            .await
            .get(provider_reference)
            .copied()
            .ok_or_else(|| LendingError::not_found("cardpoint charge", provider_reference))
    }
}

/// Payline sandbox: the secondary card rail. Identical token semantics to
/// Cardpoint but its own reference space and webhook schema.
pub struct PaylineGateway {
    charges: RwLock<HashMap<String, ChargeOutcome>>,
}

impl PaylineGateway {
    pub fn new() -> Self {
        Self {
            charges: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for PaylineGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for PaylineGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Payline
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeResponse> {
        let token = require_card_token(request)?;
        let reference = format!("pl_{}", Uuid::new_v4().simple());
        self.charges
            .write()
            .await
            .insert(reference.clone(), card_outcome(token));
        Ok(ChargeResponse {
            provider_reference: reference,
            instructions: ChargeInstructions::ClientSecret(format!(
                "pls_{}",
                Uuid::new_v4().simple()
            )),
        })
    }

    async fn report_outcome(&self, provider_reference: &str) -> Result<ChargeOutcome> {
        self.charges
            .read()
            .await
            .get(provider_reference)
            .copied()
            .ok_or_else(|| LendingError::not_found("payline charge", provider_reference))
    }
}

/// Sandbox conversion table. A live integration would pull spot rates; the
/// sandbox keeps them fixed so converted amounts are deterministic.
fn exchange_rate(currency: CryptoCurrency) -> Decimal {
    match currency {
        CryptoCurrency::Btc => dec!(64000),
        CryptoCurrency::Eth => dec!(3100),
        CryptoCurrency::Usdc => dec!(1),
    }
}

/// Coinbridge sandbox: the crypto rail. Charges return funding instructions
/// and stay pending until the provider webhook confirms the chain transfer;
/// `report_outcome` never settles one on its own.
pub struct CoinbridgeGateway {
    charges: RwLock<HashMap<String, ChargeOutcome>>,
}

impl CoinbridgeGateway {
    pub fn new() -> Self {
        Self {
            charges: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for CoinbridgeGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for CoinbridgeGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Coinbridge
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeResponse> {
        let currency = request.crypto_currency.unwrap_or(CryptoCurrency::Btc);
        let crypto_amount = (request.amount.to_major_units() / exchange_rate(currency)).round_dp(8);
        let reference = format!("cb_{}", Uuid::new_v4().simple());
        self.charges
            .write()
            .await
            .insert(reference.clone(), ChargeOutcome::Pending);
        Ok(ChargeResponse {
            provider_reference: reference,
            instructions: ChargeInstructions::CryptoTransfer {
                destination_address: format!("cb1q{}", Uuid::new_v4().simple()),
                currency,
                crypto_amount,
            },
        })
    }

    async fn report_outcome(&self, provider_reference: &str) -> Result<ChargeOutcome> {
        self.charges
            .read()
            .await
            .get(provider_reference)
            .copied()
            .ok_or_else(|| LendingError::not_found("coinbridge charge", provider_reference))
    }
}
