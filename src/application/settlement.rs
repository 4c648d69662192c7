use crate::domain::application::{ApplicationId, ApplicationStatus, LoanApplication};
use crate::domain::money::Amount;
use crate::domain::payment::{
    ChargeInstructions, ChargeOutcome, ChargeRequest, CryptoCurrency, CryptoDetails, Payment,
    PaymentId, PaymentMethod, PaymentProvider, PaymentStatus,
};
use crate::domain::ports::{
    ApplicationStoreRef, ClockRef, PaymentGatewayRef, PaymentStoreRef,
};
use crate::error::{LendingError, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Keyed digest over the raw webhook body: `hex(sha256(key "." body))`.
/// Providers sign with the shared sandbox key; tests and the sandbox
/// gateways use the same helper.
pub fn sign_payload(key: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update(b".");
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

/// What `begin_payment` hands back: the stored payment row plus whatever the
/// client needs to complete the charge.
#[derive(Debug, Clone)]
pub struct PaymentInitiation {
    pub payment: Payment,
    pub instructions: ChargeInstructions,
}

/// Settlement over the uniform gateway contract: creates charges, applies
/// synchronous confirmations and provider webhooks, and converges the
/// application onto `fee_paid` exactly once however outcomes arrive.
pub struct SettlementService {
    applications: ApplicationStoreRef,
    payments: PaymentStoreRef,
    gateways: HashMap<PaymentProvider, PaymentGatewayRef>,
    webhook_keys: HashMap<PaymentProvider, String>,
    clock: ClockRef,
}

impl SettlementService {
    pub fn new(
        applications: ApplicationStoreRef,
        payments: PaymentStoreRef,
        gateways: Vec<PaymentGatewayRef>,
        webhook_keys: HashMap<PaymentProvider, String>,
        clock: ClockRef,
    ) -> Self {
        let gateways = gateways
            .into_iter()
            .map(|gateway| (gateway.provider(), gateway))
            .collect();
        Self {
            applications,
            payments,
            gateways,
            webhook_keys,
            clock,
        }
    }

    /// Starts a fee payment for an approved application (or retries one that
    /// is already `fee_pending` after a failed attempt).
    pub async fn begin_payment(
        &self,
        application_id: ApplicationId,
        method: PaymentMethod,
        provider_hint: Option<PaymentProvider>,
        card_token: Option<String>,
        crypto_currency: Option<CryptoCurrency>,
    ) -> Result<PaymentInitiation> {
        let application = self.load_application(application_id).await?;
        if !matches!(
            application.status,
            ApplicationStatus::Approved | ApplicationStatus::FeePending
        ) {
            return Err(LendingError::IllegalTransition {
                from: application.status,
                to: ApplicationStatus::FeePending,
            });
        }
        let fee = application
            .processing_fee_amount
            .ok_or(LendingError::FeeNotSet(application_id))?;

        let gateway = self.gateway_for_method(method, provider_hint)?;
        let request = ChargeRequest {
            amount: fee,
            description: format!("Processing fee for application {application_id}"),
            card_token,
            crypto_currency,
        };
        let response = gateway.create_charge(&request).await?;

        let crypto = match &response.instructions {
            ChargeInstructions::CryptoTransfer {
                destination_address,
                currency,
                crypto_amount,
            } => Some(CryptoDetails {
                currency: *currency,
                destination_address: destination_address.clone(),
                crypto_amount: *crypto_amount,
            }),
            ChargeInstructions::ClientSecret(_) => None,
        };
        let payment = self
            .payments
            .create_payment(Payment {
                id: PaymentId(0),
                application_id,
                amount: fee,
                provider: gateway.provider(),
                method,
                provider_reference: response.provider_reference.clone(),
                crypto,
                status: PaymentStatus::Pending,
                created_at: self.clock.now(),
                completed_at: None,
            })
            .await?;

        if application.status == ApplicationStatus::Approved {
            let mut pending = application;
            pending.begin_payment()?;
            self.applications.update_application(&pending).await?;
        }

        tracing::info!(
            application_id = %application_id,
            payment_id = %payment.id,
            provider = %payment.provider,
            "fee payment started"
        );
        Ok(PaymentInitiation {
            payment,
            instructions: response.instructions,
        })
    }

    /// Synchronous confirmation path: pulls the outcome from the provider
    /// and applies it. Confirming an already-settled payment is a no-op.
    pub async fn confirm_payment(&self, payment_id: PaymentId) -> Result<Payment> {
        let payment = self
            .payments
            .payment(payment_id)
            .await?
            .ok_or_else(|| LendingError::not_found("payment", payment_id))?;

        match payment.status {
            PaymentStatus::Succeeded => return Ok(payment),
            PaymentStatus::Failed | PaymentStatus::Cancelled => {
                return Err(LendingError::ProviderDeclined {
                    provider: payment.provider,
                    detail: format!("payment attempt already {}", payment.status),
                });
            }
            PaymentStatus::Pending => {}
        }

        let gateway = self.gateway(payment.provider)?;
        let outcome = gateway.report_outcome(&payment.provider_reference).await?;
        match outcome.final_status() {
            Some(status) => {
                let settled = self.apply_outcome(&payment, status).await?;
                if settled.status == PaymentStatus::Succeeded {
                    Ok(settled)
                } else {
                    Err(LendingError::ProviderDeclined {
                        provider: settled.provider,
                        detail: format!("provider reported {}", settled.status),
                    })
                }
            }
            None => Err(LendingError::PaymentIncomplete(payment_id)),
        }
    }

    /// Webhook path. Verifies the signature over the raw body, maps the
    /// provider reference back to the payment row, and applies the outcome.
    /// Intermediate crypto states acknowledge without touching anything.
    pub async fn handle_webhook(
        &self,
        provider: PaymentProvider,
        body: &str,
        signature: &str,
    ) -> Result<Option<Payment>> {
        self.verify_signature(provider, body, signature)?;

        let event = parse_webhook(provider, body)?;
        let payment = self
            .payments
            .payment_by_provider_reference(provider, &event.provider_reference)
            .await?
            .ok_or_else(|| {
                LendingError::not_found("payment with provider reference", &event.provider_reference)
            })?;

        match event.outcome.final_status() {
            Some(status) => {
                let stored = self.apply_outcome(&payment, status).await?;
                Ok(Some(stored))
            }
            None => {
                tracing::debug!(
                    provider = %provider,
                    reference = %event.provider_reference,
                    "intermediate webhook state acknowledged"
                );
                Ok(None)
            }
        }
    }

    /// Writes the terminal payment status exactly once and, on success,
    /// converges the application onto `fee_paid`. Both the sync-confirm and
    /// webhook paths funnel through here, so the second arrival of the same
    /// outcome finds the work already done.
    async fn apply_outcome(&self, payment: &Payment, status: PaymentStatus) -> Result<Payment> {
        let completion = self
            .payments
            .complete_payment(payment.id, status, self.clock.now())
            .await?;
        let stored = completion.payment().clone();

        if stored.status == PaymentStatus::Succeeded {
            self.confirm_application_fee(&stored).await?;
        } else {
            tracing::info!(
                payment_id = %stored.id,
                status = %stored.status,
                "payment attempt closed without settling; application remains fee_pending"
            );
        }
        Ok(stored)
    }

    /// Moves the application to `fee_paid` if it is not already there.
    /// Retries on version conflicts; a late-arriving success after the
    /// application already reached `fee_paid` (or disbursed) is a no-op.
    async fn confirm_application_fee(&self, payment: &Payment) -> Result<()> {
        loop {
            let mut application = self.load_application(payment.application_id).await?;
            let fee = application
                .processing_fee_amount
                .ok_or(LendingError::FeeNotSet(application.id))?;
            if payment.amount != fee {
                return Err(LendingError::validation(
                    "payment",
                    "settled amount does not match the processing fee",
                ));
            }
            match application.status {
                ApplicationStatus::FeePaid | ApplicationStatus::Disbursed => return Ok(()),
                ApplicationStatus::FeePending => {
                    application.confirm_payment()?;
                    match self.applications.update_application(&application).await {
                        Ok(_) => {
                            tracing::info!(
                                application_id = %application.id,
                                payment_id = %payment.id,
                                "processing fee settled"
                            );
                            return Ok(());
                        }
                        Err(LendingError::ConcurrentUpdate { .. }) => continue,
                        Err(other) => return Err(other),
                    }
                }
                other => {
                    return Err(LendingError::IllegalTransition {
                        from: other,
                        to: ApplicationStatus::FeePaid,
                    });
                }
            }
        }
    }

    fn verify_signature(
        &self,
        provider: PaymentProvider,
        body: &str,
        signature: &str,
    ) -> Result<()> {
        let key = self
            .webhook_keys
            .get(&provider)
            .ok_or_else(|| LendingError::not_found("webhook key for provider", provider))?;
        let expected = sign_payload(key, body);
        if signature.trim().to_lowercase() != expected {
            tracing::warn!(provider = %provider, "webhook signature mismatch, event dropped");
            return Err(LendingError::InvalidSignature { provider });
        }
        Ok(())
    }

    fn gateway(&self, provider: PaymentProvider) -> Result<&PaymentGatewayRef> {
        self.gateways
            .get(&provider)
            .ok_or_else(|| LendingError::not_found("payment gateway", provider))
    }

    fn gateway_for_method(
        &self,
        method: PaymentMethod,
        hint: Option<PaymentProvider>,
    ) -> Result<&PaymentGatewayRef> {
        if let Some(provider) = hint {
            if provider.method() != method {
                return Err(LendingError::validation(
                    "provider",
                    format!("{provider} does not settle {method} payments"),
                ));
            }
            return self.gateway(provider);
        }
        // Card rails are interchangeable; take the configured default order.
        let default = match method {
            PaymentMethod::Card => PaymentProvider::Cardpoint,
            PaymentMethod::Crypto => PaymentProvider::Coinbridge,
        };
        self.gateway(default).or_else(|_| {
            self.gateways
                .values()
                .find(|gateway| gateway.provider().method() == method)
                .ok_or_else(|| LendingError::not_found("payment gateway for method", method))
        })
    }

    async fn load_application(&self, id: ApplicationId) -> Result<LoanApplication> {
        self.applications
            .application(id)
            .await?
            .ok_or_else(|| LendingError::not_found("application", id))
    }
}

struct WebhookEvent {
    provider_reference: String,
    outcome: ChargeOutcome,
}

/// Each provider posts its own payload shape; all of them normalize to a
/// provider reference plus an outcome.
fn parse_webhook(provider: PaymentProvider, body: &str) -> Result<WebhookEvent> {
    #[derive(Deserialize)]
    struct CardpointEvent {
        transaction_id: String,
        result: String,
    }

    #[derive(Deserialize)]
    struct PaylineData {
        reference: String,
    }
    #[derive(Deserialize)]
    struct PaylineEvent {
        r#type: String,
        data: PaylineData,
    }

    #[derive(Deserialize)]
    struct CoinbridgeEvent {
        event_type: String,
        charge_code: String,
    }

    match provider {
        PaymentProvider::Cardpoint => {
            let event: CardpointEvent = serde_json::from_str(body)?;
            let outcome = match event.result.as_str() {
                "approved" => ChargeOutcome::Succeeded,
                "declined" => ChargeOutcome::Failed,
                "voided" => ChargeOutcome::Cancelled,
                other => {
                    return Err(LendingError::validation(
                        "webhook",
                        format!("unknown cardpoint result {other:?}"),
                    ));
                }
            };
            Ok(WebhookEvent {
                provider_reference: event.transaction_id,
                outcome,
            })
        }
        PaymentProvider::Payline => {
            let event: PaylineEvent = serde_json::from_str(body)?;
            let outcome = match event.r#type.as_str() {
                "payment.succeeded" => ChargeOutcome::Succeeded,
                "payment.failed" => ChargeOutcome::Failed,
                "payment.cancelled" => ChargeOutcome::Cancelled,
                other => {
                    return Err(LendingError::validation(
                        "webhook",
                        format!("unknown payline event {other:?}"),
                    ));
                }
            };
            Ok(WebhookEvent {
                provider_reference: event.data.reference,
                outcome,
            })
        }
        PaymentProvider::Coinbridge => {
            let event: CoinbridgeEvent = serde_json::from_str(body)?;
            let outcome = match event.event_type.as_str() {
                "charge:confirmed" => ChargeOutcome::Succeeded,
                "charge:failed" => ChargeOutcome::Failed,
                "charge:pending" | "charge:delayed" => ChargeOutcome::Pending,
                other => {
                    return Err(LendingError::validation(
                        "webhook",
                        format!("unknown coinbridge event {other:?}"),
                    ));
                }
            };
            Ok(WebhookEvent {
                provider_reference: event.charge_code,
                outcome,
            })
        }
    }
}
