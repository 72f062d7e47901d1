//! LNbits Lightning provider adapter.
//!
//! Single-call invoice creation against `/api/v1/payments`; status polls
//! go by payment hash. Webhook signatures arrive as a bare-hex
//! `X-Webhook-Signature` header, HMAC-SHA256 over the raw body.
//!
//! Mock mode mirrors the BTCPay adapter: explicit constructor choice,
//! synthetic invoices, pending polls.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::config::LnbitsConfig;
use crate::domain::foundation::ProviderType;
use crate::ports::{
    CreatedInvoice, InvoiceRequest, InvoiceState, InvoiceStatus, LightningProvider, PaymentEvent,
    ProviderError,
};

use super::btcpay::ProviderMode;

type HmacSha256 = Hmac<Sha256>;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

pub struct LnbitsAdapter {
    mode: ProviderMode,
    config: Option<LnbitsConfig>,
    http: reqwest::Client,
}

impl LnbitsAdapter {
    pub fn live(config: LnbitsConfig) -> Self {
        Self {
            mode: ProviderMode::Live,
            config: Some(config),
            http: reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn mock() -> Self {
        Self {
            mode: ProviderMode::Mock,
            config: None,
            http: reqwest::Client::new(),
        }
    }

    fn unavailable(&self, message: impl Into<String>) -> ProviderError {
        ProviderError::Unavailable {
            provider: ProviderType::Lnbits,
            message: message.into(),
        }
    }

    fn rejected(&self, message: impl Into<String>) -> ProviderError {
        ProviderError::Rejected {
            provider: ProviderType::Lnbits,
            message: message.into(),
        }
    }

    fn live_config(&self) -> Result<&LnbitsConfig, ProviderError> {
        self.config
            .as_ref()
            .ok_or(ProviderError::NoProviderConfigured)
    }
}

#[async_trait]
impl LightningProvider for LnbitsAdapter {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Lnbits
    }

    async fn create_invoice(&self, req: &InvoiceRequest) -> Result<CreatedInvoice, ProviderError> {
        if self.mode == ProviderMode::Mock {
            let seed = Uuid::new_v4().simple().to_string();
            let payment_hash = hex::encode(Sha256::digest(seed.as_bytes()));
            tracing::debug!(
                payment_hash = %payment_hash,
                amount_sats = req.amount_sats,
                "Issued mock LNbits invoice"
            );
            return Ok(CreatedInvoice {
                provider: ProviderType::Lnbits,
                provider_invoice_id: payment_hash.clone(),
                payment_hash: Some(payment_hash),
                bolt11: format!("lnbc{}mockinvoice", req.amount_sats),
                expires_at: Some(
                    Utc::now() + chrono::Duration::seconds(req.expires_in_secs as i64),
                ),
            });
        }

        let config = self.live_config()?;
        let url = format!(
            "{}/api/v1/payments",
            config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "out": false,
            "amount": req.amount_sats,
            "memo": req.memo,
            "expiry": req.expires_in_secs,
            "webhook": req.webhook_url,
            "extra": req.metadata,
        });

        let response = self
            .http
            .post(&url)
            .header("X-Api-Key", config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(error = %body, "LNbits invoice creation failed");
            return Err(self.rejected(body));
        }

        let created: LnbitsInvoice = response
            .json()
            .await
            .map_err(|e| self.rejected(format!("unparseable invoice response: {e}")))?;

        Ok(CreatedInvoice {
            provider: ProviderType::Lnbits,
            provider_invoice_id: created.payment_hash.clone(),
            payment_hash: Some(created.payment_hash),
            bolt11: created.payment_request,
            expires_at: Some(Utc::now() + chrono::Duration::seconds(req.expires_in_secs as i64)),
        })
    }

    async fn get_invoice_status(
        &self,
        provider_invoice_id: &str,
        payment_hash: Option<&str>,
    ) -> Result<InvoiceStatus, ProviderError> {
        if self.mode == ProviderMode::Mock {
            return Ok(InvoiceStatus::pending());
        }

        let config = self.live_config()?;
        // LNbits keys payments by hash; the invoice id is the hash.
        let hash = payment_hash.unwrap_or(provider_invoice_id);
        let url = format!(
            "{}/api/v1/payments/{}",
            config.base_url.trim_end_matches('/'),
            hash
        );

        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(InvoiceStatus::unknown());
        }

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.rejected(body));
        }

        let payment: LnbitsPaymentStatus = response
            .json()
            .await
            .map_err(|e| self.rejected(format!("unparseable payment response: {e}")))?;

        if payment.paid {
            Ok(InvoiceStatus::paid(Utc::now()))
        } else {
            Ok(InvoiceStatus::pending())
        }
    }

    fn parse_webhook_event(&self, payload: &[u8]) -> Option<PaymentEvent> {
        let event: LnbitsWebhookEvent = serde_json::from_slice(payload).ok()?;
        let payment_hash = event.payment_hash?;

        // An LNbits webhook fires on receipt of payment; presence of the
        // hash is the whole signal.
        Some(PaymentEvent {
            provider: ProviderType::Lnbits,
            provider_invoice_id: Some(payment_hash.clone()),
            payment_hash: Some(payment_hash),
            state: InvoiceState::Paid,
        })
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<(), ProviderError> {
        let secret = self.config.as_ref().and_then(|c| c.webhook_secret.as_ref());

        let Some(secret) = secret else {
            tracing::debug!("No LNbits webhook secret configured, accepting unsigned payload");
            return Ok(());
        };

        let provided =
            signature
                .and_then(|s| hex::decode(s).ok())
                .ok_or(ProviderError::InvalidSignature {
                    provider: ProviderType::Lnbits,
                })?;

        let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        if expected.as_slice().ct_eq(&provided).unwrap_u8() != 1 {
            tracing::warn!("Invalid LNbits webhook signature");
            return Err(ProviderError::InvalidSignature {
                provider: ProviderType::Lnbits,
            });
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct LnbitsInvoice {
    payment_hash: String,
    payment_request: String,
}

#[derive(Debug, Deserialize)]
struct LnbitsPaymentStatus {
    #[serde(default)]
    paid: bool,
}

#[derive(Debug, Deserialize)]
struct LnbitsWebhookEvent {
    payment_hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn signed_adapter(secret: &str) -> LnbitsAdapter {
        LnbitsAdapter::live(LnbitsConfig {
            base_url: "https://lnbits.example.com".to_string(),
            api_key: SecretString::new("apikey".to_string()),
            webhook_secret: Some(SecretString::new(secret.to_string())),
        })
    }

    #[tokio::test]
    async fn mock_invoice_id_is_the_payment_hash() {
        let adapter = LnbitsAdapter::mock();
        let req = InvoiceRequest {
            amount_sats: 1_000,
            memo: "test".to_string(),
            expires_in_secs: 600,
            webhook_url: None,
            metadata: serde_json::json!({}),
        };

        let invoice = adapter.create_invoice(&req).await.unwrap();

        assert_eq!(
            invoice.payment_hash.as_deref(),
            Some(invoice.provider_invoice_id.as_str())
        );
        assert_eq!(invoice.provider_invoice_id.len(), 64);
    }

    #[test]
    fn parses_payment_webhook_as_paid() {
        let adapter = LnbitsAdapter::mock();
        let payload = br#"{"payment_hash":"ff00","amount":1000,"memo":"x"}"#;

        let event = adapter.parse_webhook_event(payload).unwrap();

        assert_eq!(event.state, InvoiceState::Paid);
        assert_eq!(event.payment_hash.as_deref(), Some("ff00"));
    }

    #[test]
    fn payload_without_hash_is_not_recognized() {
        let adapter = LnbitsAdapter::mock();
        assert!(adapter
            .parse_webhook_event(br#"{"type":"InvoiceSettled","invoiceId":"inv"}"#)
            .is_none());
    }

    #[test]
    fn bare_hex_signature_verifies() {
        let adapter = signed_adapter("secret");
        let payload = br#"{"payment_hash":"ff00"}"#;

        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(payload);
        let sig = hex::encode(mac.finalize().into_bytes());

        assert!(adapter.verify_webhook_signature(payload, Some(&sig)).is_ok());
    }

    #[test]
    fn wrong_signature_is_rejected() {
        let adapter = signed_adapter("secret");
        let result = adapter.verify_webhook_signature(b"{}", Some("00ff"));
        assert!(matches!(
            result,
            Err(ProviderError::InvalidSignature { .. })
        ));
    }
}
