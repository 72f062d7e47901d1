//! BTCPay Server (Greenfield API) Lightning provider adapter.
//!
//! Implements the `LightningProvider` trait against a BTCPay store.
//! Invoice creation is a two-step call: create the invoice, then fetch its
//! Lightning payment method for the BOLT11 string.
//!
//! # Security
//!
//! - Webhook signatures arrive as `BTCPay-Sig: sha256=<hex>`, an
//!   HMAC-SHA256 over the raw body, compared in constant time
//! - API keys and webhook secrets are handled via `secrecy::SecretString`
//!
//! # Mock mode
//!
//! Constructed with [`BtcpayAdapter::mock`], the adapter issues synthetic
//! invoices and reports them pending. The mode is an explicit constructor
//! choice so tests can force either behavior deterministically.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::config::BtcpayConfig;
use crate::domain::foundation::ProviderType;
use crate::ports::{
    CreatedInvoice, InvoiceRequest, InvoiceState, InvoiceStatus, LightningProvider, PaymentEvent,
    ProviderError,
};

type HmacSha256 = Hmac<Sha256>;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Whether the adapter talks to a live BTCPay instance or fabricates
/// invoices locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    Live,
    Mock,
}

pub struct BtcpayAdapter {
    mode: ProviderMode,
    config: Option<BtcpayConfig>,
    http: reqwest::Client,
}

impl BtcpayAdapter {
    /// Live adapter backed by a BTCPay store.
    pub fn live(config: BtcpayConfig) -> Self {
        Self {
            mode: ProviderMode::Live,
            config: Some(config),
            http: http_client(),
        }
    }

    /// Mock adapter: synthetic invoices, no network, unsigned webhooks
    /// accepted.
    pub fn mock() -> Self {
        Self {
            mode: ProviderMode::Mock,
            config: None,
            http: http_client(),
        }
    }

    fn unavailable(&self, message: impl Into<String>) -> ProviderError {
        ProviderError::Unavailable {
            provider: ProviderType::Btcpay,
            message: message.into(),
        }
    }

    fn rejected(&self, message: impl Into<String>) -> ProviderError {
        ProviderError::Rejected {
            provider: ProviderType::Btcpay,
            message: message.into(),
        }
    }

    fn live_config(&self) -> Result<&BtcpayConfig, ProviderError> {
        self.config
            .as_ref()
            .ok_or(ProviderError::NoProviderConfigured)
    }

    fn mock_invoice(&self, req: &InvoiceRequest) -> CreatedInvoice {
        use sha2::Digest;

        let id = format!("mock-btcpay-{}", Uuid::new_v4().simple());
        CreatedInvoice {
            provider: ProviderType::Btcpay,
            provider_invoice_id: id.clone(),
            payment_hash: Some(hex::encode(Sha256::digest(id.as_bytes()))),
            bolt11: format!("lnbc{}mockinvoice", req.amount_sats),
            expires_at: Some(Utc::now() + chrono::Duration::seconds(req.expires_in_secs as i64)),
        }
    }

    async fn fetch_bolt11(
        &self,
        config: &BtcpayConfig,
        invoice_id: &str,
    ) -> Result<String, ProviderError> {
        let url = format!(
            "{}/api/v1/stores/{}/invoices/{}/payment-methods",
            config.base_url.trim_end_matches('/'),
            config.store_id,
            invoice_id
        );

        let response = self
            .http
            .get(&url)
            .header(
                "Authorization",
                format!("token {}", config.api_key.expose_secret()),
            )
            .send()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.rejected(format!("payment-methods lookup failed: {body}")));
        }

        let methods: Vec<BtcpayPaymentMethod> = response
            .json()
            .await
            .map_err(|e| self.rejected(format!("unparseable payment-methods response: {e}")))?;

        methods
            .into_iter()
            .find(|m| m.payment_method.contains("LightningNetwork"))
            .and_then(|m| m.destination)
            .ok_or_else(|| self.rejected("invoice has no Lightning payment method"))
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_default()
}

#[async_trait]
impl LightningProvider for BtcpayAdapter {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Btcpay
    }

    async fn create_invoice(&self, req: &InvoiceRequest) -> Result<CreatedInvoice, ProviderError> {
        if self.mode == ProviderMode::Mock {
            let invoice = self.mock_invoice(req);
            tracing::debug!(
                invoice_id = %invoice.provider_invoice_id,
                amount_sats = req.amount_sats,
                "Issued mock BTCPay invoice"
            );
            return Ok(invoice);
        }

        let config = self.live_config()?;
        let url = format!(
            "{}/api/v1/stores/{}/invoices",
            config.base_url.trim_end_matches('/'),
            config.store_id
        );

        let expiration_minutes = (req.expires_in_secs / 60).max(1);
        let body = serde_json::json!({
            "amount": req.amount_sats.to_string(),
            "currency": "SATS",
            "checkout": {
                "expirationMinutes": expiration_minutes,
                "redirectURL": serde_json::Value::Null,
            },
            "metadata": {
                "orderId": req.metadata.get("order_id").cloned().unwrap_or_default(),
                "itemDesc": req.memo,
                "posData": req.metadata,
            },
        });

        let response = self
            .http
            .post(&url)
            .header(
                "Authorization",
                format!("token {}", config.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(error = %body, "BTCPay invoice creation failed");
            return Err(self.rejected(body));
        }

        let created: BtcpayInvoice = response
            .json()
            .await
            .map_err(|e| self.rejected(format!("unparseable invoice response: {e}")))?;

        let bolt11 = self.fetch_bolt11(config, &created.id).await?;
        let expires_at = created
            .expiration_time
            .and_then(|t| chrono::DateTime::from_timestamp(t, 0));

        Ok(CreatedInvoice {
            provider: ProviderType::Btcpay,
            provider_invoice_id: created.id,
            payment_hash: None,
            bolt11,
            expires_at,
        })
    }

    async fn get_invoice_status(
        &self,
        provider_invoice_id: &str,
        _payment_hash: Option<&str>,
    ) -> Result<InvoiceStatus, ProviderError> {
        if self.mode == ProviderMode::Mock {
            return Ok(InvoiceStatus::pending());
        }

        let config = self.live_config()?;
        let url = format!(
            "{}/api/v1/stores/{}/invoices/{}",
            config.base_url.trim_end_matches('/'),
            config.store_id,
            provider_invoice_id
        );

        let response = self
            .http
            .get(&url)
            .header(
                "Authorization",
                format!("token {}", config.api_key.expose_secret()),
            )
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

        let invoice: BtcpayInvoice = response
            .json()
            .await
            .map_err(|e| self.rejected(format!("unparseable invoice response: {e}")))?;

        let state = match invoice.status.as_str() {
            "Settled" => InvoiceState::Paid,
            "New" | "Processing" => InvoiceState::Pending,
            "Expired" => InvoiceState::Expired,
            "Invalid" => InvoiceState::Failed,
            _ => InvoiceState::Unknown,
        };

        let paid_at = if state == InvoiceState::Paid {
            Some(Utc::now())
        } else {
            None
        };

        Ok(InvoiceStatus { state, paid_at })
    }

    fn parse_webhook_event(&self, payload: &[u8]) -> Option<PaymentEvent> {
        let event: BtcpayWebhookEvent = serde_json::from_slice(payload).ok()?;

        // BTCPay events always carry an invoiceId and an `Invoice*` type.
        if !event.event_type.starts_with("Invoice") {
            return None;
        }
        let invoice_id = event.invoice_id?;

        let state = match event.event_type.as_str() {
            "InvoiceSettled" | "InvoicePaymentSettled" => InvoiceState::Paid,
            "InvoiceReceivedPayment" | "InvoiceProcessing" | "InvoiceCreated" => {
                InvoiceState::Pending
            }
            "InvoiceExpired" => InvoiceState::Expired,
            "InvoiceInvalid" => InvoiceState::Failed,
            _ => InvoiceState::Unknown,
        };

        Some(PaymentEvent {
            provider: ProviderType::Btcpay,
            provider_invoice_id: Some(invoice_id),
            payment_hash: None,
            state,
        })
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<(), ProviderError> {
        let secret = self.config.as_ref().and_then(|c| c.webhook_secret.as_ref());

        let Some(secret) = secret else {
            // Accept-unsigned weak mode; config validation forbids this in
            // production.
            tracing::debug!("No BTCPay webhook secret configured, accepting unsigned payload");
            return Ok(());
        };

        let provided = signature
            .and_then(|s| s.strip_prefix("sha256="))
            .and_then(|s| hex::decode(s).ok())
            .ok_or(ProviderError::InvalidSignature {
                provider: ProviderType::Btcpay,
            })?;

        let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        if expected.as_slice().ct_eq(&provided).unwrap_u8() != 1 {
            tracing::warn!("Invalid BTCPay webhook signature");
            return Err(ProviderError::InvalidSignature {
                provider: ProviderType::Btcpay,
            });
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct BtcpayInvoice {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(rename = "expirationTime")]
    expiration_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BtcpayPaymentMethod {
    #[serde(rename = "paymentMethod", default)]
    payment_method: String,
    destination: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BtcpayWebhookEvent {
    #[serde(rename = "type", default)]
    event_type: String,
    #[serde(rename = "invoiceId")]
    invoice_id: Option<String>,
}
