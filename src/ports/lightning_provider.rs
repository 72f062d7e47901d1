//! Lightning provider port.
//!
//! Uniform contract over heterogeneous payment backends (BTCPay, LNbits):
//! create invoices, poll status, recognize and verify webhooks. The engine
//! never talks to a backend except through this trait.
//!
//! # Design
//!
//! - **Closed provider set**: backends are tagged by
//!   [`ProviderType`](crate::domain::foundation::ProviderType); the registry
//!   maps tags to implementations, no reflection.
//! - **Mock operating mode**: implementations without live credentials fall
//!   back to deterministic synthetic invoices so the engine stays
//!   exercisable without a Lightning node. This is a documented operating
//!   mode, not an error.
//! - **Webhooks are hints**: a webhook event never authorizes a state
//!   change by itself; the owning service re-polls the provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::ProviderType;

/// Request to create a Lightning invoice.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceRequest {
    pub amount_sats: u64,

    /// Human-readable memo embedded in the invoice.
    pub memo: String,

    pub expires_in_secs: u64,

    /// Callback URL delivered to the backend, carrying the provider type
    /// as a query parameter so the ingress can route without inspection.
    pub webhook_url: Option<String>,

    /// Opaque metadata echoed back by providers that support it.
    pub metadata: serde_json::Value,
}

/// A created invoice as returned by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedInvoice {
    pub provider: ProviderType,
    pub provider_invoice_id: String,

    /// Not every backend exposes the payment hash at creation time.
    pub payment_hash: Option<String>,

    pub bolt11: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Provider-reported invoice state.
///
/// `Unknown` covers timeouts and unparseable responses; it must never be
/// treated as a destructive transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceState {
    Pending,
    Paid,
    Expired,
    Failed,
    Unknown,
}

/// Result of polling an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceStatus {
    pub state: InvoiceState,
    pub paid_at: Option<DateTime<Utc>>,
}

impl InvoiceStatus {
    pub fn pending() -> Self {
        Self {
            state: InvoiceState::Pending,
            paid_at: None,
        }
    }

    pub fn paid(paid_at: DateTime<Utc>) -> Self {
        Self {
            state: InvoiceState::Paid,
            paid_at: Some(paid_at),
        }
    }

    pub fn unknown() -> Self {
        Self {
            state: InvoiceState::Unknown,
            paid_at: None,
        }
    }
}

/// A payment event parsed from a webhook payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentEvent {
    pub provider: ProviderType,
    pub provider_invoice_id: Option<String>,
    pub payment_hash: Option<String>,
    pub state: InvoiceState,
}

/// Errors from provider operations.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Backend unreachable or timed out. Retrying the whole operation is
    /// safe because nothing has been persisted yet.
    #[error("Provider {provider} unavailable: {message}")]
    Unavailable {
        provider: ProviderType,
        message: String,
    },

    /// Backend answered with a rejection (bad request, auth failure).
    #[error("Provider {provider} rejected the request: {message}")]
    Rejected {
        provider: ProviderType,
        message: String,
    },

    /// Webhook signature did not verify against the configured secret.
    #[error("Invalid webhook signature for provider {provider}")]
    InvalidSignature { provider: ProviderType },

    /// No provider registered at all: a configuration error, fatal at the
    /// call site, never retried.
    #[error("No payment provider configured")]
    NoProviderConfigured,
}

/// Contract every Lightning backend adapter implements.
#[async_trait]
pub trait LightningProvider: Send + Sync {
    /// The tag this implementation serves.
    fn provider_type(&self) -> ProviderType;

    /// Creates an invoice.
    ///
    /// Implementations without live credentials return a deterministic mock
    /// invoice instead of failing.
    async fn create_invoice(&self, req: &InvoiceRequest) -> Result<CreatedInvoice, ProviderError>;

    /// Polls invoice status. Read-only and safe to call repeatedly; a
    /// timeout yields `Unknown`, never `Failed`.
    async fn get_invoice_status(
        &self,
        provider_invoice_id: &str,
        payment_hash: Option<&str>,
    ) -> Result<InvoiceStatus, ProviderError>;

    /// Attempts to parse a webhook payload.
    ///
    /// Returns `None` when the payload does not match this provider's
    /// shape; the registry uses this to identify which provider an
    /// unattributed webhook belongs to.
    fn parse_webhook_event(&self, payload: &[u8]) -> Option<PaymentEvent>;

    /// Verifies the webhook signature.
    ///
    /// With a configured secret this is an HMAC-SHA256 over the raw payload
    /// compared in constant time. Without one, any payload is accepted
    /// (dev-only weak mode).
    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<(), ProviderError>;
}
