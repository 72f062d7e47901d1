//! JSON request/response shapes for the billing endpoints.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::application::handlers::billing::Receipt;
use crate::domain::billing::{
    PaymentRecord, PaymentStatus, TierCatalogEntry, INVOICE_TTL_MINUTES, PAYMENT_METHOD,
};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvoiceRequest {
    /// Tier tag, e.g. `"pro"` or `"lifetime"`.
    pub tier: String,

    /// Apply the web-of-trust discount (capped server-side).
    #[serde(default)]
    pub apply_wot_discount: bool,

    /// `"monthly"` (default), `"annual"`, or `"lifetime"`.
    #[serde(default)]
    pub billing_cycle: Option<String>,

    /// Explicit provider tag; omitted means the configured default.
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceResponse {
    pub payment_id: String,
    pub invoice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_hash: Option<String>,
    pub amount_sats: u64,
    pub amount_usd: f64,
    pub discount_percent: u8,
    pub expires_at: DateTime<Utc>,
    pub provider: String,
    pub billing_cycle: String,
}

impl From<&PaymentRecord> for InvoiceResponse {
    fn from(payment: &PaymentRecord) -> Self {
        Self {
            payment_id: payment.id.to_string(),
            invoice: payment.invoice.clone(),
            payment_hash: payment.payment_hash.clone(),
            amount_sats: payment.amount_sats,
            amount_usd: payment.amount_usd_cents as f64 / 100.0,
            discount_percent: payment.discount_percent,
            expires_at: payment.created_at + Duration::minutes(INVOICE_TTL_MINUTES),
            provider: payment.provider.to_string(),
            billing_cycle: payment.billing_cycle.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceStatusResponse {
    pub status: String,
    pub paid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    pub tier: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<String>,
}

impl From<&PaymentRecord> for InvoiceStatusResponse {
    fn from(payment: &PaymentRecord) -> Self {
        Self {
            status: payment.status.as_str().to_string(),
            paid: payment.status == PaymentStatus::Paid,
            paid_at: payment.paid_at,
            tier: payment.tier.as_str().to_string(),
            provider: payment.provider.to_string(),
            receipt_number: payment.receipt_number.clone(),
        }
    }
}

/// Webhook acknowledgement. Always 200 unless the signature failed;
/// `success` tells the operator whether the payload was acted on.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentHistoryResponse {
    pub payments: Vec<InvoiceStatusEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceStatusEntry {
    pub payment_id: String,
    pub amount_sats: u64,
    pub tier: String,
    pub billing_cycle: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<String>,
}

impl From<&PaymentRecord> for InvoiceStatusEntry {
    fn from(payment: &PaymentRecord) -> Self {
        Self {
            payment_id: payment.id.to_string(),
            amount_sats: payment.amount_sats,
            tier: payment.tier.as_str().to_string(),
            billing_cycle: payment.billing_cycle.as_str().to_string(),
            status: payment.status.as_str().to_string(),
            created_at: payment.created_at,
            paid_at: payment.paid_at,
            receipt_number: payment.receipt_number.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptResponse {
    pub receipt_number: String,
    pub payment_id: String,
    pub user: String,
    pub tier: String,
    pub billing_cycle: String,
    pub amount_sats: u64,
    pub discount_percent: u8,
    pub payment_method: &'static str,
    pub provider: String,
    pub paid_at: DateTime<Utc>,
}

impl From<Receipt> for ReceiptResponse {
    fn from(receipt: Receipt) -> Self {
        Self {
            receipt_number: receipt.receipt_number,
            payment_id: receipt.payment_id.to_string(),
            user: receipt.user.to_string(),
            tier: receipt.tier,
            billing_cycle: receipt.billing_cycle,
            amount_sats: receipt.amount_sats,
            discount_percent: receipt.discount_percent,
            payment_method: PAYMENT_METHOD,
            provider: receipt.provider.to_string(),
            paid_at: receipt.paid_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TierResponse {
    pub tier: String,
    pub display_name: String,
    pub price_usd: f64,
    pub price_sats: u64,
    pub features: Vec<String>,
    pub identity_limit: u32,
    pub can_sell: bool,
    pub custom_domains: bool,
    pub is_lifetime: bool,
}

impl From<&TierCatalogEntry> for TierResponse {
    fn from(entry: &TierCatalogEntry) -> Self {
        Self {
            tier: entry.tier.as_str().to_string(),
            display_name: entry.display_name.to_string(),
            price_usd: entry.price_usd_cents as f64 / 100.0,
            price_sats: entry.price_sats,
            features: entry.features.iter().map(|f| f.to_string()).collect(),
            identity_limit: entry.identity_limit,
            can_sell: entry.can_sell,
            custom_domains: entry.custom_domains,
            is_lifetime: entry.is_lifetime,
        }
    }
}
