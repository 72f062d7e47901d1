//! JSON request/response shapes for the marketplace endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::handlers::marketplace::PurchaseInvoiceResult;
use crate::domain::marketplace::MarketplaceTransaction;

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseRequest {
    /// Explicit provider tag; omitted means the configured default.
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseInvoiceResponse {
    pub transaction_id: String,
    pub invoice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_hash: Option<String>,
    pub amount_sats: u64,
    pub platform_fee_sats: u64,
    pub seller_payout_sats: u64,
    pub provider: String,
}

impl From<&PurchaseInvoiceResult> for PurchaseInvoiceResponse {
    fn from(result: &PurchaseInvoiceResult) -> Self {
        let tx = &result.transaction;
        Self {
            transaction_id: tx.id.to_string(),
            invoice: result.bolt11.clone(),
            payment_hash: tx.payment_hash.clone(),
            amount_sats: tx.total_sats,
            platform_fee_sats: tx.platform_fee_sats,
            seller_payout_sats: tx.seller_payout_sats,
            provider: tx.payment_provider.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionResponse {
    pub transaction_id: String,
    pub source_type: String,
    pub source_id: String,
    pub status: String,
    pub total_sats: u64,
    pub platform_fee_sats: u64,
    pub seller_payout_sats: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_payout_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<DateTime<Utc>>,
}

impl From<&MarketplaceTransaction> for TransactionResponse {
    fn from(tx: &MarketplaceTransaction) -> Self {
        Self {
            transaction_id: tx.id.to_string(),
            source_type: tx.source_type.as_str().to_string(),
            source_id: tx.source_id.clone(),
            status: tx.status.as_str().to_string(),
            total_sats: tx.total_sats,
            platform_fee_sats: tx.platform_fee_sats,
            seller_payout_sats: tx.seller_payout_sats,
            seller_payout_status: tx.seller_payout_status.map(|s| s.as_str().to_string()),
            transfer_id: tx.transfer_id.map(|id| id.to_string()),
            created_at: tx.created_at,
            paid_at: tx.paid_at,
            settled_at: tx.settled_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnsettledResponse {
    pub transactions: Vec<TransactionResponse>,
}
