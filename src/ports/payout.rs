//! Seller payout ports: LNURL-pay resolution and the platform wallet.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::marketplace::LightningAddress;

#[derive(Debug, Clone, Error)]
pub enum PayoutError {
    /// The LNURL endpoint could not be reached or returned garbage.
    #[error("LNURL resolution failed: {0}")]
    Resolve(String),

    /// The endpoint's sendable range excludes the payout amount.
    #[error("Payout amount {requested_msats} msats outside sendable range [{min_msats}, {max_msats}]")]
    AmountOutOfRange {
        requested_msats: u64,
        min_msats: u64,
        max_msats: u64,
    },

    /// Wallet refused or failed to pay the invoice.
    #[error("Wallet payment failed: {0}")]
    Wallet(String),
}

/// Resolves a Lightning address to a payable BOLT11 invoice via the
/// LNURL-pay flow (well-known endpoint, sendable-range check, callback).
#[async_trait]
pub trait LnurlResolver: Send + Sync {
    async fn fetch_invoice(
        &self,
        address: &LightningAddress,
        amount_sats: u64,
    ) -> Result<String, PayoutError>;
}

/// Proof of an outbound payment made by the platform wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutReceipt {
    pub payment_id: String,
    pub fee_sats: Option<u64>,
    pub paid_at: DateTime<Utc>,
}

/// The platform's own Lightning wallet, used to pay sellers.
#[async_trait]
pub trait NodeWallet: Send + Sync {
    async fn pay_invoice(&self, bolt11: &str) -> Result<PayoutReceipt, PayoutError>;
}
