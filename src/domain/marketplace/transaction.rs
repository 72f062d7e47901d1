//! Marketplace transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ProviderType, Pubkey, TransactionId, TransferId};

use super::split::FeeSplit;

/// What kind of marketplace sale produced a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Listing,
    Auction,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Listing => "listing",
            SourceType::Auction => "auction",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "listing" => Some(SourceType::Listing),
            "auction" => Some(SourceType::Auction),
            _ => None,
        }
    }
}

/// Settlement lifecycle of a marketplace transaction.
///
/// `Paid` means the buyer's money is captured but the seller payout has not
/// completed; a transaction stuck in `Paid` is an operator-visible
/// recoverable state, never silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Paid,
    Settled,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Paid => "paid",
            TransactionStatus::Settled => "settled",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "paid" => Some(TransactionStatus::Paid),
            "settled" => Some(TransactionStatus::Settled),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

/// Status of the seller payout leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Sent,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Sent => "sent",
            PayoutStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PayoutStatus::Pending),
            "sent" => Some(PayoutStatus::Sent),
            "failed" => Some(PayoutStatus::Failed),
            _ => None,
        }
    }
}

/// One marketplace purchase, from invoice to settlement.
///
/// Created at invoice issuance; the status advances through
/// `pending -> paid -> settled` via conditional updates only. Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceTransaction {
    pub id: TransactionId,
    pub source_type: SourceType,
    pub source_id: String,
    pub buyer: Pubkey,
    pub seller: Pubkey,
    pub total_sats: u64,
    pub fee_bps: u32,
    pub platform_fee_sats: u64,
    pub seller_payout_sats: u64,
    pub status: TransactionStatus,
    pub payment_provider: ProviderType,
    pub provider_invoice_id: String,
    pub payment_hash: Option<String>,
    pub seller_payout_status: Option<PayoutStatus>,
    pub transfer_id: Option<TransferId>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl MarketplaceTransaction {
    /// Creates a pending transaction from a computed split and a provider
    /// invoice for the full amount.
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        id: TransactionId,
        source_type: SourceType,
        source_id: String,
        buyer: Pubkey,
        seller: Pubkey,
        split: &FeeSplit,
        payment_provider: ProviderType,
        provider_invoice_id: String,
        payment_hash: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            source_type,
            source_id,
            buyer,
            seller,
            total_sats: split.total_sats,
            fee_bps: split.fee_bps,
            platform_fee_sats: split.platform_fee_sats,
            seller_payout_sats: split.seller_payout_sats,
            status: TransactionStatus::Pending,
            payment_provider,
            provider_invoice_id,
            payment_hash,
            seller_payout_status: None,
            transfer_id: None,
            created_at: now,
            paid_at: None,
            settled_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::marketplace::calculate_split;

    #[test]
    fn pending_transaction_carries_the_split_invariant() {
        let split = calculate_split(100_000, 500).unwrap();
        let tx = MarketplaceTransaction::pending(
            TransactionId::new(),
            SourceType::Listing,
            "listing-1".to_string(),
            Pubkey::new("aa").unwrap(),
            Pubkey::new("bb").unwrap(),
            &split,
            ProviderType::Btcpay,
            "inv_1".to_string(),
            None,
            Utc::now(),
        );

        assert_eq!(tx.platform_fee_sats + tx.seller_payout_sats, tx.total_sats);
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.transfer_id.is_none());
    }

    #[test]
    fn status_parse_roundtrips() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Paid,
            TransactionStatus::Settled,
            TransactionStatus::Failed,
        ] {
            assert_eq!(TransactionStatus::parse(status.as_str()), Some(status));
        }
    }
}
