//! Settlement transfer records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Pubkey, TransferId};

use super::transaction::{MarketplaceTransaction, SourceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscrowStatus {
    Held,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Completed,
    Failed,
}

/// Durable proof that a settlement completed.
///
/// Created exactly once per settled transaction, after the seller payout
/// succeeds; its existence is the proof-of-settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: TransferId,
    pub source_type: SourceType,
    pub source_id: String,
    pub buyer: Pubkey,
    pub seller: Pubkey,
    pub total_sats: u64,
    pub platform_fee_sats: u64,
    pub seller_payout_sats: u64,
    pub escrow_status: EscrowStatus,
    pub transfer_status: TransferStatus,
    pub completed_at: DateTime<Utc>,
}

impl TransferRecord {
    /// Builds the released/completed transfer for a settled transaction.
    pub fn released(tx: &MarketplaceTransaction, now: DateTime<Utc>) -> Self {
        Self {
            id: TransferId::new(),
            source_type: tx.source_type,
            source_id: tx.source_id.clone(),
            buyer: tx.buyer.clone(),
            seller: tx.seller.clone(),
            total_sats: tx.total_sats,
            platform_fee_sats: tx.platform_fee_sats,
            seller_payout_sats: tx.seller_payout_sats,
            escrow_status: EscrowStatus::Released,
            transfer_status: TransferStatus::Completed,
            completed_at: now,
        }
    }
}
