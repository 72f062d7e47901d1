//! Marketplace persistence port.
//!
//! Covers listings and auctions (as seen by settlement), transactions,
//! transfer records, and the seller profile lookup. Multi-row operations
//! (reservation, settlement) are atomic in the implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::billing::AuditEntry;
use crate::domain::foundation::{AuctionId, DomainError, ListingId, Pubkey, TransactionId};
use crate::domain::marketplace::{Auction, Listing, MarketplaceTransaction, TransferRecord};

/// Outcome of claiming a transaction for settlement.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// This caller won the `pending -> paid` update and must settle.
    Claimed(MarketplaceTransaction),
    /// Another caller already settled; idempotent success.
    AlreadySettled(MarketplaceTransaction),
    /// The transaction is paid or failed; this caller does nothing.
    Conflict(MarketplaceTransaction),
}

#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    async fn find_listing(&self, id: &ListingId) -> Result<Option<Listing>, DomainError>;

    async fn find_auction(&self, id: &AuctionId) -> Result<Option<Auction>, DomainError>;

    /// Reserves a listing and records the pending transaction atomically.
    ///
    /// The listing row is flipped `active -> pending_sale` conditionally;
    /// if it is no longer active the insert does not happen and a
    /// `STATE_CONFLICT` error is returned.
    async fn reserve_listing(
        &self,
        listing_id: &ListingId,
        tx: &MarketplaceTransaction,
    ) -> Result<(), DomainError>;

    /// Reserves an ended auction (`ended -> pending_sale`) and records the
    /// pending transaction atomically. Same conflict semantics as
    /// [`reserve_listing`](Self::reserve_listing).
    async fn reserve_auction(
        &self,
        auction_id: &AuctionId,
        tx: &MarketplaceTransaction,
    ) -> Result<(), DomainError>;

    async fn find_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<MarketplaceTransaction>, DomainError>;

    async fn find_transaction_by_provider_ref(
        &self,
        provider_invoice_id: Option<&str>,
        payment_hash: Option<&str>,
    ) -> Result<Option<MarketplaceTransaction>, DomainError>;

    /// Claims a transaction for settlement via a conditional
    /// `pending -> paid` update. Exactly one concurrent caller gets
    /// [`ClaimOutcome::Claimed`].
    async fn claim_for_settlement(
        &self,
        id: &TransactionId,
        paid_at: DateTime<Utc>,
    ) -> Result<ClaimOutcome, DomainError>;

    /// Finalizes a settled transaction in one transaction: updates the
    /// row to `settled` with payout bookkeeping, inserts the transfer
    /// record, marks the source listing sold / auction settled, reassigns
    /// the identity to the buyer when a matching identity row exists, and
    /// appends the audit entry.
    async fn record_settlement(
        &self,
        tx: &MarketplaceTransaction,
        transfer: &TransferRecord,
        audit: &AuditEntry,
    ) -> Result<(), DomainError>;

    /// Marks the payout leg failed while leaving the transaction `paid`,
    /// so an operator can retry without refunding the buyer.
    async fn record_payout_failure(
        &self,
        id: &TransactionId,
        reason: &str,
    ) -> Result<(), DomainError>;

    /// Releases a reservation whose invoice expired or failed: the
    /// transaction becomes `failed` and the source returns to its
    /// purchasable state.
    async fn release_reservation(
        &self,
        id: &TransactionId,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError>;

    /// Transactions stuck in `paid` with a failed or missing payout,
    /// oldest first. Operator recovery surface.
    async fn list_unsettled(&self, limit: i64)
        -> Result<Vec<MarketplaceTransaction>, DomainError>;

    /// The seller's configured Lightning address, raw as stored on their
    /// profile. Parsing/validation is the caller's job.
    async fn seller_lightning_address(
        &self,
        seller: &Pubkey,
    ) -> Result<Option<String>, DomainError>;
}
