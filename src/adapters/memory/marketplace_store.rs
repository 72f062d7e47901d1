//! In-memory marketplace store for handler tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::billing::AuditEntry;
use crate::domain::foundation::{
    AuctionId, DomainError, ErrorCode, ListingId, Pubkey, TransactionId,
};
use crate::domain::marketplace::{
    Auction, AuctionStatus, Listing, ListingStatus, MarketplaceTransaction, PayoutStatus,
    SourceType, TransactionStatus, TransferRecord,
};
use crate::ports::{ClaimOutcome, MarketplaceStore};

#[derive(Default)]
struct State {
    listings: HashMap<ListingId, Listing>,
    auctions: HashMap<AuctionId, Auction>,
    transactions: HashMap<TransactionId, MarketplaceTransaction>,
    transfers: Vec<TransferRecord>,
    identities: HashMap<String, Pubkey>,
    lightning_addresses: HashMap<String, String>,
    audit: Vec<AuditEntry>,
}

#[derive(Default)]
pub struct InMemoryMarketplaceStore {
    state: Mutex<State>,
}

impl InMemoryMarketplaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_listing(&self, listing: Listing) {
        self.state
            .lock()
            .unwrap()
            .listings
            .insert(listing.id, listing);
    }

    pub fn seed_auction(&self, auction: Auction) {
        self.state
            .lock()
            .unwrap()
            .auctions
            .insert(auction.id, auction);
    }

    pub fn seed_identity(&self, name: impl Into<String>, owner: Pubkey) {
        self.state
            .lock()
            .unwrap()
            .identities
            .insert(name.into(), owner);
    }

    pub fn seed_transaction(&self, tx: MarketplaceTransaction) {
        self.state.lock().unwrap().transactions.insert(tx.id, tx);
    }

    pub fn seed_lightning_address(&self, seller: &Pubkey, address: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .lightning_addresses
            .insert(seller.as_str().to_string(), address.into());
    }

    pub fn listing(&self, id: &ListingId) -> Option<Listing> {
        self.state.lock().unwrap().listings.get(id).cloned()
    }

    pub fn auction(&self, id: &AuctionId) -> Option<Auction> {
        self.state.lock().unwrap().auctions.get(id).cloned()
    }

    pub fn transaction(&self, id: &TransactionId) -> Option<MarketplaceTransaction> {
        self.state.lock().unwrap().transactions.get(id).cloned()
    }

    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn identity_owner(&self, name: &str) -> Option<Pubkey> {
        self.state.lock().unwrap().identities.get(name).cloned()
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.lock().unwrap().audit.clone()
    }
}

fn tx_not_found() -> DomainError {
    DomainError::new(ErrorCode::TransactionNotFound, "Transaction not found")
}

#[async_trait]
impl MarketplaceStore for InMemoryMarketplaceStore {
    async fn find_listing(&self, id: &ListingId) -> Result<Option<Listing>, DomainError> {
        Ok(self.state.lock().unwrap().listings.get(id).cloned())
    }

    async fn find_auction(&self, id: &AuctionId) -> Result<Option<Auction>, DomainError> {
        Ok(self.state.lock().unwrap().auctions.get(id).cloned())
    }

    async fn reserve_listing(
        &self,
        listing_id: &ListingId,
        tx: &MarketplaceTransaction,
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        let listing = state.listings.get_mut(listing_id).ok_or_else(|| {
            DomainError::new(ErrorCode::ListingNotFound, "Listing not found")
        })?;

        if listing.status != ListingStatus::Active {
            return Err(DomainError::new(
                ErrorCode::StateConflict,
                "Listing is not available for purchase",
            ));
        }

        listing.status = ListingStatus::PendingSale;
        state.transactions.insert(tx.id, tx.clone());
        Ok(())
    }

    async fn reserve_auction(
        &self,
        auction_id: &AuctionId,
        tx: &MarketplaceTransaction,
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        let auction = state.auctions.get_mut(auction_id).ok_or_else(|| {
            DomainError::new(ErrorCode::AuctionNotFound, "Auction not found")
        })?;

        if auction.status != AuctionStatus::Ended {
            return Err(DomainError::new(
                ErrorCode::StateConflict,
                "Auction is not awaiting settlement",
            ));
        }

        auction.status = AuctionStatus::PendingSale;
        state.transactions.insert(tx.id, tx.clone());
        Ok(())
    }

    async fn find_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<MarketplaceTransaction>, DomainError> {
        Ok(self.state.lock().unwrap().transactions.get(id).cloned())
    }

    async fn find_transaction_by_provider_ref(
        &self,
        provider_invoice_id: Option<&str>,
        payment_hash: Option<&str>,
    ) -> Result<Option<MarketplaceTransaction>, DomainError> {
        let state = self.state.lock().unwrap();

        if let Some(invoice_id) = provider_invoice_id {
            if let Some(tx) = state
                .transactions
                .values()
                .find(|t| t.provider_invoice_id == invoice_id)
            {
                return Ok(Some(tx.clone()));
            }
        }

        if let Some(hash) = payment_hash {
            if let Some(tx) = state
                .transactions
                .values()
                .find(|t| t.payment_hash.as_deref() == Some(hash))
            {
                return Ok(Some(tx.clone()));
            }
        }

        Ok(None)
    }

    async fn claim_for_settlement(
        &self,
        id: &TransactionId,
        paid_at: DateTime<Utc>,
    ) -> Result<ClaimOutcome, DomainError> {
        let mut state = self.state.lock().unwrap();
        let tx = state.transactions.get_mut(id).ok_or_else(tx_not_found)?;

        match tx.status {
            TransactionStatus::Pending => {
                tx.status = TransactionStatus::Paid;
                tx.paid_at = Some(paid_at);
                tx.seller_payout_status = Some(PayoutStatus::Pending);
                Ok(ClaimOutcome::Claimed(tx.clone()))
            }
            TransactionStatus::Settled => Ok(ClaimOutcome::AlreadySettled(tx.clone())),
            _ => Ok(ClaimOutcome::Conflict(tx.clone())),
        }
    }

    async fn record_settlement(
        &self,
        tx: &MarketplaceTransaction,
        transfer: &TransferRecord,
        audit: &AuditEntry,
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();

        let asset_name = match tx.source_type {
            SourceType::Listing => {
                let listing_id = ListingId::parse(&tx.source_id)
                    .map_err(|e| DomainError::new(ErrorCode::DatabaseError, e.to_string()))?;
                let listing = state.listings.get_mut(&listing_id);
                listing.map(|l| {
                    l.status = ListingStatus::Sold;
                    l.asset_name.clone()
                })
            }
            SourceType::Auction => {
                let auction_id = AuctionId::parse(&tx.source_id)
                    .map_err(|e| DomainError::new(ErrorCode::DatabaseError, e.to_string()))?;
                let auction = state.auctions.get_mut(&auction_id);
                auction.map(|a| {
                    a.status = AuctionStatus::Settled;
                    a.winner = Some(tx.buyer.clone());
                    a.winning_amount_sats = Some(tx.total_sats);
                    a.settled_at = Some(transfer.completed_at);
                    a.asset_name.clone()
                })
            }
        };

        if let Some(name) = asset_name {
            if let Some(owner) = state.identities.get_mut(&name) {
                *owner = tx.buyer.clone();
            }
        }

        let stored = state.transactions.get_mut(&tx.id).ok_or_else(tx_not_found)?;
        stored.status = TransactionStatus::Settled;
        stored.seller_payout_status = Some(PayoutStatus::Sent);
        stored.transfer_id = Some(transfer.id);
        stored.settled_at = Some(transfer.completed_at);

        state.transfers.push(transfer.clone());
        state.audit.push(audit.clone());
        Ok(())
    }

    async fn record_payout_failure(
        &self,
        id: &TransactionId,
        _reason: &str,
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        let tx = state.transactions.get_mut(id).ok_or_else(tx_not_found)?;
        if tx.status == TransactionStatus::Paid {
            tx.seller_payout_status = Some(PayoutStatus::Failed);
        }
        Ok(())
    }

    async fn release_reservation(
        &self,
        id: &TransactionId,
        _now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        let tx = state.transactions.get(id).cloned().ok_or_else(tx_not_found)?;

        if tx.status != TransactionStatus::Pending {
            return Ok(());
        }

        if let Some(stored) = state.transactions.get_mut(id) {
            stored.status = TransactionStatus::Failed;
        }

        match tx.source_type {
            SourceType::Listing => {
                if let Ok(listing_id) = ListingId::parse(&tx.source_id) {
                    if let Some(listing) = state.listings.get_mut(&listing_id) {
                        if listing.status == ListingStatus::PendingSale {
                            listing.status = ListingStatus::Active;
                        }
                    }
                }
            }
            SourceType::Auction => {
                if let Ok(auction_id) = AuctionId::parse(&tx.source_id) {
                    if let Some(auction) = state.auctions.get_mut(&auction_id) {
                        if auction.status == AuctionStatus::PendingSale {
                            auction.status = AuctionStatus::Ended;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn list_unsettled(
        &self,
        limit: i64,
    ) -> Result<Vec<MarketplaceTransaction>, DomainError> {
        let state = self.state.lock().unwrap();
        let mut unsettled: Vec<MarketplaceTransaction> = state
            .transactions
            .values()
            .filter(|t| t.status == TransactionStatus::Paid)
            .cloned()
            .collect();
        unsettled.sort_by(|a, b| a.paid_at.cmp(&b.paid_at));
        unsettled.truncate(limit.max(0) as usize);
        Ok(unsettled)
    }

    async fn seller_lightning_address(
        &self,
        seller: &Pubkey,
    ) -> Result<Option<String>, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .lightning_addresses
            .get(seller.as_str())
            .cloned())
    }
}
