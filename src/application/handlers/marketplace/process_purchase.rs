//! ProcessPurchaseHandler - settles a paid marketplace transaction.
//!
//! Settlement is two legs with very different failure modes. The claim leg
//! (`pending -> paid`) is a conditional update, so concurrent webhook and
//! poll deliveries elect exactly one settler. The payout leg pays the
//! seller over LNURL; if it fails the transaction stays `paid` with a
//! failed payout marker and an operator retries. The buyer is never
//! refunded automatically.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::billing::{AuditEntry, ACTION_MARKETPLACE_SETTLED};
use crate::domain::marketplace::{
    LightningAddress, MarketplaceTransaction, SettlementError, TransactionStatus, TransferRecord,
};
use crate::ports::{ClaimOutcome, LnurlResolver, MarketplaceStore, NodeWallet};

pub struct ProcessPurchaseHandler {
    store: Arc<dyn MarketplaceStore>,
    resolver: Arc<dyn LnurlResolver>,
    wallet: Arc<dyn NodeWallet>,
}

impl ProcessPurchaseHandler {
    pub fn new(
        store: Arc<dyn MarketplaceStore>,
        resolver: Arc<dyn LnurlResolver>,
        wallet: Arc<dyn NodeWallet>,
    ) -> Self {
        Self {
            store,
            resolver,
            wallet,
        }
    }

    /// Confirms a buyer payment and settles if this caller wins the claim.
    ///
    /// Idempotent under redelivery: a transaction that is already settled,
    /// failed, or stuck awaiting payout retry comes back unchanged.
    pub async fn confirm(
        &self,
        tx: &MarketplaceTransaction,
        paid_at: DateTime<Utc>,
    ) -> Result<MarketplaceTransaction, SettlementError> {
        match self.store.claim_for_settlement(&tx.id, paid_at).await? {
            ClaimOutcome::Claimed(claimed) => self.settle_paid(claimed).await,
            ClaimOutcome::AlreadySettled(current) => Ok(current),
            ClaimOutcome::Conflict(current) => {
                match current.status {
                    TransactionStatus::Failed => {
                        // A released transaction reported paid afterwards:
                        // funds may have moved with no reservation to honor.
                        tracing::error!(
                            transaction_id = %current.id,
                            "Reconciliation error: payment reported for a failed transaction"
                        );
                    }
                    TransactionStatus::Paid => {
                        tracing::warn!(
                            transaction_id = %current.id,
                            "Transaction already paid, awaiting payout retry"
                        );
                    }
                    _ => {}
                }
                Ok(current)
            }
        }
    }

    /// Pays the seller and finalizes a transaction already in `paid`.
    ///
    /// Also the re-entry point for operator payout retries.
    pub async fn settle_paid(
        &self,
        tx: MarketplaceTransaction,
    ) -> Result<MarketplaceTransaction, SettlementError> {
        if tx.status != TransactionStatus::Paid {
            return Err(SettlementError::InvalidTransactionState(
                tx.status.as_str().to_string(),
            ));
        }

        let address = match self.payout_destination(&tx).await {
            Ok(address) => address,
            Err(err) => {
                self.mark_payout_failed(&tx, &err).await;
                return Err(err);
            }
        };

        let bolt11 = match self
            .resolver
            .fetch_invoice(&address, tx.seller_payout_sats)
            .await
        {
            Ok(bolt11) => bolt11,
            Err(e) => {
                let err = SettlementError::PayoutFailed(e.to_string());
                self.mark_payout_failed(&tx, &err).await;
                return Err(err);
            }
        };

        let receipt = match self.wallet.pay_invoice(&bolt11).await {
            Ok(receipt) => receipt,
            Err(e) => {
                let err = SettlementError::PayoutFailed(e.to_string());
                self.mark_payout_failed(&tx, &err).await;
                return Err(err);
            }
        };

        let now = Utc::now();
        let transfer = TransferRecord::released(&tx, now);
        let audit = AuditEntry::new(
            ACTION_MARKETPLACE_SETTLED,
            None,
            Some(tx.buyer.clone()),
            serde_json::json!({
                "transaction_id": tx.id.to_string(),
                "source_type": tx.source_type.as_str(),
                "source_id": tx.source_id,
                "total_sats": tx.total_sats,
                "platform_fee_sats": tx.platform_fee_sats,
                "seller_payout_sats": tx.seller_payout_sats,
                "payout_payment_id": receipt.payment_id,
            }),
            now,
        );
        self.store.record_settlement(&tx, &transfer, &audit).await?;

        tracing::info!(
            transaction_id = %tx.id,
            seller_payout_sats = tx.seller_payout_sats,
            "Marketplace transaction settled"
        );

        self.store
            .find_transaction(&tx.id)
            .await?
            .ok_or_else(|| SettlementError::TransactionNotFound(tx.id.to_string()))
    }

    async fn payout_destination(
        &self,
        tx: &MarketplaceTransaction,
    ) -> Result<LightningAddress, SettlementError> {
        let raw = self
            .store
            .seller_lightning_address(&tx.seller)
            .await?
            .ok_or(SettlementError::MissingPayoutDestination)?;
        LightningAddress::parse(&raw)
    }

    async fn mark_payout_failed(&self, tx: &MarketplaceTransaction, err: &SettlementError) {
        tracing::error!(
            transaction_id = %tx.id,
            seller = %tx.seller,
            error = %err,
            "Seller payout failed; transaction held in paid for operator retry"
        );
        if let Err(e) = self
            .store
            .record_payout_failure(&tx.id, &err.to_string())
            .await
        {
            tracing::error!(transaction_id = %tx.id, error = %e, "Failed to record payout failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryMarketplaceStore, MockLnurlResolver, RecordingWallet};
    use crate::domain::foundation::{ListingId, ProviderType, Pubkey, TransactionId};
    use crate::domain::marketplace::{
        calculate_split, Listing, ListingStatus, PayoutStatus, SourceType,
    };
    use crate::ports::PayoutError;

    fn buyer() -> Pubkey {
        Pubkey::new("b0b0").unwrap()
    }

    fn seller() -> Pubkey {
        Pubkey::new("5e11e4").unwrap()
    }

    fn seeded_store() -> (Arc<InMemoryMarketplaceStore>, MarketplaceTransaction) {
        let store = Arc::new(InMemoryMarketplaceStore::new());
        let listing_id = ListingId::new();
        store.seed_listing(Listing {
            id: listing_id,
            seller: seller(),
            asset_name: "alice@nym.market".to_string(),
            price_sats: 100_000,
            status: ListingStatus::Active,
        });
        store.seed_identity("alice@nym.market", seller());
        store.seed_lightning_address(&seller(), "seller@wallet.example.com");

        let split = calculate_split(100_000, 500).unwrap();
        let tx = MarketplaceTransaction::pending(
            TransactionId::new(),
            SourceType::Listing,
            listing_id.to_string(),
            buyer(),
            seller(),
            &split,
            ProviderType::Btcpay,
            "inv_mkt".to_string(),
            None,
            Utc::now(),
        );
        store.seed_transaction(tx.clone());
        (store, tx)
    }

    fn handler(
        store: Arc<InMemoryMarketplaceStore>,
        resolver: Arc<MockLnurlResolver>,
        wallet: Arc<RecordingWallet>,
    ) -> ProcessPurchaseHandler {
        ProcessPurchaseHandler::new(store, resolver, wallet)
    }

    #[tokio::test]
    async fn full_settlement_pays_seller_and_reassigns_identity() {
        let (store, tx) = seeded_store();
        let resolver = Arc::new(MockLnurlResolver::new());
        let wallet = Arc::new(RecordingWallet::new());
        let handler = handler(store.clone(), resolver.clone(), wallet.clone());

        let settled = handler.confirm(&tx, Utc::now()).await.unwrap();

        assert_eq!(settled.status, TransactionStatus::Settled);
        assert_eq!(settled.seller_payout_status, Some(PayoutStatus::Sent));
        assert!(settled.transfer_id.is_some());

        // Seller got the post-fee amount, not the total.
        assert_eq!(
            resolver.requests(),
            vec![("seller@wallet.example.com".to_string(), 95_000)]
        );
        assert_eq!(wallet.payments(), vec!["lnbc95000resolved".to_string()]);

        // Asset flipped to sold and the identity moved to the buyer.
        let listing_id = ListingId::parse(&tx.source_id).unwrap();
        assert_eq!(
            store.listing(&listing_id).unwrap().status,
            ListingStatus::Sold
        );
        assert_eq!(store.identity_owner("alice@nym.market"), Some(buyer()));
        assert_eq!(store.transfers().len(), 1);
        assert_eq!(store.audit_entries().len(), 1);
    }

    #[tokio::test]
    async fn payout_failure_holds_transaction_in_paid() {
        let (store, tx) = seeded_store();
        let resolver = Arc::new(MockLnurlResolver::new());
        let wallet = Arc::new(RecordingWallet::failing(PayoutError::Wallet(
            "insufficient balance".to_string(),
        )));
        let handler = handler(store.clone(), resolver, wallet);

        let result = handler.confirm(&tx, Utc::now()).await;

        assert!(matches!(result, Err(SettlementError::PayoutFailed(_))));
        let stored = store.transaction(&tx.id).unwrap();
        assert_eq!(stored.status, TransactionStatus::Paid);
        assert_eq!(stored.seller_payout_status, Some(PayoutStatus::Failed));
        assert!(store.transfers().is_empty());
    }

    #[tokio::test]
    async fn missing_payout_destination_surfaces_loudly() {
        // A store with the transaction but no seller profile on file.
        let (_, tx) = seeded_store();
        let store = Arc::new(InMemoryMarketplaceStore::new());
        store.seed_transaction(tx.clone());

        let handler = handler(
            store.clone(),
            Arc::new(MockLnurlResolver::new()),
            Arc::new(RecordingWallet::new()),
        );

        let result = handler.confirm(&tx, Utc::now()).await;

        assert!(matches!(
            result,
            Err(SettlementError::MissingPayoutDestination)
        ));
        // The buyer's payment is kept; only the payout leg is marked failed.
        let stored = store.transaction(&tx.id).unwrap();
        assert_eq!(stored.status, TransactionStatus::Paid);
        assert_eq!(stored.seller_payout_status, Some(PayoutStatus::Failed));
    }

    #[tokio::test]
    async fn second_confirm_is_a_no_op() {
        let (store, tx) = seeded_store();
        let resolver = Arc::new(MockLnurlResolver::new());
        let wallet = Arc::new(RecordingWallet::new());
        let handler = handler(store.clone(), resolver, wallet.clone());

        handler.confirm(&tx, Utc::now()).await.unwrap();
        let again = handler.confirm(&tx, Utc::now()).await.unwrap();

        assert_eq!(again.status, TransactionStatus::Settled);
        assert_eq!(wallet.payments().len(), 1);
        assert_eq!(store.transfers().len(), 1);
    }

    #[tokio::test]
    async fn payment_for_failed_transaction_changes_nothing() {
        let (store, mut tx) = seeded_store();
        tx.status = TransactionStatus::Failed;
        store.seed_transaction(tx.clone());

        let wallet = Arc::new(RecordingWallet::new());
        let handler = handler(store, Arc::new(MockLnurlResolver::new()), wallet.clone());

        let result = handler.confirm(&tx, Utc::now()).await.unwrap();

        assert_eq!(result.status, TransactionStatus::Failed);
        assert!(wallet.payments().is_empty());
    }

    #[tokio::test]
    async fn settle_paid_rejects_a_pending_transaction() {
        let (store, tx) = seeded_store();
        let handler = handler(
            store,
            Arc::new(MockLnurlResolver::new()),
            Arc::new(RecordingWallet::new()),
        );

        let result = handler.settle_paid(tx).await;

        assert!(matches!(
            result,
            Err(SettlementError::InvalidTransactionState(_))
        ));
    }
}
