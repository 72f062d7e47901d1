//! CreateAuctionInvoiceHandler - invoices the winner of an ended auction.

use std::sync::Arc;

use chrono::Utc;

use crate::adapters::lightning::ProviderRegistry;
use crate::domain::foundation::{AuctionId, ErrorCode, ProviderType, Pubkey, TransactionId};
use crate::domain::marketplace::{
    calculate_split, AuctionStatus, LightningAddress, MarketplaceTransaction, SettlementError,
    SourceType,
};
use crate::ports::{InvoiceRequest, MarketplaceStore};

use super::create_listing_invoice::{map_provider, PurchaseInvoiceResult};

#[derive(Debug, Clone)]
pub struct CreateAuctionInvoiceCommand {
    pub auction_id: AuctionId,
    pub buyer: Pubkey,
    pub provider: Option<ProviderType>,
}

pub struct CreateAuctionInvoiceHandler {
    store: Arc<dyn MarketplaceStore>,
    registry: Arc<ProviderRegistry>,
    fee_bps: u32,
    webhook_base_url: Option<String>,
    invoice_expiry_secs: u64,
}

impl CreateAuctionInvoiceHandler {
    pub fn new(
        store: Arc<dyn MarketplaceStore>,
        registry: Arc<ProviderRegistry>,
        fee_bps: u32,
        webhook_base_url: Option<String>,
        invoice_expiry_secs: u64,
    ) -> Self {
        Self {
            store,
            registry,
            fee_bps,
            webhook_base_url,
            invoice_expiry_secs,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateAuctionInvoiceCommand,
    ) -> Result<PurchaseInvoiceResult, SettlementError> {
        let auction = self
            .store
            .find_auction(&cmd.auction_id)
            .await?
            .ok_or_else(|| SettlementError::AuctionNotFound(cmd.auction_id.to_string()))?;

        if auction.status != AuctionStatus::Ended {
            return Err(SettlementError::InvalidTransactionState(
                auction.status.as_str().to_string(),
            ));
        }

        // Only the auction winner may settle it.
        if auction.highest_bidder.as_ref() != Some(&cmd.buyer) {
            return Err(SettlementError::NotWinner);
        }

        let raw_address = self
            .store
            .seller_lightning_address(&auction.seller)
            .await?
            .ok_or(SettlementError::MissingPayoutDestination)?;
        LightningAddress::parse(&raw_address)?;

        let split = calculate_split(auction.highest_bid_sats, self.fee_bps)?;

        let provider = self.registry.resolve(cmd.provider).map_err(map_provider)?;

        let transaction_id = TransactionId::new();
        let invoice = provider
            .create_invoice(&InvoiceRequest {
                amount_sats: split.total_sats,
                memo: format!("NymMarket auction win: {}", auction.asset_name),
                expires_in_secs: self.invoice_expiry_secs,
                webhook_url: self.webhook_base_url.as_deref().map(|base| {
                    format!(
                        "{}/api/market/webhook?provider={}",
                        base.trim_end_matches('/'),
                        provider.provider_type()
                    )
                }),
                metadata: serde_json::json!({
                    "order_id": transaction_id.to_string(),
                    "kind": "marketplace",
                }),
            })
            .await
            .map_err(map_provider)?;

        let transaction = MarketplaceTransaction::pending(
            transaction_id,
            SourceType::Auction,
            auction.id.to_string(),
            cmd.buyer,
            auction.seller,
            &split,
            invoice.provider,
            invoice.provider_invoice_id,
            invoice.payment_hash,
            Utc::now(),
        );

        match self.store.reserve_auction(&auction.id, &transaction).await {
            Ok(()) => {}
            Err(e) if e.code == ErrorCode::StateConflict => {
                return Err(SettlementError::InvalidTransactionState(
                    "auction is no longer awaiting settlement".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            transaction_id = %transaction.id,
            auction_id = %auction.id,
            total_sats = transaction.total_sats,
            "Auction settlement invoice created"
        );

        Ok(PurchaseInvoiceResult {
            bolt11: invoice.bolt11,
            transaction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::lightning::MockLightningProvider;
    use crate::adapters::memory::InMemoryMarketplaceStore;
    use crate::domain::marketplace::{Auction, TransactionStatus};

    fn winner() -> Pubkey {
        Pubkey::new("717e4").unwrap()
    }

    fn seller() -> Pubkey {
        Pubkey::new("5e11e4").unwrap()
    }

    fn ended_auction() -> Auction {
        Auction {
            id: AuctionId::new(),
            seller: seller(),
            asset_name: "bob@nym.market".to_string(),
            highest_bidder: Some(winner()),
            highest_bid_sats: 250_000,
            status: AuctionStatus::Ended,
            winner: None,
            winning_amount_sats: None,
            settled_at: None,
        }
    }

    fn handler(store: Arc<InMemoryMarketplaceStore>) -> CreateAuctionInvoiceHandler {
        let registry = ProviderRegistry::new()
            .register(Arc::new(MockLightningProvider::new(ProviderType::Btcpay)));
        CreateAuctionInvoiceHandler::new(store, Arc::new(registry), 500, None, 600)
    }

    #[tokio::test]
    async fn winner_gets_an_invoice_for_the_winning_bid() {
        let store = Arc::new(InMemoryMarketplaceStore::new());
        let auction = ended_auction();
        store.seed_auction(auction.clone());
        store.seed_lightning_address(&seller(), "seller@wallet.example.com");

        let result = handler(store.clone())
            .handle(CreateAuctionInvoiceCommand {
                auction_id: auction.id,
                buyer: winner(),
                provider: None,
            })
            .await
            .unwrap();

        assert_eq!(result.transaction.status, TransactionStatus::Pending);
        assert_eq!(result.transaction.total_sats, 250_000);
        assert_eq!(result.transaction.seller_payout_sats, 237_500);
        assert_eq!(
            store.auction(&auction.id).unwrap().status,
            AuctionStatus::PendingSale
        );
    }

    #[tokio::test]
    async fn non_winner_is_rejected() {
        let store = Arc::new(InMemoryMarketplaceStore::new());
        let auction = ended_auction();
        store.seed_auction(auction.clone());
        store.seed_lightning_address(&seller(), "seller@wallet.example.com");

        let result = handler(store)
            .handle(CreateAuctionInvoiceCommand {
                auction_id: auction.id,
                buyer: Pubkey::new("0ddba11").unwrap(),
                provider: None,
            })
            .await;

        assert!(matches!(result, Err(SettlementError::NotWinner)));
    }

    #[tokio::test]
    async fn already_reserved_auction_is_rejected() {
        let store = Arc::new(InMemoryMarketplaceStore::new());
        let mut auction = ended_auction();
        auction.status = AuctionStatus::PendingSale;
        store.seed_auction(auction.clone());
        store.seed_lightning_address(&seller(), "seller@wallet.example.com");

        let result = handler(store)
            .handle(CreateAuctionInvoiceCommand {
                auction_id: auction.id,
                buyer: winner(),
                provider: None,
            })
            .await;

        assert!(matches!(
            result,
            Err(SettlementError::InvalidTransactionState(_))
        ));
    }

    #[tokio::test]
    async fn unknown_auction_is_not_found() {
        let store = Arc::new(InMemoryMarketplaceStore::new());

        let result = handler(store)
            .handle(CreateAuctionInvoiceCommand {
                auction_id: AuctionId::new(),
                buyer: winner(),
                provider: None,
            })
            .await;

        assert!(matches!(result, Err(SettlementError::AuctionNotFound(_))));
    }
}
