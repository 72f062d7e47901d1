//! CreateListingInvoiceHandler - starts a fixed-price purchase.

use std::sync::Arc;

use chrono::Utc;

use crate::adapters::lightning::ProviderRegistry;
use crate::domain::foundation::{ErrorCode, ListingId, ProviderType, Pubkey, TransactionId};
use crate::domain::marketplace::{
    calculate_split, LightningAddress, ListingStatus, MarketplaceTransaction, SettlementError,
    SourceType,
};
use crate::ports::{InvoiceRequest, MarketplaceStore, ProviderError};

#[derive(Debug, Clone)]
pub struct CreateListingInvoiceCommand {
    pub listing_id: ListingId,
    pub buyer: Pubkey,
    pub provider: Option<ProviderType>,
}

#[derive(Debug, Clone)]
pub struct PurchaseInvoiceResult {
    pub transaction: MarketplaceTransaction,
    pub bolt11: String,
}

pub struct CreateListingInvoiceHandler {
    store: Arc<dyn MarketplaceStore>,
    registry: Arc<ProviderRegistry>,
    fee_bps: u32,
    webhook_base_url: Option<String>,
    invoice_expiry_secs: u64,
}

impl CreateListingInvoiceHandler {
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
        cmd: CreateListingInvoiceCommand,
    ) -> Result<PurchaseInvoiceResult, SettlementError> {
        let listing = self
            .store
            .find_listing(&cmd.listing_id)
            .await?
            .ok_or_else(|| SettlementError::ListingNotFound(cmd.listing_id.to_string()))?;

        if listing.status != ListingStatus::Active {
            return Err(SettlementError::ListingNotActive);
        }

        if listing.seller == cmd.buyer {
            return Err(SettlementError::Forbidden);
        }

        // Validate the seller's payout destination before taking the
        // buyer's money, not after.
        let raw_address = self
            .store
            .seller_lightning_address(&listing.seller)
            .await?
            .ok_or(SettlementError::MissingPayoutDestination)?;
        LightningAddress::parse(&raw_address)?;

        // The invoice covers the full price; the split is settled later.
        let split = calculate_split(listing.price_sats, self.fee_bps)?;

        let provider = self.registry.resolve(cmd.provider).map_err(map_provider)?;

        let transaction_id = TransactionId::new();
        let invoice = provider
            .create_invoice(&InvoiceRequest {
                amount_sats: split.total_sats,
                memo: format!("NymMarket purchase: {}", listing.asset_name),
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
            SourceType::Listing,
            listing.id.to_string(),
            cmd.buyer,
            listing.seller,
            &split,
            invoice.provider,
            invoice.provider_invoice_id,
            invoice.payment_hash,
            Utc::now(),
        );

        match self.store.reserve_listing(&listing.id, &transaction).await {
            Ok(()) => {}
            Err(e) if e.code == ErrorCode::StateConflict => {
                // Lost the reservation race to another buyer.
                return Err(SettlementError::ListingNotActive);
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            transaction_id = %transaction.id,
            listing_id = %listing.id,
            total_sats = transaction.total_sats,
            "Listing purchase invoice created"
        );

        Ok(PurchaseInvoiceResult {
            bolt11: invoice.bolt11,
            transaction,
        })
    }
}

pub(super) fn map_provider(err: ProviderError) -> SettlementError {
    match err {
        ProviderError::NoProviderConfigured => SettlementError::NoProviderConfigured,
        other => SettlementError::Provider(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::lightning::MockLightningProvider;
    use crate::adapters::memory::InMemoryMarketplaceStore;
    use crate::domain::marketplace::{Listing, ListingStatus, TransactionStatus};

    fn buyer() -> Pubkey {
        Pubkey::new("b0b0").unwrap()
    }

    fn seller() -> Pubkey {
        Pubkey::new("5e11e4").unwrap()
    }

    fn active_listing() -> Listing {
        Listing {
            id: ListingId::new(),
            seller: seller(),
            asset_name: "alice@nym.market".to_string(),
            price_sats: 100_000,
            status: ListingStatus::Active,
        }
    }

    fn handler(store: Arc<InMemoryMarketplaceStore>) -> CreateListingInvoiceHandler {
        let registry = ProviderRegistry::new()
            .register(Arc::new(MockLightningProvider::new(ProviderType::Btcpay)));
        CreateListingInvoiceHandler::new(store, Arc::new(registry), 500, None, 600)
    }

    #[tokio::test]
    async fn reserves_the_listing_and_records_the_split() {
        let store = Arc::new(InMemoryMarketplaceStore::new());
        let listing = active_listing();
        store.seed_listing(listing.clone());
        store.seed_lightning_address(&seller(), "seller@wallet.example.com");

        let result = handler(store.clone())
            .handle(CreateListingInvoiceCommand {
                listing_id: listing.id,
                buyer: buyer(),
                provider: None,
            })
            .await
            .unwrap();

        assert_eq!(result.transaction.status, TransactionStatus::Pending);
        assert_eq!(result.transaction.total_sats, 100_000);
        assert_eq!(result.transaction.platform_fee_sats, 5_000);
        assert_eq!(result.transaction.seller_payout_sats, 95_000);
        assert_eq!(
            store.listing(&listing.id).unwrap().status,
            ListingStatus::PendingSale
        );
        assert!(store.transaction(&result.transaction.id).is_some());
    }

    #[tokio::test]
    async fn inactive_listing_is_rejected() {
        let store = Arc::new(InMemoryMarketplaceStore::new());
        let mut listing = active_listing();
        listing.status = ListingStatus::PendingSale;
        store.seed_listing(listing.clone());
        store.seed_lightning_address(&seller(), "seller@wallet.example.com");

        let result = handler(store)
            .handle(CreateListingInvoiceCommand {
                listing_id: listing.id,
                buyer: buyer(),
                provider: None,
            })
            .await;

        assert!(matches!(result, Err(SettlementError::ListingNotActive)));
    }

    #[tokio::test]
    async fn seller_cannot_buy_their_own_listing() {
        let store = Arc::new(InMemoryMarketplaceStore::new());
        let listing = active_listing();
        store.seed_listing(listing.clone());
        store.seed_lightning_address(&seller(), "seller@wallet.example.com");

        let result = handler(store)
            .handle(CreateListingInvoiceCommand {
                listing_id: listing.id,
                buyer: seller(),
                provider: None,
            })
            .await;

        assert!(matches!(result, Err(SettlementError::Forbidden)));
    }

    #[tokio::test]
    async fn seller_without_payout_destination_blocks_checkout() {
        let store = Arc::new(InMemoryMarketplaceStore::new());
        let listing = active_listing();
        store.seed_listing(listing.clone());

        let result = handler(store.clone())
            .handle(CreateListingInvoiceCommand {
                listing_id: listing.id,
                buyer: buyer(),
                provider: None,
            })
            .await;

        assert!(matches!(
            result,
            Err(SettlementError::MissingPayoutDestination)
        ));
        // Nothing reserved.
        assert_eq!(
            store.listing(&listing.id).unwrap().status,
            ListingStatus::Active
        );
    }

    #[tokio::test]
    async fn malformed_seller_address_blocks_checkout() {
        let store = Arc::new(InMemoryMarketplaceStore::new());
        let listing = active_listing();
        store.seed_listing(listing.clone());
        store.seed_lightning_address(&seller(), "not-an-address");

        let result = handler(store)
            .handle(CreateListingInvoiceCommand {
                listing_id: listing.id,
                buyer: buyer(),
                provider: None,
            })
            .await;

        assert!(matches!(
            result,
            Err(SettlementError::InvalidLightningAddress(_))
        ));
    }

    #[tokio::test]
    async fn unknown_listing_is_not_found() {
        let store = Arc::new(InMemoryMarketplaceStore::new());

        let result = handler(store)
            .handle(CreateListingInvoiceCommand {
                listing_id: ListingId::new(),
                buyer: buyer(),
                provider: None,
            })
            .await;

        assert!(matches!(result, Err(SettlementError::ListingNotFound(_))));
    }
}
