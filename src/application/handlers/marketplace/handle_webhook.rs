//! Marketplace webhook ingestion.
//!
//! Same trust model as the billing webhook: the payload only identifies a
//! transaction, the provider poll decides what actually happened.

use std::sync::Arc;

use chrono::Utc;

use crate::adapters::lightning::ProviderRegistry;
use crate::application::handlers::billing::{WebhookCommand, WebhookOutcome};
use crate::application::handlers::marketplace::ProcessPurchaseHandler;
use crate::domain::marketplace::{SettlementError, TransactionStatus};
use crate::ports::{InvoiceState, LightningProvider, MarketplaceStore, PaymentEvent};

use super::create_listing_invoice::map_provider;

pub struct MarketWebhookHandler {
    store: Arc<dyn MarketplaceStore>,
    registry: Arc<ProviderRegistry>,
    settlement: Arc<ProcessPurchaseHandler>,
}

impl MarketWebhookHandler {
    pub fn new(
        store: Arc<dyn MarketplaceStore>,
        registry: Arc<ProviderRegistry>,
        settlement: Arc<ProcessPurchaseHandler>,
    ) -> Self {
        Self {
            store,
            registry,
            settlement,
        }
    }

    /// Processes one webhook delivery.
    ///
    /// Mirrors the billing webhook contract: unrecognized payloads are
    /// acknowledged as ignored, while a failed provider re-poll surfaces as
    /// an error so the HTTP layer answers non-2xx and the provider
    /// redelivers.
    pub async fn handle(&self, cmd: WebhookCommand) -> Result<WebhookOutcome, SettlementError> {
        let Some((provider, event)) = self.attribute(&cmd) else {
            tracing::info!("Marketplace webhook matched no registered provider");
            return Ok(WebhookOutcome::Ignored);
        };

        if let Err(e) = provider.verify_webhook_signature(&cmd.payload, cmd.signature.as_deref()) {
            tracing::warn!(provider = %event.provider, error = %e, "Marketplace webhook signature rejected");
            return Err(SettlementError::SignatureInvalid);
        }

        let tx = match self
            .store
            .find_transaction_by_provider_ref(
                event.provider_invoice_id.as_deref(),
                event.payment_hash.as_deref(),
            )
            .await?
        {
            Some(tx) => tx,
            None => {
                tracing::info!(provider = %event.provider, "Webhook references an unknown transaction");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        if matches!(
            tx.status,
            TransactionStatus::Settled | TransactionStatus::Failed
        ) {
            return Ok(WebhookOutcome::Unchanged);
        }

        // Re-poll the provider the invoice was created on.
        let poll_provider = self
            .registry
            .get(tx.payment_provider)
            .ok_or(SettlementError::NoProviderConfigured)?;
        let status = poll_provider
            .get_invoice_status(&tx.provider_invoice_id, tx.payment_hash.as_deref())
            .await
            .map_err(map_provider)?;

        match status.state {
            InvoiceState::Paid => {
                let paid_at = status.paid_at.unwrap_or_else(Utc::now);
                self.settlement.confirm(&tx, paid_at).await?;
                Ok(WebhookOutcome::Confirmed)
            }
            InvoiceState::Expired | InvoiceState::Failed => {
                // Give the asset back to the market.
                self.store.release_reservation(&tx.id, Utc::now()).await?;
                Ok(WebhookOutcome::Closed)
            }
            InvoiceState::Pending | InvoiceState::Unknown => Ok(WebhookOutcome::Unchanged),
        }
    }

    fn attribute(
        &self,
        cmd: &WebhookCommand,
    ) -> Option<(Arc<dyn LightningProvider>, PaymentEvent)> {
        if let Some(hint) = cmd.provider_hint {
            let provider = self.registry.get(hint)?;
            let event = provider.parse_webhook_event(&cmd.payload)?;
            return Some((provider, event));
        }
        self.registry.identify_webhook(&cmd.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::lightning::MockLightningProvider;
    use crate::adapters::memory::{InMemoryMarketplaceStore, MockLnurlResolver, RecordingWallet};
    use crate::domain::foundation::{ListingId, ProviderType, Pubkey, TransactionId};
    use crate::domain::marketplace::{
        calculate_split, Listing, ListingStatus, MarketplaceTransaction, SourceType,
    };
    use crate::ports::InvoiceStatus;

    fn seeded(
        invoice_id: &str,
    ) -> (Arc<InMemoryMarketplaceStore>, MarketplaceTransaction, Listing) {
        let store = Arc::new(InMemoryMarketplaceStore::new());
        let seller = Pubkey::new("5e11e4").unwrap();
        let listing = Listing {
            id: ListingId::new(),
            seller: seller.clone(),
            asset_name: "alice@nym.market".to_string(),
            price_sats: 100_000,
            status: ListingStatus::PendingSale,
        };
        store.seed_listing(listing.clone());
        store.seed_lightning_address(&seller, "seller@wallet.example.com");

        let split = calculate_split(100_000, 500).unwrap();
        let tx = MarketplaceTransaction::pending(
            TransactionId::new(),
            SourceType::Listing,
            listing.id.to_string(),
            Pubkey::new("b0b0").unwrap(),
            seller,
            &split,
            ProviderType::Btcpay,
            invoice_id.to_string(),
            None,
            Utc::now(),
        );
        store.seed_transaction(tx.clone());
        (store, tx, listing)
    }

    fn handler_with(
        store: Arc<InMemoryMarketplaceStore>,
        provider: MockLightningProvider,
    ) -> MarketWebhookHandler {
        let registry = Arc::new(ProviderRegistry::new().register(Arc::new(provider)));
        let settlement = Arc::new(ProcessPurchaseHandler::new(
            store.clone(),
            Arc::new(MockLnurlResolver::new()),
            Arc::new(RecordingWallet::new()),
        ));
        MarketWebhookHandler::new(store, registry, settlement)
    }

    fn payload(invoice_id: &str) -> Vec<u8> {
        format!(r#"{{"mock_provider":"btcpay","invoice_id":"{invoice_id}","state":"paid"}}"#)
            .into_bytes()
    }

    #[tokio::test]
    async fn paid_webhook_settles_the_purchase() {
        let (store, tx, _) = seeded("inv_mkt_hook");
        let provider = MockLightningProvider::new(ProviderType::Btcpay)
            .with_status(InvoiceStatus::paid(Utc::now()));
        let handler = handler_with(store.clone(), provider);

        let outcome = handler
            .handle(WebhookCommand {
                provider_hint: Some(ProviderType::Btcpay),
                payload: payload("inv_mkt_hook"),
                signature: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Confirmed);
        assert_eq!(
            store.transaction(&tx.id).unwrap().status,
            TransactionStatus::Settled
        );
    }

    #[tokio::test]
    async fn expired_invoice_releases_the_listing() {
        let (store, tx, listing) = seeded("inv_mkt_exp");
        let provider = MockLightningProvider::new(ProviderType::Btcpay).with_status(
            InvoiceStatus {
                state: InvoiceState::Expired,
                paid_at: None,
            },
        );
        let handler = handler_with(store.clone(), provider);

        let outcome = handler
            .handle(WebhookCommand {
                provider_hint: Some(ProviderType::Btcpay),
                payload: payload("inv_mkt_exp"),
                signature: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Closed);
        assert_eq!(
            store.transaction(&tx.id).unwrap().status,
            TransactionStatus::Failed
        );
        assert_eq!(
            store.listing(&listing.id).unwrap().status,
            ListingStatus::Active
        );
    }

    #[tokio::test]
    async fn pending_poll_changes_nothing() {
        let (store, tx, _) = seeded("inv_mkt_pend");
        let provider = MockLightningProvider::new(ProviderType::Btcpay)
            .with_status(InvoiceStatus::pending());
        let handler = handler_with(store.clone(), provider);

        let outcome = handler
            .handle(WebhookCommand {
                provider_hint: Some(ProviderType::Btcpay),
                payload: payload("inv_mkt_pend"),
                signature: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Unchanged);
        assert_eq!(
            store.transaction(&tx.id).unwrap().status,
            TransactionStatus::Pending
        );
    }

    #[tokio::test]
    async fn unknown_transaction_is_ignored() {
        let store = Arc::new(InMemoryMarketplaceStore::new());
        let handler = handler_with(
            store,
            MockLightningProvider::new(ProviderType::Btcpay),
        );

        let outcome = handler
            .handle(WebhookCommand {
                provider_hint: Some(ProviderType::Btcpay),
                payload: payload("inv_never_issued"),
                signature: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn bad_signature_is_rejected() {
        let (store, _, _) = seeded("inv_mkt_sig");
        let handler = handler_with(
            store,
            MockLightningProvider::new(ProviderType::Btcpay).rejecting_signatures(),
        );

        let result = handler
            .handle(WebhookCommand {
                provider_hint: Some(ProviderType::Btcpay),
                payload: payload("inv_mkt_sig"),
                signature: Some("deadbeef".to_string()),
            })
            .await;

        assert!(matches!(result, Err(SettlementError::SignatureInvalid)));
    }
}
