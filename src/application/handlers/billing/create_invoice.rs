//! CreateInvoiceHandler - issues a subscription payment invoice.

use std::sync::Arc;

use chrono::Utc;

use crate::adapters::lightning::ProviderRegistry;
use crate::domain::billing::{
    quote, AuditEntry, BillingCycle, BillingError, PaymentRecord, Tier, ACTION_PAYMENT_CREATED,
};
use crate::domain::foundation::{PaymentId, ProviderType, Pubkey};
use crate::ports::{BillingStore, InvoiceRequest, ProviderError, TrustGraph};

/// Command to create a subscription invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoiceCommand {
    pub user: Pubkey,
    pub tier: Tier,
    pub billing_cycle: BillingCycle,
    /// Consult the trust graph for a discount. The graph being unreachable
    /// degrades to no discount, never a failed checkout.
    pub apply_trust_discount: bool,
    pub provider: Option<ProviderType>,
}

#[derive(Debug, Clone)]
pub struct CreateInvoiceResult {
    pub payment: PaymentRecord,
}

pub struct CreateInvoiceHandler {
    store: Arc<dyn BillingStore>,
    registry: Arc<ProviderRegistry>,
    trust_graph: Arc<dyn TrustGraph>,
    /// Public callback base, e.g. `https://api.nym.market`. `None` disables
    /// webhook delivery (poll-only dev setups).
    webhook_base_url: Option<String>,
    invoice_expiry_secs: u64,
}

impl CreateInvoiceHandler {
    pub fn new(
        store: Arc<dyn BillingStore>,
        registry: Arc<ProviderRegistry>,
        trust_graph: Arc<dyn TrustGraph>,
        webhook_base_url: Option<String>,
        invoice_expiry_secs: u64,
    ) -> Self {
        Self {
            store,
            registry,
            trust_graph,
            webhook_base_url,
            invoice_expiry_secs,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateInvoiceCommand,
    ) -> Result<CreateInvoiceResult, BillingError> {
        // 1. Trust discount, degrading to zero when the graph is down.
        let discount = if cmd.apply_trust_discount {
            match self.trust_graph.discount_percent(&cmd.user).await {
                Ok(percent) => percent,
                Err(e) => {
                    tracing::warn!(user = %cmd.user, error = %e, "Trust graph unavailable, no discount applied");
                    0
                }
            }
        } else {
            0
        };

        // 2. Quote pins tier, cycle, and discount for the record's lifetime.
        let price = quote(cmd.tier, cmd.billing_cycle, discount)?;

        // 3. Resolve the provider.
        let provider = self.registry.resolve(cmd.provider).map_err(map_provider)?;

        // 4. Create the provider invoice.
        let payment_id = PaymentId::new();
        let webhook_url = self.webhook_base_url.as_deref().map(|base| {
            format!(
                "{}/api/payments/webhook?provider={}",
                base.trim_end_matches('/'),
                provider.provider_type()
            )
        });

        let invoice = provider
            .create_invoice(&InvoiceRequest {
                amount_sats: price.amount_sats,
                memo: format!(
                    "NymMarket {} ({})",
                    price.tier.display_name(),
                    price.billing_cycle.as_str()
                ),
                expires_in_secs: self.invoice_expiry_secs,
                webhook_url,
                metadata: serde_json::json!({
                    "order_id": payment_id.to_string(),
                    "kind": "subscription",
                }),
            })
            .await
            .map_err(map_provider)?;

        // 5. Persist the pending payment with its audit snapshot.
        let now = Utc::now();
        let payment = PaymentRecord::pending(
            payment_id,
            cmd.user.clone(),
            &price,
            invoice.provider,
            invoice.provider_invoice_id,
            invoice.bolt11,
            invoice.payment_hash,
            now,
        );

        let audit = AuditEntry::new(
            ACTION_PAYMENT_CREATED,
            Some(payment.id),
            Some(cmd.user),
            serde_json::json!({
                "tier": price.tier.as_str(),
                "billing_cycle": price.billing_cycle.as_str(),
                "amount_sats": price.amount_sats,
                "discount_percent": price.discount_percent,
                "provider": payment.provider.as_str(),
            }),
            now,
        );

        self.store.create_payment(&payment, &audit).await?;

        tracing::info!(
            payment_id = %payment.id,
            user = %payment.user,
            amount_sats = payment.amount_sats,
            provider = %payment.provider,
            "Created subscription invoice"
        );

        Ok(CreateInvoiceResult { payment })
    }
}

fn map_provider(err: ProviderError) -> BillingError {
    match err {
        ProviderError::NoProviderConfigured => BillingError::NoProviderConfigured,
        other => BillingError::Provider(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::lightning::MockLightningProvider;
    use crate::adapters::memory::{FixedTrustGraph, InMemoryBillingStore, UnreachableTrustGraph};
    use crate::domain::billing::PaymentStatus;

    fn registry() -> Arc<ProviderRegistry> {
        Arc::new(
            ProviderRegistry::new()
                .register(Arc::new(MockLightningProvider::new(ProviderType::Btcpay))),
        )
    }

    fn handler(
        store: Arc<InMemoryBillingStore>,
        trust: Arc<dyn TrustGraph>,
    ) -> CreateInvoiceHandler {
        CreateInvoiceHandler::new(
            store,
            registry(),
            trust,
            Some("https://api.nym.market".to_string()),
            600,
        )
    }

    fn user() -> Pubkey {
        Pubkey::new("ab12cd34").unwrap()
    }

    #[tokio::test]
    async fn creates_pending_payment_with_audit_entry() {
        let store = Arc::new(InMemoryBillingStore::new());
        let handler = handler(store.clone(), Arc::new(FixedTrustGraph::disabled()));

        let result = handler
            .handle(CreateInvoiceCommand {
                user: user(),
                tier: Tier::Pro,
                billing_cycle: BillingCycle::Monthly,
                apply_trust_discount: false,
                provider: None,
            })
            .await
            .unwrap();

        assert_eq!(result.payment.status, PaymentStatus::Pending);
        assert_eq!(result.payment.amount_sats, 21_000);
        assert_eq!(result.payment.tier, Tier::Pro);
        assert!(result.payment.receipt_number.is_none());

        let audit = store.audit_entries();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, ACTION_PAYMENT_CREATED);
        assert_eq!(audit[0].payment_id, Some(result.payment.id));
    }

    #[tokio::test]
    async fn trust_discount_is_capped_at_fifty_percent() {
        let store = Arc::new(InMemoryBillingStore::new());
        let handler = handler(store, Arc::new(FixedTrustGraph::new(80)));

        let result = handler
            .handle(CreateInvoiceCommand {
                user: user(),
                tier: Tier::Pro,
                billing_cycle: BillingCycle::Monthly,
                apply_trust_discount: true,
                provider: None,
            })
            .await
            .unwrap();

        assert_eq!(result.payment.discount_percent, 50);
        assert_eq!(result.payment.amount_sats, 10_500);
    }

    #[tokio::test]
    async fn unreachable_trust_graph_degrades_to_no_discount() {
        let store = Arc::new(InMemoryBillingStore::new());
        let handler = handler(store, Arc::new(UnreachableTrustGraph));

        let result = handler
            .handle(CreateInvoiceCommand {
                user: user(),
                tier: Tier::Pro,
                billing_cycle: BillingCycle::Monthly,
                apply_trust_discount: true,
                provider: None,
            })
            .await
            .unwrap();

        assert_eq!(result.payment.discount_percent, 0);
        assert_eq!(result.payment.amount_sats, 21_000);
    }

    #[tokio::test]
    async fn free_tier_is_rejected() {
        let store = Arc::new(InMemoryBillingStore::new());
        let handler = handler(store, Arc::new(FixedTrustGraph::disabled()));

        let result = handler
            .handle(CreateInvoiceCommand {
                user: user(),
                tier: Tier::Free,
                billing_cycle: BillingCycle::Monthly,
                apply_trust_discount: false,
                provider: None,
            })
            .await;

        assert!(matches!(result, Err(BillingError::InvalidTier(_))));
    }

    #[tokio::test]
    async fn empty_registry_yields_no_provider_configured() {
        let store = Arc::new(InMemoryBillingStore::new());
        let handler = CreateInvoiceHandler::new(
            store,
            Arc::new(ProviderRegistry::new()),
            Arc::new(FixedTrustGraph::disabled()),
            None,
            600,
        );

        let result = handler
            .handle(CreateInvoiceCommand {
                user: user(),
                tier: Tier::Pro,
                billing_cycle: BillingCycle::Monthly,
                apply_trust_discount: false,
                provider: None,
            })
            .await;

        assert!(matches!(result, Err(BillingError::NoProviderConfigured)));
    }

    #[tokio::test]
    async fn provider_failure_persists_nothing() {
        let store = Arc::new(InMemoryBillingStore::new());
        let provider = MockLightningProvider::new(ProviderType::Btcpay).with_create_error(
            ProviderError::Unavailable {
                provider: ProviderType::Btcpay,
                message: "connection refused".to_string(),
            },
        );
        let handler = CreateInvoiceHandler::new(
            store.clone(),
            Arc::new(ProviderRegistry::new().register(Arc::new(provider))),
            Arc::new(FixedTrustGraph::disabled()),
            None,
            600,
        );

        let result = handler
            .handle(CreateInvoiceCommand {
                user: user(),
                tier: Tier::Pro,
                billing_cycle: BillingCycle::Monthly,
                apply_trust_discount: false,
                provider: None,
            })
            .await;

        assert!(matches!(result, Err(BillingError::Provider(_))));
        assert!(store.audit_entries().is_empty());
    }

    #[tokio::test]
    async fn lifetime_cycle_buys_lifetime_tier() {
        let store = Arc::new(InMemoryBillingStore::new());
        let handler = handler(store, Arc::new(FixedTrustGraph::disabled()));

        let result = handler
            .handle(CreateInvoiceCommand {
                user: user(),
                tier: Tier::Pro,
                billing_cycle: BillingCycle::Lifetime,
                apply_trust_discount: false,
                provider: None,
            })
            .await
            .unwrap();

        assert_eq!(result.payment.tier, Tier::Lifetime);
        assert_eq!(result.payment.amount_sats, 210_000);
    }
}
