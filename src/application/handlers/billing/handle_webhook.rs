//! HandleWebhookHandler - ingests provider payment callbacks.
//!
//! A webhook is treated as a hint, never as proof of payment: after the
//! signature checks out we re-poll the provider and confirm from the poll
//! result, so a forged or replayed body can at worst trigger a harmless
//! status check.

use std::sync::Arc;

use chrono::Utc;

use crate::adapters::lightning::ProviderRegistry;
use crate::application::handlers::billing::ProcessPaymentHandler;
use crate::domain::billing::{BillingError, PaymentStatus};
use crate::domain::foundation::ProviderType;
use crate::ports::{BillingStore, InvoiceState, LightningProvider, PaymentEvent, ProviderError};

#[derive(Debug, Clone)]
pub struct WebhookCommand {
    /// Provider named by the delivery URL, when present.
    pub provider_hint: Option<ProviderType>,
    pub payload: Vec<u8>,
    pub signature: Option<String>,
}

/// What became of a webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// The referenced payment reached `Paid`.
    Confirmed,
    /// The referenced payment moved to a non-paid terminal state.
    Closed,
    /// The payment was already terminal or still pending; nothing changed.
    Unchanged,
    /// The payload did not match any registered provider, or referenced no
    /// payment we know. Acknowledged so the sender stops retrying.
    Ignored,
}

pub struct HandleWebhookHandler {
    store: Arc<dyn BillingStore>,
    registry: Arc<ProviderRegistry>,
    confirmation: ProcessPaymentHandler,
}

impl HandleWebhookHandler {
    pub fn new(store: Arc<dyn BillingStore>, registry: Arc<ProviderRegistry>) -> Self {
        let confirmation = ProcessPaymentHandler::new(store.clone());
        Self {
            store,
            registry,
            confirmation,
        }
    }

    /// Processes one webhook delivery.
    ///
    /// Unrecognized payloads and unknown payment references are
    /// acknowledged as [`WebhookOutcome::Ignored`]. A failed re-poll of the
    /// provider is returned as an error on purpose: the HTTP layer answers
    /// non-2xx and the provider redelivers once the outage clears, so no
    /// payment notification is ever dropped on a transient fault.
    pub async fn handle(&self, cmd: WebhookCommand) -> Result<WebhookOutcome, BillingError> {
        let Some((provider, event)) = self.attribute(&cmd) else {
            tracing::info!("Webhook payload matched no registered provider");
            return Ok(WebhookOutcome::Ignored);
        };

        if let Err(e) = provider.verify_webhook_signature(&cmd.payload, cmd.signature.as_deref()) {
            tracing::warn!(provider = %event.provider, error = %e, "Webhook signature rejected");
            return Err(BillingError::SignatureInvalid);
        }

        let payment = match self
            .store
            .find_payment_by_provider_ref(
                event.provider_invoice_id.as_deref(),
                event.payment_hash.as_deref(),
            )
            .await?
        {
            Some(payment) => payment,
            None => {
                tracing::info!(provider = %event.provider, "Webhook references an unknown payment");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        if payment.status.is_terminal() {
            return Ok(WebhookOutcome::Unchanged);
        }

        // Never trust the webhook body for money movement; re-poll.
        let status = provider
            .get_invoice_status(&payment.provider_invoice_id, payment.payment_hash.as_deref())
            .await
            .map_err(map_provider)?;

        let now = Utc::now();
        match status.state {
            InvoiceState::Paid => {
                let paid_at = status.paid_at.unwrap_or(now);
                self.confirmation.confirm(&payment, paid_at).await?;
                Ok(WebhookOutcome::Confirmed)
            }
            InvoiceState::Expired => {
                self.store
                    .transition_payment(&payment.id, PaymentStatus::Expired, now)
                    .await?;
                Ok(WebhookOutcome::Closed)
            }
            InvoiceState::Failed => {
                self.store
                    .transition_payment(&payment.id, PaymentStatus::Failed, now)
                    .await?;
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
    use crate::adapters::memory::InMemoryBillingStore;
    use crate::domain::billing::{quote, BillingCycle, PaymentRecord, Tier};
    use crate::domain::foundation::{PaymentId, Pubkey};
    use crate::ports::InvoiceStatus;

    fn pending_payment(invoice_id: &str) -> PaymentRecord {
        let price = quote(Tier::Pro, BillingCycle::Monthly, 0).unwrap();
        PaymentRecord::pending(
            PaymentId::new(),
            Pubkey::new("ab12cd34").unwrap(),
            &price,
            ProviderType::Btcpay,
            invoice_id.to_string(),
            "lnbc21000".to_string(),
            None,
            Utc::now(),
        )
    }

    fn scripted_payload(invoice_id: &str) -> Vec<u8> {
        format!(r#"{{"mock_provider":"btcpay","invoice_id":"{invoice_id}","state":"paid"}}"#)
            .into_bytes()
    }

    #[tokio::test]
    async fn paid_webhook_confirms_after_repoll() {
        let store = Arc::new(InMemoryBillingStore::new());
        let payment = pending_payment("inv_hook");
        store.seed_payment(payment.clone());

        let provider = MockLightningProvider::new(ProviderType::Btcpay)
            .with_status(InvoiceStatus::paid(Utc::now()));
        let handler = HandleWebhookHandler::new(
            store.clone(),
            Arc::new(ProviderRegistry::new().register(Arc::new(provider))),
        );

        let outcome = handler
            .handle(WebhookCommand {
                provider_hint: Some(ProviderType::Btcpay),
                payload: scripted_payload("inv_hook"),
                signature: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Confirmed);
        let stored = store.payment(&payment.id).unwrap();
        assert_eq!(stored.status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn webhook_body_alone_never_confirms() {
        // The body says paid but the provider poll still says pending.
        let store = Arc::new(InMemoryBillingStore::new());
        let payment = pending_payment("inv_forged");
        store.seed_payment(payment.clone());

        let provider = MockLightningProvider::new(ProviderType::Btcpay)
            .with_status(InvoiceStatus::pending());
        let handler = HandleWebhookHandler::new(
            store.clone(),
            Arc::new(ProviderRegistry::new().register(Arc::new(provider))),
        );

        let outcome = handler
            .handle(WebhookCommand {
                provider_hint: Some(ProviderType::Btcpay),
                payload: scripted_payload("inv_forged"),
                signature: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Unchanged);
        assert_eq!(
            store.payment(&payment.id).unwrap().status,
            PaymentStatus::Pending
        );
    }

    #[tokio::test]
    async fn repoll_failure_is_an_error_so_the_provider_redelivers() {
        let store = Arc::new(InMemoryBillingStore::new());
        let payment = pending_payment("inv_outage");
        store.seed_payment(payment.clone());

        let provider = MockLightningProvider::new(ProviderType::Btcpay).with_status_error(
            ProviderError::Unavailable {
                provider: ProviderType::Btcpay,
                message: "connect timeout".to_string(),
            },
        );
        let handler = HandleWebhookHandler::new(
            store.clone(),
            Arc::new(ProviderRegistry::new().register(Arc::new(provider))),
        );

        let result = handler
            .handle(WebhookCommand {
                provider_hint: Some(ProviderType::Btcpay),
                payload: scripted_payload("inv_outage"),
                signature: None,
            })
            .await;

        // Non-2xx forces a redelivery; the payment is untouched meanwhile.
        assert!(matches!(result, Err(BillingError::Provider(_))));
        assert_eq!(
            store.payment(&payment.id).unwrap().status,
            PaymentStatus::Pending
        );
    }

    #[tokio::test]
    async fn unrecognized_payload_is_ignored() {
        let store = Arc::new(InMemoryBillingStore::new());
        let provider = MockLightningProvider::new(ProviderType::Btcpay);
        let handler = HandleWebhookHandler::new(
            store,
            Arc::new(ProviderRegistry::new().register(Arc::new(provider))),
        );

        let outcome = handler
            .handle(WebhookCommand {
                provider_hint: None,
                payload: b"{\"some\":\"noise\"}".to_vec(),
                signature: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn unknown_payment_reference_is_ignored() {
        let store = Arc::new(InMemoryBillingStore::new());
        let provider = MockLightningProvider::new(ProviderType::Btcpay);
        let handler = HandleWebhookHandler::new(
            store,
            Arc::new(ProviderRegistry::new().register(Arc::new(provider))),
        );

        let outcome = handler
            .handle(WebhookCommand {
                provider_hint: Some(ProviderType::Btcpay),
                payload: scripted_payload("inv_nobody_made"),
                signature: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn bad_signature_is_rejected() {
        let store = Arc::new(InMemoryBillingStore::new());
        let payment = pending_payment("inv_sig");
        store.seed_payment(payment);

        let provider =
            MockLightningProvider::new(ProviderType::Btcpay).rejecting_signatures();
        let handler = HandleWebhookHandler::new(
            store,
            Arc::new(ProviderRegistry::new().register(Arc::new(provider))),
        );

        let result = handler
            .handle(WebhookCommand {
                provider_hint: Some(ProviderType::Btcpay),
                payload: scripted_payload("inv_sig"),
                signature: Some("deadbeef".to_string()),
            })
            .await;

        assert!(matches!(result, Err(BillingError::SignatureInvalid)));
    }

    #[tokio::test]
    async fn replay_of_paid_webhook_is_a_no_op() {
        let store = Arc::new(InMemoryBillingStore::new());
        let mut payment = pending_payment("inv_replay");
        payment.status = PaymentStatus::Paid;
        store.seed_payment(payment);

        let provider = MockLightningProvider::new(ProviderType::Btcpay);
        let handler = HandleWebhookHandler::new(
            store.clone(),
            Arc::new(ProviderRegistry::new().register(Arc::new(provider))),
        );

        let outcome = handler
            .handle(WebhookCommand {
                provider_hint: Some(ProviderType::Btcpay),
                payload: scripted_payload("inv_replay"),
                signature: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Unchanged);
        assert!(store.audit_entries().is_empty());
    }

    #[tokio::test]
    async fn expired_poll_result_closes_the_payment() {
        let store = Arc::new(InMemoryBillingStore::new());
        let payment = pending_payment("inv_exp");
        store.seed_payment(payment.clone());

        let provider = MockLightningProvider::new(ProviderType::Btcpay).with_status(
            InvoiceStatus {
                state: InvoiceState::Expired,
                paid_at: None,
            },
        );
        let handler = HandleWebhookHandler::new(
            store.clone(),
            Arc::new(ProviderRegistry::new().register(Arc::new(provider))),
        );

        let outcome = handler
            .handle(WebhookCommand {
                provider_hint: Some(ProviderType::Btcpay),
                payload: scripted_payload("inv_exp"),
                signature: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Closed);
        assert_eq!(
            store.payment(&payment.id).unwrap().status,
            PaymentStatus::Expired
        );
    }
}
