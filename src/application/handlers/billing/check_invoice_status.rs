//! CheckInvoiceStatusHandler - polls a payment's provider and reconciles.

use std::sync::Arc;

use chrono::Utc;

use crate::adapters::lightning::ProviderRegistry;
use crate::application::handlers::billing::ProcessPaymentHandler;
use crate::domain::billing::{BillingError, PaymentRecord, PaymentStatus};
use crate::domain::foundation::{AuthenticatedUser, PaymentId};
use crate::ports::{BillingStore, InvoiceState};

#[derive(Debug, Clone)]
pub struct CheckInvoiceStatusCommand {
    pub payment_id: PaymentId,
    pub caller: AuthenticatedUser,
}

pub struct CheckInvoiceStatusHandler {
    store: Arc<dyn BillingStore>,
    registry: Arc<ProviderRegistry>,
    confirmation: ProcessPaymentHandler,
}

impl CheckInvoiceStatusHandler {
    pub fn new(store: Arc<dyn BillingStore>, registry: Arc<ProviderRegistry>) -> Self {
        let confirmation = ProcessPaymentHandler::new(store.clone());
        Self {
            store,
            registry,
            confirmation,
        }
    }

    pub async fn handle(
        &self,
        cmd: CheckInvoiceStatusCommand,
    ) -> Result<PaymentRecord, BillingError> {
        let payment = self
            .store
            .find_payment(&cmd.payment_id)
            .await?
            .ok_or_else(|| BillingError::PaymentNotFound(cmd.payment_id.to_string()))?;

        if payment.user != cmd.caller.pubkey && !cmd.caller.is_admin {
            return Err(BillingError::Forbidden);
        }

        // Terminal states are cached; no provider round-trip.
        if payment.status.is_terminal() {
            return Ok(payment);
        }

        let now = Utc::now();

        // Local wall-clock backstop, independent of provider callbacks.
        if payment.is_locally_expired(now) {
            tracing::info!(payment_id = %payment.id, "Invoice passed local expiry backstop");
            return Ok(self
                .store
                .transition_payment(&payment.id, PaymentStatus::Expired, now)
                .await?);
        }

        // Always poll the provider the payment was created with, never the
        // current default.
        let provider = self
            .registry
            .get(payment.provider)
            .ok_or(BillingError::NoProviderConfigured)?;

        let status = match provider
            .get_invoice_status(&payment.provider_invoice_id, payment.payment_hash.as_deref())
            .await
        {
            Ok(status) => status,
            Err(e) => {
                // A poll failure is not a state change; report what we have.
                tracing::warn!(payment_id = %payment.id, error = %e, "Provider status poll failed");
                return Ok(payment);
            }
        };

        match status.state {
            InvoiceState::Paid => {
                let paid_at = status.paid_at.unwrap_or(now);
                self.confirmation.confirm(&payment, paid_at).await
            }
            InvoiceState::Expired => Ok(self
                .store
                .transition_payment(&payment.id, PaymentStatus::Expired, now)
                .await?),
            InvoiceState::Failed => Ok(self
                .store
                .transition_payment(&payment.id, PaymentStatus::Failed, now)
                .await?),
            InvoiceState::Pending | InvoiceState::Unknown => Ok(payment),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::lightning::MockLightningProvider;
    use crate::adapters::memory::InMemoryBillingStore;
    use crate::domain::billing::{quote, BillingCycle, Tier};
    use crate::domain::foundation::{ProviderType, Pubkey};
    use crate::ports::InvoiceStatus;

    fn owner() -> Pubkey {
        Pubkey::new("ab12cd34").unwrap()
    }

    fn pending_payment() -> PaymentRecord {
        let price = quote(Tier::Pro, BillingCycle::Monthly, 0).unwrap();
        PaymentRecord::pending(
            PaymentId::new(),
            owner(),
            &price,
            ProviderType::Btcpay,
            "inv_1".to_string(),
            "lnbc21000".to_string(),
            None,
            Utc::now(),
        )
    }

    fn handler_with(
        store: Arc<InMemoryBillingStore>,
        provider: MockLightningProvider,
    ) -> CheckInvoiceStatusHandler {
        CheckInvoiceStatusHandler::new(
            store,
            Arc::new(ProviderRegistry::new().register(Arc::new(provider))),
        )
    }

    #[tokio::test]
    async fn paid_poll_confirms_the_payment() {
        let store = Arc::new(InMemoryBillingStore::new());
        let payment = pending_payment();
        store.seed_payment(payment.clone());

        let provider = MockLightningProvider::new(ProviderType::Btcpay)
            .with_status(InvoiceStatus::paid(Utc::now()));
        let handler = handler_with(store, provider);

        let result = handler
            .handle(CheckInvoiceStatusCommand {
                payment_id: payment.id,
                caller: AuthenticatedUser::new(owner()),
            })
            .await
            .unwrap();

        assert_eq!(result.status, PaymentStatus::Paid);
        assert!(result.receipt_number.is_some());
    }

    #[tokio::test]
    async fn terminal_payment_skips_the_provider() {
        let store = Arc::new(InMemoryBillingStore::new());
        let mut payment = pending_payment();
        payment.status = PaymentStatus::Paid;
        payment.receipt_number = Some("NM-x-1234".to_string());
        store.seed_payment(payment.clone());

        let provider = MockLightningProvider::new(ProviderType::Btcpay);
        let handler = CheckInvoiceStatusHandler::new(
            store,
            Arc::new(ProviderRegistry::new().register(Arc::new(provider))),
        );

        let result = handler
            .handle(CheckInvoiceStatusCommand {
                payment_id: payment.id,
                caller: AuthenticatedUser::new(owner()),
            })
            .await
            .unwrap();

        assert_eq!(result.status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn stale_pending_invoice_expires_locally() {
        let store = Arc::new(InMemoryBillingStore::new());
        let mut payment = pending_payment();
        payment.created_at = Utc::now() - chrono::Duration::minutes(11);
        store.seed_payment(payment.clone());

        let provider = MockLightningProvider::new(ProviderType::Btcpay);
        let handler = handler_with(store, provider);

        let result = handler
            .handle(CheckInvoiceStatusCommand {
                payment_id: payment.id,
                caller: AuthenticatedUser::new(owner()),
            })
            .await
            .unwrap();

        assert_eq!(result.status, PaymentStatus::Expired);
    }

    #[tokio::test]
    async fn poll_failure_leaves_payment_untouched() {
        let store = Arc::new(InMemoryBillingStore::new());
        let payment = pending_payment();
        store.seed_payment(payment.clone());

        let provider = MockLightningProvider::new(ProviderType::Btcpay).with_status_error(
            crate::ports::ProviderError::Unavailable {
                provider: ProviderType::Btcpay,
                message: "timeout".to_string(),
            },
        );
        let handler = handler_with(store, provider);

        let result = handler
            .handle(CheckInvoiceStatusCommand {
                payment_id: payment.id,
                caller: AuthenticatedUser::new(owner()),
            })
            .await
            .unwrap();

        assert_eq!(result.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn stranger_cannot_poll_someone_elses_payment() {
        let store = Arc::new(InMemoryBillingStore::new());
        let payment = pending_payment();
        store.seed_payment(payment.clone());

        let handler = handler_with(store, MockLightningProvider::new(ProviderType::Btcpay));

        let result = handler
            .handle(CheckInvoiceStatusCommand {
                payment_id: payment.id,
                caller: AuthenticatedUser::new(Pubkey::new("ff99").unwrap()),
            })
            .await;

        assert!(matches!(result, Err(BillingError::Forbidden)));
    }

    #[tokio::test]
    async fn admin_can_poll_any_payment() {
        let store = Arc::new(InMemoryBillingStore::new());
        let payment = pending_payment();
        store.seed_payment(payment.clone());

        let handler = handler_with(store, MockLightningProvider::new(ProviderType::Btcpay));

        let result = handler
            .handle(CheckInvoiceStatusCommand {
                payment_id: payment.id,
                caller: AuthenticatedUser::admin(Pubkey::new("ff99").unwrap()),
            })
            .await;

        assert!(result.is_ok());
    }
}
