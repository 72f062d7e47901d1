//! PaymentHistoryHandler - recent payments for the calling user.

use std::sync::Arc;

use crate::domain::billing::{BillingError, PaymentRecord};
use crate::domain::foundation::AuthenticatedUser;
use crate::ports::BillingStore;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone)]
pub struct PaymentHistoryCommand {
    pub caller: AuthenticatedUser,
    pub limit: Option<i64>,
}

pub struct PaymentHistoryHandler {
    store: Arc<dyn BillingStore>,
}

impl PaymentHistoryHandler {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    pub async fn handle(
        &self,
        cmd: PaymentHistoryCommand,
    ) -> Result<Vec<PaymentRecord>, BillingError> {
        let limit = cmd
            .limit
            .unwrap_or(DEFAULT_LIMIT)
            .clamp(1, MAX_LIMIT);
        Ok(self
            .store
            .list_payments_for_user(&cmd.caller.pubkey, limit)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBillingStore;
    use crate::domain::billing::{quote, BillingCycle, Tier};
    use crate::domain::foundation::{PaymentId, ProviderType, Pubkey};
    use chrono::{Duration, Utc};

    fn payment_for(user: &Pubkey, minutes_ago: i64) -> PaymentRecord {
        let price = quote(Tier::Pro, BillingCycle::Monthly, 0).unwrap();
        PaymentRecord::pending(
            PaymentId::new(),
            user.clone(),
            &price,
            ProviderType::Btcpay,
            format!("inv-{minutes_ago}"),
            "lnbc21000".to_string(),
            None,
            Utc::now() - Duration::minutes(minutes_ago),
        )
    }

    #[tokio::test]
    async fn returns_only_the_callers_payments_newest_first() {
        let store = Arc::new(InMemoryBillingStore::new());
        let alice = Pubkey::new("aa11").unwrap();
        let bob = Pubkey::new("bb22").unwrap();
        store.seed_payment(payment_for(&alice, 30));
        store.seed_payment(payment_for(&alice, 5));
        store.seed_payment(payment_for(&bob, 1));

        let handler = PaymentHistoryHandler::new(store);
        let history = handler
            .handle(PaymentHistoryCommand {
                caller: AuthenticatedUser::new(alice.clone()),
                limit: None,
            })
            .await
            .unwrap();

        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|p| p.user == alice));
        assert!(history[0].created_at > history[1].created_at);
    }

    #[tokio::test]
    async fn limit_is_clamped() {
        let store = Arc::new(InMemoryBillingStore::new());
        let alice = Pubkey::new("aa11").unwrap();
        for i in 0..5 {
            store.seed_payment(payment_for(&alice, i));
        }

        let handler = PaymentHistoryHandler::new(store);
        let history = handler
            .handle(PaymentHistoryCommand {
                caller: AuthenticatedUser::new(alice),
                limit: Some(2),
            })
            .await
            .unwrap();

        assert_eq!(history.len(), 2);
    }
}
