//! GetReceiptHandler - fetches the receipt for a settled payment.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::billing::{BillingError, PaymentStatus};
use crate::domain::foundation::{AuthenticatedUser, PaymentId, ProviderType, Pubkey};
use crate::ports::BillingStore;

#[derive(Debug, Clone)]
pub struct GetReceiptCommand {
    pub payment_id: PaymentId,
    pub caller: AuthenticatedUser,
}

/// The receipt view of a paid payment.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub receipt_number: String,
    pub payment_id: PaymentId,
    pub user: Pubkey,
    pub tier: String,
    pub billing_cycle: String,
    pub amount_sats: u64,
    pub discount_percent: u8,
    pub provider: ProviderType,
    pub paid_at: DateTime<Utc>,
}

pub struct GetReceiptHandler {
    store: Arc<dyn BillingStore>,
}

impl GetReceiptHandler {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, cmd: GetReceiptCommand) -> Result<Receipt, BillingError> {
        let payment = self
            .store
            .find_payment(&cmd.payment_id)
            .await?
            .ok_or_else(|| BillingError::PaymentNotFound(cmd.payment_id.to_string()))?;

        // Receipts are private to the payer; admins get no shortcut here.
        if payment.user != cmd.caller.pubkey {
            return Err(BillingError::Forbidden);
        }

        if payment.status != PaymentStatus::Paid {
            return Err(BillingError::PaymentNotFound(format!(
                "No receipt for payment {}",
                payment.id
            )));
        }

        let (receipt_number, paid_at) = match (payment.receipt_number, payment.paid_at) {
            (Some(number), Some(at)) => (number, at),
            _ => {
                // A paid payment always carries both; anything else is a
                // persistence bug worth surfacing.
                return Err(BillingError::Database(format!(
                    "Paid payment {} is missing receipt fields",
                    payment.id
                )));
            }
        };

        Ok(Receipt {
            receipt_number,
            payment_id: payment.id,
            user: payment.user,
            tier: payment.tier.as_str().to_string(),
            billing_cycle: payment.billing_cycle.as_str().to_string(),
            amount_sats: payment.amount_sats,
            discount_percent: payment.discount_percent,
            provider: payment.provider,
            paid_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBillingStore;
    use crate::domain::billing::{quote, BillingCycle, PaymentRecord, Tier};

    fn paid_payment(user: &Pubkey) -> PaymentRecord {
        let price = quote(Tier::Pro, BillingCycle::Monthly, 0).unwrap();
        let mut payment = PaymentRecord::pending(
            PaymentId::new(),
            user.clone(),
            &price,
            ProviderType::Btcpay,
            "inv_rcpt".to_string(),
            "lnbc21000".to_string(),
            None,
            Utc::now(),
        );
        payment.status = PaymentStatus::Paid;
        payment.paid_at = Some(Utc::now());
        payment.receipt_number = Some("NM-abc123-1f2e".to_string());
        payment
    }

    #[tokio::test]
    async fn payer_gets_their_receipt() {
        let store = Arc::new(InMemoryBillingStore::new());
        let alice = Pubkey::new("aa11").unwrap();
        let payment = paid_payment(&alice);
        store.seed_payment(payment.clone());

        let handler = GetReceiptHandler::new(store);
        let receipt = handler
            .handle(GetReceiptCommand {
                payment_id: payment.id,
                caller: AuthenticatedUser::new(alice),
            })
            .await
            .unwrap();

        assert_eq!(receipt.receipt_number, "NM-abc123-1f2e");
        assert_eq!(receipt.amount_sats, 21_000);
    }

    #[tokio::test]
    async fn non_payer_is_forbidden_even_as_admin() {
        let store = Arc::new(InMemoryBillingStore::new());
        let alice = Pubkey::new("aa11").unwrap();
        let payment = paid_payment(&alice);
        store.seed_payment(payment.clone());

        let handler = GetReceiptHandler::new(store);
        let result = handler
            .handle(GetReceiptCommand {
                payment_id: payment.id,
                caller: AuthenticatedUser::admin(Pubkey::new("bb22").unwrap()),
            })
            .await;

        assert!(matches!(result, Err(BillingError::Forbidden)));
    }

    #[tokio::test]
    async fn pending_payment_has_no_receipt() {
        let store = Arc::new(InMemoryBillingStore::new());
        let alice = Pubkey::new("aa11").unwrap();
        let price = quote(Tier::Pro, BillingCycle::Monthly, 0).unwrap();
        let payment = PaymentRecord::pending(
            PaymentId::new(),
            alice.clone(),
            &price,
            ProviderType::Btcpay,
            "inv_pending".to_string(),
            "lnbc21000".to_string(),
            None,
            Utc::now(),
        );
        store.seed_payment(payment.clone());

        let handler = GetReceiptHandler::new(store);
        let result = handler
            .handle(GetReceiptCommand {
                payment_id: payment.id,
                caller: AuthenticatedUser::new(alice),
            })
            .await;

        assert!(matches!(result, Err(BillingError::PaymentNotFound(_))));
    }
}
