//! RetryPayoutHandler - operator re-entry for stuck settlements.

use std::sync::Arc;

use crate::domain::foundation::{AuthenticatedUser, TransactionId};
use crate::domain::marketplace::{MarketplaceTransaction, SettlementError, TransactionStatus};
use crate::ports::MarketplaceStore;

use super::ProcessPurchaseHandler;

#[derive(Debug, Clone)]
pub struct RetryPayoutCommand {
    pub transaction_id: TransactionId,
    pub caller: AuthenticatedUser,
}

pub struct RetryPayoutHandler {
    store: Arc<dyn MarketplaceStore>,
    settlement: Arc<ProcessPurchaseHandler>,
}

impl RetryPayoutHandler {
    pub fn new(
        store: Arc<dyn MarketplaceStore>,
        settlement: Arc<ProcessPurchaseHandler>,
    ) -> Self {
        Self { store, settlement }
    }

    pub async fn handle(
        &self,
        cmd: RetryPayoutCommand,
    ) -> Result<MarketplaceTransaction, SettlementError> {
        if !cmd.caller.is_admin {
            return Err(SettlementError::Forbidden);
        }

        let tx = self
            .store
            .find_transaction(&cmd.transaction_id)
            .await?
            .ok_or_else(|| SettlementError::TransactionNotFound(cmd.transaction_id.to_string()))?;

        // Only a captured-but-unsettled transaction can be retried.
        if tx.status != TransactionStatus::Paid {
            return Err(SettlementError::InvalidTransactionState(
                tx.status.as_str().to_string(),
            ));
        }

        tracing::info!(
            transaction_id = %tx.id,
            admin = %cmd.caller.pubkey,
            "Retrying seller payout"
        );
        self.settlement.settle_paid(tx).await
    }

    /// Transactions stuck in `paid`, oldest first. Operator triage view.
    pub async fn list_unsettled(
        &self,
        caller: &AuthenticatedUser,
        limit: i64,
    ) -> Result<Vec<MarketplaceTransaction>, SettlementError> {
        if !caller.is_admin {
            return Err(SettlementError::Forbidden);
        }
        Ok(self.store.list_unsettled(limit.clamp(1, 100)).await?)
    }
}
