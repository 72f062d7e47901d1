//! ProcessPaymentHandler - the confirmation routine.
//!
//! Shared by the webhook path and the status-poll path. Terminal-check
//! first, then one atomic store operation that marks the payment paid,
//! extends the subscription, and appends the audit entry. Racing callers
//! are resolved by the store's conditional claim; the loser still reports
//! success.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::billing::{
    receipt_number, AuditEntry, BillingError, PaymentRecord, PaymentStatus, SubscriptionRecord,
    ACTION_PAYMENT_CONFIRMED,
};
use crate::ports::{BillingStore, ConfirmOutcome};

pub struct ProcessPaymentHandler {
    store: Arc<dyn BillingStore>,
}

impl ProcessPaymentHandler {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    /// Confirms a payment the provider has reported paid.
    ///
    /// Idempotent: a payment already in a terminal state is returned
    /// unchanged, with no second extension, receipt, or audit entry. The
    /// status machine is monotonic, so a locally expired payment stays
    /// expired even if the provider later reports it paid; that case is
    /// logged for operator reconciliation.
    pub async fn confirm(
        &self,
        payment: &PaymentRecord,
        paid_at: DateTime<Utc>,
    ) -> Result<PaymentRecord, BillingError> {
        match payment.status {
            PaymentStatus::Paid => return Ok(payment.clone()),
            PaymentStatus::Expired | PaymentStatus::Failed => {
                tracing::error!(
                    payment_id = %payment.id,
                    status = payment.status.as_str(),
                    "Provider reports paid but payment is terminally non-paid; manual reconciliation needed"
                );
                return Ok(payment.clone());
            }
            PaymentStatus::Pending => {}
        }

        let now = Utc::now();

        // Pinned tier/cycle come from the record itself, never the catalog.
        let mut subscription = self
            .store
            .find_subscription(&payment.user)
            .await?
            .unwrap_or_else(|| SubscriptionRecord::free(payment.user.clone()));
        subscription.apply_payment(payment.tier, payment.billing_cycle, now);

        let receipt = receipt_number(payment.id, paid_at);
        let audit = AuditEntry::new(
            ACTION_PAYMENT_CONFIRMED,
            Some(payment.id),
            Some(payment.user.clone()),
            serde_json::json!({
                "receipt_number": receipt,
                "tier": payment.tier.as_str(),
                "billing_cycle": payment.billing_cycle.as_str(),
                "amount_sats": payment.amount_sats,
                "expires_at": subscription.expires_at,
            }),
            now,
        );

        let outcome = self
            .store
            .confirm_payment(&payment.id, paid_at, &receipt, &subscription, &audit)
            .await?;

        match outcome {
            ConfirmOutcome::Confirmed(confirmed) => {
                tracing::info!(
                    payment_id = %confirmed.id,
                    user = %confirmed.user,
                    tier = confirmed.tier.as_str(),
                    receipt = %receipt,
                    "Payment confirmed"
                );
                Ok(confirmed)
            }
            ConfirmOutcome::AlreadyPaid(existing) => {
                tracing::debug!(payment_id = %existing.id, "Payment already confirmed by a concurrent caller");
                Ok(existing)
            }
        }
    }
}
