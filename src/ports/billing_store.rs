//! Billing persistence port.
//!
//! One store covers payments, subscriptions, and the audit log because
//! confirmation must write all three atomically. Implementations back this
//! with a single database transaction (or a single mutex for the in-memory
//! test double).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::billing::{AuditEntry, PaymentRecord, PaymentStatus, SubscriptionRecord};
use crate::domain::foundation::{DomainError, PaymentId, Pubkey};

/// Outcome of a confirmation attempt.
///
/// `AlreadyPaid` is the idempotent path: a concurrent caller (webhook vs.
/// poll) won the conditional update first, and the loser reports success
/// without writing anything.
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    Confirmed(PaymentRecord),
    AlreadyPaid(PaymentRecord),
}

impl ConfirmOutcome {
    pub fn payment(&self) -> &PaymentRecord {
        match self {
            ConfirmOutcome::Confirmed(p) | ConfirmOutcome::AlreadyPaid(p) => p,
        }
    }
}

#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Persists a freshly created pending payment together with its audit
    /// entry, atomically.
    async fn create_payment(
        &self,
        payment: &PaymentRecord,
        audit: &AuditEntry,
    ) -> Result<(), DomainError>;

    async fn find_payment(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, DomainError>;

    /// Looks a payment up by provider invoice id or payment hash, in that
    /// order of preference. Webhook payloads carry one or both.
    async fn find_payment_by_provider_ref(
        &self,
        provider_invoice_id: Option<&str>,
        payment_hash: Option<&str>,
    ) -> Result<Option<PaymentRecord>, DomainError>;

    /// Moves a pending payment to a terminal non-paid state.
    ///
    /// Conditional on the row still being pending; if another caller
    /// already transitioned it, the current record is returned unchanged.
    async fn transition_payment(
        &self,
        id: &PaymentId,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<PaymentRecord, DomainError>;

    /// Confirms a payment and applies the subscription upgrade in one
    /// transaction.
    ///
    /// The payment row is claimed with a conditional update (pending only);
    /// the subscription write and the audit entry happen only when the
    /// claim succeeds. Losing the race returns [`ConfirmOutcome::AlreadyPaid`].
    async fn confirm_payment(
        &self,
        id: &PaymentId,
        paid_at: DateTime<Utc>,
        receipt_number: &str,
        subscription: &SubscriptionRecord,
        audit: &AuditEntry,
    ) -> Result<ConfirmOutcome, DomainError>;

    async fn find_subscription(
        &self,
        user: &Pubkey,
    ) -> Result<Option<SubscriptionRecord>, DomainError>;

    /// Most recent payments for a user, newest first.
    async fn list_payments_for_user(
        &self,
        user: &Pubkey,
        limit: i64,
    ) -> Result<Vec<PaymentRecord>, DomainError>;
}
