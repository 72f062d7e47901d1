//! In-memory billing store.
//!
//! Mirrors the conditional-update semantics of the Postgres store under a
//! single mutex, so handler tests exercise the same race outcomes without
//! a database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::billing::{
    AuditEntry, PaymentRecord, PaymentStatus, SubscriptionRecord,
};
use crate::domain::foundation::{DomainError, ErrorCode, PaymentId, Pubkey};
use crate::ports::{BillingStore, ConfirmOutcome};

#[derive(Default)]
struct State {
    payments: HashMap<PaymentId, PaymentRecord>,
    subscriptions: HashMap<String, SubscriptionRecord>,
    audit: Vec<AuditEntry>,
}

#[derive(Default)]
pub struct InMemoryBillingStore {
    state: Mutex<State>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_subscription(&self, subscription: SubscriptionRecord) {
        let mut state = self.state.lock().unwrap();
        state
            .subscriptions
            .insert(subscription.user.as_str().to_string(), subscription);
    }

    pub fn seed_payment(&self, payment: PaymentRecord) {
        self.state
            .lock()
            .unwrap()
            .payments
            .insert(payment.id, payment);
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.lock().unwrap().audit.clone()
    }

    pub fn payment(&self, id: &PaymentId) -> Option<PaymentRecord> {
        self.state.lock().unwrap().payments.get(id).cloned()
    }
}

fn not_found() -> DomainError {
    DomainError::new(ErrorCode::PaymentNotFound, "Payment not found")
}

#[async_trait]
impl BillingStore for InMemoryBillingStore {
    async fn create_payment(
        &self,
        payment: &PaymentRecord,
        audit: &AuditEntry,
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        state.payments.insert(payment.id, payment.clone());
        state.audit.push(audit.clone());
        Ok(())
    }

    async fn find_payment(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, DomainError> {
        Ok(self.state.lock().unwrap().payments.get(id).cloned())
    }

    async fn find_payment_by_provider_ref(
        &self,
        provider_invoice_id: Option<&str>,
        payment_hash: Option<&str>,
    ) -> Result<Option<PaymentRecord>, DomainError> {
        let state = self.state.lock().unwrap();

        if let Some(invoice_id) = provider_invoice_id {
            if let Some(payment) = state
                .payments
                .values()
                .find(|p| p.provider_invoice_id == invoice_id)
            {
                return Ok(Some(payment.clone()));
            }
        }

        if let Some(hash) = payment_hash {
            if let Some(payment) = state
                .payments
                .values()
                .find(|p| p.payment_hash.as_deref() == Some(hash))
            {
                return Ok(Some(payment.clone()));
            }
        }

        Ok(None)
    }

    async fn transition_payment(
        &self,
        id: &PaymentId,
        to: PaymentStatus,
        _now: DateTime<Utc>,
    ) -> Result<PaymentRecord, DomainError> {
        let mut state = self.state.lock().unwrap();
        let payment = state.payments.get_mut(id).ok_or_else(not_found)?;
        if payment.status == PaymentStatus::Pending {
            payment.status = to;
        }
        Ok(payment.clone())
    }

    async fn confirm_payment(
        &self,
        id: &PaymentId,
        paid_at: DateTime<Utc>,
        receipt_number: &str,
        subscription: &SubscriptionRecord,
        audit: &AuditEntry,
    ) -> Result<ConfirmOutcome, DomainError> {
        let mut state = self.state.lock().unwrap();
        let payment = state.payments.get(id).cloned().ok_or_else(not_found)?;

        if payment.status != PaymentStatus::Pending {
            return Ok(ConfirmOutcome::AlreadyPaid(payment));
        }

        let updated = {
            let entry = state.payments.get_mut(id).ok_or_else(not_found)?;
            entry.status = PaymentStatus::Paid;
            entry.paid_at = Some(paid_at);
            entry.receipt_number = Some(receipt_number.to_string());
            entry.subscription_id = Some(subscription.id);
            entry.clone()
        };

        state
            .subscriptions
            .insert(subscription.user.as_str().to_string(), subscription.clone());
        state.audit.push(audit.clone());

        Ok(ConfirmOutcome::Confirmed(updated))
    }

    async fn find_subscription(
        &self,
        user: &Pubkey,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .get(user.as_str())
            .cloned())
    }

    async fn list_payments_for_user(
        &self,
        user: &Pubkey,
        limit: i64,
    ) -> Result<Vec<PaymentRecord>, DomainError> {
        let state = self.state.lock().unwrap();
        let mut payments: Vec<PaymentRecord> = state
            .payments
            .values()
            .filter(|p| p.user == *user)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        payments.truncate(limit.max(0) as usize);
        Ok(payments)
    }
}
