//! Append-only financial audit entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::foundation::{PaymentId, Pubkey};

/// One entry in the financial audit trail. Never edited, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub action: String,
    pub payment_id: Option<PaymentId>,
    pub user: Option<Pubkey>,
    pub detail: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        action: impl Into<String>,
        payment_id: Option<PaymentId>,
        user: Option<Pubkey>,
        detail: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.into(),
            payment_id,
            user,
            detail,
            recorded_at: now,
        }
    }
}

/// Audit action recorded when an invoice is issued.
pub const ACTION_PAYMENT_CREATED: &str = "payment.created";

/// Audit action recorded when a payment confirms.
pub const ACTION_PAYMENT_CONFIRMED: &str = "payment.confirmed";

/// Audit action recorded when a marketplace transaction settles.
pub const ACTION_MARKETPLACE_SETTLED: &str = "marketplace.settled";
