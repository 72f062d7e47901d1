//! Payment records and their status state machine.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PaymentId, ProviderType, Pubkey, SubscriptionId};

use super::cycle::BillingCycle;
use super::pricing::PriceQuote;
use super::tier::Tier;

/// The only supported payment method.
pub const PAYMENT_METHOD: &str = "lightning";

/// A pending invoice stays claimable for this long before the local
/// wall-clock backstop force-expires it, independent of provider callbacks.
pub const INVOICE_TTL_MINUTES: i64 = 10;

/// Payment lifecycle state.
///
/// The status is monotonic: every non-pending state is terminal, and once
/// terminal a record is never mutated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Expired,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            "expired" => Some(PaymentStatus::Expired),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// A subscription payment, created at invoice issuance and mutated exactly
/// once at confirmation (or expiry). Never deleted: financial audit trail.
///
/// Tier, cycle, and discount are snapshotted here at issuance so later
/// catalog changes cannot alter what a pending invoice is worth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub subscription_id: Option<SubscriptionId>,
    pub user: Pubkey,
    pub amount_sats: u64,
    pub amount_usd_cents: u64,
    pub invoice: String,
    pub payment_hash: Option<String>,
    pub provider: ProviderType,
    pub provider_invoice_id: String,
    pub status: PaymentStatus,
    pub receipt_number: Option<String>,
    pub tier: Tier,
    pub billing_cycle: BillingCycle,
    pub discount_percent: u8,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentRecord {
    /// Creates a pending payment from a resolved quote and provider invoice.
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        id: PaymentId,
        user: Pubkey,
        quote: &PriceQuote,
        provider: ProviderType,
        provider_invoice_id: String,
        invoice: String,
        payment_hash: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            subscription_id: None,
            user,
            amount_sats: quote.amount_sats,
            amount_usd_cents: quote.amount_usd_cents,
            invoice,
            payment_hash,
            provider,
            provider_invoice_id,
            status: PaymentStatus::Pending,
            receipt_number: None,
            tier: quote.tier,
            billing_cycle: quote.billing_cycle,
            discount_percent: quote.discount_percent,
            created_at: now,
            paid_at: None,
        }
    }

    /// Whether the local wall-clock expiry backstop has elapsed.
    pub fn is_locally_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentStatus::Pending
            && now - self.created_at > Duration::minutes(INVOICE_TTL_MINUTES)
    }
}
