//! Billing cycles and expiry arithmetic.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How often a subscription is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Annual,
    Lifetime,
}

/// Annual billing charges 10 monthly periods for 12 months of service.
/// The "2 months free" is baked into this multiplier, not a discount.
const ANNUAL_MULTIPLIER: u64 = 10;

impl BillingCycle {
    /// Price multiplier applied to the tier's monthly base price.
    pub fn multiplier(&self) -> u64 {
        match self {
            BillingCycle::Monthly | BillingCycle::Lifetime => 1,
            BillingCycle::Annual => ANNUAL_MULTIPLIER,
        }
    }

    /// Computes the new expiry when a payment for this cycle confirms.
    ///
    /// Extension always bases off `max(now, current_expiry)`: renewing early
    /// extends from the future expiry, renewing a lapsed subscription
    /// extends from now. Lifetime is "forever" expressed as a far-future
    /// timestamp so expiry comparisons stay uniform (no sentinel null).
    pub fn extend_expiry(
        &self,
        current_expiry: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        match self {
            BillingCycle::Lifetime => now + Duration::days(365 * 100),
            BillingCycle::Annual => base_expiry(current_expiry, now) + Duration::days(365),
            BillingCycle::Monthly => base_expiry(current_expiry, now) + Duration::days(30),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "monthly" => Some(BillingCycle::Monthly),
            "annual" => Some(BillingCycle::Annual),
            "lifetime" => Some(BillingCycle::Lifetime),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Annual => "annual",
            BillingCycle::Lifetime => "lifetime",
        }
    }
}

fn base_expiry(current_expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match current_expiry {
        Some(expiry) if expiry > now => expiry,
        _ => now,
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
