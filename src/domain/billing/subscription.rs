//! Subscription records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Pubkey, SubscriptionId};

use super::cycle::BillingCycle;
use super::tier::Tier;

/// A user's subscription. Mutated only by the billing confirmation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: SubscriptionId,
    pub user: Pubkey,
    pub tier: Tier,
    pub expires_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl SubscriptionRecord {
    /// A fresh free-tier subscription with no expiry.
    pub fn free(user: Pubkey) -> Self {
        Self {
            id: SubscriptionId::new(),
            user,
            tier: Tier::Free,
            expires_at: None,
            cancelled_at: None,
        }
    }

    /// Applies a confirmed payment: sets the tier, extends expiry off
    /// `max(now, current_expiry)`, and un-cancels. A renewal always clears
    /// any pending cancellation.
    pub fn apply_payment(&mut self, tier: Tier, cycle: BillingCycle, now: DateTime<Utc>) {
        self.tier = tier;
        self.expires_at = Some(cycle.extend_expiry(self.expires_at, now));
        self.cancelled_at = None;
    }

    /// Whether the subscription currently grants its tier's benefits.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expiry) => expiry > now,
            None => self.tier == Tier::Free,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn free_subscription_is_active_without_expiry() {
        let sub = SubscriptionRecord::free(Pubkey::new("ab").unwrap());
        assert!(sub.is_active(Utc::now()));
    }

    #[test]
    fn apply_payment_sets_tier_and_expiry() {
        let now = Utc::now();
        let mut sub = SubscriptionRecord::free(Pubkey::new("ab").unwrap());
        sub.apply_payment(Tier::Pro, BillingCycle::Monthly, now);

        assert_eq!(sub.tier, Tier::Pro);
        assert_eq!(sub.expires_at, Some(now + Duration::days(30)));
        assert!(sub.is_active(now));
    }

    #[test]
    fn renewal_clears_cancellation() {
        let now = Utc::now();
        let mut sub = SubscriptionRecord::free(Pubkey::new("ab").unwrap());
        sub.cancelled_at = Some(now - Duration::days(1));
        sub.apply_payment(Tier::Pro, BillingCycle::Monthly, now);
        assert!(sub.cancelled_at.is_none());
    }

    #[test]
    fn early_renewal_stacks_on_current_expiry() {
        let now = Utc::now();
        let mut sub = SubscriptionRecord::free(Pubkey::new("ab").unwrap());
        sub.apply_payment(Tier::Pro, BillingCycle::Monthly, now);
        sub.apply_payment(Tier::Pro, BillingCycle::Monthly, now + Duration::days(5));

        // 30 days from the first expiry, not from day 5.
        assert_eq!(sub.expires_at, Some(now + Duration::days(60)));
    }

    #[test]
    fn expired_subscription_is_inactive() {
        let now = Utc::now();
        let mut sub = SubscriptionRecord::free(Pubkey::new("ab").unwrap());
        sub.apply_payment(Tier::Pro, BillingCycle::Monthly, now - Duration::days(90));
        assert!(!sub.is_active(now));
    }
}
