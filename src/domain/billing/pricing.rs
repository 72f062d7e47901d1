//! Invoice pricing: tier base price, cycle multiplier, trust discount.

use serde::Serialize;

use super::cycle::BillingCycle;
use super::errors::BillingError;
use super::tier::Tier;

/// Hard cap on the Web-of-Trust discount. Never bypassable by input.
pub const MAX_DISCOUNT_PERCENT: u8 = 50;

/// A fully resolved price for one invoice.
///
/// `amount_usd_cents` is a display figure derived from the independently
/// configured USD price; settlement logic must only use `amount_sats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    /// The tier actually being purchased (may differ from the requested
    /// tier for lifetime purchases).
    pub tier: Tier,
    pub billing_cycle: BillingCycle,
    pub amount_sats: u64,
    pub amount_usd_cents: u64,
    pub discount_percent: u8,
}

/// Computes the price for a subscription invoice.
///
/// - The free tier cannot be invoiced.
/// - A lifetime billing cycle always buys the Lifetime tier, regardless of
///   the tier argument.
/// - `trust_discount_percent` is capped at [`MAX_DISCOUNT_PERCENT`].
///
/// # Errors
///
/// Returns [`BillingError::InvalidTier`] for the free tier.
pub fn quote(
    tier: Tier,
    billing_cycle: BillingCycle,
    trust_discount_percent: u8,
) -> Result<PriceQuote, BillingError> {
    if tier == Tier::Free {
        return Err(BillingError::InvalidTier(
            "free tier cannot be purchased".to_string(),
        ));
    }

    let tier = if billing_cycle == BillingCycle::Lifetime {
        Tier::Lifetime
    } else {
        tier
    };

    let discount_percent = trust_discount_percent.min(MAX_DISCOUNT_PERCENT);
    let entry = tier.catalog_entry();
    let multiplier = billing_cycle.multiplier();

    Ok(PriceQuote {
        tier,
        billing_cycle,
        amount_sats: apply_discount(entry.price_sats * multiplier, discount_percent),
        amount_usd_cents: apply_discount(entry.price_usd_cents * multiplier, discount_percent),
        discount_percent,
    })
}

fn apply_discount(amount: u64, discount_percent: u8) -> u64 {
    (amount as f64 * (1.0 - f64::from(discount_percent) / 100.0)).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pro_monthly_without_discount_is_21000_sats() {
        let quote = quote(Tier::Pro, BillingCycle::Monthly, 0).unwrap();
        assert_eq!(quote.amount_sats, 21_000);
        assert_eq!(quote.amount_usd_cents, 2_100);
        assert_eq!(quote.discount_percent, 0);
    }

    #[test]
    fn trust_discount_of_80_is_capped_at_50() {
        let capped = quote(Tier::Pro, BillingCycle::Monthly, 80).unwrap();
        let fifty = quote(Tier::Pro, BillingCycle::Monthly, 50).unwrap();
        assert_eq!(capped.discount_percent, 50);
        assert_eq!(capped.amount_sats, 10_500);
        assert_eq!(capped.amount_sats, fifty.amount_sats);
    }

    #[test]
    fn annual_pays_ten_monthly_periods() {
        let quote = quote(Tier::Pro, BillingCycle::Annual, 0).unwrap();
        assert_eq!(quote.amount_sats, 210_000);
        assert_eq!(quote.amount_usd_cents, 21_000);
    }

    #[test]
    fn free_tier_is_rejected() {
        assert!(matches!(
            quote(Tier::Free, BillingCycle::Monthly, 0),
            Err(BillingError::InvalidTier(_))
        ));
    }

    #[test]
    fn lifetime_cycle_resolves_to_lifetime_tier() {
        let quote = quote(Tier::Pro, BillingCycle::Lifetime, 0).unwrap();
        assert_eq!(quote.tier, Tier::Lifetime);
        assert_eq!(quote.amount_sats, Tier::Lifetime.catalog_entry().price_sats);
    }

    #[test]
    fn discount_applies_to_both_currencies() {
        let quote = quote(Tier::Pro, BillingCycle::Annual, 25).unwrap();
        assert_eq!(quote.amount_sats, 157_500);
        assert_eq!(quote.amount_usd_cents, 15_750);
    }

    proptest! {
        #[test]
        fn discount_never_exceeds_half_price(discount in 0u8..=255) {
            let full = quote(Tier::Pro, BillingCycle::Monthly, 0).unwrap();
            let discounted = quote(Tier::Pro, BillingCycle::Monthly, discount).unwrap();
            prop_assert!(discounted.amount_sats * 2 >= full.amount_sats);
            prop_assert!(discounted.discount_percent <= MAX_DISCOUNT_PERCENT);
        }
    }
}
