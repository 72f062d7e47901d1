//! Subscription tier catalog.
//!
//! The catalog is static and compiled into the service; prices charged to a
//! user are snapshotted onto the payment record at invoice creation, so a
//! later catalog change can never retroactively alter what a pending invoice
//! is worth.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Free tier - a single identity, no paid capabilities.
    Free,

    /// Pro tier - the standard paid subscription.
    Pro,

    /// Lifetime tier - one-time purchase, never expires.
    Lifetime,
}

impl Tier {
    /// Returns true if this tier is a paid tier.
    pub fn is_paid(&self) -> bool {
        !matches!(self, Tier::Free)
    }

    /// Returns the display name for this tier.
    pub fn display_name(&self) -> &'static str {
        match self {
            Tier::Free => "Free",
            Tier::Pro => "Pro",
            Tier::Lifetime => "Lifetime",
        }
    }

    /// Catalog entry for this tier.
    pub fn catalog_entry(&self) -> &'static TierCatalogEntry {
        TIER_CATALOG
            .iter()
            .find(|entry| entry.tier == *self)
            .expect("every tier has a catalog entry")
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "free" => Some(Tier::Free),
            "pro" => Some(Tier::Pro),
            "lifetime" => Some(Tier::Lifetime),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Lifetime => "lifetime",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Static catalog entry describing what a tier costs and unlocks.
#[derive(Debug, Clone, Serialize)]
pub struct TierCatalogEntry {
    pub tier: Tier,
    pub display_name: &'static str,

    /// Monthly base price in USD cents (display figure only).
    pub price_usd_cents: u64,

    /// Monthly base price in sats (the settlement figure).
    pub price_sats: u64,

    pub features: &'static [&'static str],

    /// How many platform identities the tier may hold.
    pub identity_limit: u32,

    /// Whether the tier can list assets on the marketplace.
    pub can_sell: bool,

    /// Whether the tier unlocks custom identity domains.
    pub custom_domains: bool,

    pub is_lifetime: bool,
}

/// The complete tier catalog.
pub static TIER_CATALOG: Lazy<Vec<TierCatalogEntry>> = Lazy::new(|| {
    vec![
        TierCatalogEntry {
            tier: Tier::Free,
            display_name: "Free",
            price_usd_cents: 0,
            price_sats: 0,
            features: &["1 identity", "Public profile"],
            identity_limit: 1,
            can_sell: false,
            custom_domains: false,
            is_lifetime: false,
        },
        TierCatalogEntry {
            tier: Tier::Pro,
            display_name: "Pro",
            price_usd_cents: 2_100,
            price_sats: 21_000,
            features: &[
                "5 identities",
                "Marketplace selling",
                "Custom domains",
                "Priority support",
            ],
            identity_limit: 5,
            can_sell: true,
            custom_domains: true,
            is_lifetime: false,
        },
        TierCatalogEntry {
            tier: Tier::Lifetime,
            display_name: "Lifetime",
            price_usd_cents: 21_000,
            price_sats: 210_000,
            features: &[
                "10 identities",
                "Marketplace selling",
                "Custom domains",
                "Priority support",
                "Never expires",
            ],
            identity_limit: 10,
            can_sell: true,
            custom_domains: true,
            is_lifetime: true,
        },
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tier_has_a_catalog_entry() {
        for tier in [Tier::Free, Tier::Pro, Tier::Lifetime] {
            assert_eq!(tier.catalog_entry().tier, tier);
        }
    }

    #[test]
    fn free_tier_is_not_paid() {
        assert!(!Tier::Free.is_paid());
        assert!(Tier::Pro.is_paid());
        assert!(Tier::Lifetime.is_paid());
    }

    #[test]
    fn pro_monthly_base_price_is_21000_sats() {
        assert_eq!(Tier::Pro.catalog_entry().price_sats, 21_000);
    }

    #[test]
    fn only_lifetime_is_lifetime() {
        assert!(Tier::Lifetime.catalog_entry().is_lifetime);
        assert!(!Tier::Pro.catalog_entry().is_lifetime);
        assert!(!Tier::Free.catalog_entry().is_lifetime);
    }

    #[test]
    fn tier_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Tier::Pro).unwrap(), "\"pro\"");
    }

    #[test]
    fn tier_parse_roundtrips() {
        for tier in [Tier::Free, Tier::Pro, Tier::Lifetime] {
            assert_eq!(Tier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(Tier::parse("platinum"), None);
    }
}
