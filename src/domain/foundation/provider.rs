//! Lightning payment backend tags.
//!
//! A closed set of tagged variants instead of duck-typed runtime dispatch;
//! the provider registry maps each tag to one implementation.

use serde::{Deserialize, Serialize};

/// The payment backends the engine knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// BTCPay Server (Greenfield API).
    Btcpay,

    /// LNbits.
    Lnbits,
}

impl ProviderType {
    /// Registry fallback order when no default is configured.
    pub const PREFERENCE_ORDER: [ProviderType; 2] = [ProviderType::Btcpay, ProviderType::Lnbits];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Btcpay => "btcpay",
            ProviderType::Lnbits => "lnbits",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "btcpay" => Some(ProviderType::Btcpay),
            "lnbits" => Some(ProviderType::Lnbits),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown provider: {s}"))
    }
}
