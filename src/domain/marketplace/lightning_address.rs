//! Lightning payout destinations.
//!
//! A seller's payout destination is either a Lightning address
//! (`user@domain`, resolved via the LNURL-pay well-known endpoint) or a raw
//! bech32-encoded `lnurl1...` string. Validation happens when a marketplace
//! invoice is created, not when the payout finally runs: an invoice with no
//! viable payout destination is refused up front.

use serde::{Deserialize, Serialize};

use super::errors::SettlementError;

/// A syntactically valid Lightning payout destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LightningAddress(String);

impl LightningAddress {
    /// Parses and validates a payout destination.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidLightningAddress`] for anything
    /// that is neither `user@domain` nor a decodable `lnurl1...` string.
    pub fn parse(value: &str) -> Result<Self, SettlementError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(SettlementError::InvalidLightningAddress(
                "empty address".to_string(),
            ));
        }

        let lower = value.to_lowercase();
        if lower.starts_with("lnurl1") {
            bech32::decode(&lower).map_err(|e| {
                SettlementError::InvalidLightningAddress(format!("bad lnurl encoding: {e}"))
            })?;
            return Ok(Self(lower));
        }

        if is_valid_internet_identifier(value) {
            return Ok(Self(lower));
        }

        Err(SettlementError::InvalidLightningAddress(format!(
            "expected user@domain or lnurl1..., got '{value}'"
        )))
    }

    /// The LNURL-pay endpoint this address resolves to, when it is an
    /// internet identifier. Raw lnurl strings carry their own URL.
    pub fn lnurlp_url(&self) -> Option<String> {
        let (user, domain) = self.0.split_once('@')?;
        Some(format!("https://{domain}/.well-known/lnurlp/{user}"))
    }

    /// The raw lnurl payload when this is a bech32 lnurl, decoded to its
    /// embedded URL.
    pub fn decoded_lnurl(&self) -> Option<String> {
        if !self.0.starts_with("lnurl1") {
            return None;
        }
        let (_hrp, data) = bech32::decode(&self.0).ok()?;
        String::from_utf8(data).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_valid_internet_identifier(value: &str) -> bool {
    let Some((user, domain)) = value.split_once('@') else {
        return false;
    };
    if user.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    let user_ok = user
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+'));
    let domain_ok = domain.contains('.')
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'));
    user_ok && domain_ok
}

impl std::fmt::Display for LightningAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internet_identifier_is_accepted() {
        let addr = LightningAddress::parse("alice@getalby.com").unwrap();
        assert_eq!(addr.as_str(), "alice@getalby.com");
        assert_eq!(
            addr.lnurlp_url().unwrap(),
            "https://getalby.com/.well-known/lnurlp/alice"
        );
    }

    #[test]
    fn address_is_lowercased() {
        let addr = LightningAddress::parse("Alice@GetAlby.com").unwrap();
        assert_eq!(addr.as_str(), "alice@getalby.com");
    }

    #[test]
    fn bech32_lnurl_is_accepted_and_decodes() {
        // bech32 encoding of "https://x.io/p" with hrp "lnurl"
        let encoded = bech32::encode::<bech32::Bech32>(
            bech32::Hrp::parse("lnurl").unwrap(),
            b"https://x.io/p",
        )
        .unwrap();
        let addr = LightningAddress::parse(&encoded).unwrap();
        assert_eq!(addr.decoded_lnurl().as_deref(), Some("https://x.io/p"));
        assert!(addr.lnurlp_url().is_none());
    }

    #[test]
    fn garbage_is_rejected() {
        for bad in ["", "no-at-sign", "@domain.com", "user@", "a@b@c.com", "lnurl1notbech32!"] {
            assert!(
                LightningAddress::parse(bad).is_err(),
                "should reject {bad:?}"
            );
        }
    }

    #[test]
    fn domain_without_dot_is_rejected() {
        assert!(LightningAddress::parse("user@localhost").is_err());
    }
}
