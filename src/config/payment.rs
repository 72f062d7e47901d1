//! Payment configuration (Lightning providers, fees, payout wallet)

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Payment configuration.
///
/// Each provider section is optional; a provider with no section is simply
/// not registered. A provider section with credentials runs live, one
/// without runs in deterministic mock mode (synthetic invoices) so the rest
/// of the engine stays exercisable without a Lightning node.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// BTCPay Server (Greenfield API) backend
    pub btcpay: Option<BtcpayConfig>,

    /// LNbits backend
    pub lnbits: Option<LnbitsConfig>,

    /// Preferred provider when the caller does not name one
    /// ("btcpay" or "lnbits")
    pub default_provider: Option<String>,

    /// Marketplace platform fee in basis points (500 = 5%)
    #[serde(default = "default_fee_bps")]
    pub marketplace_fee_bps: u32,

    /// Provider invoice expiry in seconds
    #[serde(default = "default_invoice_expiry")]
    pub invoice_expiry_secs: u64,

    /// Raw web-of-trust discount granted to every user, in percent.
    /// Absent or zero disables the discount path entirely.
    pub wot_discount_percent: Option<u8>,

    /// Platform wallet used to pay sellers. Absent means payouts run
    /// against a mock wallet (dev-only)
    pub payout_wallet: Option<PayoutWalletConfig>,
}

/// LNbits wallet used for outbound seller payouts.
#[derive(Debug, Clone, Deserialize)]
pub struct PayoutWalletConfig {
    #[serde(default = "default_lnbits_url")]
    pub base_url: String,

    /// Admin key; the invoice key cannot send
    pub admin_key: SecretString,
}

/// BTCPay Server connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BtcpayConfig {
    #[serde(default = "default_btcpay_url")]
    pub base_url: String,

    /// Greenfield API key; empty means mock mode is forced
    #[serde(default = "default_empty_secret")]
    pub api_key: SecretString,

    #[serde(default)]
    pub store_id: String,

    /// Webhook HMAC secret; absent means unsigned webhooks are accepted
    /// (dev-only weak mode)
    pub webhook_secret: Option<SecretString>,
}

/// LNbits connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LnbitsConfig {
    #[serde(default = "default_lnbits_url")]
    pub base_url: String,

    /// Invoice/read API key; empty means mock mode is forced
    #[serde(default = "default_empty_secret")]
    pub api_key: SecretString,

    /// Webhook HMAC secret; absent means unsigned webhooks are accepted
    /// (dev-only weak mode)
    pub webhook_secret: Option<SecretString>,
}

impl BtcpayConfig {
    /// True when live Greenfield credentials are present.
    pub fn has_credentials(&self) -> bool {
        !self.api_key.expose_secret().is_empty() && !self.store_id.is_empty()
    }
}

impl LnbitsConfig {
    /// True when a live API key is present.
    pub fn has_credentials(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            btcpay: None,
            lnbits: None,
            default_provider: None,
            marketplace_fee_bps: default_fee_bps(),
            invoice_expiry_secs: default_invoice_expiry(),
            wot_discount_percent: None,
            payout_wallet: None,
        }
    }
}

impl PaymentConfig {
    /// Validate payment configuration.
    ///
    /// In production an enabled provider must carry a webhook secret;
    /// the unsigned weak mode is development-only.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if let Some(provider) = &self.default_provider {
            if provider != "btcpay" && provider != "lnbits" {
                return Err(ValidationError::UnknownProvider(provider.clone()));
            }
        }
        if self.marketplace_fee_bps >= 10_000 {
            return Err(ValidationError::FeeOutOfRange(self.marketplace_fee_bps));
        }
        if *environment == Environment::Production {
            if let Some(btcpay) = &self.btcpay {
                if btcpay.webhook_secret.is_none() {
                    return Err(ValidationError::UnsignedWebhooksInProduction("btcpay"));
                }
            }
            if let Some(lnbits) = &self.lnbits {
                if lnbits.webhook_secret.is_none() {
                    return Err(ValidationError::UnsignedWebhooksInProduction("lnbits"));
                }
            }
        }
        Ok(())
    }
}

fn default_empty_secret() -> SecretString {
    SecretString::new(String::new())
}

fn default_fee_bps() -> u32 {
    500
}

fn default_invoice_expiry() -> u64 {
    600
}

fn default_btcpay_url() -> String {
    "https://btcpay.localhost".to_string()
}

fn default_lnbits_url() -> String {
    "https://legend.lnbits.com".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btcpay(secret: Option<&str>) -> BtcpayConfig {
        BtcpayConfig {
            base_url: default_btcpay_url(),
            api_key: SecretString::new("token".to_string()),
            store_id: "store1".to_string(),
            webhook_secret: secret.map(|s| SecretString::new(s.to_string())),
        }
    }

    #[test]
    fn empty_config_is_valid_in_development() {
        let config = PaymentConfig::default();
        assert!(config.validate(&Environment::Development).is_ok());
    }

    #[test]
    fn unknown_default_provider_is_rejected() {
        let config = PaymentConfig {
            default_provider: Some("opennode".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(&Environment::Development),
            Err(ValidationError::UnknownProvider(_))
        ));
    }

    #[test]
    fn fee_of_100_percent_is_rejected() {
        let config = PaymentConfig {
            marketplace_fee_bps: 10_000,
            ..Default::default()
        };
        assert!(config.validate(&Environment::Development).is_err());
    }

    #[test]
    fn production_requires_webhook_secret() {
        let config = PaymentConfig {
            btcpay: Some(btcpay(None)),
            ..Default::default()
        };
        assert!(config.validate(&Environment::Development).is_ok());
        assert!(matches!(
            config.validate(&Environment::Production),
            Err(ValidationError::UnsignedWebhooksInProduction("btcpay"))
        ));
    }

    #[test]
    fn production_accepts_signed_provider() {
        let config = PaymentConfig {
            btcpay: Some(btcpay(Some("whsec"))),
            ..Default::default()
        };
        assert!(config.validate(&Environment::Production).is_ok());
    }
}
