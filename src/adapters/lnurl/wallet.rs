//! Platform payout wallets.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::PayoutWalletConfig;
use crate::ports::{NodeWallet, PayoutError, PayoutReceipt};

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// LNbits wallet paying out with the admin key.
pub struct LnbitsWallet {
    config: PayoutWalletConfig,
    http: reqwest::Client,
}

impl LnbitsWallet {
    pub fn new(config: PayoutWalletConfig) -> Self {
        Self {
            config,
            // Lightning payments can take a while to route.
            http: reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl NodeWallet for LnbitsWallet {
    async fn pay_invoice(&self, bolt11: &str) -> Result<PayoutReceipt, PayoutError> {
        let url = format!(
            "{}/api/v1/payments",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .http
            .post(&url)
            .header("X-Api-Key", self.config.admin_key.expose_secret())
            .json(&serde_json::json!({ "out": true, "bolt11": bolt11 }))
            .send()
            .await
            .map_err(|e| PayoutError::Wallet(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(error = %body, "Wallet payment failed");
            return Err(PayoutError::Wallet(body));
        }

        let paid: WalletPaymentResponse = response
            .json()
            .await
            .map_err(|e| PayoutError::Wallet(format!("unparseable payment response: {e}")))?;

        Ok(PayoutReceipt {
            payment_id: paid.payment_hash,
            fee_sats: None,
            paid_at: Utc::now(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WalletPaymentResponse {
    payment_hash: String,
}

/// Dev-only wallet that pretends every payment succeeds.
pub struct MockWallet;

#[async_trait]
impl NodeWallet for MockWallet {
    async fn pay_invoice(&self, bolt11: &str) -> Result<PayoutReceipt, PayoutError> {
        tracing::info!(invoice = %bolt11, "Mock wallet paid invoice");
        Ok(PayoutReceipt {
            payment_id: format!("mock-payout-{}", uuid::Uuid::new_v4().simple()),
            fee_sats: Some(0),
            paid_at: Utc::now(),
        })
    }
}
