//! LNURL-pay client.
//!
//! Resolves a seller's payout destination to a payable BOLT11 invoice:
//! fetch the pay-request descriptor (well-known endpoint for `user@domain`
//! addresses, the embedded URL for raw lnurls), check the sendable range,
//! then hit the callback for an invoice at the exact payout amount.
//!
//! LNURL amounts are millisatoshis; the engine works in whole sats and
//! multiplies by 1000 at this boundary.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::marketplace::LightningAddress;
use crate::ports::{LnurlResolver, PayoutError};

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

const MSATS_PER_SAT: u64 = 1_000;

pub struct LnurlClient {
    http: reqwest::Client,
}

impl LnurlClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn fetch_pay_request(&self, url: &str) -> Result<LnurlPayRequest, PayoutError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| PayoutError::Resolve(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PayoutError::Resolve(format!(
                "pay request endpoint returned {}",
                response.status()
            )));
        }

        let descriptor: LnurlPayRequest = response
            .json()
            .await
            .map_err(|e| PayoutError::Resolve(format!("unparseable pay request: {e}")))?;

        if descriptor.tag.as_deref() != Some("payRequest") {
            return Err(PayoutError::Resolve(format!(
                "unexpected LNURL tag {:?}",
                descriptor.tag
            )));
        }

        Ok(descriptor)
    }
}

impl Default for LnurlClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LnurlResolver for LnurlClient {
    async fn fetch_invoice(
        &self,
        address: &LightningAddress,
        amount_sats: u64,
    ) -> Result<String, PayoutError> {
        let url = address
            .lnurlp_url()
            .or_else(|| address.decoded_lnurl())
            .ok_or_else(|| {
                PayoutError::Resolve(format!("no resolvable endpoint for {address}"))
            })?;

        let descriptor = self.fetch_pay_request(&url).await?;

        let amount_msats = amount_sats * MSATS_PER_SAT;
        if amount_msats < descriptor.min_sendable || amount_msats > descriptor.max_sendable {
            return Err(PayoutError::AmountOutOfRange {
                requested_msats: amount_msats,
                min_msats: descriptor.min_sendable,
                max_msats: descriptor.max_sendable,
            });
        }

        let separator = if descriptor.callback.contains('?') {
            '&'
        } else {
            '?'
        };
        let callback_url = format!("{}{}amount={}", descriptor.callback, separator, amount_msats);

        let response = self
            .http
            .get(&callback_url)
            .send()
            .await
            .map_err(|e| PayoutError::Resolve(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PayoutError::Resolve(format!(
                "callback returned {}",
                response.status()
            )));
        }

        let invoice: LnurlCallbackResponse = response
            .json()
            .await
            .map_err(|e| PayoutError::Resolve(format!("unparseable callback response: {e}")))?;

        if let Some(status) = &invoice.status {
            if status.eq_ignore_ascii_case("error") {
                return Err(PayoutError::Resolve(
                    invoice.reason.unwrap_or_else(|| "LNURL error".to_string()),
                ));
            }
        }

        invoice
            .pr
            .ok_or_else(|| PayoutError::Resolve("callback response missing invoice".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct LnurlPayRequest {
    callback: String,
    #[serde(rename = "minSendable")]
    min_sendable: u64,
    #[serde(rename = "maxSendable")]
    max_sendable: u64,
    tag: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LnurlCallbackResponse {
    pr: Option<String>,
    status: Option<String>,
    reason: Option<String>,
}
