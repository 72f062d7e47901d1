//! Payout doubles: LNURL resolver and wallet with scriptable failures.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::marketplace::LightningAddress;
use crate::ports::{LnurlResolver, NodeWallet, PayoutError, PayoutReceipt};

/// Resolves every address to a canned invoice, or fails every request.
pub struct MockLnurlResolver {
    failure: Option<PayoutError>,
    requests: Mutex<Vec<(String, u64)>>,
}

impl MockLnurlResolver {
    pub fn new() -> Self {
        Self {
            failure: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: PayoutError) -> Self {
        Self {
            failure: Some(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Addresses and amounts the handler resolved, in order.
    pub fn requests(&self) -> Vec<(String, u64)> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockLnurlResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LnurlResolver for MockLnurlResolver {
    async fn fetch_invoice(
        &self,
        address: &LightningAddress,
        amount_sats: u64,
    ) -> Result<String, PayoutError> {
        self.requests
            .lock()
            .unwrap()
            .push((address.as_str().to_string(), amount_sats));

        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        Ok(format!("lnbc{amount_sats}resolved"))
    }
}

/// Wallet double; records paid invoices, optionally fails.
pub struct RecordingWallet {
    failure: Option<PayoutError>,
    payments: Mutex<Vec<String>>,
}

impl RecordingWallet {
    pub fn new() -> Self {
        Self {
            failure: None,
            payments: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: PayoutError) -> Self {
        Self {
            failure: Some(error),
            payments: Mutex::new(Vec::new()),
        }
    }

    pub fn payments(&self) -> Vec<String> {
        self.payments.lock().unwrap().clone()
    }
}

impl Default for RecordingWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeWallet for RecordingWallet {
    async fn pay_invoice(&self, bolt11: &str) -> Result<PayoutReceipt, PayoutError> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        self.payments.lock().unwrap().push(bolt11.to_string());
        Ok(PayoutReceipt {
            payment_id: format!("paid:{bolt11}"),
            fee_sats: Some(1),
            paid_at: Utc::now(),
        })
    }
}
