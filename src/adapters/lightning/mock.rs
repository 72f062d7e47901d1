//! Scripted Lightning provider for handler tests.
//!
//! Unlike the mock *mode* of the real adapters (deterministic, no
//! scripting), this double lets a test queue specific outcomes and then
//! inspect what the handler asked for.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::foundation::ProviderType;
use crate::ports::{
    CreatedInvoice, InvoiceRequest, InvoiceState, InvoiceStatus, LightningProvider, PaymentEvent,
    ProviderError,
};

pub struct MockLightningProvider {
    provider: ProviderType,
    create_results: Mutex<VecDeque<Result<CreatedInvoice, ProviderError>>>,
    status_results: Mutex<VecDeque<Result<InvoiceStatus, ProviderError>>>,
    create_requests: Mutex<Vec<InvoiceRequest>>,
    status_requests: Mutex<Vec<String>>,
    reject_signatures: bool,
}

impl MockLightningProvider {
    pub fn new(provider: ProviderType) -> Self {
        Self {
            provider,
            create_results: Mutex::new(VecDeque::new()),
            status_results: Mutex::new(VecDeque::new()),
            create_requests: Mutex::new(Vec::new()),
            status_requests: Mutex::new(Vec::new()),
            reject_signatures: false,
        }
    }

    pub fn with_invoice(self, invoice: CreatedInvoice) -> Self {
        self.create_results
            .lock()
            .unwrap()
            .push_back(Ok(invoice));
        self
    }

    pub fn with_create_error(self, error: ProviderError) -> Self {
        self.create_results
            .lock()
            .unwrap()
            .push_back(Err(error));
        self
    }

    pub fn with_status(self, status: InvoiceStatus) -> Self {
        self.status_results
            .lock()
            .unwrap()
            .push_back(Ok(status));
        self
    }

    pub fn with_status_error(self, error: ProviderError) -> Self {
        self.status_results
            .lock()
            .unwrap()
            .push_back(Err(error));
        self
    }

    pub fn rejecting_signatures(mut self) -> Self {
        self.reject_signatures = true;
        self
    }

    /// Invoice requests the handler under test issued, in order.
    pub fn create_requests(&self) -> Vec<InvoiceRequest> {
        self.create_requests.lock().unwrap().clone()
    }

    /// Invoice ids the handler polled, in order.
    pub fn status_requests(&self) -> Vec<String> {
        self.status_requests.lock().unwrap().clone()
    }

    fn default_invoice(&self, req: &InvoiceRequest) -> CreatedInvoice {
        CreatedInvoice {
            provider: self.provider,
            provider_invoice_id: format!("scripted-{}", self.provider),
            payment_hash: Some("00".repeat(32)),
            bolt11: format!("lnbc{}scripted", req.amount_sats),
            expires_at: Some(Utc::now() + chrono::Duration::seconds(600)),
        }
    }
}

#[async_trait]
impl LightningProvider for MockLightningProvider {
    fn provider_type(&self) -> ProviderType {
        self.provider
    }

    async fn create_invoice(&self, req: &InvoiceRequest) -> Result<CreatedInvoice, ProviderError> {
        self.create_requests.lock().unwrap().push(req.clone());
        match self.create_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(self.default_invoice(req)),
        }
    }

    async fn get_invoice_status(
        &self,
        provider_invoice_id: &str,
        _payment_hash: Option<&str>,
    ) -> Result<InvoiceStatus, ProviderError> {
        self.status_requests
            .lock()
            .unwrap()
            .push(provider_invoice_id.to_string());
        match self.status_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(InvoiceStatus::pending()),
        }
    }

    fn parse_webhook_event(&self, payload: &[u8]) -> Option<PaymentEvent> {
        let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
        if value.get("mock_provider")?.as_str()? != self.provider.as_str() {
            return None;
        }
        Some(PaymentEvent {
            provider: self.provider,
            provider_invoice_id: value
                .get("invoice_id")
                .and_then(|v| v.as_str())
                .map(String::from),
            payment_hash: value
                .get("payment_hash")
                .and_then(|v| v.as_str())
                .map(String::from),
            state: match value.get("state").and_then(|v| v.as_str()) {
                Some("paid") => InvoiceState::Paid,
                Some("expired") => InvoiceState::Expired,
                Some("failed") => InvoiceState::Failed,
                _ => InvoiceState::Pending,
            },
        })
    }

    fn verify_webhook_signature(
        &self,
        _payload: &[u8],
        _signature: Option<&str>,
    ) -> Result<(), ProviderError> {
        if self.reject_signatures {
            return Err(ProviderError::InvalidSignature {
                provider: self.provider,
            });
        }
        Ok(())
    }
}
