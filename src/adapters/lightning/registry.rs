//! Provider registry.
//!
//! Holds one adapter per registered [`ProviderType`] and resolves which
//! one serves a given request:
//!
//! 1. an explicitly requested provider, if registered;
//! 2. the configured default, if registered;
//! 3. the first registered provider in the fixed preference order.
//!
//! An empty registry resolves to `NoProviderConfigured` at call time; the
//! engine still boots so non-payment surfaces keep working.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::PaymentConfig;
use crate::domain::foundation::ProviderType;
use crate::ports::{LightningProvider, PaymentEvent, ProviderError};

use super::btcpay::BtcpayAdapter;
use super::lnbits::LnbitsAdapter;

pub struct ProviderRegistry {
    providers: BTreeMap<ProviderType, Arc<dyn LightningProvider>>,
    default_provider: Option<ProviderType>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: BTreeMap::new(),
            default_provider: None,
        }
    }

    /// Builds the registry from configuration.
    ///
    /// A provider section with live credentials registers a live adapter;
    /// a section without credentials registers the same adapter in mock
    /// mode. No section, no registration.
    pub fn from_config(config: &PaymentConfig) -> Self {
        let mut registry = Self::new();

        if let Some(btcpay) = &config.btcpay {
            let adapter: Arc<dyn LightningProvider> = if btcpay.has_credentials() {
                Arc::new(BtcpayAdapter::live(btcpay.clone()))
            } else {
                tracing::info!("BTCPay credentials absent, registering mock adapter");
                Arc::new(BtcpayAdapter::mock())
            };
            registry = registry.register(adapter);
        }

        if let Some(lnbits) = &config.lnbits {
            let adapter: Arc<dyn LightningProvider> = if lnbits.has_credentials() {
                Arc::new(LnbitsAdapter::live(lnbits.clone()))
            } else {
                tracing::info!("LNbits credentials absent, registering mock adapter");
                Arc::new(LnbitsAdapter::mock())
            };
            registry = registry.register(adapter);
        }

        if let Some(default) = config
            .default_provider
            .as_deref()
            .and_then(ProviderType::parse)
        {
            registry = registry.with_default(default);
        }

        registry
    }

    pub fn register(mut self, provider: Arc<dyn LightningProvider>) -> Self {
        self.providers.insert(provider.provider_type(), provider);
        self
    }

    /// Sets the preferred provider. Ignored at resolution time if that
    /// provider is not actually registered.
    pub fn with_default(mut self, provider: ProviderType) -> Self {
        self.default_provider = Some(provider);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Resolves the provider for an outbound operation.
    pub fn resolve(
        &self,
        requested: Option<ProviderType>,
    ) -> Result<Arc<dyn LightningProvider>, ProviderError> {
        if let Some(requested) = requested {
            return self
                .providers
                .get(&requested)
                .cloned()
                .ok_or(ProviderError::NoProviderConfigured);
        }

        if let Some(default) = self.default_provider {
            if let Some(provider) = self.providers.get(&default) {
                return Ok(provider.clone());
            }
        }

        for candidate in ProviderType::PREFERENCE_ORDER {
            if let Some(provider) = self.providers.get(&candidate) {
                return Ok(provider.clone());
            }
        }

        Err(ProviderError::NoProviderConfigured)
    }

    /// Fetches a specific registered provider.
    pub fn get(&self, provider: ProviderType) -> Option<Arc<dyn LightningProvider>> {
        self.providers.get(&provider).cloned()
    }

    /// Identifies which registered provider a webhook payload belongs to
    /// when the transport carried no explicit hint. Providers are asked in
    /// preference order; the first one whose parser recognizes the payload
    /// wins.
    pub fn identify_webhook(
        &self,
        payload: &[u8],
    ) -> Option<(Arc<dyn LightningProvider>, PaymentEvent)> {
        for candidate in ProviderType::PREFERENCE_ORDER {
            if let Some(provider) = self.providers.get(&candidate) {
                if let Some(event) = provider.parse_webhook_event(payload) {
                    return Some((provider.clone(), event));
                }
            }
        }
        None
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
