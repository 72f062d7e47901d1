//! Ports: the traits the application layer depends on.
//!
//! Adapters implement these; handlers hold them as `Arc<dyn Trait>`.
//! Ports may reference domain types, never the other way around.

pub mod billing_store;
pub mod lightning_provider;
pub mod marketplace_store;
pub mod payout;
pub mod session_validator;
pub mod trust_graph;

pub use billing_store::{BillingStore, ConfirmOutcome};
pub use lightning_provider::{
    CreatedInvoice, InvoiceRequest, InvoiceState, InvoiceStatus, LightningProvider, PaymentEvent,
    ProviderError,
};
pub use marketplace_store::{ClaimOutcome, MarketplaceStore};
pub use payout::{LnurlResolver, NodeWallet, PayoutError, PayoutReceipt};
pub use session_validator::SessionValidator;
pub use trust_graph::TrustGraph;
