//! Lightning provider adapters and the registry that dispatches to them.

mod btcpay;
mod lnbits;
mod mock;
mod registry;

pub use btcpay::{BtcpayAdapter, ProviderMode};
pub use lnbits::LnbitsAdapter;
pub use mock::MockLightningProvider;
pub use registry::ProviderRegistry;
