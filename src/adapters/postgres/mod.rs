//! PostgreSQL persistence adapters.

mod billing_store;
mod marketplace_store;

pub use billing_store::PostgresBillingStore;
pub use marketplace_store::PostgresMarketplaceStore;
