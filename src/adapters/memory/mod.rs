//! In-memory adapters.
//!
//! Used by handler tests and by the dev server when no database-backed
//! collaborator is configured (trust graph, payout wallet).

mod billing_store;
mod marketplace_store;
mod payout;
mod trust;

pub use billing_store::InMemoryBillingStore;
pub use marketplace_store::InMemoryMarketplaceStore;
pub use payout::{MockLnurlResolver, RecordingWallet};
pub use trust::{FixedTrustGraph, UnreachableTrustGraph};
