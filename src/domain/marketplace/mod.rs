//! Marketplace split-settlement domain.
//!
//! Fee splits, transactions, settlement transfers, and payout destinations.

mod errors;
mod lightning_address;
mod listing;
mod split;
mod transaction;
mod transfer;

pub use errors::SettlementError;
pub use lightning_address::LightningAddress;
pub use listing::{Auction, AuctionStatus, Listing, ListingStatus};
pub use split::{calculate_split, FeeSplit};
pub use transaction::{
    MarketplaceTransaction, PayoutStatus, SourceType, TransactionStatus,
};
pub use transfer::{EscrowStatus, TransferRecord, TransferStatus};
