//! Shared domain foundation: errors, identifiers, auth context.

mod auth;
mod errors;
mod ids;
mod provider;

pub use auth::{AuthError, AuthenticatedUser};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{
    AuctionId, ListingId, PaymentId, Pubkey, SubscriptionId, TransactionId, TransferId,
};
pub use provider::ProviderType;
