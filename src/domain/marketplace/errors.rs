//! Marketplace settlement error types.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Errors from the split-settlement service.
#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Fee must be below 100% (got {0} bps)")]
    InvalidFee(u32),

    #[error("Invalid Lightning address: {0}")]
    InvalidLightningAddress(String),

    #[error("Listing not found: {0}")]
    ListingNotFound(String),

    #[error("Auction not found: {0}")]
    AuctionNotFound(String),

    #[error("Listing is not active")]
    ListingNotActive,

    /// The caller is not the auction's highest bidder.
    #[error("Caller is not the winning bidder")]
    NotWinner,

    /// Seller has no payout destination on file. The buyer has already
    /// paid, so this must surface as an operational alert.
    #[error("Seller has no Lightning address on file")]
    MissingPayoutDestination,

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// The transaction is in a state from which it cannot be settled.
    #[error("Transaction is in an invalid state to settle: {0}")]
    InvalidTransactionState(String),

    /// The provider tag was not recognized.
    #[error("Unknown payment provider: {0}")]
    InvalidProvider(String),

    /// No Lightning provider is configured. Configuration fault, not retried.
    #[error("No payment provider configured")]
    NoProviderConfigured,

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Invalid webhook signature")]
    SignatureInvalid,

    /// Seller payout failed after the buyer's payment was captured. The
    /// transaction stays `paid` and an operator retries explicitly.
    #[error("Seller payout failed: {0}")]
    PayoutFailed(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(String),
}

impl SettlementError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            SettlementError::InvalidAmount(_) => ErrorCode::ValidationFailed,
            SettlementError::InvalidFee(_) => ErrorCode::InvalidFee,
            SettlementError::InvalidLightningAddress(_) => ErrorCode::InvalidLightningAddress,
            SettlementError::ListingNotFound(_) => ErrorCode::ListingNotFound,
            SettlementError::AuctionNotFound(_) => ErrorCode::AuctionNotFound,
            SettlementError::ListingNotActive => ErrorCode::StateConflict,
            SettlementError::NotWinner => ErrorCode::NotWinner,
            SettlementError::MissingPayoutDestination => ErrorCode::MissingPayoutDestination,
            SettlementError::TransactionNotFound(_) => ErrorCode::TransactionNotFound,
            SettlementError::InvalidTransactionState(_) => ErrorCode::StateConflict,
            SettlementError::InvalidProvider(_) => ErrorCode::ValidationFailed,
            SettlementError::NoProviderConfigured => ErrorCode::NoProviderConfigured,
            SettlementError::Provider(_) => ErrorCode::ProviderUnavailable,
            SettlementError::SignatureInvalid => ErrorCode::SignatureInvalid,
            SettlementError::PayoutFailed(_) => ErrorCode::PayoutFailed,
            SettlementError::Forbidden => ErrorCode::Forbidden,
            SettlementError::Database(_) => ErrorCode::DatabaseError,
        }
    }
}

impl From<DomainError> for SettlementError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ListingNotFound => SettlementError::ListingNotFound(err.message),
            ErrorCode::AuctionNotFound => SettlementError::AuctionNotFound(err.message),
            ErrorCode::TransactionNotFound => SettlementError::TransactionNotFound(err.message),
            ErrorCode::Forbidden => SettlementError::Forbidden,
            _ => SettlementError::Database(err.to_string()),
        }
    }
}
