//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField {
            field: field.into(),
        }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i64, max: i64, actual: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors (reject synchronously, no side effects)
    ValidationFailed,
    InvalidTier,
    InvalidBillingCycle,
    InvalidFee,
    InvalidLightningAddress,

    // Configuration errors (fatal at call site, never retried)
    NoProviderConfigured,

    // Not found errors
    PaymentNotFound,
    TransactionNotFound,
    ListingNotFound,
    AuctionNotFound,

    // State errors
    StateConflict,
    NotWinner,

    // Provider errors (retry is safe, nothing persisted yet)
    ProviderUnavailable,
    ProviderRejected,

    // Webhook errors
    SignatureInvalid,

    // Settlement errors (money already captured, operator-visible)
    MissingPayoutDestination,
    PayoutFailed,

    // Authorization errors
    Unauthorized,
    Forbidden,

    // Infrastructure errors
    DatabaseError,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::InvalidTier => "INVALID_TIER",
            ErrorCode::InvalidBillingCycle => "INVALID_BILLING_CYCLE",
            ErrorCode::InvalidFee => "INVALID_FEE",
            ErrorCode::InvalidLightningAddress => "INVALID_LIGHTNING_ADDRESS",
            ErrorCode::NoProviderConfigured => "NO_PROVIDER_CONFIGURED",
            ErrorCode::PaymentNotFound => "PAYMENT_NOT_FOUND",
            ErrorCode::TransactionNotFound => "TRANSACTION_NOT_FOUND",
            ErrorCode::ListingNotFound => "LISTING_NOT_FOUND",
            ErrorCode::AuctionNotFound => "AUCTION_NOT_FOUND",
            ErrorCode::StateConflict => "STATE_CONFLICT",
            ErrorCode::NotWinner => "NOT_WINNER",
            ErrorCode::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            ErrorCode::ProviderRejected => "PROVIDER_REJECTED",
            ErrorCode::SignatureInvalid => "SIGNATURE_INVALID",
            ErrorCode::MissingPayoutDestination => "MISSING_PAYOUT_DESTINATION",
            ErrorCode::PayoutFailed => "PAYOUT_FAILED",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            details: HashMap::new(),
        }
        .with_detail("field", field.into())
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        DomainError::new(ErrorCode::ValidationFailed, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_empty_field_displays_correctly() {
        let err = ValidationError::empty_field("buyer_pubkey");
        assert_eq!(format!("{}", err), "Field 'buyer_pubkey' cannot be empty");
    }

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::PaymentNotFound, "Payment not found");
        assert_eq!(format!("{}", err), "[PAYMENT_NOT_FOUND] Payment not found");
    }

    #[test]
    fn domain_error_with_detail_adds_detail() {
        let err = DomainError::new(ErrorCode::StateConflict, "Already settled")
            .with_detail("transaction_id", "abc")
            .with_detail("status", "settled");

        assert_eq!(err.details.get("transaction_id"), Some(&"abc".to_string()));
        assert_eq!(err.details.get("status"), Some(&"settled".to_string()));
    }

    #[test]
    fn error_code_display_formats_correctly() {
        assert_eq!(
            format!("{}", ErrorCode::NoProviderConfigured),
            "NO_PROVIDER_CONFIGURED"
        );
        assert_eq!(
            format!("{}", ErrorCode::MissingPayoutDestination),
            "MISSING_PAYOUT_DESTINATION"
        );
    }
}
