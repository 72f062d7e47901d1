//! Billing error types.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Errors from the subscription billing service.
#[derive(Debug, Clone, Error)]
pub enum BillingError {
    /// The requested tier cannot be invoiced.
    #[error("Invalid tier: {0}")]
    InvalidTier(String),

    /// The billing cycle string was not recognized.
    #[error("Invalid billing cycle: {0}")]
    InvalidBillingCycle(String),

    /// The provider tag was not recognized.
    #[error("Unknown payment provider: {0}")]
    InvalidProvider(String),

    /// No Lightning provider is configured. Configuration fault, not retried.
    #[error("No payment provider configured")]
    NoProviderConfigured,

    /// The payment backend failed; nothing was persisted, the caller may
    /// retry the whole operation.
    #[error("Payment provider error: {0}")]
    Provider(String),

    /// Webhook signature verification failed.
    #[error("Invalid webhook signature")]
    SignatureInvalid,

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    /// Caller is not the paying user.
    #[error("Forbidden")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(String),
}

impl BillingError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            BillingError::InvalidTier(_) => ErrorCode::InvalidTier,
            BillingError::InvalidBillingCycle(_) => ErrorCode::InvalidBillingCycle,
            BillingError::InvalidProvider(_) => ErrorCode::ValidationFailed,
            BillingError::NoProviderConfigured => ErrorCode::NoProviderConfigured,
            BillingError::Provider(_) => ErrorCode::ProviderUnavailable,
            BillingError::SignatureInvalid => ErrorCode::SignatureInvalid,
            BillingError::PaymentNotFound(_) => ErrorCode::PaymentNotFound,
            BillingError::Forbidden => ErrorCode::Forbidden,
            BillingError::Database(_) => ErrorCode::DatabaseError,
        }
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::PaymentNotFound => BillingError::PaymentNotFound(err.message),
            ErrorCode::Forbidden => BillingError::Forbidden,
            _ => BillingError::Database(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_map_to_taxonomy() {
        assert_eq!(
            BillingError::NoProviderConfigured.error_code(),
            ErrorCode::NoProviderConfigured
        );
        assert_eq!(
            BillingError::SignatureInvalid.error_code(),
            ErrorCode::SignatureInvalid
        );
    }

    #[test]
    fn domain_not_found_maps_to_payment_not_found() {
        let err: BillingError =
            DomainError::new(ErrorCode::PaymentNotFound, "missing").into();
        assert!(matches!(err, BillingError::PaymentNotFound(_)));
    }
}
