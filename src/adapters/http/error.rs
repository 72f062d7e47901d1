//! HTTP error mapping.
//!
//! Domain errors carry an `ErrorCode`; this module maps codes onto status
//! codes and a uniform `{error, code}` JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::billing::BillingError;
use crate::domain::foundation::ErrorCode;
use crate::domain::marketplace::SettlementError;

/// Uniform error body for every API endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
        }
    }
}

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::ValidationFailed
        | ErrorCode::InvalidTier
        | ErrorCode::InvalidBillingCycle
        | ErrorCode::InvalidFee
        | ErrorCode::InvalidLightningAddress
        | ErrorCode::SignatureInvalid => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden | ErrorCode::NotWinner => StatusCode::FORBIDDEN,
        ErrorCode::PaymentNotFound
        | ErrorCode::TransactionNotFound
        | ErrorCode::ListingNotFound
        | ErrorCode::AuctionNotFound => StatusCode::NOT_FOUND,
        ErrorCode::StateConflict => StatusCode::CONFLICT,
        ErrorCode::ProviderUnavailable | ErrorCode::ProviderRejected => StatusCode::BAD_GATEWAY,
        ErrorCode::NoProviderConfigured
        | ErrorCode::MissingPayoutDestination
        | ErrorCode::PayoutFailed
        | ErrorCode::DatabaseError
        | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Wrapper that lets handlers return domain errors with `?`.
#[derive(Debug)]
pub enum ApiError {
    Billing(BillingError),
    Settlement(SettlementError),
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        ApiError::Billing(err)
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        ApiError::Settlement(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            ApiError::Billing(e) => (e.error_code(), e.to_string()),
            ApiError::Settlement(e) => (e.error_code(), e.to_string()),
        };
        let status = status_for(code);
        if status.is_server_error() {
            tracing::error!(code = %code, error = %message, "Request failed");
        }
        (status, Json(ErrorResponse::new(code.to_string(), message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes_map_to_404() {
        assert_eq!(
            status_for(ErrorCode::PaymentNotFound),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(ErrorCode::ListingNotFound),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn signature_failures_are_client_errors() {
        assert_eq!(
            status_for(ErrorCode::SignatureInvalid),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn payout_failures_are_server_errors() {
        assert_eq!(
            status_for(ErrorCode::PayoutFailed),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
