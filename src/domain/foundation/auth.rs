//! Authenticated user context and auth errors.
//!
//! Authentication is an external collaborator; the engine only consumes a
//! validated identity injected by the HTTP middleware.

use thiserror::Error;

use super::ids::Pubkey;

/// Identity extracted from a validated bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// The user's public key.
    pub pubkey: Pubkey,

    /// Whether the token carries the platform admin role.
    pub is_admin: bool,
}

impl AuthenticatedUser {
    pub fn new(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_admin: false,
        }
    }

    pub fn admin(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_admin: true,
        }
    }
}

/// Errors from bearer token validation.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Authentication service unavailable: {0}")]
    ServiceUnavailable(String),
}
