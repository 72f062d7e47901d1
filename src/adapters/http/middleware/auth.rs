//! Bearer-token authentication middleware and extractors.
//!
//! The middleware validates tokens through the `SessionValidator` port and
//! injects `AuthenticatedUser` into request extensions; handlers pull it
//! back out with `RequireAuth` (or `RequireAdmin` for operator endpoints).

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::error::ErrorResponse;
use crate::domain::foundation::{AuthError, AuthenticatedUser};
use crate::ports::SessionValidator;

pub type AuthState = Arc<dyn SessionValidator>;

/// Validates the `Authorization: Bearer <token>` header.
///
/// A missing header passes through without an identity so that public
/// routes under the same layer keep working; protected handlers enforce
/// authentication via the extractors. An invalid token is rejected here.
pub async fn auth_middleware(
    State(validator): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match token {
        Some(token) => match validator.validate(token).await {
            Ok(user) => {
                request.extensions_mut().insert(user);
                next.run(request).await
            }
            Err(e) => {
                let (status, message) = match &e {
                    AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired"),
                    AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
                    AuthError::ServiceUnavailable(msg) => {
                        tracing::error!(error = %msg, "Auth service unavailable");
                        (
                            StatusCode::SERVICE_UNAVAILABLE,
                            "Authentication service unavailable",
                        )
                    }
                };
                (status, Json(ErrorResponse::new("AUTH_ERROR", message))).into_response()
            }
        },
        None => next.run(request).await,
    }
}

/// Extractor for handlers that require an authenticated caller.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthenticatedUser);

impl<S> axum::extract::FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .cloned()
                .map(RequireAuth)
                .ok_or(AuthRejection::Unauthenticated)
        })
    }
}

/// Extractor for operator-only endpoints.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthenticatedUser);

impl<S> axum::extract::FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            match parts.extensions.get::<AuthenticatedUser>().cloned() {
                Some(user) if user.is_admin => Ok(RequireAdmin(user)),
                Some(_) => Err(AuthRejection::Forbidden),
                None => Err(AuthRejection::Unauthenticated),
            }
        })
    }
}

/// Rejection for the auth extractors.
#[derive(Debug, Clone)]
pub enum AuthRejection {
    Unauthenticated,
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthRejection::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Authentication required",
            ),
            AuthRejection::Forbidden => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", "Admin role required")
            }
        };
        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}
