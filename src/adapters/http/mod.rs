//! HTTP adapters - REST API implementations.
//!
//! Each domain module has its own HTTP adapter for endpoint exposure.
//! `app_router` assembles the full application: billing under
//! `/api/payments`, marketplace settlement under `/api/market`, plus the
//! public tier catalog and a health probe.

pub mod error;
pub mod market;
pub mod middleware;
pub mod payments;

use std::time::Duration;

use axum::http::HeaderValue;
use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

pub use error::ApiError;
pub use market::market_routes;
pub use market::MarketAppState;
pub use middleware::{auth_middleware, AuthState, RequireAdmin, RequireAuth};
pub use payments::payments_routes;
pub use payments::PaymentsAppState;

/// Assemble the complete application router.
///
/// The auth middleware runs on every route; it only rejects requests that
/// carry an invalid token. Webhook and health endpoints stay reachable
/// without credentials, while protected handlers enforce identity through
/// the `RequireAuth`/`RequireAdmin` extractors.
pub fn app_router(
    payments: PaymentsAppState,
    market: MarketAppState,
    auth: AuthState,
    server: &ServerConfig,
) -> Router {
    Router::new()
        .route("/health", get(payments::handlers::health))
        .route("/api/tiers", get(payments::handlers::list_tiers))
        .nest("/api/payments", payments_routes().with_state(payments))
        .nest("/api/market", market_routes().with_state(market))
        .layer(from_fn_with_state(auth, auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(server))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs,
        )))
}

/// Restricts origins when `cors_origins` is configured; wide open otherwise
/// (dev setups with a local frontend).
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
