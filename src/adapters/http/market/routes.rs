//! Router for the marketplace endpoints.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    create_auction_invoice, create_listing_invoice, handle_webhook, list_unsettled, retry_payout,
    MarketAppState,
};

/// Routes mounted under `/api/market`.
///
/// - `POST /listings/:id/invoice` - buy a fixed-price listing (auth)
/// - `POST /auctions/:id/invoice` - settle a won auction (auth, winner only)
/// - `POST /webhook` - provider callback (signature verified, no auth)
/// - `POST /transactions/:id/retry-payout` - re-run a failed payout (admin)
/// - `GET  /transactions/unsettled` - stuck settlements, oldest first (admin)
pub fn market_routes() -> Router<MarketAppState> {
    Router::new()
        .route("/listings/:id/invoice", post(create_listing_invoice))
        .route("/auctions/:id/invoice", post(create_auction_invoice))
        .route("/webhook", post(handle_webhook))
        .route("/transactions/:id/retry-payout", post(retry_payout))
        .route("/transactions/unsettled", get(list_unsettled))
}
