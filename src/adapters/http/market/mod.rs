//! HTTP adapter for marketplace settlement.
//!
//! - `POST /api/market/listings/:id/invoice` - buy a listing
//! - `POST /api/market/auctions/:id/invoice` - settle a won auction
//! - `POST /api/market/webhook` - provider payment callbacks
//! - `POST /api/market/transactions/:id/retry-payout` - operator recovery
//! - `GET  /api/market/transactions/unsettled` - operator triage

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::MarketAppState;
pub use routes::market_routes;
