//! HTTP adapter for subscription billing.
//!
//! - `GET  /api/tiers` - static tier catalog
//! - `POST /api/payments/invoice` - create a subscription invoice
//! - `GET  /api/payments/invoice/:id` - poll invoice status
//! - `POST /api/payments/webhook` - provider payment callbacks
//! - `GET  /api/payments/history` - payment history
//! - `GET  /api/payments/receipt/:payment_id` - receipt lookup

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::PaymentsAppState;
pub use routes::payments_routes;
