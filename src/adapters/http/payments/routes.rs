//! Router for the billing endpoints.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    create_invoice, get_invoice_status, get_receipt, handle_webhook, payment_history,
    PaymentsAppState,
};

/// Routes mounted under `/api/payments`.
///
/// - `POST /invoice` - create a subscription invoice (auth)
/// - `GET  /invoice/:id` - poll invoice status (auth, payer or admin)
/// - `POST /webhook` - provider callback (signature verified, no auth)
/// - `GET  /history` - recent payments (auth)
/// - `GET  /receipt/:payment_id` - receipt lookup (auth, payer only)
pub fn payments_routes() -> Router<PaymentsAppState> {
    Router::new()
        .route("/invoice", post(create_invoice))
        .route("/invoice/:id", get(get_invoice_status))
        .route("/webhook", post(handle_webhook))
        .route("/history", get(payment_history))
        .route("/receipt/:payment_id", get(get_receipt))
}
