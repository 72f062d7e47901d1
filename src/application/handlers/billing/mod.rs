//! Subscription billing use cases.

mod check_invoice_status;
mod create_invoice;
mod get_receipt;
mod handle_webhook;
mod payment_history;
mod process_payment;

pub use check_invoice_status::{CheckInvoiceStatusCommand, CheckInvoiceStatusHandler};
pub use create_invoice::{CreateInvoiceCommand, CreateInvoiceHandler};
pub use get_receipt::{GetReceiptCommand, GetReceiptHandler, Receipt};
pub use handle_webhook::{HandleWebhookHandler, WebhookCommand, WebhookOutcome};
pub use payment_history::{PaymentHistoryCommand, PaymentHistoryHandler};
pub use process_payment::ProcessPaymentHandler;
