//! Marketplace purchase and settlement use cases.

mod create_auction_invoice;
mod create_listing_invoice;
mod handle_webhook;
mod process_purchase;
mod retry_payout;

pub use create_auction_invoice::{CreateAuctionInvoiceCommand, CreateAuctionInvoiceHandler};
pub use create_listing_invoice::{
    CreateListingInvoiceCommand, CreateListingInvoiceHandler, PurchaseInvoiceResult,
};
pub use handle_webhook::MarketWebhookHandler;
pub use process_purchase::ProcessPurchaseHandler;
pub use retry_payout::{RetryPayoutCommand, RetryPayoutHandler};
