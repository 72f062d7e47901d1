//! Subscription billing domain.
//!
//! Tier catalog, cycle pricing, payment records with a monotonic status
//! state machine, and receipt issuance.
//!
//! # Module Structure
//!
//! - `tier` - static tier catalog
//! - `cycle` - billing cycles and expiry arithmetic
//! - `pricing` - invoice quoting with the trust-discount cap
//! - `payment` - PaymentRecord and its status state machine
//! - `subscription` - SubscriptionRecord extension logic
//! - `receipt` - receipt number generation
//! - `audit` - append-only audit entries

mod audit;
mod cycle;
mod errors;
mod payment;
mod pricing;
mod receipt;
mod subscription;
mod tier;

pub use audit::{
    AuditEntry, ACTION_MARKETPLACE_SETTLED, ACTION_PAYMENT_CONFIRMED, ACTION_PAYMENT_CREATED,
};
pub use cycle::BillingCycle;
pub use errors::BillingError;
pub use payment::{PaymentRecord, PaymentStatus, INVOICE_TTL_MINUTES, PAYMENT_METHOD};
pub use pricing::{quote, PriceQuote, MAX_DISCOUNT_PERCENT};
pub use receipt::receipt_number;
pub use subscription::SubscriptionRecord;
pub use tier::{Tier, TierCatalogEntry, TIER_CATALOG};
