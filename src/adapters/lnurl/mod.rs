//! LNURL-pay resolution and the platform payout wallet.

mod client;
mod wallet;

pub use client::LnurlClient;
pub use wallet::{LnbitsWallet, MockWallet};
