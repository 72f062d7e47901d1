//! Trust-graph port.
//!
//! An external reputation system grants per-user subscription discounts.
//! The engine treats it as advisory: an unreachable graph means no
//! discount, never a failed checkout.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Pubkey};

#[async_trait]
pub trait TrustGraph: Send + Sync {
    /// Raw discount percent for a user, before the billing cap is applied.
    async fn discount_percent(&self, user: &Pubkey) -> Result<u8, DomainError>;
}
