//! Trust-graph doubles.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode, Pubkey};
use crate::ports::TrustGraph;

/// Grants every user the same raw discount.
pub struct FixedTrustGraph {
    percent: u8,
}

impl FixedTrustGraph {
    pub fn new(percent: u8) -> Self {
        Self { percent }
    }

    /// Grants nothing; the default for deployments without a trust graph.
    pub fn disabled() -> Self {
        Self { percent: 0 }
    }
}

#[async_trait]
impl TrustGraph for FixedTrustGraph {
    async fn discount_percent(&self, _user: &Pubkey) -> Result<u8, DomainError> {
        Ok(self.percent)
    }
}

/// Always unreachable; discounts must degrade to zero, not fail checkout.
pub struct UnreachableTrustGraph;

#[async_trait]
impl TrustGraph for UnreachableTrustGraph {
    async fn discount_percent(&self, _user: &Pubkey) -> Result<u8, DomainError> {
        Err(DomainError::new(
            ErrorCode::InternalError,
            "trust graph unreachable",
        ))
    }
}
