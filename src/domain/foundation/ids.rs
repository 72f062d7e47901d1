//! Strongly-typed identifiers for domain entities.
//!
//! UUID-backed newtypes prevent mixing up a payment id with a transaction id
//! at compile time. `Pubkey` is the platform's user identity (hex-encoded
//! public key issued by the external auth collaborator).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::ValidationError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID (e.g. loaded from the database).
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parses from a string representation.
            pub fn parse(s: &str) -> Result<Self, ValidationError> {
                Uuid::parse_str(s).map(Self).map_err(|e| {
                    ValidationError::invalid_format(stringify!($name), e.to_string())
                })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Identifier for a payment record.
    PaymentId
);
uuid_id!(
    /// Identifier for a subscription record.
    SubscriptionId
);
uuid_id!(
    /// Identifier for a marketplace transaction.
    TransactionId
);
uuid_id!(
    /// Identifier for a settlement transfer record.
    TransferId
);
uuid_id!(
    /// Identifier for a marketplace listing.
    ListingId
);
uuid_id!(
    /// Identifier for a marketplace auction.
    AuctionId
);

/// User identity: a hex-encoded public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pubkey(String);

impl Pubkey {
    /// Creates a pubkey, rejecting empty or non-hex input.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::empty_field("pubkey"));
        }
        if !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::invalid_format(
                "pubkey",
                "expected hex characters",
            ));
        }
        Ok(Self(value.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Pubkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
