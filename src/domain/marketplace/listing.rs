//! Marketplace listings and auctions (as seen by the settlement engine).
//!
//! Browsing and bidding are external collaborators; the engine only needs
//! enough of the listing/auction shape to validate a purchase and flip the
//! sale status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AuctionId, ListingId, Pubkey};

/// Sale status of a fixed-price listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    /// An invoice is outstanding; hidden from browsing so a second buyer
    /// cannot race to pay for the same asset.
    PendingSale,
    Sold,
    Withdrawn,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::PendingSale => "pending_sale",
            ListingStatus::Sold => "sold",
            ListingStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ListingStatus::Active),
            "pending_sale" => Some(ListingStatus::PendingSale),
            "sold" => Some(ListingStatus::Sold),
            "withdrawn" => Some(ListingStatus::Withdrawn),
            _ => None,
        }
    }
}

/// A fixed-price listing for an identity asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub seller: Pubkey,
    /// The identity name/domain being sold, e.g. `alice@nym.market`.
    pub asset_name: String,
    pub price_sats: u64,
    pub status: ListingStatus,
}

/// Settlement status of an auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    Ended,
    PendingSale,
    Settled,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Ended => "ended",
            AuctionStatus::PendingSale => "pending_sale",
            AuctionStatus::Settled => "settled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ended" => Some(AuctionStatus::Ended),
            "pending_sale" => Some(AuctionStatus::PendingSale),
            "settled" => Some(AuctionStatus::Settled),
            _ => None,
        }
    }
}

/// An ended auction awaiting settlement by its highest bidder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub seller: Pubkey,
    pub asset_name: String,
    pub highest_bidder: Option<Pubkey>,
    pub highest_bid_sats: u64,
    pub status: AuctionStatus,
    pub winner: Option<Pubkey>,
    pub winning_amount_sats: Option<u64>,
    pub settled_at: Option<DateTime<Utc>>,
}
