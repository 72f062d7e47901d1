//! PostgreSQL implementation of the marketplace store.
//!
//! Reservation and settlement are multi-row writes wrapped in a single
//! database transaction. Status flips are conditional updates so that two
//! concurrent buyers, or a webhook racing a poll, cannot both proceed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::AuditEntry;
use crate::domain::foundation::{
    AuctionId, DomainError, ErrorCode, ListingId, Pubkey, TransactionId, TransferId,
};
use crate::domain::marketplace::{
    Auction, AuctionStatus, EscrowStatus, Listing, ListingStatus, MarketplaceTransaction,
    PayoutStatus, SourceType, TransactionStatus, TransferRecord, TransferStatus,
};
use crate::ports::{ClaimOutcome, MarketplaceStore};

pub struct PostgresMarketplaceStore {
    pool: PgPool,
}

impl PostgresMarketplaceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<MarketplaceTransaction, DomainError> {
        self.find_transaction(id).await?.ok_or_else(|| {
            DomainError::new(ErrorCode::TransactionNotFound, "Transaction not found")
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    source_type: String,
    source_id: String,
    buyer_pubkey: String,
    seller_pubkey: String,
    total_sats: i64,
    fee_bps: i32,
    platform_fee_sats: i64,
    seller_payout_sats: i64,
    status: String,
    payment_provider: String,
    provider_invoice_id: String,
    payment_hash: Option<String>,
    seller_payout_status: Option<String>,
    transfer_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    settled_at: Option<DateTime<Utc>>,
}

const TRANSACTION_COLUMNS: &str = "id, source_type, source_id, buyer_pubkey, seller_pubkey, \
     total_sats, fee_bps, platform_fee_sats, seller_payout_sats, status, payment_provider, \
     provider_invoice_id, payment_hash, seller_payout_status, transfer_id, created_at, \
     paid_at, settled_at";

impl TryFrom<TransactionRow> for MarketplaceTransaction {
    type Error = DomainError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(MarketplaceTransaction {
            id: TransactionId::from_uuid(row.id),
            source_type: SourceType::parse(&row.source_type)
                .ok_or_else(|| db_error(format!("invalid source type: {}", row.source_type)))?,
            source_id: row.source_id,
            buyer: Pubkey::new(row.buyer_pubkey)
                .map_err(|e| db_error(format!("invalid buyer pubkey: {e}")))?,
            seller: Pubkey::new(row.seller_pubkey)
                .map_err(|e| db_error(format!("invalid seller pubkey: {e}")))?,
            total_sats: sats_as_u64(row.total_sats)?,
            fee_bps: u32::try_from(row.fee_bps).map_err(|_| db_error("negative fee_bps"))?,
            platform_fee_sats: sats_as_u64(row.platform_fee_sats)?,
            seller_payout_sats: sats_as_u64(row.seller_payout_sats)?,
            status: TransactionStatus::parse(&row.status)
                .ok_or_else(|| db_error(format!("invalid transaction status: {}", row.status)))?,
            payment_provider: row
                .payment_provider
                .parse()
                .map_err(|e| db_error(format!("invalid provider: {e}")))?,
            provider_invoice_id: row.provider_invoice_id,
            payment_hash: row.payment_hash,
            seller_payout_status: row
                .seller_payout_status
                .as_deref()
                .map(|s| {
                    PayoutStatus::parse(s)
                        .ok_or_else(|| db_error(format!("invalid payout status: {s}")))
                })
                .transpose()?,
            transfer_id: row.transfer_id.map(TransferId::from_uuid),
            created_at: row.created_at,
            paid_at: row.paid_at,
            settled_at: row.settled_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ListingRow {
    id: Uuid,
    seller_pubkey: String,
    asset_name: String,
    price_sats: i64,
    status: String,
}

impl TryFrom<ListingRow> for Listing {
    type Error = DomainError;

    fn try_from(row: ListingRow) -> Result<Self, Self::Error> {
        Ok(Listing {
            id: ListingId::from_uuid(row.id),
            seller: Pubkey::new(row.seller_pubkey)
                .map_err(|e| db_error(format!("invalid seller pubkey: {e}")))?,
            asset_name: row.asset_name,
            price_sats: sats_as_u64(row.price_sats)?,
            status: ListingStatus::parse(&row.status)
                .ok_or_else(|| db_error(format!("invalid listing status: {}", row.status)))?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuctionRow {
    id: Uuid,
    seller_pubkey: String,
    asset_name: String,
    highest_bidder_pubkey: Option<String>,
    highest_bid_sats: i64,
    status: String,
    winner_pubkey: Option<String>,
    winning_amount_sats: Option<i64>,
    settled_at: Option<DateTime<Utc>>,
}

impl TryFrom<AuctionRow> for Auction {
    type Error = DomainError;

    fn try_from(row: AuctionRow) -> Result<Self, Self::Error> {
        Ok(Auction {
            id: AuctionId::from_uuid(row.id),
            seller: Pubkey::new(row.seller_pubkey)
                .map_err(|e| db_error(format!("invalid seller pubkey: {e}")))?,
            asset_name: row.asset_name,
            highest_bidder: row
                .highest_bidder_pubkey
                .map(Pubkey::new)
                .transpose()
                .map_err(|e| db_error(format!("invalid bidder pubkey: {e}")))?,
            highest_bid_sats: sats_as_u64(row.highest_bid_sats)?,
            status: AuctionStatus::parse(&row.status)
                .ok_or_else(|| db_error(format!("invalid auction status: {}", row.status)))?,
            winner: row
                .winner_pubkey
                .map(Pubkey::new)
                .transpose()
                .map_err(|e| db_error(format!("invalid winner pubkey: {e}")))?,
            winning_amount_sats: row.winning_amount_sats.map(sats_as_u64).transpose()?,
            settled_at: row.settled_at,
        })
    }
}

fn db_error(message: impl Into<String>) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, message)
}

fn sats_as_u64(sats: i64) -> Result<u64, DomainError> {
    u64::try_from(sats).map_err(|_| db_error("negative sat amount"))
}

fn sats_as_i64(sats: u64) -> Result<i64, DomainError> {
    i64::try_from(sats).map_err(|_| db_error("sat amount exceeds i64 range"))
}

async fn insert_transaction<'e, E>(
    executor: E,
    tx: &MarketplaceTransaction,
) -> Result<(), DomainError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO marketplace_transactions (
            id, source_type, source_id, buyer_pubkey, seller_pubkey, total_sats,
            fee_bps, platform_fee_sats, seller_payout_sats, status, payment_provider,
            provider_invoice_id, payment_hash, seller_payout_status, transfer_id,
            created_at, paid_at, settled_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(tx.id.as_uuid())
    .bind(tx.source_type.as_str())
    .bind(&tx.source_id)
    .bind(tx.buyer.as_str())
    .bind(tx.seller.as_str())
    .bind(sats_as_i64(tx.total_sats)?)
    .bind(i32::try_from(tx.fee_bps).map_err(|_| db_error("fee_bps out of range"))?)
    .bind(sats_as_i64(tx.platform_fee_sats)?)
    .bind(sats_as_i64(tx.seller_payout_sats)?)
    .bind(tx.status.as_str())
    .bind(tx.payment_provider.as_str())
    .bind(&tx.provider_invoice_id)
    .bind(&tx.payment_hash)
    .bind(tx.seller_payout_status.map(|s| s.as_str()))
    .bind(tx.transfer_id.map(|id| id.as_uuid()))
    .bind(tx.created_at)
    .bind(tx.paid_at)
    .bind(tx.settled_at)
    .execute(executor)
    .await
    .map_err(|e| db_error(format!("failed to insert transaction: {e}")))?;
    Ok(())
}

#[async_trait]
impl MarketplaceStore for PostgresMarketplaceStore {
    async fn find_listing(&self, id: &ListingId) -> Result<Option<Listing>, DomainError> {
        let row: Option<ListingRow> = sqlx::query_as(
            r#"
            SELECT id, seller_pubkey, asset_name, price_sats, status
            FROM marketplace_listings
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(format!("failed to find listing: {e}")))?;

        row.map(Listing::try_from).transpose()
    }

    async fn find_auction(&self, id: &AuctionId) -> Result<Option<Auction>, DomainError> {
        let row: Option<AuctionRow> = sqlx::query_as(
            r#"
            SELECT id, seller_pubkey, asset_name, highest_bidder_pubkey, highest_bid_sats,
                   status, winner_pubkey, winning_amount_sats, settled_at
            FROM marketplace_auctions
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(format!("failed to find auction: {e}")))?;

        row.map(Auction::try_from).transpose()
    }

    async fn reserve_listing(
        &self,
        listing_id: &ListingId,
        tx: &MarketplaceTransaction,
    ) -> Result<(), DomainError> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error(format!("failed to begin transaction: {e}")))?;

        let reserved = sqlx::query(
            r#"
            UPDATE marketplace_listings SET status = 'pending_sale'
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(listing_id.as_uuid())
        .execute(&mut *db_tx)
        .await
        .map_err(|e| db_error(format!("failed to reserve listing: {e}")))?;

        if reserved.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::StateConflict,
                "Listing is not available for purchase",
            ));
        }

        insert_transaction(&mut *db_tx, tx).await?;

        db_tx
            .commit()
            .await
            .map_err(|e| db_error(format!("failed to commit: {e}")))?;
        Ok(())
    }

    async fn reserve_auction(
        &self,
        auction_id: &AuctionId,
        tx: &MarketplaceTransaction,
    ) -> Result<(), DomainError> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error(format!("failed to begin transaction: {e}")))?;

        let reserved = sqlx::query(
            r#"
            UPDATE marketplace_auctions SET status = 'pending_sale'
            WHERE id = $1 AND status = 'ended'
            "#,
        )
        .bind(auction_id.as_uuid())
        .execute(&mut *db_tx)
        .await
        .map_err(|e| db_error(format!("failed to reserve auction: {e}")))?;

        if reserved.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::StateConflict,
                "Auction is not awaiting settlement",
            ));
        }

        insert_transaction(&mut *db_tx, tx).await?;

        db_tx
            .commit()
            .await
            .map_err(|e| db_error(format!("failed to commit: {e}")))?;
        Ok(())
    }

    async fn find_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<MarketplaceTransaction>, DomainError> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM marketplace_transactions WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(format!("failed to find transaction: {e}")))?;

        row.map(MarketplaceTransaction::try_from).transpose()
    }

    async fn find_transaction_by_provider_ref(
        &self,
        provider_invoice_id: Option<&str>,
        payment_hash: Option<&str>,
    ) -> Result<Option<MarketplaceTransaction>, DomainError> {
        if let Some(invoice_id) = provider_invoice_id {
            let row: Option<TransactionRow> = sqlx::query_as(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM marketplace_transactions \
                 WHERE provider_invoice_id = $1"
            ))
            .bind(invoice_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(format!("failed to find transaction: {e}")))?;

            if let Some(row) = row {
                return Ok(Some(MarketplaceTransaction::try_from(row)?));
            }
        }

        if let Some(hash) = payment_hash {
            let row: Option<TransactionRow> = sqlx::query_as(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM marketplace_transactions \
                 WHERE payment_hash = $1"
            ))
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(format!("failed to find transaction: {e}")))?;

            if let Some(row) = row {
                return Ok(Some(MarketplaceTransaction::try_from(row)?));
            }
        }

        Ok(None)
    }

    async fn claim_for_settlement(
        &self,
        id: &TransactionId,
        paid_at: DateTime<Utc>,
    ) -> Result<ClaimOutcome, DomainError> {
        let claimed = sqlx::query(
            r#"
            UPDATE marketplace_transactions
            SET status = 'paid', paid_at = $2, seller_payout_status = 'pending'
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id.as_uuid())
        .bind(paid_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(format!("failed to claim transaction: {e}")))?;

        let current = self.load_transaction(id).await?;

        if claimed.rows_affected() == 1 {
            return Ok(ClaimOutcome::Claimed(current));
        }

        match current.status {
            TransactionStatus::Settled => Ok(ClaimOutcome::AlreadySettled(current)),
            _ => Ok(ClaimOutcome::Conflict(current)),
        }
    }

    async fn record_settlement(
        &self,
        tx: &MarketplaceTransaction,
        transfer: &TransferRecord,
        audit: &AuditEntry,
    ) -> Result<(), DomainError> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error(format!("failed to begin transaction: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO marketplace_transfers (
                id, source_type, source_id, buyer_pubkey, seller_pubkey, total_sats,
                platform_fee_sats, seller_payout_sats, escrow_status, transfer_status,
                completed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(transfer.id.as_uuid())
        .bind(transfer.source_type.as_str())
        .bind(&transfer.source_id)
        .bind(transfer.buyer.as_str())
        .bind(transfer.seller.as_str())
        .bind(sats_as_i64(transfer.total_sats)?)
        .bind(sats_as_i64(transfer.platform_fee_sats)?)
        .bind(sats_as_i64(transfer.seller_payout_sats)?)
        .bind(escrow_status_str(transfer.escrow_status))
        .bind(transfer_status_str(transfer.transfer_status))
        .bind(transfer.completed_at)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| db_error(format!("failed to insert transfer: {e}")))?;

        sqlx::query(
            r#"
            UPDATE marketplace_transactions
            SET status = 'settled', seller_payout_status = 'sent',
                transfer_id = $2, settled_at = $3
            WHERE id = $1
            "#,
        )
        .bind(tx.id.as_uuid())
        .bind(transfer.id.as_uuid())
        .bind(transfer.completed_at)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| db_error(format!("failed to settle transaction: {e}")))?;

        match tx.source_type {
            SourceType::Listing => {
                sqlx::query("UPDATE marketplace_listings SET status = 'sold' WHERE id = $1::uuid")
                    .bind(&tx.source_id)
                    .execute(&mut *db_tx)
                    .await
                    .map_err(|e| db_error(format!("failed to mark listing sold: {e}")))?;
            }
            SourceType::Auction => {
                sqlx::query(
                    r#"
                    UPDATE marketplace_auctions
                    SET status = 'settled', winner_pubkey = $2,
                        winning_amount_sats = $3, settled_at = $4
                    WHERE id = $1::uuid
                    "#,
                )
                .bind(&tx.source_id)
                .bind(tx.buyer.as_str())
                .bind(sats_as_i64(tx.total_sats)?)
                .bind(transfer.completed_at)
                .execute(&mut *db_tx)
                .await
                .map_err(|e| db_error(format!("failed to settle auction: {e}")))?;
            }
        }

        // Reassign the identity asset when a matching row exists. Assets
        // managed off-platform have no row; their absence is tolerated.
        let asset_table = match tx.source_type {
            SourceType::Listing => "marketplace_listings",
            SourceType::Auction => "marketplace_auctions",
        };
        sqlx::query(&format!(
            "UPDATE identities SET owner_pubkey = $2 \
             WHERE name = (SELECT asset_name FROM {asset_table} WHERE id = $1::uuid)"
        ))
        .bind(&tx.source_id)
        .bind(tx.buyer.as_str())
        .execute(&mut *db_tx)
        .await
        .map_err(|e| db_error(format!("failed to reassign identity: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO billing_audit_log (id, action, payment_id, user_pubkey, detail, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(audit.id)
        .bind(&audit.action)
        .bind(audit.payment_id.map(|id| id.as_uuid()))
        .bind(audit.user.as_ref().map(|u| u.as_str().to_string()))
        .bind(audit.detail.to_string())
        .bind(audit.recorded_at)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| db_error(format!("failed to insert audit entry: {e}")))?;

        db_tx
            .commit()
            .await
            .map_err(|e| db_error(format!("failed to commit: {e}")))?;
        Ok(())
    }

    async fn record_payout_failure(
        &self,
        id: &TransactionId,
        reason: &str,
    ) -> Result<(), DomainError> {
        tracing::warn!(transaction_id = %id, reason = %reason, "Recording payout failure");

        sqlx::query(
            r#"
            UPDATE marketplace_transactions
            SET seller_payout_status = 'failed'
            WHERE id = $1 AND status = 'paid'
            "#,
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(format!("failed to record payout failure: {e}")))?;
        Ok(())
    }

    async fn release_reservation(
        &self,
        id: &TransactionId,
        _now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let tx = self.load_transaction(id).await?;

        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error(format!("failed to begin transaction: {e}")))?;

        let failed = sqlx::query(
            r#"
            UPDATE marketplace_transactions SET status = 'failed'
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id.as_uuid())
        .execute(&mut *db_tx)
        .await
        .map_err(|e| db_error(format!("failed to fail transaction: {e}")))?;

        if failed.rows_affected() == 1 {
            match tx.source_type {
                SourceType::Listing => {
                    sqlx::query(
                        r#"
                        UPDATE marketplace_listings SET status = 'active'
                        WHERE id = $1::uuid AND status = 'pending_sale'
                        "#,
                    )
                    .bind(&tx.source_id)
                    .execute(&mut *db_tx)
                    .await
                    .map_err(|e| db_error(format!("failed to release listing: {e}")))?;
                }
                SourceType::Auction => {
                    sqlx::query(
                        r#"
                        UPDATE marketplace_auctions SET status = 'ended'
                        WHERE id = $1::uuid AND status = 'pending_sale'
                        "#,
                    )
                    .bind(&tx.source_id)
                    .execute(&mut *db_tx)
                    .await
                    .map_err(|e| db_error(format!("failed to release auction: {e}")))?;
                }
            }
        }

        db_tx
            .commit()
            .await
            .map_err(|e| db_error(format!("failed to commit: {e}")))?;
        Ok(())
    }

    async fn list_unsettled(
        &self,
        limit: i64,
    ) -> Result<Vec<MarketplaceTransaction>, DomainError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM marketplace_transactions \
             WHERE status = 'paid' ORDER BY paid_at ASC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error(format!("failed to list unsettled transactions: {e}")))?;

        rows.into_iter()
            .map(MarketplaceTransaction::try_from)
            .collect()
    }

    async fn seller_lightning_address(
        &self,
        seller: &Pubkey,
    ) -> Result<Option<String>, DomainError> {
        let address: Option<Option<String>> = sqlx::query_scalar(
            r#"
            SELECT lightning_address FROM user_profiles WHERE pubkey = $1
            "#,
        )
        .bind(seller.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(format!("failed to look up seller profile: {e}")))?;

        Ok(address.flatten())
    }
}

fn escrow_status_str(status: EscrowStatus) -> &'static str {
    match status {
        EscrowStatus::Held => "held",
        EscrowStatus::Released => "released",
    }
}

fn transfer_status_str(status: TransferStatus) -> &'static str {
    match status {
        TransferStatus::Completed => "completed",
        TransferStatus::Failed => "failed",
    }
}
