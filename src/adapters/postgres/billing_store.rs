//! PostgreSQL implementation of the billing store.
//!
//! Confirmation is the interesting path: a conditional
//! `UPDATE ... WHERE status = 'pending'` claims the payment row, and the
//! subscription upsert plus audit insert ride the same transaction only
//! when the claim succeeds. Concurrent confirmers (webhook vs. poll) race
//! on that update; exactly one wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{
    AuditEntry, BillingCycle, PaymentRecord, PaymentStatus, SubscriptionRecord, Tier,
};
use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentId, Pubkey, SubscriptionId,
};
use crate::ports::{BillingStore, ConfirmOutcome};

pub struct PostgresBillingStore {
    pool: PgPool,
}

impl PostgresBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    subscription_id: Option<Uuid>,
    user_pubkey: String,
    amount_sats: i64,
    amount_usd_cents: i64,
    invoice: String,
    payment_hash: Option<String>,
    provider: String,
    provider_invoice_id: String,
    status: String,
    receipt_number: Option<String>,
    tier: String,
    billing_cycle: String,
    discount_percent: i16,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
}

const PAYMENT_COLUMNS: &str = "id, subscription_id, user_pubkey, amount_sats, amount_usd_cents, \
     invoice, payment_hash, provider, provider_invoice_id, status, receipt_number, \
     tier, billing_cycle, discount_percent, created_at, paid_at";

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(PaymentRecord {
            id: PaymentId::from_uuid(row.id),
            subscription_id: row.subscription_id.map(SubscriptionId::from_uuid),
            user: Pubkey::new(row.user_pubkey)
                .map_err(|e| db_error(format!("invalid user pubkey: {e}")))?,
            amount_sats: u64::try_from(row.amount_sats)
                .map_err(|_| db_error("negative amount_sats"))?,
            amount_usd_cents: u64::try_from(row.amount_usd_cents)
                .map_err(|_| db_error("negative amount_usd_cents"))?,
            invoice: row.invoice,
            payment_hash: row.payment_hash,
            provider: row
                .provider
                .parse()
                .map_err(|e| db_error(format!("invalid provider: {e}")))?,
            provider_invoice_id: row.provider_invoice_id,
            status: PaymentStatus::parse(&row.status)
                .ok_or_else(|| db_error(format!("invalid payment status: {}", row.status)))?,
            receipt_number: row.receipt_number,
            tier: Tier::parse(&row.tier)
                .ok_or_else(|| db_error(format!("invalid tier: {}", row.tier)))?,
            billing_cycle: BillingCycle::parse(&row.billing_cycle).ok_or_else(|| {
                db_error(format!("invalid billing cycle: {}", row.billing_cycle))
            })?,
            discount_percent: u8::try_from(row.discount_percent)
                .map_err(|_| db_error("discount_percent out of range"))?,
            created_at: row.created_at,
            paid_at: row.paid_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_pubkey: String,
    tier: String,
    expires_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<SubscriptionRow> for SubscriptionRecord {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(SubscriptionRecord {
            id: SubscriptionId::from_uuid(row.id),
            user: Pubkey::new(row.user_pubkey)
                .map_err(|e| db_error(format!("invalid user pubkey: {e}")))?,
            tier: Tier::parse(&row.tier)
                .ok_or_else(|| db_error(format!("invalid tier: {}", row.tier)))?,
            expires_at: row.expires_at,
            cancelled_at: row.cancelled_at,
        })
    }
}

fn db_error(message: impl Into<String>) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, message)
}

fn sats_as_i64(sats: u64, field: &str) -> Result<i64, DomainError> {
    i64::try_from(sats).map_err(|_| db_error(format!("{field} exceeds i64 range")))
}

async fn insert_audit<'e, E>(executor: E, audit: &AuditEntry) -> Result<(), sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
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
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl BillingStore for PostgresBillingStore {
    async fn create_payment(
        &self,
        payment: &PaymentRecord,
        audit: &AuditEntry,
    ) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error(format!("failed to begin transaction: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, subscription_id, user_pubkey, amount_sats, amount_usd_cents,
                invoice, payment_hash, provider, provider_invoice_id, status,
                receipt_number, tier, billing_cycle, discount_percent, created_at, paid_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.subscription_id.map(|id| id.as_uuid()))
        .bind(payment.user.as_str())
        .bind(sats_as_i64(payment.amount_sats, "amount_sats")?)
        .bind(sats_as_i64(payment.amount_usd_cents, "amount_usd_cents")?)
        .bind(&payment.invoice)
        .bind(&payment.payment_hash)
        .bind(payment.provider.as_str())
        .bind(&payment.provider_invoice_id)
        .bind(payment.status.as_str())
        .bind(&payment.receipt_number)
        .bind(payment.tier.as_str())
        .bind(payment.billing_cycle.as_str())
        .bind(i16::from(payment.discount_percent))
        .bind(payment.created_at)
        .bind(payment.paid_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error(format!("failed to insert payment: {e}")))?;

        insert_audit(&mut *tx, audit)
            .await
            .map_err(|e| db_error(format!("failed to insert audit entry: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| db_error(format!("failed to commit: {e}")))?;
        Ok(())
    }

    async fn find_payment(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(format!("failed to find payment: {e}")))?;

        row.map(PaymentRecord::try_from).transpose()
    }

    async fn find_payment_by_provider_ref(
        &self,
        provider_invoice_id: Option<&str>,
        payment_hash: Option<&str>,
    ) -> Result<Option<PaymentRecord>, DomainError> {
        if let Some(invoice_id) = provider_invoice_id {
            let row: Option<PaymentRow> = sqlx::query_as(&format!(
                "SELECT {PAYMENT_COLUMNS} FROM payments WHERE provider_invoice_id = $1"
            ))
            .bind(invoice_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(format!("failed to find payment: {e}")))?;

            if let Some(row) = row {
                return Ok(Some(PaymentRecord::try_from(row)?));
            }
        }

        if let Some(hash) = payment_hash {
            let row: Option<PaymentRow> = sqlx::query_as(&format!(
                "SELECT {PAYMENT_COLUMNS} FROM payments WHERE payment_hash = $1"
            ))
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(format!("failed to find payment: {e}")))?;

            if let Some(row) = row {
                return Ok(Some(PaymentRecord::try_from(row)?));
            }
        }

        Ok(None)
    }

    async fn transition_payment(
        &self,
        id: &PaymentId,
        to: PaymentStatus,
        _now: DateTime<Utc>,
    ) -> Result<PaymentRecord, DomainError> {
        // Only a pending payment can move; a terminal row is left alone.
        sqlx::query(
            r#"
            UPDATE payments SET status = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id.as_uuid())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(format!("failed to transition payment: {e}")))?;

        self.find_payment(id).await?.ok_or_else(|| {
            DomainError::new(ErrorCode::PaymentNotFound, "Payment not found")
        })
    }

    async fn confirm_payment(
        &self,
        id: &PaymentId,
        paid_at: DateTime<Utc>,
        receipt_number: &str,
        subscription: &SubscriptionRecord,
        audit: &AuditEntry,
    ) -> Result<ConfirmOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error(format!("failed to begin transaction: {e}")))?;

        let claimed = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'paid', paid_at = $2, receipt_number = $3, subscription_id = $4
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id.as_uuid())
        .bind(paid_at)
        .bind(receipt_number)
        .bind(subscription.id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error(format!("failed to confirm payment: {e}")))?;

        if claimed.rows_affected() == 0 {
            // Lost the race (or the payment already expired). Report the
            // current row without writing anything.
            tx.rollback()
                .await
                .map_err(|e| db_error(format!("failed to rollback: {e}")))?;

            let current = self.find_payment(id).await?.ok_or_else(|| {
                DomainError::new(ErrorCode::PaymentNotFound, "Payment not found")
            })?;
            return Ok(ConfirmOutcome::AlreadyPaid(current));
        }

        sqlx::query(
            r#"
            INSERT INTO subscriptions (id, user_pubkey, tier, expires_at, cancelled_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_pubkey) DO UPDATE
            SET tier = EXCLUDED.tier,
                expires_at = EXCLUDED.expires_at,
                cancelled_at = EXCLUDED.cancelled_at
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.user.as_str())
        .bind(subscription.tier.as_str())
        .bind(subscription.expires_at)
        .bind(subscription.cancelled_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error(format!("failed to upsert subscription: {e}")))?;

        insert_audit(&mut *tx, audit)
            .await
            .map_err(|e| db_error(format!("failed to insert audit entry: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| db_error(format!("failed to commit: {e}")))?;

        let confirmed = self.find_payment(id).await?.ok_or_else(|| {
            DomainError::new(ErrorCode::PaymentNotFound, "Payment not found")
        })?;
        Ok(ConfirmOutcome::Confirmed(confirmed))
    }

    async fn find_subscription(
        &self,
        user: &Pubkey,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT id, user_pubkey, tier, expires_at, cancelled_at
            FROM subscriptions
            WHERE user_pubkey = $1
            "#,
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(format!("failed to find subscription: {e}")))?;

        row.map(SubscriptionRecord::try_from).transpose()
    }

    async fn list_payments_for_user(
        &self,
        user: &Pubkey,
        limit: i64,
    ) -> Result<Vec<PaymentRecord>, DomainError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE user_pubkey = $1 ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(user.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error(format!("failed to list payments: {e}")))?;

        rows.into_iter().map(PaymentRecord::try_from).collect()
    }
}
