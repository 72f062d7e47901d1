//! HTTP handlers for the marketplace endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::adapters::http::error::ApiError;
use crate::adapters::http::middleware::{RequireAdmin, RequireAuth};
use crate::adapters::http::payments::handlers::{parse_provider, webhook_signature};
use crate::adapters::lightning::ProviderRegistry;
use crate::application::handlers::billing::{WebhookCommand, WebhookOutcome};
use crate::application::handlers::marketplace::{
    CreateAuctionInvoiceCommand, CreateAuctionInvoiceHandler, CreateListingInvoiceCommand,
    CreateListingInvoiceHandler, MarketWebhookHandler, ProcessPurchaseHandler,
    RetryPayoutCommand, RetryPayoutHandler,
};
use crate::domain::foundation::{AuctionId, ListingId, TransactionId};
use crate::domain::marketplace::SettlementError;
use crate::ports::{LnurlResolver, MarketplaceStore, NodeWallet};

use super::dto::{
    PurchaseInvoiceResponse, PurchaseRequest, TransactionResponse, UnsettledResponse,
};
use crate::adapters::http::payments::dto::WebhookResponse;

/// Shared state for the marketplace routes.
#[derive(Clone)]
pub struct MarketAppState {
    pub store: Arc<dyn MarketplaceStore>,
    pub registry: Arc<ProviderRegistry>,
    pub resolver: Arc<dyn LnurlResolver>,
    pub wallet: Arc<dyn NodeWallet>,
    pub fee_bps: u32,
    pub webhook_base_url: Option<String>,
    pub invoice_expiry_secs: u64,
}

impl MarketAppState {
    fn listing_invoice_handler(&self) -> CreateListingInvoiceHandler {
        CreateListingInvoiceHandler::new(
            self.store.clone(),
            self.registry.clone(),
            self.fee_bps,
            self.webhook_base_url.clone(),
            self.invoice_expiry_secs,
        )
    }

    fn auction_invoice_handler(&self) -> CreateAuctionInvoiceHandler {
        CreateAuctionInvoiceHandler::new(
            self.store.clone(),
            self.registry.clone(),
            self.fee_bps,
            self.webhook_base_url.clone(),
            self.invoice_expiry_secs,
        )
    }

    fn settlement_handler(&self) -> Arc<ProcessPurchaseHandler> {
        Arc::new(ProcessPurchaseHandler::new(
            self.store.clone(),
            self.resolver.clone(),
            self.wallet.clone(),
        ))
    }

    fn webhook_handler(&self) -> MarketWebhookHandler {
        MarketWebhookHandler::new(
            self.store.clone(),
            self.registry.clone(),
            self.settlement_handler(),
        )
    }

    fn retry_handler(&self) -> RetryPayoutHandler {
        RetryPayoutHandler::new(self.store.clone(), self.settlement_handler())
    }
}

/// `POST /api/market/listings/:id/invoice`
pub async fn create_listing_invoice(
    State(state): State<MarketAppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    Json(req): Json<PurchaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let listing_id =
        ListingId::parse(&id).map_err(|_| SettlementError::ListingNotFound(id.clone()))?;
    let provider =
        parse_provider(req.provider.as_deref()).map_err(SettlementError::InvalidProvider)?;

    let result = state
        .listing_invoice_handler()
        .handle(CreateListingInvoiceCommand {
            listing_id,
            buyer: user.pubkey,
            provider,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PurchaseInvoiceResponse::from(&result)),
    ))
}

/// `POST /api/market/auctions/:id/invoice`
pub async fn create_auction_invoice(
    State(state): State<MarketAppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    Json(req): Json<PurchaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let auction_id =
        AuctionId::parse(&id).map_err(|_| SettlementError::AuctionNotFound(id.clone()))?;
    let provider =
        parse_provider(req.provider.as_deref()).map_err(SettlementError::InvalidProvider)?;

    let result = state
        .auction_invoice_handler()
        .handle(CreateAuctionInvoiceCommand {
            auction_id,
            buyer: user.pubkey,
            provider,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PurchaseInvoiceResponse::from(&result)),
    ))
}

#[derive(Debug, Deserialize)]
pub struct WebhookParams {
    #[serde(default)]
    pub provider: Option<String>,
}

/// `POST /api/market/webhook?provider=<type>`
///
/// Same contract as the billing webhook: unrecognized payloads are
/// acknowledged with `{success:false}`, a bad signature is the only 400,
/// and a transient processing fault propagates as 5xx so the provider
/// redelivers.
pub async fn handle_webhook(
    State(state): State<MarketAppState>,
    Query(params): Query<WebhookParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let provider_hint = match parse_provider(params.provider.as_deref()) {
        Ok(hint) => hint,
        Err(raw) => {
            tracing::info!(provider = %raw, "Marketplace webhook named an unknown provider");
            return Ok(Json(WebhookResponse { success: false }));
        }
    };

    let outcome = state
        .webhook_handler()
        .handle(WebhookCommand {
            provider_hint,
            payload: body.to_vec(),
            signature: webhook_signature(&headers),
        })
        .await?;

    Ok(Json(WebhookResponse {
        success: !matches!(outcome, WebhookOutcome::Ignored),
    }))
}

/// `POST /api/market/transactions/:id/retry-payout` (admin)
pub async fn retry_payout(
    State(state): State<MarketAppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction_id =
        TransactionId::parse(&id).map_err(|_| SettlementError::TransactionNotFound(id.clone()))?;

    let tx = state
        .retry_handler()
        .handle(RetryPayoutCommand {
            transaction_id,
            caller: admin,
        })
        .await?;

    Ok(Json(TransactionResponse::from(&tx)))
}

#[derive(Debug, Deserialize)]
pub struct UnsettledParams {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// `GET /api/market/transactions/unsettled` (admin)
pub async fn list_unsettled(
    State(state): State<MarketAppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(params): Query<UnsettledParams>,
) -> Result<impl IntoResponse, ApiError> {
    let transactions = state
        .retry_handler()
        .list_unsettled(&admin, params.limit.unwrap_or(50))
        .await?;

    Ok(Json(UnsettledResponse {
        transactions: transactions.iter().map(TransactionResponse::from).collect(),
    }))
}
