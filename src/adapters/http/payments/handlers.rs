//! HTTP handlers for the billing endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::adapters::http::error::ApiError;
use crate::adapters::http::middleware::RequireAuth;
use crate::adapters::lightning::ProviderRegistry;
use crate::application::handlers::billing::{
    CheckInvoiceStatusCommand, CheckInvoiceStatusHandler, CreateInvoiceCommand,
    CreateInvoiceHandler, GetReceiptCommand, GetReceiptHandler, HandleWebhookHandler,
    PaymentHistoryCommand, PaymentHistoryHandler, WebhookCommand, WebhookOutcome,
};
use crate::domain::billing::{BillingCycle, BillingError, Tier, TIER_CATALOG};
use crate::domain::foundation::{PaymentId, ProviderType};
use crate::ports::{BillingStore, TrustGraph};

use super::dto::{
    CreateInvoiceRequest, InvoiceResponse, InvoiceStatusEntry, InvoiceStatusResponse,
    PaymentHistoryResponse, ReceiptResponse, TierResponse, WebhookResponse,
};

/// Shared state for the billing routes.
#[derive(Clone)]
pub struct PaymentsAppState {
    pub store: Arc<dyn BillingStore>,
    pub registry: Arc<ProviderRegistry>,
    pub trust_graph: Arc<dyn TrustGraph>,
    pub webhook_base_url: Option<String>,
    pub invoice_expiry_secs: u64,
}

impl PaymentsAppState {
    fn create_invoice_handler(&self) -> CreateInvoiceHandler {
        CreateInvoiceHandler::new(
            self.store.clone(),
            self.registry.clone(),
            self.trust_graph.clone(),
            self.webhook_base_url.clone(),
            self.invoice_expiry_secs,
        )
    }

    fn check_status_handler(&self) -> CheckInvoiceStatusHandler {
        CheckInvoiceStatusHandler::new(self.store.clone(), self.registry.clone())
    }

    fn webhook_handler(&self) -> HandleWebhookHandler {
        HandleWebhookHandler::new(self.store.clone(), self.registry.clone())
    }

    fn history_handler(&self) -> PaymentHistoryHandler {
        PaymentHistoryHandler::new(self.store.clone())
    }

    fn receipt_handler(&self) -> GetReceiptHandler {
        GetReceiptHandler::new(self.store.clone())
    }
}

/// `GET /api/tiers`
pub async fn list_tiers() -> impl IntoResponse {
    let tiers: Vec<TierResponse> = TIER_CATALOG.iter().map(TierResponse::from).collect();
    Json(tiers)
}

/// `POST /api/payments/invoice`
pub async fn create_invoice(
    State(state): State<PaymentsAppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tier = Tier::parse(&req.tier).ok_or(BillingError::InvalidTier(req.tier.clone()))?;
    let billing_cycle = match req.billing_cycle.as_deref() {
        Some(raw) => BillingCycle::parse(raw)
            .ok_or_else(|| BillingError::InvalidBillingCycle(raw.to_string()))?,
        None => BillingCycle::Monthly,
    };
    let provider =
        parse_provider(req.provider.as_deref()).map_err(BillingError::InvalidProvider)?;

    let result = state
        .create_invoice_handler()
        .handle(CreateInvoiceCommand {
            user: user.pubkey,
            tier,
            billing_cycle,
            apply_trust_discount: req.apply_wot_discount,
            provider,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse::from(&result.payment)),
    ))
}

/// `GET /api/payments/invoice/:id`
pub async fn get_invoice_status(
    State(state): State<PaymentsAppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id =
        PaymentId::parse(&id).map_err(|_| BillingError::PaymentNotFound(id.clone()))?;

    let payment = state
        .check_status_handler()
        .handle(CheckInvoiceStatusCommand {
            payment_id,
            caller: user,
        })
        .await?;

    Ok(Json(InvoiceStatusResponse::from(&payment)))
}

#[derive(Debug, Deserialize)]
pub struct WebhookParams {
    #[serde(default)]
    pub provider: Option<String>,
}

/// `POST /api/payments/webhook?provider=<type>`
///
/// Unrecognized payloads are acknowledged with `{success:false}` so the
/// sender stops retrying; only a bad signature is a client error. A
/// transient processing fault (provider re-poll down, database error)
/// propagates as 5xx so the provider redelivers the webhook.
pub async fn handle_webhook(
    State(state): State<PaymentsAppState>,
    Query(params): Query<WebhookParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let provider_hint = match parse_provider(params.provider.as_deref()) {
        Ok(hint) => hint,
        Err(raw) => {
            tracing::info!(provider = %raw, "Webhook named an unknown provider");
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

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// `GET /api/payments/history?limit=N`
pub async fn payment_history(
    State(state): State<PaymentsAppState>,
    RequireAuth(user): RequireAuth,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let payments = state
        .history_handler()
        .handle(PaymentHistoryCommand {
            caller: user,
            limit: params.limit,
        })
        .await?;

    Ok(Json(PaymentHistoryResponse {
        payments: payments.iter().map(InvoiceStatusEntry::from).collect(),
    }))
}

/// `GET /api/payments/receipt/:payment_id`
pub async fn get_receipt(
    State(state): State<PaymentsAppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id =
        PaymentId::parse(&id).map_err(|_| BillingError::PaymentNotFound(id.clone()))?;

    let receipt = state
        .receipt_handler()
        .handle(GetReceiptCommand {
            payment_id,
            caller: user,
        })
        .await?;

    Ok(Json(ReceiptResponse::from(receipt)))
}

/// Parses an optional provider tag, keeping the raw string on failure.
pub(crate) fn parse_provider(raw: Option<&str>) -> Result<Option<ProviderType>, String> {
    match raw {
        None => Ok(None),
        Some(raw) => ProviderType::parse(raw)
            .map(Some)
            .ok_or_else(|| raw.to_string()),
    }
}

/// Pulls the provider signature out of whichever header it arrived in.
pub(crate) fn webhook_signature(headers: &HeaderMap) -> Option<String> {
    ["btcpay-sig", "x-webhook-signature"]
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
