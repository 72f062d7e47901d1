//! NymMarket payment and settlement engine entrypoint.
//!
//! Wires configuration, the PostgreSQL stores, the Lightning provider
//! registry and the payout wallet into the HTTP application, then serves
//! it on the configured address.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use nym_market::adapters::auth::JwtSessionValidator;
use nym_market::adapters::http::{app_router, AuthState, MarketAppState, PaymentsAppState};
use nym_market::adapters::lightning::ProviderRegistry;
use nym_market::adapters::lnurl::{LnbitsWallet, LnurlClient, MockWallet};
use nym_market::adapters::memory::FixedTrustGraph;
use nym_market::adapters::postgres::{PostgresBillingStore, PostgresMarketplaceStore};
use nym_market::config::AppConfig;
use nym_market::ports::{NodeWallet, TrustGraph};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config);

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(config.database.idle_timeout())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        sqlx::migrate!().run(&pool).await?;
        tracing::info!("database migrations applied");
    }

    let registry = Arc::new(ProviderRegistry::from_config(&config.payment));
    if registry.is_empty() {
        tracing::warn!("no Lightning provider configured; invoice creation will fail");
    }

    let billing_store = Arc::new(PostgresBillingStore::new(pool.clone()));
    let marketplace_store = Arc::new(PostgresMarketplaceStore::new(pool.clone()));

    let trust_graph: Arc<dyn TrustGraph> = match config.payment.wot_discount_percent {
        Some(percent) if percent > 0 => Arc::new(FixedTrustGraph::new(percent)),
        _ => Arc::new(FixedTrustGraph::disabled()),
    };

    let wallet: Arc<dyn NodeWallet> = match &config.payment.payout_wallet {
        Some(payout) => Arc::new(LnbitsWallet::new(payout.clone())),
        None => {
            tracing::warn!("no payout wallet configured; seller payouts run against a mock wallet");
            Arc::new(MockWallet)
        }
    };

    let webhook_base = Some(config.server.base_url.trim_end_matches('/').to_string());

    let payments = PaymentsAppState {
        store: billing_store,
        registry: registry.clone(),
        trust_graph,
        webhook_base_url: webhook_base.clone(),
        invoice_expiry_secs: config.payment.invoice_expiry_secs,
    };

    let market = MarketAppState {
        store: marketplace_store,
        registry,
        resolver: Arc::new(LnurlClient::new()),
        wallet,
        fee_bps: config.payment.marketplace_fee_bps,
        webhook_base_url: webhook_base,
        invoice_expiry_secs: config.payment.invoice_expiry_secs,
    };

    let auth: AuthState = Arc::new(JwtSessionValidator::new(&config.auth.jwt_secret));

    let app = app_router(payments, market, auth, &config.server);

    let addr = config.server.socket_addr();
    tracing::info!(%addr, environment = ?config.server.environment, "starting nym-market");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone()));

    if config.is_production() {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
