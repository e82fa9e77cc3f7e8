//! Flowgate gateway server binary.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use url::Url;

use flowgate_api::AppState;
use flowgate_api::config::ApiConfig;
use flowgate_core::auth::codec::TokenCodec;
use flowgate_core::auth::service::TokenService;
use flowgate_core::auth::store::{PgRefreshTokenStore, RefreshTokenStore};
use flowgate_core::clients::engine::HttpUpstreamEngine;
use flowgate_core::clients::identity::HttpIdentityProvider;
use flowgate_core::clients::ledger::HttpCreditLedger;
use flowgate_core::credits::{CreditGate, OperationCosts};
use flowgate_core::history::PgMessageStore;
use flowgate_core::relay::StreamRelay;
use flowgate_core::users::PgUserStore;

/// CLI arguments for the gateway server.
#[derive(Parser, Debug)]
#[command(name = "flowgate_server", about = "Flowgate gateway server")]
struct Args {
    /// Address to bind (overrides BIND_ADDR).
    #[arg(long)]
    bind_addr: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/flowgate"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,flowgate_api=debug,flowgate_core=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let mut config = ApiConfig::from_env();
    if let Some(bind_addr) = args.bind_addr {
        config.bind_addr = bind_addr;
    }
    config.database_url = args.database_url.clone();

    info!(bind_addr = %config.bind_addr, "starting flowgate_server");

    let pool = flowgate_core::db::connect_pool(&args.database_url, args.max_connections).await?;

    info!("running database migrations");
    flowgate_core::migrate::migrate(&pool).await?;

    let codec = TokenCodec::new(
        &config.access_token_secret,
        &config.refresh_token_secret,
        &config.token_issuer,
        &config.token_audience,
    );

    let http = reqwest::Client::new();
    let identity = Arc::new(HttpIdentityProvider::new(
        Url::parse(&config.identity_base_url)?,
        http.clone(),
    ));
    let ledger = Arc::new(HttpCreditLedger::new(
        Url::parse(&config.ledger_base_url)?,
        http.clone(),
    ));
    let engine = Arc::new(HttpUpstreamEngine::new(
        Url::parse(&config.engine_base_url)?,
        config.engine_api_key.clone(),
        http,
    ));

    let users = Arc::new(PgUserStore::new(pool.clone()));
    let refresh_store = Arc::new(PgRefreshTokenStore::new(pool.clone()));
    let tokens = Arc::new(TokenService::new(
        codec.clone(),
        refresh_store.clone(),
        users.clone(),
    ));

    // Hourly sweep of expired refresh token records. Validity checks
    // already treat them as dead; this keeps the table from growing.
    let purge_store = refresh_store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));
        interval.tick().await;
        loop {
            interval.tick().await;
            match purge_store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "purged expired refresh tokens"),
                Err(e) => warn!(error = %e, "refresh token purge failed"),
            }
        }
    });
    let credits = Arc::new(CreditGate::new(
        ledger.clone(),
        OperationCosts {
            prediction: config.prediction_cost,
        },
        Duration::from_millis(config.admission_timeout_ms),
    ));
    let relay = Arc::new(StreamRelay::new(
        engine.clone(),
        ledger,
        Arc::new(PgMessageStore::new(pool)),
    ));

    let state = AppState {
        config: config.clone(),
        codec,
        tokens,
        users,
        identity,
        credits,
        engine,
        relay,
    };

    let app = flowgate_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
