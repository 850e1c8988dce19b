//! Tally API Server
//!
//! Main entry point for the ledger write-path service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tally_api::{AppState, create_router};
use tally_core::idempotency::{
    IdempotencyGateway, IdempotencyStore, MemoryIdempotencyStore, RedisIdempotencyStore,
};
use tally_db::connect_pool;
use tally_shared::{AppConfig, IdempotencyBackend, JwtConfig, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(config.log.json);

    let db = Arc::new(
        connect_pool(&config.database)
            .await
            .context("Failed to connect to database")?,
    );
    info!("Connected to database");

    let jwt_service = JwtService::new(JwtConfig {
        secret: config.jwt.secret.clone(),
        access_token_expires_minutes: i64::try_from(config.jwt.access_token_expiry_secs / 60)
            .context("jwt.access_token_expiry_secs is too large")?,
    });

    let store = idempotency_store(&config).await?;
    let state = AppState {
        db: Arc::clone(&db),
        jwt_service: Arc::new(jwt_service),
        idempotency: IdempotencyGateway::from_config(store, &config.idempotency),
        tenant_tx_timeout: config
            .database
            .tenant_tx_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
        max_body_bytes: config.idempotency.max_body_bytes,
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Closing database pool");
    match Arc::try_unwrap(db) {
        Ok(db) => db.close().await?,
        Err(_) => tracing::warn!("Database pool still shared at shutdown, dropping it"),
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tally=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn idempotency_store(config: &AppConfig) -> anyhow::Result<Arc<dyn IdempotencyStore>> {
    let settings = &config.idempotency;
    match settings.backend {
        IdempotencyBackend::Memory => {
            let store = Arc::new(MemoryIdempotencyStore::new());
            store.spawn_sweeper(Duration::from_secs(settings.sweep_interval_secs));
            info!(
                sweep_interval_secs = settings.sweep_interval_secs,
                "Using in-memory idempotency store"
            );
            Ok(store)
        }
        IdempotencyBackend::Redis => {
            let url = settings
                .redis_url
                .as_deref()
                .context("idempotency.redis_url is required when backend is redis")?;
            let store = RedisIdempotencyStore::connect(url)
                .await
                .context("Failed to connect to Redis")?;
            info!("Using Redis idempotency store");
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
