//! Session Service
//!
//! Entry point: loads configuration, connects the renewal store and serves
//! the HTTP API until SIGTERM or SIGINT.

use session_service::clock::SystemClock;
use session_service::codec::TokenCodec;
use session_service::config::{Config, StoreBackend};
use session_service::observability::metrics::init_metrics_recorder;
use session_service::routes::{self, AppState};
use session_service::services::{InMemoryUserDirectory, TokenService};
use session_service::store::{InMemoryRenewalStore, RedisRenewalStore, RenewalStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Session Service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        store_backend = ?config.store_backend,
        app_env = ?config.app_env,
        access_token_ttl_seconds = config.access_token_ttl.as_secs(),
        refresh_token_ttl_seconds = config.refresh_token_ttl.as_secs(),
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let clock = Arc::new(SystemClock);

    let store: Arc<dyn RenewalStore> = match config.store_backend {
        StoreBackend::Redis => {
            info!("Connecting to Redis...");
            let store = RedisRenewalStore::connect(&config.redis_url, config.redis_timeout)
                .await
                .map_err(|e| {
                    error!("Failed to connect to Redis: {}", e);
                    e
                })?;
            info!("Redis connection established");
            Arc::new(store)
        }
        StoreBackend::Memory => {
            warn!("Using in-memory renewal store; sessions will not survive a restart");
            Arc::new(InMemoryRenewalStore::new(clock.clone()))
        }
    };

    let codec = TokenCodec::new(&config.jwt_secret, clock, config.jwt_clock_skew);
    let tokens = Arc::new(TokenService::new(
        codec,
        store,
        config.access_token_ttl,
        config.refresh_token_ttl,
    ));
    let identity = Arc::new(InMemoryUserDirectory::new(config.bcrypt_cost).map_err(|e| {
        error!("Failed to initialize user directory: {}", e);
        e
    })?);

    let state = Arc::new(AppState::new(&config, tokens, identity));
    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Session Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.shutdown_drain))
        .await?;

    info!("Session Service shutdown complete");

    Ok(())
}

/// Text output by default, JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let (json_layer, text_layer) = if json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "session_service=debug,tower_http=debug".into()),
        )
        .with(json_layer)
        .with(text_layer)
        .init();
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and the drain period is complete.
async fn shutdown_signal(drain: Duration) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain.is_zero() {
        info!("Skipping drain period");
    } else {
        warn!("Draining connections for {} seconds...", drain.as_secs());
        tokio::time::sleep(drain).await;
        info!("Drain period complete");
    }
}
