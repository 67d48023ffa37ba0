//! # Dukan API Server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Start-up                                         │
//! │                                                                         │
//! │  tracing (RUST_LOG) ──► ApiConfig::load ──► Database::new (migrations)  │
//! │        ──► default exchange rate (first run) ──► axum::serve            │
//! │                                                  (graceful shutdown)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dukan_api::{router, ApiConfig, AppState};
use dukan_core::ExchangeRate;
use dukan_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dukan=debug,sqlx=warn")),
        )
        .with_target(true)
        .init();

    info!("Starting Dukan API server...");

    let config = ApiConfig::load().context("loading configuration")?;
    info!(
        port = config.http_port,
        database = %config.database_path,
        "Configuration loaded"
    );
    if config.uses_dev_secret() {
        warn!("Using the built-in JWT secret; set DUKAN_JWT_SECRET in production");
    }

    let db = Database::new(DbConfig::new(&config.database_path))
        .await
        .with_context(|| format!("opening database {}", config.database_path))?;
    info!("Database ready");

    let default_rate = ExchangeRate::from_f64(config.default_exchange_rate)?;
    if db.settings().init_exchange_rate(default_rate).await? {
        info!(rate = %default_rate, "No exchange rate stored, using configured default");
    }
    if !db.settings().has_admin_key().await? {
        warn!("No admin key set; destructive actions are locked until one is seeded");
    }

    let state = Arc::new(AppState::new(db.clone(), config.clone()));
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
