//! # Tienda API Server
//!
//! Binary entry point: configuration, tracing, database, cloud wiring and
//! the HTTP listener with graceful shutdown.
//!
//! ## Startup
//! ```text
//! .env ──► ApiConfig::load ──► init_tracing ──► Database::new (migrations)
//!                                                     │
//!                              tienda_cloud::connect ─┤
//!                                                     ▼
//!                              AppState ──► create_router ──► axum::serve
//! ```

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tienda_api::{create_router, ApiConfig, AppState};
use tienda_db::{Database, DbConfig};

const DEFAULT_LOG_FILTER: &str = "info,tienda=debug,sqlx=warn";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal in production
    let dotenv = dotenvy::dotenv();

    init_tracing();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded .env file");
    }

    info!("Starting Tienda API server...");

    let config = ApiConfig::load().context("invalid configuration")?;
    info!(
        addr = %config.bind_addr,
        database = %config.database_path.display(),
        cloud_enabled = config.cloud.is_enabled(),
        "Configuration loaded"
    );

    let db = Database::new(
        DbConfig::new(config.database_path.clone()).max_connections(config.db_max_connections),
    )
    .await
    .context("database initialization failed")?;
    info!("Database ready");

    let store = tienda_cloud::connect(&config.cloud).context("cloud client setup failed")?;

    let addr = config.bind_addr;
    let state = AppState::new(db.clone(), store, config);
    let app = create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
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
