//! Gatepass server.
//!
//! Connects to `PostgreSQL`, applies migrations, syncs the tier catalog and
//! serves the HTTP API.
//!
//! ```bash
//! docker compose up -d postgres
//! cargo run -p gatepass-server --bin server
//! ```

use anyhow::Context;
use gatepass_core::environment::{Clock, SystemClock};
use gatepass_postgres::PostgresStore;
use gatepass_server::{AppState, Config, build_router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gatepass=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Gatepass server...");

    let config = Config::from_env().context("Failed to load configuration")?;
    for key in config.insecure_defaults() {
        tracing::warn!(key, "Secret is using its development default");
    }
    tracing::info!(
        event = %config.event.tag,
        tiers = config.tiers.len(),
        "Configuration loaded"
    );

    let metrics_addr: SocketAddr = config
        .metrics_address()
        .parse()
        .context("Invalid metrics address")?;
    gatepass_server::metrics::install_exporter(metrics_addr)
        .context("Failed to install metrics exporter")?;

    let store = PostgresStore::connect(
        &config.database.url,
        config.database.max_connections,
        Duration::from_secs(config.database.acquire_timeout),
    )
    .await
    .context("Failed to connect to PostgreSQL")?;
    tracing::info!("PostgreSQL connected");

    store.migrate().await.context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    store
        .sync_tiers(&config.tiers)
        .await
        .context("Failed to sync tier catalog")?;
    tracing::info!("Tier catalog synced");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState::build(&config, Arc::new(store), clock)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address()))?;
    tracing::info!(addr = %config.bind_address(), "Gatepass server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down gracefully...");
        })
        .await
        .context("Server error")?;
    Ok(())
}
