//! # mediation-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the mediation API.
//! Binds to configurable port (default 8080).

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;

use mediation_api::state::{AppConfig, AppState, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("reading configuration")?;

    // Initialize structured tracing.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    let metrics = if config.metrics_enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("installing Prometheus recorder")?;
        Some(handle)
    } else {
        tracing::info!("metrics disabled; /metrics will return 404");
        None
    };

    // Initialize database pool (optional; absent means in-memory only).
    let db_pool = mediation_api::db::init_pool(config.database_url.as_deref())
        .await
        .map_err(|e| {
            tracing::error!("Database initialization failed: {e}");
            e
        })?;

    let port = config.port;
    let state = AppState::with_config(config, db_pool, metrics);

    // Hydrate in-memory stores from database (if connected).
    state.hydrate_from_db().await.map_err(|e| {
        tracing::error!("Database hydration failed: {e}");
        e
    })?;

    mediation_api::bootstrap::seed_admin(&state)
        .await
        .map_err(|e| {
            tracing::error!("Admin seed failed: {e}");
            e
        })?;

    let app = mediation_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Mediation API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
