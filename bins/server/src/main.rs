//! Tally API Server
//!
//! Main entry point for the Tally ledger service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusHandle;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tally_api::{AppState, create_router, telemetry};
use tally_db::{OperationTypeRepository, connect, ledger_service, migration::Migrator, pool_metrics};
use tally_shared::AppConfig;
use tally_shared::config::LogFormat;

/// How often pool gauges are refreshed and histograms drained.
const METRICS_INTERVAL: Duration = Duration::from_secs(5);

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "tally=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Refreshes pool gauges and runs exporter upkeep until aborted.
async fn maintain_metrics(
    db: DatabaseConnection,
    max_connections: u32,
    handle: PrometheusHandle,
) {
    let mut ticker = tokio::time::interval(METRICS_INTERVAL);
    loop {
        ticker.tick().await;
        pool_metrics::record_pool_stats(&db, max_connections);
        handle.run_upkeep();
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
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing and metrics
    init_tracing(config.logging.format);
    let metrics = telemetry::install_recorder().context("Failed to install metrics recorder")?;

    // Connect to database
    let db = connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!(
        max_connections = config.database.max_connections,
        "Connected to database"
    );

    if config.database.run_migrations {
        Migrator::up(&db, None).await.context("Migration failed")?;
        let seeded = OperationTypeRepository::new(db.clone())
            .seed_defaults()
            .await
            .context("Seeding operation types failed")?;
        info!(seeded, "Migrations applied");
    }

    let metrics_task = tokio::spawn(maintain_metrics(
        db.clone(),
        config.database.max_connections,
        metrics.clone(),
    ));

    // Create application state
    let state = AppState::new(
        Arc::new(ledger_service(&db)),
        config.server.request_timeout(),
        metrics,
    );

    // Create router
    let app = create_router(state);

    // Start server
    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    metrics_task.abort();
    db.close().await?;
    info!("Server stopped");

    Ok(())
}
