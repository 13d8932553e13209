use anyhow::{Context, Result};
use axum::serve;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use mrf_api_gateway::{create_app, AppState};
use mrf_database::{initialize_database, UserRepository};
use mrf_utils::{init_logging, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load().unwrap_or_else(|error| {
        eprintln!("Failed to load configuration ({}), using defaults", error);
        AppConfig::default()
    });

    init_logging(&config.logging)?;
    info!("Starting MRF Tracker API Gateway");

    let pool = initialize_database(&config.database).await?;
    info!("Database connection established");

    let purged = UserRepository::new(pool.clone()).purge_expired_sessions().await?;
    info!(purged, "Expired sessions removed");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server host or port")?;

    let state = AppState::new(pool, config)?;
    let app = create_app(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("API Gateway listening on {}", addr);

    serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
