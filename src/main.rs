use std::net::SocketAddr;

use anyhow::{Context, Result};
use tracing::{info, warn};
use translation_service::api::{self, AppState};
use translation_service::{config, store, TranslationService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translation_service=info".parse()?),
        )
        .init();

    info!("Starting translation service");

    // Load configuration from environment
    let config = config::Config::from_env()?;

    let store = store::connect(&config).await?;
    let service = TranslationService::new(store);

    if config.api_key.is_none() {
        warn!("API_KEY not set; /api routes are open to anyone who can reach this port");
    }

    let app = api::router(AppState::new(service, config.api_key.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("✓ Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
