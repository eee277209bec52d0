//! RAG Gateway
//!
//! This is the main entry point for the application.

use anyhow::{Context, Result};
use rag_gateway::{bootstrap, config, network::HttpClient, web::create_router};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let (settings, source) = config::load()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(settings.logging.with_target)
        .init();

    info!("Starting RAG Gateway v{}", rag_gateway::VERSION);
    match source {
        Some(path) => info!("Loaded settings from: {}", path.display()),
        None => info!("No settings file found, using defaults"),
    }

    // Initialize HTTP client
    let client = HttpClient::with_settings(&settings.outgoing)?;
    info!("HTTP client initialized");

    // Resolve secrets and build the collaborator clients
    let addr = SocketAddr::new(
        settings
            .server
            .bind_address
            .parse()
            .context("invalid server.bind_address")?,
        settings.server.port,
    );
    let state = bootstrap::build_state(settings, client).await?;
    info!("Application state initialized");

    // Create router
    let app = create_router(state);

    info!("Starting server on http://{}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
