//! Salesbot Bridge Web Server.
//!
//! This binary serves the Kommo salesbot webhook:
//! - Acknowledges every `widget_request` with 200 OK immediately
//! - Verifies the signed token in the background
//! - Posts the derived reply back to the salesbot's `return_url`
//! - Waits for in-flight replies before exiting

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use salesbot::{config, router, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before anything reads the environment (RUST_LOG included)
    let dotenv_path = config::load_dotenv(None);

    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!(
        dotenv_loaded = dotenv_path.is_some(),
        dotenv_path = ?dotenv_path,
        "web_server_starting"
    );

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        port = config.port,
        token_leeway_secs = config.token_leeway_secs,
        callback_timeout_ms = config.callback_timeout_ms,
        "config_loaded"
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let drain_timeout = config.callback_timeout();
    let state = AppState::new(config);
    let app = router(state.clone());

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Replies already acknowledged to the salesbot still get delivered
    state.drain(drain_timeout).await;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
