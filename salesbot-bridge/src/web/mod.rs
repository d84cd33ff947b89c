//! Web server module for the Kommo salesbot webhook.
//!
//! This module provides a thin web server that:
//! - Receives `widget_request` callbacks from the salesbot
//! - Returns 200 OK before doing any work
//! - Verifies the signed token, derives a reply and posts it back on a
//!   detached task
//!
//! The caller never learns about validation or delivery failures; they are
//! only logged.

pub mod handlers;
pub mod token;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    health, kommo_webhook, process_callback, root, AppState, HealthResponse, Outcome, SkipReason,
};
pub use token::{verify_token, TokenClaims, TokenError};

/// Path the salesbot `widget_request` step posts to.
pub const WEBHOOK_PATH: &str = "/kommo-webhook";

/// Largest request body read into memory. Larger bodies are acknowledged
/// and dropped.
pub const MAX_BODY_BYTES: usize = 256 * 1024;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(WEBHOOK_PATH, post(kommo_webhook))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
