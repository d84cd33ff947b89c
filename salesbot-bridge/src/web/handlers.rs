//! Webhook endpoint handlers.
//!
//! The Kommo handler acknowledges first and works afterwards:
//! 1. Parse the body leniently
//! 2. Hand the callback to a detached task
//! 3. Return 200 with an empty body
//!
//! Validation, reply derivation and delivery happen on the detached task and
//! are only visible in the logs. Tasks are tracked so shutdown can wait for
//! replies that are still in flight.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::kommo::{CallbackClient, CallbackError, InboundCallback};
use crate::reply::derive_reply;
use crate::web::token::{verify_token, TokenError};
use crate::Config;

/// Plain-text body served on `/`.
pub const ROOT_MESSAGE: &str = "Kommo salesbot bridge is running";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub callback: CallbackClient,
    /// In-flight reply tasks
    pub tasks: TaskTracker,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let callback = CallbackClient::new(config.long_lived_token.clone(), config.callback_timeout());
        Self::with_callback(config, callback)
    }

    pub fn with_callback(config: Config, callback: CallbackClient) -> Self {
        Self {
            config: Arc::new(config),
            callback,
            tasks: TaskTracker::new(),
        }
    }

    /// Stop accepting reply tasks and wait for the running ones.
    ///
    /// Returns `false` when tasks were still pending after `timeout`.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tasks.close();
        let pending = self.tasks.len();

        if pending == 0 {
            return true;
        }

        info!(pending_tasks = pending, "reply_tasks_draining");

        match tokio::time::timeout(timeout, self.tasks.wait()).await {
            Ok(()) => {
                info!("reply_tasks_drained");
                true
            }
            Err(_) => {
                warn!(
                    pending_tasks = self.tasks.len(),
                    timeout_seconds = timeout.as_secs_f64(),
                    "reply_tasks_abandoned"
                );
                false
            }
        }
    }
}

// =============================================================================
// Liveness
// =============================================================================

/// Root endpoint confirming the process is up.
pub async fn root() -> &'static str {
    ROOT_MESSAGE
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Kommo Webhook
// =============================================================================

/// Why a callback was dropped without a reply.
#[derive(Debug)]
pub enum SkipReason {
    EmptyMessage,
    MissingToken,
    MissingReturnUrl,
    InvalidToken(TokenError),
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::EmptyMessage => "empty_message",
            SkipReason::MissingToken => "missing_token",
            SkipReason::MissingReturnUrl => "missing_return_url",
            SkipReason::InvalidToken(_) => "invalid_token",
        }
    }
}

/// Result of processing one callback.
#[derive(Debug)]
pub enum Outcome {
    Delivered { reply: String },
    Skipped(SkipReason),
    DeliveryFailed(CallbackError),
}

/// Kommo salesbot webhook endpoint.
///
/// Always answers 200 with an empty body, whatever the payload. A body that
/// cannot be read (over the size limit, aborted) is handled as empty.
pub async fn kommo_webhook(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> StatusCode {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            warn!(status_code = e.status().as_u16(), error = %e, "kommo_body_rejected");
            Bytes::new()
        }
    };
    let callback = InboundCallback::from_body(&body);

    info!(
        body_length = body.len(),
        has_token = callback.token.is_some(),
        has_message = callback.normalized_message().is_some(),
        has_return_url = callback.return_url.is_some(),
        "kommo_webhook_received"
    );

    let tasks = state.tasks.clone();
    tasks.spawn(async move {
        process_callback(&state, callback).await;
    });

    StatusCode::OK
}

/// Validate a callback, derive the reply and post it to the salesbot.
///
/// Never fails: every problem ends as a logged [`Outcome`].
pub async fn process_callback(state: &AppState, callback: InboundCallback) -> Outcome {
    let message = match callback.normalized_message() {
        Some(m) => m,
        None => return skip(SkipReason::EmptyMessage),
    };

    let token = match callback.token.as_deref() {
        Some(t) => t,
        None => return skip(SkipReason::MissingToken),
    };

    let return_url = match callback.return_url.as_deref() {
        Some(u) => u,
        None => return skip(SkipReason::MissingReturnUrl),
    };

    let claims = match verify_token(&state.config.secret_key, token, state.config.token_leeway_secs) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(reason = e.reason(), error = %e, "kommo_token_invalid");
            return skip(SkipReason::InvalidToken(e));
        }
    };

    let reply = derive_reply(message);

    info!(
        issuer = ?claims.iss,
        account_id = ?claims.account_id,
        message_length = message.len(),
        reply_length = reply.len(),
        "kommo_reply_derived"
    );

    match state.callback.send_reply(return_url, &reply).await {
        Ok(()) => {
            info!(return_url = %return_url, "kommo_reply_delivered");
            Outcome::Delivered { reply }
        }
        Err(e) => {
            error!(
                return_url = %return_url,
                reason = e.reason(),
                error = %e,
                "kommo_callback_failed"
            );
            Outcome::DeliveryFailed(e)
        }
    }
}

fn skip(reason: SkipReason) -> Outcome {
    info!(reason = reason.as_str(), "kommo_webhook_skipped");
    Outcome::Skipped(reason)
}
