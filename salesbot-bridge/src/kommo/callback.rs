//! Outbound delivery of salesbot replies.
//!
//! One POST per reply, bounded by a timeout, never retried. Failures are
//! returned to the caller, which only logs them.

use std::time::Duration;

use reqwest::{header::AUTHORIZATION, Client, StatusCode};
use thiserror::Error;
use tracing::info;
use url::Url;

use super::types::SalesbotResume;

/// Maximum number of response body bytes kept in a [`CallbackError::Status`].
const BODY_PREVIEW_LIMIT: usize = 200;

/// Errors raised while posting a reply to the salesbot.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("return url is not an absolute http(s) url: {0}")]
    InvalidUrl(String),

    #[error("callback timed out after {0:?}")]
    Timeout(Duration),

    #[error("callback request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("callback rejected with status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl CallbackError {
    /// Stable label for structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            CallbackError::InvalidUrl(_) => "invalid_url",
            CallbackError::Timeout(_) => "timeout",
            CallbackError::Request(_) => "request_error",
            CallbackError::Status { .. } => "bad_status",
        }
    }
}

/// HTTP client that resumes salesbots with a reply.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct CallbackClient {
    client: Client,
    bearer: String,
    timeout: Duration,
}

impl CallbackClient {
    /// Create a client that authenticates with the long-lived `bearer` token.
    pub fn new(bearer: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            bearer: bearer.into(),
            timeout,
        }
    }

    /// Post `reply` to `return_url`.
    pub async fn send_reply(&self, return_url: &str, reply: &str) -> Result<(), CallbackError> {
        let url = parse_return_url(return_url)?;
        let payload = SalesbotResume::text(reply);

        info!(
            return_url = %url,
            reply_length = reply.len(),
            timeout_seconds = self.timeout.as_secs_f64(),
            "kommo_callback_sending"
        );

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.bearer))
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CallbackError::Timeout(self.timeout)
                } else {
                    CallbackError::Request(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CallbackError::Status {
                status,
                body: truncate(&body, BODY_PREVIEW_LIMIT),
            });
        }

        info!(status_code = status.as_u16(), "kommo_callback_accepted");

        Ok(())
    }
}

/// Accept only absolute http and https URLs.
fn parse_return_url(raw: &str) -> Result<Url, CallbackError> {
    match Url::parse(raw.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(url),
        _ => Err(CallbackError::InvalidUrl(raw.to_string())),
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
