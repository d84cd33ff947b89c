//! Wire types for the Kommo salesbot `widget_request` exchange.
//!
//! This module defines:
//! - the inbound callback Kommo posts to `/kommo-webhook`
//! - the resume payload posted back to the callback's `return_url`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Name of the salesbot handler that renders a value in the chat.
pub const SHOW_HANDLER: &str = "show";

/// Display type used with [`SHOW_HANDLER`].
pub const TEXT_DISPLAY: &str = "text";

// =============================================================================
// Inbound Callback
// =============================================================================

/// Inbound widget request sent by the salesbot.
///
/// Parsing is lenient: Kommo reuses the webhook path for triggers that carry
/// no message, so anything unexpected becomes an absent field instead of a
/// rejected request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundCallback {
    /// Signed JWT issued by Kommo
    pub token: Option<String>,
    /// `data.message` as sent, untrimmed
    pub message: Option<String>,
    /// Address that resumes the salesbot
    pub return_url: Option<String>,
}

impl InboundCallback {
    /// Parse a raw request body.
    ///
    /// Non-JSON bodies and non-object documents yield an empty callback.
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => Self::from_value(&value),
            Err(e) => {
                debug!(error = %e, body_length = body.len(), "kommo_body_not_json");
                Self::default()
            }
        }
    }

    /// Extract the callback fields from a parsed JSON document.
    pub fn from_value(value: &Value) -> Self {
        let message = value
            .get("data")
            .and_then(|data| data.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            token: non_empty_str(value.get("token")),
            message,
            return_url: non_empty_str(value.get("return_url")),
        }
    }

    /// The message with surrounding whitespace removed, `None` when empty.
    pub fn normalized_message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

// =============================================================================
// Salesbot Resume Payload
// =============================================================================

/// Body posted to `return_url` to continue the salesbot flow.
///
/// The reply travels twice: as raw data for later bot steps and as a `show`
/// handler so the chat renders it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SalesbotResume {
    pub data: ResumeData,
    pub execute_handlers: Vec<ExecuteHandler>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResumeData {
    pub message: String,
}

/// A single salesbot handler invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecuteHandler {
    pub handler: String,
    pub params: HandlerParams,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandlerParams {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl SalesbotResume {
    /// Build a resume payload that shows `reply` as text.
    pub fn text(reply: &str) -> Self {
        Self {
            data: ResumeData {
                message: reply.to_string(),
            },
            execute_handlers: vec![ExecuteHandler {
                handler: SHOW_HANDLER.to_string(),
                params: HandlerParams {
                    kind: TEXT_DISPLAY.to_string(),
                    value: reply.to_string(),
                },
            }],
        }
    }
}
