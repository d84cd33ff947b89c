//! Salesbot Bridge - answers Kommo salesbot widget requests.
//!
//! The `salesbot-web` binary serves a single webhook. Each request is
//! acknowledged at once, then handled on a detached task:
//!
//! ```text
//! Salesbot → /kommo-webhook → 200 OK
//!                 └→ verify token → derive reply → POST return_url → Salesbot
//! ```

pub mod config;
pub mod kommo;
pub mod reply;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use kommo::{CallbackClient, CallbackError, InboundCallback, SalesbotResume};
pub use reply::derive_reply;
pub use web::{router, AppState};
