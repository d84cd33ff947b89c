//! Kommo salesbot integration.
//!
//! This module provides:
//! - Wire types for the `widget_request` callback and the resume payload
//! - An async client that posts replies back to the salesbot
//!
//! ## Flow
//!
//! ```text
//! Salesbot → /kommo-webhook → reply → return_url → Salesbot resumes
//! ```

pub mod callback;
pub mod types;

pub use callback::{CallbackClient, CallbackError};
pub use types::{InboundCallback, SalesbotResume};
