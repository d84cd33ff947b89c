//! Reply derivation for salesbot messages.

/// Normalized messages answered with [`GREETING_REPLY`].
pub const GREETINGS: [&str; 3] = ["hello", "hi", "hey"];

pub const GREETING_REPLY: &str = "Hello! How can I help you?";

/// Lead-in for echoed messages.
pub const ECHO_PREFIX: &str = "You said: ";

/// Sent instead of an empty reply; Kommo rejects empty `show` values.
pub const FALLBACK_REPLY: &str = "Sorry, I didn't catch that. Could you say it again?";

/// Derive the reply for a user message.
///
/// Greeting detection ignores case and surrounding whitespace. Anything else
/// is echoed back as written.
pub fn derive_reply(message: &str) -> String {
    let normalized = message.trim().to_lowercase();

    let reply = if GREETINGS.contains(&normalized.as_str()) {
        GREETING_REPLY.to_string()
    } else {
        format!("{}{}", ECHO_PREFIX, message)
    };

    ensure_non_empty(reply)
}

fn ensure_non_empty(reply: String) -> String {
    if reply.trim().is_empty() {
        FALLBACK_REPLY.to_string()
    } else {
        reply
    }
}
