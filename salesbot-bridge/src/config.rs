//! Configuration module for environment variable parsing.
//!
//! Everything is read once at startup. The resulting [`Config`] is immutable
//! and shared with the handlers through `Arc`.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Port used when `PORT` is unset or invalid.
pub const DEFAULT_PORT: u16 = 3000;

/// Clock-skew allowance applied to `exp`/`nbf` checks, in seconds.
pub const DEFAULT_TOKEN_LEEWAY_SECS: u64 = 30;

/// Timeout for the outbound salesbot callback, in milliseconds.
pub const DEFAULT_CALLBACK_TIMEOUT_MS: u64 = 5000;

/// Errors raised while loading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Shared secret used to verify inbound widget tokens
    pub secret_key: String,

    /// Long-lived Kommo token sent as the bearer on callbacks
    pub long_lived_token: String,

    /// Port for the web server to listen on
    pub port: u16,

    /// Allowed clock skew when checking token time claims
    pub token_leeway_secs: u64,

    /// Outbound callback timeout in milliseconds
    pub callback_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// `from_env` is the production entry point; tests pass a closure over a
    /// fixed map so they never touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Config {
            secret_key: required(&lookup, "KOMMO_SECRET_KEY")?,
            long_lived_token: required(&lookup, "KOMMO_LONG_LIVED_TOKEN")?,
            port: parse_or_default(&lookup, "PORT", DEFAULT_PORT),
            token_leeway_secs: parse_or_default(
                &lookup,
                "TOKEN_LEEWAY_SECS",
                DEFAULT_TOKEN_LEEWAY_SECS,
            ),
            callback_timeout_ms: parse_or_default(
                &lookup,
                "CALLBACK_TIMEOUT_MS",
                DEFAULT_CALLBACK_TIMEOUT_MS,
            ),
        })
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback_timeout_ms)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("secret_key", &"<redacted>")
            .field("long_lived_token", &"<redacted>")
            .field("port", &self.port)
            .field("token_leeway_secs", &self.token_leeway_secs)
            .field("callback_timeout_ms", &self.callback_timeout_ms)
            .finish()
    }
}

/// Load a `.env` file into the process environment.
///
/// With `None` the file is searched from the working directory upwards.
/// Variables already set are left alone. Returns the loaded file, if any.
pub fn load_dotenv(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) => dotenvy::from_path(path).ok().map(|_| path.to_path_buf()),
        None => dotenvy::dotenv().ok(),
    }
}

/// Read a variable that must be present and non-blank.
fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Parse a variable, falling back to `default` when unset or invalid.
fn parse_or_default<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy,
{
    let raw = match lookup(name) {
        Some(v) => v,
        None => return default,
    };

    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("KOMMO_SECRET_KEY", "secret"),
            ("KOMMO_LONG_LIVED_TOKEN", "bearer"),
        ]))
        .unwrap();

        assert_eq!(config.secret_key, "secret");
        assert_eq!(config.long_lived_token, "bearer");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.token_leeway_secs, DEFAULT_TOKEN_LEEWAY_SECS);
        assert_eq!(config.callback_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_overrides_parsed() {
        let config = Config::from_lookup(lookup_from(&[
            ("KOMMO_SECRET_KEY", "secret"),
            ("KOMMO_LONG_LIVED_TOKEN", "bearer"),
            ("PORT", "8081"),
            ("TOKEN_LEEWAY_SECS", " 45 "),
            ("CALLBACK_TIMEOUT_MS", "1500"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.token_leeway_secs, 45);
        assert_eq!(config.callback_timeout_ms, 1500);
    }

    #[test]
    fn test_invalid_number_uses_default() {
        let config = Config::from_lookup(lookup_from(&[
            ("KOMMO_SECRET_KEY", "secret"),
            ("KOMMO_LONG_LIVED_TOKEN", "bearer"),
            ("PORT", "not-a-port"),
        ]))
        .unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_missing_secret() {
        let result = Config::from_lookup(lookup_from(&[("KOMMO_LONG_LIVED_TOKEN", "bearer")]));
        assert_eq!(result.unwrap_err(), ConfigError::Missing("KOMMO_SECRET_KEY"));
    }

    #[test]
    fn test_blank_bearer_is_missing() {
        let result = Config::from_lookup(lookup_from(&[
            ("KOMMO_SECRET_KEY", "secret"),
            ("KOMMO_LONG_LIVED_TOKEN", "   "),
        ]));
        assert_eq!(
            result.unwrap_err(),
            ConfigError::Missing("KOMMO_LONG_LIVED_TOKEN")
        );
    }

    #[test]
    fn test_load_dotenv_file() {
        let path = env::temp_dir().join(format!("salesbot-test-{}.env", std::process::id()));
        std::fs::write(
            &path,
            "SALESBOT_TEST_DOTENV_SECRET=from-file\nSALESBOT_TEST_DOTENV_KEPT=from-file\n",
        )
        .unwrap();
        env::set_var("SALESBOT_TEST_DOTENV_KEPT", "from-env");

        assert_eq!(load_dotenv(Some(&path)), Some(path.clone()));
        assert_eq!(env::var("SALESBOT_TEST_DOTENV_SECRET").unwrap(), "from-file");
        assert_eq!(env::var("SALESBOT_TEST_DOTENV_KEPT").unwrap(), "from-env");

        env::remove_var("SALESBOT_TEST_DOTENV_SECRET");
        env::remove_var("SALESBOT_TEST_DOTENV_KEPT");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_dotenv_missing_file() {
        let path = env::temp_dir().join("salesbot-test-does-not-exist.env");
        assert_eq!(load_dotenv(Some(&path)), None);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::from_lookup(lookup_from(&[
            ("KOMMO_SECRET_KEY", "super-secret"),
            ("KOMMO_LONG_LIVED_TOKEN", "bearer-value"),
        ]))
        .unwrap();

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("bearer-value"));
        assert!(rendered.contains("<redacted>"));
    }
}
