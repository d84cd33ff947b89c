//! Kommo widget token verification.
//!
//! The salesbot signs every `widget_request` with a JWT using the
//! integration's secret key. Only the HMAC family is accepted; time claims
//! are checked with a configurable clock-skew allowance.

use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Algorithms a shared-secret token may be signed with.
const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Claims carried by a widget token. All of them are optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TokenClaims {
    pub iss: Option<String>,
    pub sub: Option<String>,
    pub exp: Option<u64>,
    pub nbf: Option<u64>,
    pub iat: Option<u64>,
    /// Kommo account the salesbot runs in (number or string depending on issuer)
    pub account_id: Option<Value>,
}

/// Reasons a token is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is empty")]
    Empty,

    #[error("token has expired")]
    Expired,

    #[error("token is not valid yet")]
    Premature,

    #[error("token signature does not match")]
    BadSignature,

    #[error("token is signed with an unsupported algorithm")]
    Algorithm,

    #[error("token is malformed: {0}")]
    Malformed(String),
}

impl TokenError {
    /// Stable label for structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::Empty => "empty",
            TokenError::Expired => "expired",
            TokenError::Premature => "premature",
            TokenError::BadSignature => "bad_signature",
            TokenError::Algorithm => "algorithm",
            TokenError::Malformed(_) => "malformed",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::ImmatureSignature => TokenError::Premature,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => TokenError::Algorithm,
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// Verify a widget token against the shared `secret`.
///
/// `exp` and `nbf` are enforced when present, each with `leeway_secs` of
/// tolerance. The audience is not checked.
pub fn verify_token(secret: &str, token: &str, leeway_secs: u64) -> Result<TokenClaims, TokenError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::Empty);
    }

    // An empty key would verify tokens signed with an empty key
    if secret.is_empty() {
        return Err(TokenError::BadSignature);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = HMAC_ALGORITHMS.to_vec();
    validation.required_spec_claims.clear();
    validation.leeway = leeway_secs;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.validate_aud = false;

    let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;

    debug!(
        algorithm = ?data.header.alg,
        issuer = ?data.claims.iss,
        "kommo_token_verified"
    );

    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, get_current_timestamp, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "test-secret-key";

    fn sign(claims: &Value, alg: Algorithm, secret: &str) -> String {
        encode(
            &Header::new(alg),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn valid_claims() -> Value {
        let now = get_current_timestamp();
        json!({
            "iss": "https://example.kommo.com",
            "iat": now,
            "nbf": now,
            "exp": now + 600,
            "account_id": 123456
        })
    }

    #[test]
    fn test_verify_valid_token() {
        let token = sign(&valid_claims(), Algorithm::HS256, SECRET);

        let claims = verify_token(SECRET, &token, 30).unwrap();

        assert_eq!(claims.iss.as_deref(), Some("https://example.kommo.com"));
        assert_eq!(claims.account_id, Some(json!(123456)));
    }

    #[test]
    fn test_verify_other_hmac_algorithms() {
        for alg in [Algorithm::HS384, Algorithm::HS512] {
            let token = sign(&valid_claims(), alg, SECRET);
            assert!(verify_token(SECRET, &token, 30).is_ok(), "{alg:?} rejected");
        }
    }

    #[test]
    fn test_verify_token_without_time_claims() {
        let token = sign(&json!({ "sub": "bot" }), Algorithm::HS256, SECRET);
        assert!(verify_token(SECRET, &token, 30).is_ok());
    }

    #[test]
    fn test_verify_wrong_secret() {
        let token = sign(&valid_claims(), Algorithm::HS256, "other-secret");
        assert_eq!(verify_token(SECRET, &token, 30), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_verify_expired() {
        let now = get_current_timestamp();
        let token = sign(&json!({ "exp": now - 600 }), Algorithm::HS256, SECRET);
        assert_eq!(verify_token(SECRET, &token, 30), Err(TokenError::Expired));
    }

    #[test]
    fn test_verify_expired_within_leeway() {
        let now = get_current_timestamp();
        let token = sign(&json!({ "exp": now - 10 }), Algorithm::HS256, SECRET);
        assert!(verify_token(SECRET, &token, 30).is_ok());
    }

    #[test]
    fn test_verify_not_yet_valid() {
        let now = get_current_timestamp();
        let token = sign(&json!({ "nbf": now + 600, "exp": now + 1200 }), Algorithm::HS256, SECRET);
        assert_eq!(verify_token(SECRET, &token, 30), Err(TokenError::Premature));
    }

    #[test]
    fn test_verify_not_yet_valid_within_leeway() {
        let now = get_current_timestamp();
        let token = sign(&json!({ "nbf": now + 10, "exp": now + 600 }), Algorithm::HS256, SECRET);
        assert!(verify_token(SECRET, &token, 30).is_ok());
    }

    #[test]
    fn test_verify_malformed() {
        let err = verify_token(SECRET, "not-a-jwt", 30).unwrap_err();
        assert_eq!(err.reason(), "malformed");
    }

    #[test]
    fn test_verify_empty_inputs() {
        let token = sign(&valid_claims(), Algorithm::HS256, SECRET);
        assert_eq!(verify_token(SECRET, "  ", 30), Err(TokenError::Empty));
        assert_eq!(verify_token("", &token, 30), Err(TokenError::BadSignature));
    }
}
