//! Bearer token verification.
//!
//! Tokens are issued by the platform's identity service and signed with a
//! shared HS256 secret. This service only verifies them and reads the
//! caller's id; it never mints tokens.

use batchgen_core::types::DbId;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Default clock-skew allowance when checking `exp`.
const DEFAULT_LEEWAY_SECS: u64 = 60;

/// The claims this service reads. Unknown claims are ignored.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// The caller's internal database id.
    pub sub: DbId,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtConfig {
    /// Shared HMAC-SHA256 secret.
    pub secret: String,
    /// Seconds of clock skew tolerated on `exp`.
    pub leeway_secs: u64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

impl JwtConfig {
    /// Load from the environment.
    ///
    /// | Env Var           | Required | Default |
    /// |-------------------|----------|---------|
    /// | `JWT_SECRET`      | **yes**  | --      |
    /// | `JWT_LEEWAY_SECS` | no       | `60`    |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is missing or empty, or the leeway does not parse.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let leeway_secs = std::env::var("JWT_LEEWAY_SECS")
            .map(|v| v.parse().expect("JWT_LEEWAY_SECS must be a valid u64"))
            .unwrap_or(DEFAULT_LEEWAY_SECS);

        Self {
            secret,
            leeway_secs,
        }
    }
}

/// Verify signature and expiry, returning the caller's claims.
pub fn verify_access_token(
    token: &str,
    config: &JwtConfig,
) -> Result<AccessClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.leeway = config.leeway_secs;
    validation.set_required_spec_claims(&["exp", "sub"]);

    decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::*;

    const SECRET: &str = "shared-secret-for-batch-tests";

    fn config() -> JwtConfig {
        JwtConfig {
            secret: SECRET.to_string(),
            leeway_secs: 0,
        }
    }

    fn sign(claims: &serde_json::Value, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn in_minutes(mins: i64) -> i64 {
        chrono::Utc::now().timestamp() + mins * 60
    }

    #[test]
    fn valid_token_yields_caller_id() {
        let token = sign(
            &serde_json::json!({"sub": 42, "exp": in_minutes(5), "role": "editor"}),
            SECRET,
        );
        let claims = verify_access_token(&token, &config()).unwrap();
        assert_eq!(claims.sub, 42);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = sign(&serde_json::json!({"sub": 1, "exp": in_minutes(-5)}), SECRET);
        assert!(verify_access_token(&token, &config()).is_err());
    }

    #[test]
    fn leeway_tolerates_small_clock_skew() {
        let token = sign(&serde_json::json!({"sub": 1, "exp": in_minutes(-1)}), SECRET);
        let lenient = JwtConfig {
            leeway_secs: 120,
            ..config()
        };
        assert!(verify_access_token(&token, &lenient).is_ok());
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let token = sign(&serde_json::json!({"sub": 1, "exp": in_minutes(5)}), "another-secret");
        assert!(verify_access_token(&token, &config()).is_err());
    }

    #[test]
    fn token_without_subject_is_rejected() {
        let token = sign(&serde_json::json!({"exp": in_minutes(5)}), SECRET);
        assert!(verify_access_token(&token, &config()).is_err());
    }
}
