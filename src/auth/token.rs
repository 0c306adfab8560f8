//! Stateless access tokens (HS256 JWTs).
//!
//! Tokens carry the user id, email and an expiry; there is no revocation
//! list, so a token stays valid until it expires.

use anyhow::Result;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

const TOKEN_TYPE_ACCESS: &str = "access";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Stringified user id.
    pub sub: String,

    pub email: String,

    /// Expiry as seconds since the Unix epoch.
    pub exp: i64,

    #[serde(rename = "type")]
    pub token_type: String,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_minutes: i64,
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_minutes,
        }
    }

    /// Issue an access token with the configured lifetime.
    pub fn issue(&self, user_id: i32, email: &str) -> Result<String> {
        self.issue_with_ttl(user_id, email, self.ttl_minutes * 60)
    }

    /// Issue an access token expiring `ttl_seconds` from now. A ttl of zero
    /// or less produces a token that is already expired.
    pub fn issue_with_ttl(&self, user_id: i32, email: &str, ttl_seconds: i64) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        // Expiry checks pass while exp == now, so a non-positive ttl must
        // land strictly in the past to be expired at issue time.
        let exp = if ttl_seconds > 0 {
            now + ttl_seconds
        } else {
            now + ttl_seconds - 1
        };

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp,
            token_type: TOKEN_TYPE_ACCESS.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to sign token: {e}"))
    }

    /// Verify a token and return its claims.
    ///
    /// Returns `None` for a bad signature, an expired token, malformed input,
    /// or the wrong token type. No leeway is applied to expiry.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).ok()?;

        if data.claims.token_type != TOKEN_TYPE_ACCESS {
            return None;
        }

        Some(data.claims)
    }
}
