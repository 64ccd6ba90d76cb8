//! Bearer token issuance and verification.
//!
//! Tokens are HS256-signed JWTs carrying the user id, issued-at and a
//! one-hour expiry. Verification accepts the symmetric-HMAC family only, so a
//! token signed with any other algorithm family is rejected outright.

use crate::error::ServiceError;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Token lifetime in seconds.
const TOKEN_TTL_SECS: i64 = 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    user_id: i64,
    iat: i64,
    exp: i64,
}

/// Issues and parses signed bearer tokens for a single process-wide key.
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenManager {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Issue a token for `user_id`, valid for one hour.
    pub fn issue(&self, user_id: i64) -> Result<String, ServiceError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            user_id,
            iat: now,
            exp: now + TOKEN_TTL_SECS,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(format!("failed to sign token: {e}")))
    }

    /// Verify signature, algorithm family and expiry; extract the user id.
    /// Every failure mode collapses into [`ServiceError::TokenInvalid`].
    pub fn parse(&self, token: &str) -> Result<i64, ServiceError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims.user_id)
            .map_err(|_| ServiceError::TokenInvalid)
    }
}
