//! JWT credential verification

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::IdentityVerifier;
use crate::registry::UserId;

/// Claims carried by platform access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated user identity
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Expiry, seconds since the Unix epoch
    pub exp: i64,
}

/// Verifies HS256-signed tokens against a shared secret
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Create a verifier for the given signing secret.
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier").finish_non_exhaustive()
    }
}

impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Option<UserId> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Some(UserId::new(data.claims.user_id)),
            Err(e) => {
                tracing::debug!(error = %e, "Token verification failed");
                None
            }
        }
    }
}
