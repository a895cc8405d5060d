//! Identity verification seam
//!
//! The relay never mints or refreshes credentials; it only consumes the
//! result of verifying one. The verifier is a collaborator plugged in at
//! server construction, so the hub can sit behind whatever credential
//! scheme the platform runs.

pub mod jwt;

pub use jwt::{Claims, JwtVerifier};

use std::collections::HashMap;
use std::future::Future;

use crate::registry::UserId;

/// Maps an opaque credential to a user identity
///
/// `None` means the credential is invalid; the connection attempt is
/// rejected and never reaches the registry. Implementations must not block
/// indefinitely; the lifecycle manager bounds the call with a timeout
/// regardless.
pub trait IdentityVerifier: Send + Sync + 'static {
    /// Resolve `token` to an identity, or `None` if it does not verify.
    fn verify(&self, token: &str) -> impl Future<Output = Option<UserId>> + Send;
}

/// Verifier backed by a fixed token table
///
/// For demos and tests, where minting real signed tokens is noise.
#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, UserId>,
}

impl StaticTokenVerifier {
    /// Create an empty table (rejects everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token that resolves to `identity`
    pub fn with_token(mut self, token: impl Into<String>, identity: impl Into<UserId>) -> Self {
        self.tokens.insert(token.into(), identity.into());
        self
    }
}

impl IdentityVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Option<UserId> {
        self.tokens.get(token).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_verifier() {
        let verifier = StaticTokenVerifier::new().with_token("tok-A", "u1");

        assert_eq!(verifier.verify("tok-A").await, Some(UserId::new("u1")));
        assert_eq!(verifier.verify("tok-B").await, None);
    }

    #[tokio::test]
    async fn test_empty_table_rejects() {
        let verifier = StaticTokenVerifier::new();
        assert_eq!(verifier.verify("anything").await, None);
    }
}
