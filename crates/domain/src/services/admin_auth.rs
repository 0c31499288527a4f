//! Bearer-session check for the admin endpoints.
//!
//! Tokens are issued by the login flow elsewhere; this process only knows the
//! SHA3-256 digest of each live token and the principal it belongs to.

use std::collections::HashMap;

use hex::encode as hex_encode;
use sha3::{Digest, Sha3_256};
use thiserror::Error;

use crate::config::AdminSessionDigest;

/// Hex SHA3-256 digest of a bearer token, as configured in
/// `API_ADMIN_SESSIONS`.
pub fn derive_session_digest(token: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(token.as_bytes());
    hex_encode(hasher.finalize())
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing access token")]
    MissingToken,
    #[error("invalid access token")]
    InvalidToken,
    #[error("principal `{0}` is not an administrator")]
    Forbidden(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPrincipal(String);

impl AdminPrincipal {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdminAuthenticator {
    sessions: HashMap<String, String>,
    admin_principal: String,
}

impl AdminAuthenticator {
    pub fn new(sessions: &[AdminSessionDigest], admin_principal: impl Into<String>) -> Self {
        Self {
            sessions: sessions
                .iter()
                .map(|session| (session.digest.to_ascii_lowercase(), session.principal.clone()))
                .collect(),
            admin_principal: admin_principal.into(),
        }
    }

    /// Accepts the raw `Authorization` header value.
    pub fn verify(&self, authorization: Option<&str>) -> Result<AdminPrincipal, AuthError> {
        let token = authorization
            .and_then(|value| value.trim().strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let principal = self
            .sessions
            .get(&derive_session_digest(token))
            .ok_or(AuthError::InvalidToken)?;

        if *principal != self.admin_principal {
            return Err(AuthError::Forbidden(principal.clone()));
        }

        Ok(AdminPrincipal(principal.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> AdminAuthenticator {
        AdminAuthenticator::new(
            &[
                AdminSessionDigest {
                    principal: "admin".into(),
                    digest: derive_session_digest("root-token"),
                },
                AdminSessionDigest {
                    principal: "editor".into(),
                    digest: derive_session_digest("editor-token"),
                },
            ],
            "admin",
        )
    }

    #[test]
    fn digest_is_deterministic_hex() {
        let left = derive_session_digest("abcd");
        assert_eq!(left, derive_session_digest("abcd"));
        assert_eq!(left.len(), 64);
    }

    #[test]
    fn accepts_admin_bearer() {
        let principal = authenticator()
            .verify(Some("Bearer root-token"))
            .expect("admin accepted");
        assert_eq!(principal.as_str(), "admin");
    }

    #[test]
    fn rejects_missing_or_malformed_header() {
        let auth = authenticator();
        assert_eq!(auth.verify(None), Err(AuthError::MissingToken));
        assert_eq!(auth.verify(Some("Basic abc")), Err(AuthError::MissingToken));
        assert_eq!(auth.verify(Some("Bearer   ")), Err(AuthError::MissingToken));
    }

    #[test]
    fn unknown_token_is_invalid() {
        assert_eq!(
            authenticator().verify(Some("Bearer guess")),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn non_admin_principal_is_forbidden() {
        assert_eq!(
            authenticator().verify(Some("Bearer editor-token")),
            Err(AuthError::Forbidden("editor".into()))
        );
    }
}
