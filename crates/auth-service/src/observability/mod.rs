//! Observability for the auth service.
//!
//! # Privacy by Default
//!
//! Async operations use `#[instrument(skip_all)]` with an explicit allow-list
//! of fields. Fields fall in three groups:
//! - **SAFE**: logged in plaintext (token kind, operation name, outcome)
//! - **HASHED**: SHA-256 prefix only, for correlation (email)
//! - **NEVER**: passwords, OTP codes, tokens, the signing secret

pub mod metrics;

use crate::errors::AuthError;
use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars)
///
/// One-way and truncated. Not suitable for anything but log correlation.
pub fn hash_for_correlation(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let result = hasher.finalize();
    hex::encode(result.get(..4).unwrap_or_default())
}

/// Error categories for metrics labels (bounded cardinality)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad credentials, unknown accounts, wrong OTP
    Authentication,
    /// Rejected, revoked or wrong-kind tokens, missing role
    Authorization,
    /// Store, database and crypto failures
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl From<&AuthError> for ErrorCategory {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::AuthenticationFailed
            | AuthError::AccountInactive
            | AuthError::PasswordUnchanged
            | AuthError::InvalidOtp
            | AuthError::EmailNotFound
            | AuthError::EmailAlreadyRegistered
            | AuthError::SubjectNotFound => ErrorCategory::Authentication,
            AuthError::TokenExpired
            | AuthError::TokenMalformed(_)
            | AuthError::TokenRevoked
            | AuthError::WrongTokenKind { .. }
            | AuthError::InsufficientRole => ErrorCategory::Authorization,
            AuthError::SessionStore(_)
            | AuthError::Database(_)
            | AuthError::Crypto(_)
            | AuthError::Internal => ErrorCategory::Internal,
        }
    }
}
