//! Signed, expiring tokens (HS256 JWT).
//!
//! The codec is stateless: it knows nothing about the session registry.
//! A token that verifies here may still be revoked.

use crate::models::TokenKind;
use crate::observability::metrics::record_token_validation;
use common::secret::{ExposeSecret, SecretBox};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

/// Maximum accepted token size in bytes (4KB).
///
/// Checked before any base64 decoding or signature work. Our tokens are
/// around 250 bytes.
pub const MAX_TOKEN_SIZE_BYTES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("bad signature")]
    BadSignature,

    #[error("missing claim: {0}")]
    MissingClaim(&'static str),

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

impl TokenError {
    /// Bounded label for metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TokenError::Expired => "expired",
            TokenError::Malformed(_) => "malformed",
            TokenError::BadSignature => "bad_signature",
            TokenError::MissingClaim(_) => "missing_claim",
            TokenError::Encoding(_) => "encoding",
        }
    }
}

/// Claims written into every token.
///
/// `sub` and `jti` are redacted from `Debug` output.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("kind", &self.kind)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("jti", &"[REDACTED]")
            .finish()
    }
}

/// Claims as read back from an untrusted token. Every field is optional so
/// a missing claim can be told apart from a malformed one.
#[derive(Deserialize)]
struct RawClaims {
    sub: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    exp: Option<i64>,
    iat: Option<i64>,
}

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject: Uuid,
    pub kind: TokenKind,
    pub expires_at: i64,
    pub issued_at: Option<i64>,
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &"HS256")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl TokenCodec {
    pub fn new(secret: &SecretBox<Vec<u8>>) -> Self {
        let key = secret.expose_secret();

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry and required claims are checked by hand to get distinct errors.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            validation,
        }
    }

    /// Issue a token for `subject` that expires `ttl` from now.
    pub fn issue(
        &self,
        subject: Uuid,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        self.issue_at(subject, kind, ttl, chrono::Utc::now().timestamp())
    }

    /// Issue a token as if the current time were `now` (Unix seconds).
    #[instrument(skip_all, fields(kind = %kind))]
    pub fn issue_at(
        &self,
        subject: Uuid,
        kind: TokenKind,
        ttl: Duration,
        now: i64,
    ) -> Result<String, TokenError> {
        let ttl_secs = i64::try_from(ttl.as_secs())
            .map_err(|_| TokenError::Encoding("TTL out of range".to_string()))?;

        let claims = Claims {
            sub: subject.to_string(),
            kind,
            exp: now.saturating_add(ttl_secs),
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(target: "auth.codec", error = %e, "Token signing failed");
            TokenError::Encoding(e.to_string())
        })
    }

    /// Verify signature and expiry against the current time.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    /// Verify signature and expiry as if the current time were `now`.
    ///
    /// A token whose `exp` equals `now` is already expired.
    #[instrument(skip_all)]
    pub fn verify_at(&self, token: &str, now: i64) -> Result<VerifiedToken, TokenError> {
        let result = self.decode_claims(token, now);

        match &result {
            Ok(verified) => {
                tracing::trace!(target: "auth.codec", kind = %verified.kind, "Token verified");
                record_token_validation("success", None);
            }
            Err(e) => {
                tracing::debug!(target: "auth.codec", reason = e.as_label(), "Token rejected");
                record_token_validation("error", Some(e.as_label()));
            }
        }

        result
    }

    fn decode_claims(&self, token: &str, now: i64) -> Result<VerifiedToken, TokenError> {
        if token.len() > MAX_TOKEN_SIZE_BYTES {
            return Err(TokenError::Malformed(format!(
                "token exceeds {} bytes",
                MAX_TOKEN_SIZE_BYTES
            )));
        }

        let data = decode::<RawClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::BadSignature
                }
                _ => TokenError::Malformed(e.to_string()),
            },
        )?;

        let claims = data.claims;
        let sub = claims.sub.ok_or(TokenError::MissingClaim("sub"))?;
        let kind = claims.kind.ok_or(TokenError::MissingClaim("type"))?;
        let exp = claims.exp.ok_or(TokenError::MissingClaim("exp"))?;

        let subject = Uuid::parse_str(&sub)
            .map_err(|_| TokenError::Malformed("subject is not a UUID".to_string()))?;
        let kind: TokenKind = kind.parse().map_err(TokenError::Malformed)?;

        if exp <= now {
            return Err(TokenError::Expired);
        }

        Ok(VerifiedToken {
            subject,
            kind,
            expires_at: exp,
            issued_at: claims.iat,
        })
    }
}
