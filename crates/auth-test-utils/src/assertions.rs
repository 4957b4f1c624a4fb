//! Custom test assertions for expressive tests
//!
//! Provides trait-based assertions for issued tokens. They only decode the
//! token; signature checks belong to the codec's own tests.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;

/// JWT header structure
#[derive(Debug, Deserialize)]
struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

/// JWT claims structure
#[derive(Debug, Deserialize)]
struct JwtClaims {
    pub sub: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

fn segment(token: &str, index: usize) -> Vec<u8> {
    let part = token
        .split('.')
        .nth(index)
        .unwrap_or_else(|| panic!("JWT is missing segment {}", index));
    URL_SAFE_NO_PAD
        .decode(part)
        .unwrap_or_else(|e| panic!("Failed to base64 decode JWT segment {}: {:?}", index, e))
}

fn claims(token: &str) -> JwtClaims {
    serde_json::from_slice(&segment(token, 1)).expect("Failed to parse JWT claims")
}

/// Custom assertions for issued tokens
///
/// # Example
/// ```rust,ignore
/// pair.access_token
///     .assert_valid_jwt()
///     .assert_kind("access")
///     .assert_for_subject(&pair.subject.to_string());
/// ```
pub trait TokenAssertions {
    /// Assert that the token is a well-formed HS256 JWT with the expected claims
    fn assert_valid_jwt(&self) -> &Self;

    /// Assert the `type` claim (`access`, `refresh` or `reset`)
    fn assert_kind(&self, kind: &str) -> &Self;

    /// Assert that the token expires within the specified seconds
    fn assert_expires_in(&self, seconds: u64) -> &Self;

    /// Assert that the token is for the specified subject
    fn assert_for_subject(&self, subject: &str) -> &Self;

    /// Assert that two tokens carry different `jti` values
    fn assert_distinct_from(&self, other: &str) -> &Self;
}

impl TokenAssertions for String {
    fn assert_valid_jwt(&self) -> &Self {
        let parts = self.split('.').count();
        assert_eq!(
            parts, 3,
            "JWT must have 3 parts (header.payload.signature), got {}",
            parts
        );

        let header: JwtHeader =
            serde_json::from_slice(&segment(self, 0)).expect("Failed to parse JWT header JSON");
        assert_eq!(header.alg, "HS256", "Expected HS256 algorithm");
        assert_eq!(header.typ, "JWT", "Expected JWT type");

        let claims = claims(self);
        assert!(!claims.jti.is_empty(), "Token must carry a jti");
        assert!(
            claims.exp >= claims.iat,
            "Token expires ({}) before it was issued ({})",
            claims.exp,
            claims.iat
        );

        self
    }

    fn assert_kind(&self, kind: &str) -> &Self {
        let claims = claims(self);
        assert_eq!(
            claims.kind, kind,
            "Expected token kind '{}', got '{}'",
            kind, claims.kind
        );

        self
    }

    fn assert_expires_in(&self, seconds: u64) -> &Self {
        let claims = claims(self);

        let now = chrono::Utc::now().timestamp();
        let expires_in = claims.exp - now;

        // Allow 5-second tolerance for slow test runs
        assert!(
            (expires_in - seconds as i64).abs() <= 5,
            "Expected token to expire in {} seconds, but expires in {} seconds",
            seconds,
            expires_in
        );

        self
    }

    fn assert_for_subject(&self, subject: &str) -> &Self {
        let claims = claims(self);
        assert_eq!(
            claims.sub, subject,
            "Expected subject '{}', got '{}'",
            subject, claims.sub
        );

        self
    }

    fn assert_distinct_from(&self, other: &str) -> &Self {
        let mine = claims(self).jti;
        let theirs = claims(other).jti;
        assert_ne!(mine, theirs, "Tokens share jti '{}'", mine);

        self
    }
}
