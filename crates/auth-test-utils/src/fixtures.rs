//! Deterministic fixtures for testing
//!
//! The signing secret is fixed so tokens minted by a test can be verified by
//! any codec built from the same fixture.

use auth_service::config::{AuthSettings, MIN_BCRYPT_COST};
use auth_service::crypto::codec::TokenCodec;
use common::secret::SecretBox;

/// Signing secret shared by every test server and codec.
pub const TEST_JWT_SECRET: [u8; 32] = *b"test-secret-do-not-use-in-prod!!";

/// Boxed copy of [`TEST_JWT_SECRET`].
pub fn test_jwt_secret() -> SecretBox<Vec<u8>> {
    SecretBox::new(Box::new(TEST_JWT_SECRET.to_vec()))
}

/// Codec keyed with [`TEST_JWT_SECRET`].
pub fn test_codec() -> TokenCodec {
    TokenCodec::new(&test_jwt_secret())
}

/// Default settings with the cheapest accepted bcrypt cost.
pub fn test_settings() -> AuthSettings {
    AuthSettings {
        bcrypt_cost: MIN_BCRYPT_COST,
        ..AuthSettings::default()
    }
}
