//! Password hashing and random material.
//!
//! Token signing lives in [`codec`].

pub mod codec;

use crate::config::{MAX_BCRYPT_COST, MAX_OTP_LENGTH, MIN_BCRYPT_COST, MIN_OTP_LENGTH};
use crate::errors::AuthError;
use common::secret::{ExposeSecret, SecretString};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::instrument;

/// Precomputed bcrypt hash (cost 12) verified against when the email is
/// unknown, so a failed login takes the same time either way.
pub const DUMMY_PASSWORD_HASH: &str =
    "$2b$12$LQv3c1yqBWVHxkd0LHAkCOYz6TtxMQJqhN8/LewY5GyYqExt7YD3a";

/// Largest multiple of 10 that fits in a byte. Bytes at or above it are
/// discarded to keep digits uniform.
const OTP_BYTE_CUTOFF: u8 = 250;

/// Hash a password with bcrypt using the configured cost factor.
#[instrument(skip_all)]
pub fn hash_password(password: &SecretString, cost: u32) -> Result<String, AuthError> {
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        return Err(AuthError::Crypto(format!(
            "Invalid bcrypt cost: {} (must be {}-{})",
            cost, MIN_BCRYPT_COST, MAX_BCRYPT_COST
        )));
    }

    bcrypt::hash(password.expose_secret(), cost)
        .map_err(|e| AuthError::Crypto(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a bcrypt hash.
#[instrument(skip_all)]
pub fn verify_password(password: &SecretString, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password.expose_secret(), hash)
        .map_err(|e| AuthError::Crypto(format!("Password verification failed: {}", e)))
}

/// Burn one bcrypt verification against [`DUMMY_PASSWORD_HASH`].
pub fn verify_dummy_password(password: &SecretString) {
    let _ = bcrypt::verify(password.expose_secret(), DUMMY_PASSWORD_HASH);
}

/// Generate cryptographically secure random bytes
pub fn generate_random_bytes(len: usize) -> Result<Vec<u8>, AuthError> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|e| AuthError::Crypto(format!("Random generation failed: {}", e)))?;
    Ok(bytes)
}

/// Generate a numeric one-time code of `length` digits from the system CSPRNG.
///
/// Leading zeros are kept, so the code is always exactly `length` characters.
#[instrument(skip_all, fields(length = length))]
pub fn generate_otp(length: usize) -> Result<SecretString, AuthError> {
    if !(MIN_OTP_LENGTH..=MAX_OTP_LENGTH).contains(&length) {
        return Err(AuthError::Crypto(format!(
            "Invalid OTP length: {} (must be {}-{})",
            length, MIN_OTP_LENGTH, MAX_OTP_LENGTH
        )));
    }

    let mut code = String::with_capacity(length);
    while code.len() < length {
        for byte in generate_random_bytes(length * 2)? {
            if byte >= OTP_BYTE_CUTOFF {
                continue;
            }
            code.push(char::from(b'0' + byte % 10));
            if code.len() == length {
                break;
            }
        }
    }

    Ok(SecretString::from(code))
}
