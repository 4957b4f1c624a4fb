use base64::{engine::general_purpose, Engine as _};
use common::config::{LogFormat, ObservabilityConfig, RedisConfig};
use common::secret::{ExposeSecret, SecretBox};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default access token lifetime: 8 days.
pub const DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES: u64 = 60 * 24 * 8;

/// Default refresh token lifetime: 180 days.
pub const DEFAULT_REFRESH_TOKEN_EXPIRE_MINUTES: u64 = 60 * 24 * 180;

/// Default reset token lifetime.
pub const DEFAULT_RESET_TOKEN_EXPIRE_MINUTES: u64 = 15;

/// Default OTP lifetime.
pub const DEFAULT_OTP_EXPIRE_MINUTES: u64 = 10;

/// Upper bound for any token or OTP lifetime (10 years).
pub const MAX_EXPIRE_MINUTES: u64 = 60 * 24 * 365 * 10;

pub const DEFAULT_OTP_LENGTH: usize = 6;
pub const MIN_OTP_LENGTH: usize = 4;
pub const MAX_OTP_LENGTH: usize = 10;

/// Default bcrypt cost factor (2^12 iterations).
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Minimum accepted bcrypt cost. Anything lower is too fast to brute force.
pub const MIN_BCRYPT_COST: u32 = 10;

/// Maximum accepted bcrypt cost. Higher values make login noticeably slow.
pub const MAX_BCRYPT_COST: u32 = 14;

/// Minimum decoded length of the HMAC signing secret (256 bits).
pub const MIN_JWT_SECRET_BYTES: usize = 32;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Values consumed by the auth workflow.
///
/// Kept separate from [`Config`] so the workflow can be built in tests
/// without connection strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub reset_token_ttl: Duration,
    pub otp_ttl: Duration,
    pub otp_length: usize,
    pub bcrypt_cost: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            access_token_ttl: minutes(DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES),
            refresh_token_ttl: minutes(DEFAULT_REFRESH_TOKEN_EXPIRE_MINUTES),
            reset_token_ttl: minutes(DEFAULT_RESET_TOKEN_EXPIRE_MINUTES),
            otp_ttl: minutes(DEFAULT_OTP_EXPIRE_MINUTES),
            otp_length: DEFAULT_OTP_LENGTH,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

pub struct Config {
    pub database_url: String,
    pub redis: RedisConfig,
    pub bind_address: String,
    /// HMAC-SHA256 secret used to sign every token.
    pub jwt_secret: SecretBox<Vec<u8>>,
    pub auth: AuthSettings,
    pub notification_webhook_url: Option<String>,
    pub observability: ObservabilityConfig,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            database_url: self.database_url.clone(),
            redis: self.redis.clone(),
            bind_address: self.bind_address.clone(),
            jwt_secret: SecretBox::new(Box::new(self.jwt_secret.expose_secret().clone())),
            auth: self.auth.clone(),
            notification_webhook_url: self.notification_webhook_url.clone(),
            observability: self.observability.clone(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("redis", &self.redis)
            .field("bind_address", &self.bind_address)
            .field("jwt_secret", &"[REDACTED]")
            .field("auth", &self.auth)
            .field(
                "notification_webhook_url",
                &self.notification_webhook_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("observability", &self.observability)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT secret: {0}")]
    InvalidJwtSecret(String),

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = required(vars, "DATABASE_URL")?;
        let redis_url = required(vars, "REDIS_URL")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let secret_base64 = required(vars, "AUTH_JWT_SECRET")?;
        let jwt_secret = general_purpose::STANDARD
            .decode(secret_base64.trim())
            .map_err(ConfigError::Base64Error)?;

        if jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(ConfigError::InvalidJwtSecret(format!(
                "Expected at least {} bytes, got {}",
                MIN_JWT_SECRET_BYTES,
                jwt_secret.len()
            )));
        }

        let access_minutes = parse_minutes(
            vars,
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES,
        )?;
        let refresh_minutes = parse_minutes(
            vars,
            "REFRESH_TOKEN_EXPIRE_MINUTES",
            DEFAULT_REFRESH_TOKEN_EXPIRE_MINUTES,
        )?;
        let reset_minutes = parse_minutes(
            vars,
            "RESET_TOKEN_EXPIRE_MINUTES",
            DEFAULT_RESET_TOKEN_EXPIRE_MINUTES,
        )?;
        let otp_minutes = parse_minutes(vars, "OTP_EXPIRE_MINUTES", DEFAULT_OTP_EXPIRE_MINUTES)?;

        let otp_length = match vars.get("OTP_LENGTH") {
            Some(raw) => {
                let value: usize = raw.parse().map_err(|e| invalid("OTP_LENGTH", e))?;
                if !(MIN_OTP_LENGTH..=MAX_OTP_LENGTH).contains(&value) {
                    return Err(invalid(
                        "OTP_LENGTH",
                        format!(
                            "must be between {} and {}, got {}",
                            MIN_OTP_LENGTH, MAX_OTP_LENGTH, value
                        ),
                    ));
                }
                value
            }
            None => DEFAULT_OTP_LENGTH,
        };

        let bcrypt_cost = match vars.get("BCRYPT_COST") {
            Some(raw) => {
                let value: u32 = raw.parse().map_err(|e| invalid("BCRYPT_COST", e))?;
                if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&value) {
                    return Err(invalid(
                        "BCRYPT_COST",
                        format!(
                            "must be between {} and {}, got {}",
                            MIN_BCRYPT_COST, MAX_BCRYPT_COST, value
                        ),
                    ));
                }
                value
            }
            None => DEFAULT_BCRYPT_COST,
        };

        let notification_webhook_url = vars
            .get("NOTIFICATION_WEBHOOK_URL")
            .filter(|url| !url.trim().is_empty())
            .cloned();

        let log_format = match vars.get("LOG_FORMAT") {
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|reason| invalid("LOG_FORMAT", reason))?,
            None => LogFormat::default(),
        };

        Ok(Config {
            database_url,
            redis: RedisConfig { url: redis_url },
            bind_address,
            jwt_secret: SecretBox::new(Box::new(jwt_secret)),
            auth: AuthSettings {
                access_token_ttl: minutes(access_minutes),
                refresh_token_ttl: minutes(refresh_minutes),
                reset_token_ttl: minutes(reset_minutes),
                otp_ttl: minutes(otp_minutes),
                otp_length,
                bcrypt_cost,
            },
            notification_webhook_url,
            observability: ObservabilityConfig { log_format },
        })
    }
}

fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.saturating_mul(60))
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn invalid(name: &str, reason: impl fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Token lifetimes must be between one minute and `MAX_EXPIRE_MINUTES`.
fn parse_minutes(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(raw) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = raw.trim().parse().map_err(|e| invalid(name, e))?;
    if value == 0 {
        return Err(invalid(name, "must be greater than zero"));
    }
    if value > MAX_EXPIRE_MINUTES {
        return Err(invalid(
            name,
            format!("must be at most {}, got {}", MAX_EXPIRE_MINUTES, value),
        ));
    }
    Ok(value)
}
