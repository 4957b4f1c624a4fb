use crate::crypto::codec::TokenError;
use crate::models::TokenKind;
use crate::repositories::session_store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    AuthenticationFailed,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Token expired")]
    TokenExpired,

    #[error("Malformed token: {0}")]
    TokenMalformed(String),

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Wrong token kind: expected {expected}, got {actual}")]
    WrongTokenKind {
        expected: TokenKind,
        actual: TokenKind,
    },

    #[error("Insufficient role")]
    InsufficientRole,

    #[error("New password must differ from the current one")]
    PasswordUnchanged,

    #[error("Invalid OTP")]
    InvalidOtp,

    #[error("Email not found")]
    EmailNotFound,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("Subject not found")]
    SubjectNotFound,

    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Internal server error")]
    Internal,
}

impl AuthError {
    /// True for the failures that collapse into the generic forbidden response.
    pub fn is_forbidden(&self) -> bool {
        matches!(
            self,
            AuthError::TokenExpired
                | AuthError::TokenMalformed(_)
                | AuthError::TokenRevoked
                | AuthError::WrongTokenKind { .. }
                | AuthError::InsufficientRole
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::AuthenticationFailed
            | AuthError::AccountInactive
            | AuthError::PasswordUnchanged
            | AuthError::InvalidOtp => StatusCode::BAD_REQUEST,
            AuthError::TokenExpired
            | AuthError::TokenMalformed(_)
            | AuthError::TokenRevoked
            | AuthError::WrongTokenKind { .. }
            | AuthError::InsufficientRole => StatusCode::FORBIDDEN,
            AuthError::EmailNotFound | AuthError::SubjectNotFound => StatusCode::NOT_FOUND,
            AuthError::EmailAlreadyRegistered => StatusCode::CONFLICT,
            AuthError::SessionStore(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Database(_) | AuthError::Crypto(_) | AuthError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Encoding(msg) => AuthError::Crypto(msg),
            other => AuthError::TokenMalformed(other.to_string()),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::SessionStore(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Token failures share one body so callers cannot probe which check failed.
        let (code, message) = match &self {
            AuthError::AuthenticationFailed => {
                ("AUTHENTICATION_FAILED", "Incorrect email or password")
            }
            AuthError::AccountInactive => ("ACCOUNT_INACTIVE", "Account is inactive"),
            AuthError::PasswordUnchanged => (
                "PASSWORD_UNCHANGED",
                "New password must differ from the current one",
            ),
            AuthError::InvalidOtp => ("INVALID_OTP", "Invalid or expired code"),
            AuthError::EmailNotFound => ("EMAIL_NOT_FOUND", "No account with this email"),
            AuthError::SubjectNotFound => ("SUBJECT_NOT_FOUND", "Account not found"),
            AuthError::EmailAlreadyRegistered => (
                "EMAIL_ALREADY_REGISTERED",
                "There is already an account with this email",
            ),
            AuthError::TokenExpired
            | AuthError::TokenMalformed(_)
            | AuthError::TokenRevoked
            | AuthError::WrongTokenKind { .. }
            | AuthError::InsufficientRole => ("FORBIDDEN", "Could not validate credentials"),
            AuthError::SessionStore(_) => (
                "SERVICE_UNAVAILABLE",
                "Session store temporarily unavailable",
            ),
            AuthError::Database(_) => ("DATABASE_ERROR", "An internal database error occurred"),
            AuthError::Crypto(_) => ("CRYPTO_ERROR", "An internal cryptographic error occurred"),
            AuthError::Internal => ("INTERNAL_ERROR", "An internal error occurred"),
        };

        if self.is_forbidden() {
            tracing::debug!(target: "auth.errors", reason = %self, "Rejected credentials");
        } else if status.is_server_error() {
            tracing::error!(target: "auth.errors", error = %self, "Request failed");
        }

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
            },
        };

        (status, Json(error_response)).into_response()
    }
}
