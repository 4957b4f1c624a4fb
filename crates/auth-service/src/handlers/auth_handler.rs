use crate::errors::AuthError;
use crate::models::{
    AccessTokenResponse, MeResponse, Principal, ResetTokenResponse, SubjectResponse, TokenPair,
};
use crate::services::auth_service::AuthService;
use axum::{extract::State, http::StatusCode, Extension, Form, Json};
use common::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: SecretString,
}

/// OAuth2 password grant, sent as `application/x-www-form-urlencoded`.
/// `username` carries the email.
#[derive(Debug, Deserialize)]
pub struct TokenForm {
    #[serde(default)]
    pub grant_type: Option<String>,
    pub username: String,
    pub password: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current: SecretString,
    pub new: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub reset_token: SecretString,
    pub password: SecretString,
}

/// POST /api/v1/auth/login
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let pair = state.auth.login(&payload.email, &payload.password).await?;
    Ok(Json(pair))
}

/// POST /api/v1/auth/register
pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MeResponse>), AuthError> {
    let principal = state
        .auth
        .register(&payload.email, &payload.password)
        .await?;
    Ok((StatusCode::CREATED, Json(MeResponse::from(&principal))))
}

/// POST /api/v1/auth/token
pub async fn handle_token(
    State(state): State<Arc<AppState>>,
    Form(form): Form<TokenForm>,
) -> Result<Json<AccessTokenResponse>, AuthError> {
    if form.grant_type.as_deref().is_some_and(|g| g != "password") {
        return Err(AuthError::AuthenticationFailed);
    }

    let response = state
        .auth
        .issue_access_token(&form.username, &form.password)
        .await?;
    Ok(Json(response))
}

/// POST /api/v1/auth/refresh-token
pub async fn handle_refresh_token(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<(StatusCode, Json<AccessTokenResponse>), AuthError> {
    let response = state
        .auth
        .refresh(payload.refresh_token.expose_secret())
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/change-password
///
/// Requires a bearer access token; the middleware supplies the principal.
pub async fn handle_change_password(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let pair = state
        .auth
        .change_password(&principal, &payload.current, &payload.new)
        .await?;
    Ok(Json(pair))
}

/// POST /api/v1/auth/forgot-password
pub async fn handle_forgot_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<StatusCode, AuthError> {
    state.auth.forgot_password(&payload.email).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/v1/auth/verify-otp
pub async fn handle_verify_otp(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<ResetTokenResponse>, AuthError> {
    let response = state.auth.verify_otp(&payload.email, &payload.otp).await?;
    Ok(Json(response))
}

/// POST /api/v1/auth/reset-password
pub async fn handle_reset_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<SubjectResponse>, AuthError> {
    let response = state
        .auth
        .reset_password(payload.reset_token.expose_secret(), &payload.password)
        .await?;
    Ok(Json(response))
}

/// GET /api/v1/auth/me
pub async fn handle_me(Extension(principal): Extension<Principal>) -> Json<MeResponse> {
    Json(MeResponse::from(&principal))
}
