use crate::errors::AuthError;
use crate::handlers::auth_handler::AppState;
use crate::models::Role;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::debug;

/// Middleware state: the application plus the roles a route requires.
///
/// An empty role list admits any active principal.
#[derive(Clone)]
pub struct AuthMiddlewareState {
    pub app: Arc<AppState>,
    pub required_roles: &'static [Role],
}

/// Pull the token out of an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(req: &Request) -> Result<&str, AuthError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            debug!(target: "auth.middleware", "Missing Authorization header");
            AuthError::TokenMalformed("Missing Authorization header".to_string())
        })?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        debug!(target: "auth.middleware", "Invalid Authorization header format");
        AuthError::TokenMalformed("Invalid Authorization header format".to_string())
    })
}

/// Authenticate the bearer access token and store the resolved
/// [`Principal`](crate::models::Principal) in the request extensions.
pub async fn require_auth(
    State(state): State<Arc<AuthMiddlewareState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    let token = extract_bearer_token(&req)?;

    let principal = state
        .app
        .auth
        .authenticate(token, state.required_roles)
        .await?;

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}
