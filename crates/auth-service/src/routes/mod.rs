use crate::handlers::auth_handler::{self, AppState};
use crate::handlers::health_handler;
use crate::middleware::auth::{require_auth, AuthMiddlewareState};
use crate::models::Role;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use crate::observability::metrics::init_metrics_recorder;

/// Request timeout applied to every route.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Routes behind the bearer gate admit any active principal.
const ANY_ROLE: &[Role] = &[];

/// Build the application routes.
///
/// - Public: `/health`, `/ready`, `/metrics` and the credential endpoints
///   under `/api/v1/auth`
/// - Bearer access token: `/api/v1/auth/change-password`, `/api/v1/auth/me`
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthMiddlewareState {
        app: state.clone(),
        required_roles: ANY_ROLE,
    });

    let public_routes = Router::new()
        .route("/health", get(health_handler::health_check))
        .route("/ready", get(health_handler::readiness_check))
        .route("/api/v1/auth/login", post(auth_handler::handle_login))
        .route("/api/v1/auth/token", post(auth_handler::handle_token))
        .route(
            "/api/v1/auth/register",
            post(auth_handler::handle_register),
        )
        .route(
            "/api/v1/auth/refresh-token",
            post(auth_handler::handle_refresh_token),
        )
        .route(
            "/api/v1/auth/forgot-password",
            post(auth_handler::handle_forgot_password),
        )
        .route(
            "/api/v1/auth/verify-otp",
            post(auth_handler::handle_verify_otp),
        )
        .route(
            "/api/v1/auth/reset-password",
            post(auth_handler::handle_reset_password),
        )
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route(
            "/api/v1/auth/change-password",
            post(auth_handler::handle_change_password),
        )
        .route("/api/v1/auth/me", get(auth_handler::handle_me))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(health_handler::metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
}
