//! Liveness, readiness and metrics endpoints.

use crate::handlers::auth_handler::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub session_store: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness probe. Never checks dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe: 200 when both the directory and the session store
/// answer, 503 otherwise.
///
/// The response never carries the underlying error; it is logged instead.
#[tracing::instrument(skip_all, name = "auth.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = match state.auth.directory().ping().await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!(target: "auth.health", error = %e, "Readiness check failed: database");
            "unhealthy"
        }
    };

    let session_store = match state.auth.registry().ping().await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!(
                target: "auth.health",
                error = %e,
                "Readiness check failed: session store"
            );
            "unhealthy"
        }
    };

    if database == "healthy" && session_store == "healthy" {
        return (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                database,
                session_store,
                error: None,
            }),
        );
    }

    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ReadinessResponse {
            status: "not_ready",
            database,
            session_store,
            error: Some("Service dependencies unavailable".to_string()),
        }),
    )
}

/// Prometheus text exposition.
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}
