//! Operational endpoints: health, readiness, liveness.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub instance: String,
    pub uptime_secs: u64,
    pub database: String,
    pub database_reachable: bool,
}

/// GET /health — Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses((status = 200, description = "Service health summary", body = HealthResponse))
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.repos.database();
    let reachable = db.ping().await;
    Json(HealthResponse {
        status: if reachable { "healthy" } else { "degraded" }.to_string(),
        instance: state.instance_name.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        database: db.provider().to_string(),
        database_reachable: reachable,
    })
}

/// GET /ready — Readiness probe. 200 only when the database answers.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Operations",
    responses(
        (status = 200, description = "Ready to accept traffic"),
        (status = 503, description = "Database unreachable")
    )
)]
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.repos.database().ping().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /live — Liveness probe.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses((status = 200, description = "Process is alive"))
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
