//! Health probe and performance report endpoints.

use axum::{extract::State, http::StatusCode, response::Json};

use crate::operations::{HealthReport, HealthStatus};
use crate::performance::PerformanceReport;
use crate::server::AppState;

/// Reports data store reachability; degraded still answers 200
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Healthy or degraded", body = HealthReport),
        (status = 503, description = "Data store unreachable", body = HealthReport)
    ),
    tag = "operations"
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.engine.health().await;
    let status = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (status, Json(report))
}

/// Rolling per-operation statistics and the overall grade
#[utoipa::path(
    get,
    path = "/api/v2/performance",
    responses(
        (status = 200, description = "Performance report", body = PerformanceReport)
    ),
    tag = "operations"
)]
pub async fn performance_report(State(state): State<AppState>) -> Json<PerformanceReport> {
    Json(state.engine.performance_report().await)
}
