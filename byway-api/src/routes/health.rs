/// Health check endpoints
///
/// ```text
/// GET /api/v1/health      -> 200 {"status": "OK"}
/// GET /api/v1/ui-health   -> 200 {"status": "OK"} | 503 database unreachable
/// ```
///
/// Neither requires cookie consent.

use crate::{app::AppState, error::ApiResult, error::ApiError};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    fn ok() -> Self {
        Self {
            status: "OK".to_string(),
        }
    }
}

/// Process liveness
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// Liveness plus a database round trip
pub async fn ui_health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Database health check failed");
            ApiError::ServiceUnavailable("Database Network Error".to_string())
        })?;

    Ok(Json(HealthResponse::ok()))
}
