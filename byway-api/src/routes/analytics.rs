/// Admin analytics: rows created per 28-day window over the last 12 windows

use crate::{app::AppState, error::ApiResult, response::ApiResponse};
use axum::extract::State;
use byway_shared::models::analytics::{last_12_months, AnalyticsSource, Last12Months};
use chrono::Utc;

async fn report(
    state: &AppState,
    source: AnalyticsSource,
    message: &str,
) -> ApiResult<ApiResponse<Last12Months>> {
    let data = last_12_months(&state.db, source, Utc::now()).await?;
    Ok(ApiResponse::ok(data, message))
}

pub async fn users_analytics(
    State(state): State<AppState>,
) -> ApiResult<ApiResponse<Last12Months>> {
    report(&state, AnalyticsSource::Users, "Users analytics fetched").await
}

pub async fn courses_analytics(
    State(state): State<AppState>,
) -> ApiResult<ApiResponse<Last12Months>> {
    report(&state, AnalyticsSource::Courses, "Courses analytics fetched").await
}

pub async fn orders_analytics(
    State(state): State<AppState>,
) -> ApiResult<ApiResponse<Last12Months>> {
    report(&state, AnalyticsSource::Orders, "Orders analytics fetched").await
}
