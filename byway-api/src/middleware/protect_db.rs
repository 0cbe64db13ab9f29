/// Demo-mode database protection
///
/// The public API explorer sends `x-swagger-mock`; in production those
/// requests get a canned reply instead of touching the database.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{app::AppState, response::ApiResponse};

pub const MOCK_HEADER: &str = "x-swagger-mock";
pub const DEMO_MESSAGE: &str =
    "This is a demo response. Connect your own database to test full functionality.";

pub async fn protect_db(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if state.config.api.is_production() && req.headers().contains_key(MOCK_HEADER) {
        tracing::debug!(path = %req.uri().path(), "Serving demo response");
        return ApiResponse::message(DEMO_MESSAGE).into_response();
    }

    next.run(req).await
}
