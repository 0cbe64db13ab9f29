/// Success envelope
///
/// Every successful response is `{success: true, message, data, statusCode}`
/// with the HTTP status equal to `statusCode`. Errors use the matching
/// envelope in [`crate::error`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    pub status_code: u16,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: Option<T>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            status_code: status.as_u16(),
        }
    }

    /// 200 with data
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, Some(data), message)
    }

    /// 201 with data
    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CREATED, Some(data), message)
    }
}

impl ApiResponse<()> {
    /// 200 with `data: null`
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, None, message)
    }

    /// `data: null` with a custom status
    pub fn message_with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status, None, message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}
