/// Error handling for the API server
///
/// `ApiError` is the only error type handlers return. Every variant renders
/// the error envelope `{success: false, message, statusCode}` with the HTTP
/// status equal to `statusCode`. Library errors reach it through the `From`
/// impls below, so handlers propagate with `?`.
///
/// # Example
///
/// ```
/// use byway_api::error::{ApiError, ApiResult};
///
/// fn find(found: bool) -> ApiResult<&'static str> {
///     if !found {
///         return Err(ApiError::NotFound("Course not found".to_string()));
///     }
///     Ok("course")
/// }
///
/// assert!(find(false).is_err());
/// ```

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use byway_shared::auth::{authorization::AuthzError, jwt::JwtError, password::PasswordError};
use byway_shared::integrations::{MailError, MediaError, PaymentError, VideoError};
use byway_shared::models::course::ThreadError;
use byway_shared::redis::RedisClientError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type ApiResult<T> = Result<T, ApiError>;

/// Message returned for any internal failure
pub const INTERNAL_MESSAGE: &str = "Internal server error. Please try again";

/// Message returned when an id can't be parsed
pub const INVALID_ID_MESSAGE: &str = "Invalid data format. Database could not process your request.";

/// Postgres SQLSTATE for unique violations
const UNIQUE_VIOLATION: &str = "23505";

/// Postgres SQLSTATE for malformed input text (e.g. a bad uuid literal)
const INVALID_TEXT_REPRESENTATION: &str = "22P02";

#[derive(Debug)]
pub enum ApiError {
    /// 400
    BadRequest(String),

    /// 401
    Unauthorized(String),

    /// 403
    Forbidden(String),

    /// 404
    NotFound(String),

    /// 409
    Conflict(String),

    /// 413
    PayloadTooLarge(String),

    /// 422 with a single message
    Unprocessable(String),

    /// 422 from derived validation rules
    ValidationError(Vec<ValidationErrorDetail>),

    /// 429
    RateLimitExceeded { retry_after: u64, message: String },

    /// 500; the message is logged, never returned
    InternalError(String),

    /// 503
    ServiceUnavailable(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Error envelope
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub status_code: u16,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unprocessable(_) | ApiError::ValidationError(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Message shown to the client
    pub fn client_message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::Unprocessable(msg)
            | ApiError::ServiceUnavailable(msg) => msg.clone(),
            ApiError::RateLimitExceeded { message, .. } => message.clone(),
            ApiError::ValidationError(errors) => errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "Request validation failed".to_string()),
            ApiError::InternalError(_) => INTERNAL_MESSAGE.to_string(),
        }
    }

    pub fn invalid_id() -> Self {
        ApiError::BadRequest(INVALID_ID_MESSAGE.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            ApiError::Unprocessable(msg) => write!(f, "Unprocessable: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::RateLimitExceeded { message, .. } => {
                write!(f, "Rate limit exceeded: {}", message)
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::InternalError(cause) = &self {
            tracing::error!(error = %cause, "Internal error");
        }

        let status = self.status();
        let body = Json(ErrorResponse {
            success: false,
            message: self.client_message(),
            status_code: status.as_u16(),
        });

        let mut response = (status, body).into_response();

        if let ApiError::RateLimitExceeded { retry_after, .. } = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }

        response
    }
}

/// Field named by a unique constraint: `users_email_key` -> `email`
pub fn duplicate_field(constraint: &str) -> &str {
    let trimmed = constraint.strip_suffix("_key").unwrap_or(constraint);
    match trimmed.split_once('_') {
        Some((_, field)) if !field.is_empty() => field,
        _ => trimmed,
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                match db_err.code().as_deref() {
                    Some(UNIQUE_VIOLATION) => {
                        let field = db_err.constraint().map(duplicate_field).unwrap_or("value");
                        return ApiError::Conflict(format!("Duplicate {} entered", field));
                    }
                    Some(INVALID_TEXT_REPRESENTATION) => return ApiError::invalid_id(),
                    _ => {}
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Session has ended.".to_string()),
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            _ => ApiError::Unauthorized("Token is invalid, try again.".to_string()),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        ApiError::Forbidden(err.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<ThreadError> for ApiError {
    fn from(err: ThreadError) -> Self {
        ApiError::NotFound(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge("Request body is too large".to_string());
        }
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge("Request body is too large".to_string());
        }
        ApiError::BadRequest(err.body_text())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter().map(move |e| ValidationErrorDetail {
                    field: field.clone(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field)),
                })
            })
            .collect();

        details.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(details)
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Rejected(msg) => ApiError::BadRequest(msg),
            other => ApiError::InternalError(format!("Media store failure: {}", other)),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Rejected(msg) => ApiError::BadRequest(msg),
            other => ApiError::InternalError(format!("Payment gateway failure: {}", other)),
        }
    }
}

impl From<VideoError> for ApiError {
    fn from(err: VideoError) -> Self {
        match err {
            VideoError::InvalidConfiguration(msg) => ApiError::InternalError(msg),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        ApiError::InternalError(format!("Mail failure: {}", err))
    }
}

impl From<RedisClientError> for ApiError {
    fn from(err: RedisClientError) -> Self {
        ApiError::InternalError(format!("Redis failure: {}", err))
    }
}
