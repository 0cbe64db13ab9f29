/// Cookie consent gate
///
/// Clients must send the visitor's consent choices as JSON in the
/// `x-cookie-consent` header before any non-health route runs.

use axum::{extract::Request, middleware::Next, response::Response};

use crate::error::ApiError;

pub const CONSENT_HEADER: &str = "x-cookie-consent";

pub async fn require_cookie_consent(req: Request, next: Next) -> Result<Response, ApiError> {
    check_consent(req.headers().get(CONSENT_HEADER).map(|v| v.as_bytes()))?;
    Ok(next.run(req).await)
}

fn check_consent(raw: Option<&[u8]>) -> Result<(), ApiError> {
    let raw = raw
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::NotFound("Cookie consent is required to proceed".to_string()))?;

    serde_json::from_slice::<serde_json::Value>(raw)
        .map(|_| ())
        .map_err(|_| ApiError::BadRequest("Invalid cookie consent format".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_missing_consent_is_not_found() {
        assert_eq!(check_consent(None).unwrap_err().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            check_consent(Some(b"")).unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_malformed_consent_is_bad_request() {
        let err = check_consent(Some(b"analytics=yes")).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.client_message(), "Invalid cookie consent format");
    }

    #[test]
    fn test_json_consent_passes() {
        assert!(check_consent(Some(br#"{"necessary":true,"analytics":false}"#)).is_ok());
        assert!(check_consent(Some(b"true")).is_ok());
    }
}
