/// HTTP contract tests for the ByWay API
///
/// These drive the full router (consent, demo guard, auth and handlers)
/// with fake integrations. Tests that need Postgres are `#[ignore]`d; run
/// them with `cargo test -- --ignored` against a test database.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use byway_api::config::Environment;
use byway_api::middleware::consent::CONSENT_HEADER;
use byway_api::middleware::protect_db::{DEMO_MESSAGE, MOCK_HEADER};
use byway_shared::auth::jwt::{create_token, ActivationClaims, PendingUser};
use chrono::Duration;
use common::{consented, json_request, read_json, set_cookies, TestContext, PUBLISHABLE_KEY};
use serde_json::json;
use uuid::Uuid;

fn context() -> TestContext {
    TestContext::new(Environment::Test).unwrap()
}

#[tokio::test]
async fn test_health_needs_no_consent() {
    let ctx = context();

    let response = ctx
        .send(Request::get("/api/v1/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], "OK");
}

#[tokio::test]
async fn test_missing_consent_is_rejected() {
    let ctx = context();

    let response = ctx
        .send(Request::get("/api/v1/get-courses").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["statusCode"], 404);
}

#[tokio::test]
async fn test_malformed_consent_is_bad_request() {
    let ctx = context();

    let response = ctx
        .send(
            Request::get("/api/v1/me")
                .header(CONSENT_HEADER, "{not json")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route() {
    let ctx = context();

    let response = ctx
        .send(consented("GET", "/api/v1/no-such-thing").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["message"], "Route /api/v1/no-such-thing not found");
}

#[tokio::test]
async fn test_me_without_cookie() {
    let ctx = context();

    let response = ctx
        .send(consented("GET", "/api/v1/me").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(
        body["message"],
        "Authentication required. Please log in to continue."
    );
}

#[tokio::test]
async fn test_me_with_garbage_token() {
    let ctx = context();

    let response = ctx
        .send(
            consented("GET", "/api/v1/me")
                .header(header::COOKIE, "access_token=not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        read_json(response).await["message"],
        "Token is invalid, try again."
    );
}

#[tokio::test]
async fn test_access_token_signed_with_wrong_secret() {
    let ctx = context();
    let mut other = common::test_config(Environment::Test);
    other.tokens.access_secret = "someone-else".to_string();
    let claims = byway_shared::auth::jwt::Claims::new(
        Uuid::new_v4(),
        byway_shared::auth::jwt::TokenType::Access,
        Duration::minutes(5),
    );
    let token = create_token(&claims, &other.tokens.access_secret).unwrap();

    let response = ctx
        .send(
            consented("GET", "/api/v1/me")
                .header(header::COOKIE, format!("access_token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_without_cookie() {
    let ctx = context();

    let response = ctx
        .send(consented("GET", "/api/v1/refresh-tokens").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await["message"],
        "Session has ended. Please log in again."
    );
}

#[tokio::test]
async fn test_refresh_with_expired_token() {
    let ctx = context();
    let cookie = ctx.expired_refresh_cookie(Uuid::new_v4(), Duration::minutes(10));

    let response = ctx
        .send(
            consented("GET", "/api/v1/refresh-tokens")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["message"], "Session has ended.");
}

#[tokio::test]
async fn test_refresh_with_just_expired_token() {
    let ctx = context();
    let cookie = ctx.expired_refresh_cookie(Uuid::new_v4(), Duration::seconds(5));

    let response = ctx
        .send(
            consented("GET", "/api/v1/refresh-tokens")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_requires_both_fields() {
    let ctx = context();

    let response = ctx
        .send(json_request(
            "POST",
            "/api/v1/login",
            json!({ "email": "ada@byway.dev" }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await["message"],
        "Please enter your email and password"
    );
}

#[tokio::test]
async fn test_login_rejects_malformed_json() {
    let ctx = context();

    let response = ctx
        .send(
            consented("POST", "/api/v1/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"email\":"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["success"], false);
}

#[tokio::test]
async fn test_registration_validates_before_touching_storage() {
    let ctx = context();

    let response = ctx
        .send(json_request(
            "POST",
            "/api/v1/registration",
            json!({ "name": "Ada", "email": "not-an-email", "password": "Str0ng!pass" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = ctx
        .send(json_request(
            "POST",
            "/api/v1/registration",
            json!({ "name": "Ada", "email": "ada@byway.dev" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await["message"],
        "All fields are required"
    );
    assert_eq!(ctx.mailer.count(), 0);
}

#[tokio::test]
async fn test_activation_without_cookie() {
    let ctx = context();

    let response = ctx
        .send(json_request(
            "POST",
            "/api/v1/activate-user",
            json!({ "activationCode": "1234" }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        read_json(response).await["message"],
        "Verification code has expired"
    );
}

#[tokio::test]
async fn test_activation_with_wrong_code() {
    let ctx = context();
    let claims = ActivationClaims::new(
        PendingUser {
            name: "Ada".to_string(),
            email: "ada@byway.dev".to_string(),
            password_hash: "hash".to_string(),
        },
        "4821".to_string(),
    );
    let token = create_token(&claims, &ctx.config.tokens.activation_secret).unwrap();

    let response = ctx
        .send(
            consented("POST", "/api/v1/activate-user")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, format!("activation_Token={}", token))
                .body(Body::from(json!({ "activationCode": "1111" }).to_string()))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await["message"],
        "Invalid verification code"
    );
}

#[tokio::test]
async fn test_activation_with_expired_code() {
    let ctx = context();
    let claims = ActivationClaims::with_expiration(
        PendingUser {
            name: "Ada".to_string(),
            email: "ada@byway.dev".to_string(),
            password_hash: "hash".to_string(),
        },
        "4821".to_string(),
        -Duration::minutes(10),
    );
    let token = create_token(&claims, &ctx.config.tokens.activation_secret).unwrap();

    let response = ctx
        .send(
            consented("POST", "/api/v1/activate-user")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, format!("activation_Token={}", token))
                .body(Body::from(json!({ "activationCode": "4821" }).to_string()))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_route_requires_login() {
    let ctx = context();

    let response = ctx
        .send(consented("GET", "/api/v1/get-all-users").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_notification_stream_skips_consent() {
    let ctx = context();

    let response = ctx
        .send(
            Request::get("/api/v1/notifications/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await["message"],
        "Authentication required. Please log in to continue."
    );

    let response = ctx
        .send(
            Request::get("/api/v1/notifications/stream")
                .header(header::COOKIE, "access_token=not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_publishable_key() {
    let ctx = context();

    let response = ctx
        .send(
            consented("GET", "/api/v1/payment/stripepublishablekey")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["message"], "Key sent");
    assert_eq!(body["data"]["publishableKey"], PUBLISHABLE_KEY);
}

#[tokio::test]
async fn test_generate_video_url() {
    let ctx = context();

    let response = ctx
        .send(json_request(
            "POST",
            "/api/v1/generate-video-url",
            json!({ "videoId": "abc123" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["otp"], "otp-abc123");
    assert_eq!(body["data"]["playbackInfo"], "playback-abc123");

    let response = ctx
        .send(json_request("POST", "/api/v1/generate-video-url", json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_demo_guard_in_production() {
    let ctx = TestContext::new(Environment::Production).unwrap();

    let response = ctx
        .send(
            consented("GET", "/api/v1/get-all-users")
                .header(MOCK_HEADER, "true")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], DEMO_MESSAGE);
}

#[tokio::test]
async fn test_demo_header_ignored_outside_production() {
    let ctx = context();

    let response = ctx
        .send(
            consented("GET", "/api/v1/get-all-users")
                .header(MOCK_HEADER, "true")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cors_preflight_allows_consent_header() {
    let ctx = context();

    let response = ctx
        .send(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/v1/get-courses")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, CONSENT_HEADER)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
        "true"
    );
}

#[tokio::test]
#[ignore] // Requires database
async fn test_register_activate_login_flow() {
    let ctx = TestContext::with_database().await.unwrap();
    let email = format!("learner-{}@byway.dev", Uuid::new_v4());

    let response = ctx
        .send(json_request(
            "POST",
            "/api/v1/registration",
            json!({ "name": "Learner", "email": email, "password": "Str0ng!pass" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let activation_cookie = set_cookies(&response)
        .into_iter()
        .find(|c| c.starts_with("activation_Token="))
        .unwrap();
    let code = ctx.mailer.activation_code_for(&email).unwrap();

    let response = ctx
        .send(
            consented("POST", "/api/v1/activate-user")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, activation_cookie.clone())
                .body(Body::from(json!({ "activationCode": code }).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = ctx
        .send(
            consented("POST", "/api/v1/activate-user")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, activation_cookie)
                .body(Body::from(json!({ "activationCode": code }).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = ctx
        .send(json_request(
            "POST",
            "/api/v1/login",
            json!({ "email": email.to_uppercase(), "password": "Str0ng!pass" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let access_cookie = set_cookies(&response)
        .into_iter()
        .find(|c| c.starts_with("access_token="))
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body["data"]["user"]["email"], email);
    assert!(body["data"]["user"].get("passwordHash").is_none());

    let response = ctx
        .send(
            consented("GET", "/api/v1/me")
                .header(header::COOKIE, access_cookie.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["data"]["email"], email);

    let response = ctx
        .send(
            consented("GET", "/api/v1/get-all-users")
                .header(header::COOKIE, access_cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore] // Requires database
async fn test_login_unknown_email() {
    let ctx = TestContext::with_database().await.unwrap();

    let response = ctx
        .send(json_request(
            "POST",
            "/api/v1/login",
            json!({ "email": format!("ghost-{}@byway.dev", Uuid::new_v4()), "password": "x" }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore] // Requires database
async fn test_me_for_deleted_account() {
    let ctx = TestContext::with_database().await.unwrap();
    let cookie = ctx.access_cookie(Uuid::new_v4());

    let response = ctx
        .send(
            consented("GET", "/api/v1/me")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
