/// Purchase, progress and review flows against a real database
///
/// Every test here needs Postgres and is `#[ignore]`d; run them with
/// `cargo test -- --ignored` against a test database.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use byway_shared::models::course::{Course, CourseContent, CourseInput};
use byway_shared::models::user::{CreateUser, User, UserRole};
use common::{consented, json_body, read_json, TestContext};
use serde_json::json;
use uuid::Uuid;

async fn seed_learner(ctx: &TestContext) -> User {
    User::create(
        &ctx.db,
        CreateUser {
            name: "Learner".to_string(),
            email: format!("learner-{}@byway.dev", Uuid::new_v4()),
            password_hash: "$argon2id$unused".to_string(),
            avatar: None,
            role: UserRole::User,
            is_verified: true,
        },
    )
    .await
    .unwrap()
}

async fn seed_course(ctx: &TestContext) -> Course {
    let lesson = |title: &str| CourseContent {
        title: title.to_string(),
        video_url: format!("vdo-{}", title),
        video_section: "Basics".to_string(),
        ..Default::default()
    };

    Course::create(
        &ctx.db,
        CourseInput {
            name: format!("Rust {}", Uuid::new_v4()),
            description: "Ownership and borrowing".to_string(),
            price: 49.0,
            estimated_price: Some(79.0),
            thumbnail: None,
            demo_video: None,
            demo_url: None,
            tags: "rust".to_string(),
            level: "Beginner".to_string(),
            category: "Programming".to_string(),
            benefits: Vec::new(),
            prerequisites: Vec::new(),
            course_data: vec![lesson("intro"), lesson("traits")],
        },
    )
    .await
    .unwrap()
}

/// Authenticated JSON request
fn as_user(
    ctx: &TestContext,
    user: &User,
    method: &str,
    uri: &str,
    body: serde_json::Value,
) -> Request<Body> {
    consented(method, uri)
        .header(header::COOKIE, ctx.access_cookie(user.id))
        .header(header::CONTENT_TYPE, "application/json")
        .body(json_body(body))
        .unwrap()
}

async fn purchase(
    ctx: &TestContext,
    user: &User,
    course: &Course,
) -> axum::http::Response<Body> {
    ctx.send(as_user(
        ctx,
        user,
        "POST",
        "/api/v1/create-order",
        json!({ "courseId": course.id, "payment_info": { "id": "pi_ok" } }),
    ))
    .await
}

#[tokio::test]
#[ignore] // Requires database
async fn test_order_enrolls_once() {
    let ctx = TestContext::with_database().await.unwrap();
    let learner = seed_learner(&ctx).await;
    let course = seed_course(&ctx).await;

    let response = purchase(&ctx, &learner, &course).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["data"]["courseId"], course.id.to_string());

    let enrolled = User::find_by_id(&ctx.db, learner.id).await.unwrap().unwrap();
    let enrollment = enrolled.enrollment(course.id).unwrap();
    assert_eq!(enrollment.progress.len(), 2);
    assert!(enrollment.progress.iter().all(|p| !p.viewed));
    assert!(!enrollment.reviewed);

    let stored = Course::find_by_id(&ctx.db, course.id).await.unwrap().unwrap();
    assert_eq!(stored.purchase, 1);

    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(learner.id)
        .fetch_one(&ctx.db)
        .await
        .unwrap();
    assert_eq!(orders, 1);

    let response = purchase(&ctx, &learner, &course).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await["message"],
        "You have already purchased this course"
    );

    let stored = Course::find_by_id(&ctx.db, course.id).await.unwrap().unwrap();
    assert_eq!(stored.purchase, 1);
}

#[tokio::test]
#[ignore] // Requires database
async fn test_order_with_unpaid_intent_changes_nothing() {
    let ctx = TestContext::with_database().await.unwrap();
    let learner = seed_learner(&ctx).await;
    let course = seed_course(&ctx).await;

    let response = ctx
        .send(as_user(
            &ctx,
            &learner,
            "POST",
            "/api/v1/create-order",
            json!({ "courseId": course.id, "payment_info": { "id": "pi_fail_card" } }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let stored = User::find_by_id(&ctx.db, learner.id).await.unwrap().unwrap();
    assert!(!stored.is_enrolled(course.id));
    let course = Course::find_by_id(&ctx.db, course.id).await.unwrap().unwrap();
    assert_eq!(course.purchase, 0);
}

#[tokio::test]
#[ignore] // Requires database
async fn test_content_requires_enrollment() {
    let ctx = TestContext::with_database().await.unwrap();
    let learner = seed_learner(&ctx).await;
    let course = seed_course(&ctx).await;
    let uri = format!("/api/v1/get-course-content/{}", course.id);

    let response = ctx
        .send(
            consented("GET", &uri)
                .header(header::COOKIE, ctx.access_cookie(learner.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        read_json(response).await["message"],
        "You are not eligible to access this course"
    );

    assert_eq!(purchase(&ctx, &learner, &course).await.status(), StatusCode::CREATED);

    let response = ctx
        .send(
            consented("GET", &uri)
                .header(header::COOKIE, ctx.access_cookie(learner.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["videoUrl"], "vdo-intro");
}

#[tokio::test]
#[ignore] // Requires database
async fn test_marking_a_lesson_viewed() {
    let ctx = TestContext::with_database().await.unwrap();
    let learner = seed_learner(&ctx).await;
    let course = seed_course(&ctx).await;
    let lesson = course.course_data[1].id;

    let mark = |video_id: Uuid| {
        as_user(
            &ctx,
            &learner,
            "PUT",
            "/api/v1/update-user-videos-viewed",
            json!({ "courseId": course.id, "videoId": video_id }),
        )
    };

    let response = ctx.send(mark(lesson)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(purchase(&ctx, &learner, &course).await.status(), StatusCode::CREATED);

    let response = ctx.send(mark(lesson)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        read_json(response).await["message"],
        "You have completed this lesson. Well done!"
    );

    let stored = User::find_by_id(&ctx.db, learner.id).await.unwrap().unwrap();
    let progress = &stored.enrollment(course.id).unwrap().progress;
    assert!(progress.iter().any(|p| p.video_id == lesson && p.viewed));
    assert!(progress
        .iter()
        .any(|p| p.video_id == course.course_data[0].id && !p.viewed));
}

#[tokio::test]
#[ignore] // Requires database
async fn test_one_review_per_enrollment() {
    let ctx = TestContext::with_database().await.unwrap();
    let learner = seed_learner(&ctx).await;
    let course = seed_course(&ctx).await;
    let uri = format!("/api/v1/add-review/{}", course.id);
    let review = || {
        as_user(
            &ctx,
            &learner,
            "PUT",
            &uri,
            json!({ "review": "Clear and practical", "rating": 4 }),
        )
    };

    let response = ctx.send(review()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        read_json(response).await["message"],
        "You are not allowed access to this course"
    );

    assert_eq!(purchase(&ctx, &learner, &course).await.status(), StatusCode::CREATED);

    let response = ctx.send(review()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["reviews"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["ratings"], 4.0);

    let stored = User::find_by_id(&ctx.db, learner.id).await.unwrap().unwrap();
    assert!(stored.enrollment(course.id).unwrap().reviewed);

    let response = ctx.send(review()).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        read_json(response).await["message"],
        "You have already reviewed this course"
    );

    let stored = Course::find_by_id(&ctx.db, course.id).await.unwrap().unwrap();
    assert_eq!(stored.reviews.len(), 1);
}
