/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use byway_api::app::{build_router, AppState, Services};
/// use byway_api::config::Config;
/// use sqlx::PgPool;
///
/// # async fn example(services: Services) -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, config, services));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{auth, consent, protect_db, rate_limit},
    routes,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method, Uri},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use byway_shared::integrations::{
    CloudinaryStore, MailTemplate, Mailer, MediaStore, NotificationHub, PaymentGateway,
    SmtpMailer, StripeGateway, VdoCipherClient, VideoOtpProvider,
};
use byway_shared::models::notification::{CreateNotification, Notification};
use byway_shared::redis::RedisClient;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use uuid::Uuid;

/// Largest accepted request body
pub const BODY_LIMIT_BYTES: usize = 50 * 1024 * 1024;

/// Third-party service handles
#[derive(Clone)]
pub struct Services {
    pub mailer: Arc<dyn Mailer>,
    pub media: Arc<dyn MediaStore>,
    pub payments: Arc<dyn PaymentGateway>,
    pub video: Arc<dyn VideoOtpProvider>,
}

impl Services {
    /// Production clients for every integration
    ///
    /// # Errors
    ///
    /// Returns an error if a client rejects its configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            mailer: Arc::new(SmtpMailer::from_config(&config.smtp)?),
            media: Arc::new(CloudinaryStore::new(config.cloudinary.clone())?),
            payments: Arc::new(StripeGateway::new(config.stripe.clone())?),
            video: Arc::new(VdoCipherClient::new(config.vdocipher.clone())?),
        })
    }
}

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub services: Services,

    /// Live feed behind `/notifications/stream`
    pub hub: NotificationHub,

    /// Backs the rate limiter; `None` disables it
    pub redis: Option<RedisClient>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, services: Services) -> Self {
        Self {
            db,
            config: Arc::new(config),
            services,
            hub: NotificationHub::new(),
            redis: None,
        }
    }

    pub fn with_redis(mut self, redis: RedisClient) -> Self {
        self.redis = Some(redis);
        self
    }

    /// Records an admin notification and pushes it to live subscribers
    pub async fn notify(
        &self,
        user_id: Uuid,
        title: &str,
        message: String,
    ) -> Result<Notification, ApiError> {
        let notification = Notification::create(
            &self.db,
            CreateNotification {
                user_id,
                title: title.to_string(),
                message,
            },
        )
        .await?;

        let delivered = self.hub.publish(notification.clone());
        tracing::debug!(
            notification_id = %notification.id,
            title,
            delivered,
            "Notification recorded"
        );

        Ok(notification)
    }

    /// Sends an email, logging instead of failing
    pub async fn send_mail_best_effort(&self, to: &str, template: MailTemplate) {
        let subject = template.subject();
        if let Err(e) = self.services.mailer.send(to, template).await {
            tracing::warn!(error = %e, subject, "Failed to send email");
        }
    }
}

/// Builds the complete router
///
/// ```text
/// /api/v1
/// ├── GET  /health, /ui-health          (no consent)
/// ├── GET  /notifications/stream        (access cookie + admin role, no consent)
/// ├── public routes                     (consent)
/// ├── user routes                       (consent + access cookie)
/// └── admin routes                      (consent + access cookie + admin role)
/// ```
///
/// Every `/api/v1` route is wrapped by the rate limiter and demo-mode DB
/// protection. Unknown paths get `400 Route {path} not found`.
pub fn build_router(state: AppState) -> Router {
    use routes::{analytics, course, health, layout, notification, order, user};

    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/ui-health", get(health::ui_health_check));

    let public_routes = Router::new()
        .route("/registration", post(user::registration))
        .route("/activate-user", post(user::activate_user))
        .route("/login", post(user::login))
        .route("/social-auth", post(user::social_auth))
        .route("/refresh-tokens", get(user::refresh_tokens))
        .route("/get-admin", get(user::get_admin))
        .route("/get-users-list", get(user::get_users_list))
        .route("/get-course-free/:course_id", get(course::get_course_free))
        .route("/get-courses", get(course::get_courses))
        .route("/generate-video-url", post(course::generate_video_url))
        .route("/payment/stripepublishablekey", get(order::publishable_key))
        .route("/get-layout/:layout_type", get(layout::get_layout));

    let user_routes = Router::new()
        .route("/logout", post(user::logout))
        .route("/me", get(user::me))
        .route("/update-user-info", put(user::update_user_info))
        .route("/update-user-password", put(user::update_password))
        .route("/update-profile-picture", put(user::update_profile_picture))
        .route("/get-admin-list", get(user::get_admin_list))
        .route("/update-user-videos-viewed", put(user::mark_video_viewed))
        .route("/get-user-courses-summary", get(user::courses_summary))
        .route("/get-course/:course_id", get(course::get_course))
        .route("/get-course-content/:course_id", get(course::get_course_content))
        .route("/add-question", put(course::add_question))
        .route("/add-answer", put(course::add_answer))
        .route("/add-review/:course_id", put(course::add_review))
        .route("/create-order", post(order::create_order))
        .route("/payment", post(order::new_payment))
        .route_layer(from_fn_with_state(state.clone(), auth::require_user));

    let admin_routes = Router::new()
        .route("/get-all-users", get(user::get_all_users))
        .route("/update-user-role", put(user::update_user_role))
        .route("/delete-user/:user_id", delete(user::delete_user))
        .route("/create-course", post(course::create_course))
        .route("/edit-course/:course_id", put(course::edit_course))
        .route("/add-reply-review/:course_id", put(course::add_reply_to_review))
        .route("/get-all-courses", get(course::get_all_courses))
        .route("/delete-course/:course_id", delete(course::delete_course))
        .route("/get-all-orders", get(order::get_all_orders))
        .route("/get-all-notifications", get(notification::get_all_notifications))
        .route(
            "/update-notification-status/:id",
            put(notification::update_notification_status),
        )
        .route("/get-users-analytics", get(analytics::users_analytics))
        .route("/get-courses-analytics", get(analytics::courses_analytics))
        .route("/get-orders-analytics", get(analytics::orders_analytics))
        .route("/create-layout", post(layout::create_layout))
        .route("/edit-layout", put(layout::edit_layout))
        .route_layer(from_fn(auth::require_admin))
        .route_layer(from_fn_with_state(state.clone(), auth::require_user));

    let consented_routes = Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .route_layer(from_fn(consent::require_cookie_consent));

    // EventSource cannot set custom headers, so the stream skips consent
    let stream_routes = Router::new()
        .route("/notifications/stream", get(notification::stream_notifications))
        .route_layer(from_fn(auth::require_admin))
        .route_layer(from_fn_with_state(state.clone(), auth::require_user));

    let v1_routes = Router::new()
        .merge(health_routes)
        .merge(stream_routes)
        .merge(consented_routes)
        .route_layer(from_fn_with_state(state.clone(), protect_db::protect_db))
        .route_layer(from_fn_with_state(state.clone(), rate_limit::rate_limit_layer));

    Router::new()
        .nest("/api/v1", v1_routes)
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(consent::CONSENT_HEADER),
        ])
        .allow_credentials(true)
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::BadRequest(format!("Route {} not found", uri.path()))
}
