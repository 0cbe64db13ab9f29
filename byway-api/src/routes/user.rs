/// Account endpoints
///
/// # Endpoints
///
/// - `POST /registration`, `POST /activate-user`: two-step sign-up with a
///   mailed 4-digit code carried in the `activation_Token` cookie
/// - `POST /login`, `POST /social-auth`, `POST /logout`, `GET /refresh-tokens`:
///   cookie sessions
/// - `GET /me`, `PUT /update-user-info`, `PUT /update-user-password`,
///   `PUT /update-profile-picture`: the caller's own profile
/// - `PUT /update-user-videos-viewed`, `GET /get-user-courses-summary`:
///   learning progress
/// - `GET /get-all-users`, `PUT /update-user-role`, `DELETE /delete-user/:id`:
///   admin user management
/// - `GET /get-admin`, `GET /get-admin-list`, `GET /get-users-list`: directories

use crate::{
    app::AppState,
    cookies,
    error::{ApiError, ApiResult},
    extract::{parse_id, ApiJson, FormData},
    middleware::auth::CurrentUser,
    response::ApiResponse,
    routes::{asset_id, present, replace_media},
};
use axum::{
    extract::{Path, State},
    Extension,
};
use axum_extra::extract::cookie::CookieJar;
use byway_shared::{
    auth::{
        jwt::{self, ActivationClaims, JwtError, PendingUser},
        password,
        validation::normalize_email,
    },
    integrations::{MailTemplate, ResourceKind, UploadOptions},
    models::{
        course::Course,
        user::{CreateUser, UpdateUser, User, UserRole, UserSummary, VideoProgress},
        MediaRef,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::ValidateEmail;

const WEAK_PASSWORD: &str = "Password security is too weak";
const INVALID_EMAIL: &str = "Please enter a valid email";
const CODE_EXPIRED: &str = "Verification code has expired";
const ACCOUNT_NOT_FOUND: &str = "Account not found";
const AVATAR_TRANSFORMATION: &str = "w_500,h_500,c_fill,g_face";

#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRequest {
    #[serde(default)]
    pub activation_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SocialAuthRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,

    /// Profile picture URL from the identity provider
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInfoRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub old_password: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoViewedRequest {
    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
}

/// Session issued on login or social sign-in
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub user: User,

    /// Milliseconds since the epoch when the access cookie ends
    pub expires_at: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshData {
    pub expires_at: i64,
}

/// One row of the learner dashboard
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: Uuid,
    pub name: String,
    pub thumbnail: Option<MediaRef>,
    pub ratings: f64,
    pub purchase: i32,
    pub progress: Vec<VideoProgress>,
    pub reviewed: bool,
}

/// Issues a session and sets its cookies
fn start_session(
    state: &AppState,
    jar: CookieJar,
    user: &User,
) -> ApiResult<(CookieJar, i64)> {
    let session = jwt::issue_session(user.id, &state.config.tokens.session_keys())?;
    let jar = cookies::set_session(jar, &session, &state.config);
    Ok((jar, session.expires_at_millis()))
}

/// Starts a registration
///
/// Nothing is stored yet: the hashed credentials travel inside the
/// activation token until the mailed code comes back.
///
/// # Errors
///
/// - `400`: missing field, bad email, weak password, mail not sent
/// - `409`: email already registered
pub async fn registration(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<RegistrationRequest>,
) -> ApiResult<(CookieJar, ApiResponse<()>)> {
    let (Some(name), Some(email), Some(password)) =
        (present(req.name), present(req.email), req.password.filter(|p| !p.is_empty()))
    else {
        return Err(ApiError::BadRequest("All fields are required".to_string()));
    };

    let email = valid_email(&email)?;

    if password::validate_password_strength(&password).is_err() {
        return Err(ApiError::BadRequest(WEAK_PASSWORD.to_string()));
    }

    if User::find_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::Conflict(
            "Account already exists. Please proceed to sign in to your account".to_string(),
        ));
    }

    let password_hash = password::hash_password(&password)?;
    let activation_code = jwt::generate_activation_code();
    let claims = ActivationClaims::new(
        PendingUser {
            name: name.clone(),
            email: email.clone(),
            password_hash,
        },
        activation_code.clone(),
    );
    let token = jwt::create_token(&claims, &state.config.tokens.activation_secret)?;

    state
        .services
        .mailer
        .send(
            &email,
            MailTemplate::Activation {
                name,
                activation_code,
            },
        )
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Activation email failed");
            ApiError::BadRequest("Failed to send mail".to_string())
        })?;

    tracing::info!(email = %email, "Activation code sent");

    let jar = cookies::set_activation(jar, token, &state.config);
    Ok((
        jar,
        ApiResponse::message("A verification code has been sent to your email."),
    ))
}

/// Confirms a registration with the mailed code and creates the account
pub async fn activate_user(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<ActivationRequest>,
) -> ApiResult<(CookieJar, ApiResponse<()>)> {
    let token = cookies::read(&jar, cookies::ACTIVATION_TOKEN)
        .ok_or_else(|| ApiError::Unauthorized(CODE_EXPIRED.to_string()))?;

    let claims = jwt::validate_activation_token(&token, &state.config.tokens.activation_secret)
        .map_err(|e| match e {
            JwtError::Expired => ApiError::Unauthorized(CODE_EXPIRED.to_string()),
            other => ApiError::from(other),
        })?;

    let code = present(req.activation_code).unwrap_or_default();
    if code != claims.activation_code {
        return Err(ApiError::BadRequest("Invalid verification code".to_string()));
    }

    let pending = claims.user;
    if User::find_by_email(&state.db, &pending.email).await?.is_some() {
        return Err(ApiError::Conflict("Account already exists".to_string()));
    }

    let user = User::create(
        &state.db,
        CreateUser {
            name: pending.name,
            email: pending.email,
            password_hash: pending.password_hash,
            avatar: None,
            role: UserRole::User,
            is_verified: true,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "User registered");

    let jar = cookies::clear_activation(jar, &state.config);
    Ok((
        jar,
        ApiResponse::message_with_status(
            axum::http::StatusCode::CREATED,
            "Account verified successfully",
        ),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<(CookieJar, ApiResponse<SessionData>)> {
    let (Some(email), Some(password)) =
        (present(req.email), req.password.filter(|p| !p.is_empty()))
    else {
        return Err(ApiError::BadRequest(
            "Please enter your email and password".to_string(),
        ));
    };

    let user = User::find_by_email(&state.db, &normalize_email(&email))
        .await?
        .ok_or_else(|| ApiError::NotFound(ACCOUNT_NOT_FOUND.to_string()))?;

    if !password::verify_password(&password, &user.password_hash)? {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let (jar, expires_at) = start_session(&state, jar, &user)?;
    tracing::debug!(user_id = %user.id, "User logged in");

    Ok((
        jar,
        ApiResponse::ok(SessionData { user, expires_at }, "Logged in successfully"),
    ))
}

/// Signs in with an identity vouched for by the frontend's OAuth flow
///
/// Unknown emails get a verified account with an unusable random password.
pub async fn social_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<SocialAuthRequest>,
) -> ApiResult<(CookieJar, ApiResponse<SessionData>)> {
    let (Some(name), Some(email)) = (present(req.name), present(req.email)) else {
        return Err(ApiError::BadRequest("Please provide name and email".to_string()));
    };
    let email = normalize_email(&email);

    let user = match User::find_by_email(&state.db, &email).await? {
        Some(user) => user,
        None => {
            let password_hash = password::hash_password(&password::generate_random_password())?;
            let avatar = present(req.avatar).map(|url| MediaRef {
                public_id: String::new(),
                url,
            });

            let user = User::create(
                &state.db,
                CreateUser {
                    name,
                    email,
                    password_hash,
                    avatar,
                    role: UserRole::User,
                    is_verified: true,
                },
            )
            .await?;
            tracing::info!(user_id = %user.id, "User registered through social sign-in");
            user
        }
    };

    let (jar, expires_at) = start_session(&state, jar, &user)?;

    Ok((
        jar,
        ApiResponse::ok(SessionData { user, expires_at }, "Logged in successfully"),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, ApiResponse<()>) {
    (
        cookies::clear_session(jar, &state.config),
        ApiResponse::message("Logout successfully"),
    )
}

/// Rotates the session from the refresh cookie
///
/// # Errors
///
/// - `400`: no refresh cookie
/// - `401`: refresh token expired or invalid
/// - `404`: account deleted since the token was issued
pub async fn refresh_tokens(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, ApiResponse<RefreshData>)> {
    let token = cookies::read(&jar, cookies::REFRESH_TOKEN).ok_or_else(|| {
        ApiError::BadRequest("Session has ended. Please log in again.".to_string())
    })?;

    let claims = jwt::validate_refresh_token(&token, &state.config.tokens.refresh_secret)?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::NotFound(ACCOUNT_NOT_FOUND.to_string()))?;

    let (jar, expires_at) = start_session(&state, jar, &user)?;

    Ok((
        jar,
        ApiResponse::ok(RefreshData { expires_at }, "Tokens Refreshed"),
    ))
}

pub async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> ApiResponse<User> {
    ApiResponse::ok(user, "User fetched")
}

pub async fn update_user_info(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<UpdateInfoRequest>,
) -> ApiResult<ApiResponse<User>> {
    let (Some(name), Some(email)) = (present(req.name), present(req.email)) else {
        return Err(ApiError::BadRequest("Fields are required".to_string()));
    };

    let email = valid_email(&email)?;

    if User::email_taken_by_other(&state.db, &email, user.id).await? {
        return Err(ApiError::Conflict("Email already exists".to_string()));
    }

    let updated = User::update(
        &state.db,
        user.id,
        UpdateUser {
            name: Some(name),
            email: Some(email),
            ..Default::default()
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound(ACCOUNT_NOT_FOUND.to_string()))?;

    Ok(ApiResponse::created(updated, "Profile updated"))
}

pub async fn update_password(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<UpdatePasswordRequest>,
) -> ApiResult<ApiResponse<()>> {
    let (Some(old_password), Some(new_password)) = (
        req.old_password.filter(|p| !p.is_empty()),
        req.new_password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::BadRequest(
            "Please enter your old and new password".to_string(),
        ));
    };

    if !password::verify_password(&old_password, &user.password_hash)? {
        return Err(ApiError::Unauthorized("Invalid old password".to_string()));
    }

    if old_password == new_password {
        return Err(ApiError::Forbidden(
            "New password must be different from old password".to_string(),
        ));
    }

    if password::validate_password_strength(&new_password).is_err() {
        return Err(ApiError::BadRequest(WEAK_PASSWORD.to_string()));
    }

    User::update(
        &state.db,
        user.id,
        UpdateUser {
            password_hash: Some(password::hash_password(&new_password)?),
            ..Default::default()
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound(ACCOUNT_NOT_FOUND.to_string()))?;

    Ok(ApiResponse::message_with_status(
        axum::http::StatusCode::CREATED,
        "Password updated",
    ))
}

/// Normalized address, 400 when it isn't one
fn valid_email(raw: &str) -> ApiResult<String> {
    let email = normalize_email(raw);
    if email.validate_email() {
        Ok(email)
    } else {
        Err(ApiError::BadRequest(INVALID_EMAIL.to_string()))
    }
}

/// Folder holding a user's avatar uploads
fn avatar_folder(user: &User) -> String {
    format!("byWay/users/{} - {}", user.name, user.id)
}

/// Replaces the caller's avatar with a 500x500 face crop of the upload
pub async fn update_profile_picture(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut form: FormData,
) -> ApiResult<ApiResponse<User>> {
    let mut files = form.take_files("avatar");
    let file = match files.len() {
        0 => return Err(ApiError::BadRequest("Please provide an image".to_string())),
        1 => files.remove(0),
        _ => return Err(ApiError::Forbidden("Multiple images not allowed".to_string())),
    };

    if !file.is_image() {
        return Err(ApiError::Unprocessable(
            "Invalid image format. File must be an image(.jpg, .png, .jpeg)".to_string(),
        ));
    }

    let folder = avatar_folder(&user);
    let replaced = user
        .avatar
        .as_ref()
        .map(|old| &old.0)
        .filter(|old| !old.public_id.is_empty())
        .map(|old| asset_id(&folder, old));

    let avatar = replace_media(
        state.services.media.as_ref(),
        file.into_media_source(),
        UploadOptions::image(folder).with_transformation(AVATAR_TRANSFORMATION),
        replaced,
    )
    .await?;

    let updated = User::update(
        &state.db,
        user.id,
        UpdateUser {
            avatar: Some(avatar),
            ..Default::default()
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound(ACCOUNT_NOT_FOUND.to_string()))?;

    Ok(ApiResponse::created(updated, "Profile image updated"))
}

pub async fn get_all_users(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<User>>> {
    let users = User::list_all(&state.db).await?;
    Ok(ApiResponse::ok(users, "Users fetched"))
}

pub async fn get_admin_list(
    State(state): State<AppState>,
) -> ApiResult<ApiResponse<Vec<User>>> {
    let admins = User::list_by_role(&state.db, UserRole::Admin).await?;
    Ok(ApiResponse::ok(admins, "Admin list fetched"))
}

/// Newest admin, shown as the course author on the public site
pub async fn get_admin(State(state): State<AppState>) -> ApiResult<ApiResponse<User>> {
    let admin = User::find_newest_admin(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Admin not found".to_string()))?;
    Ok(ApiResponse::ok(admin, "Admin fetched"))
}

pub async fn get_users_list(
    State(state): State<AppState>,
) -> ApiResult<ApiResponse<Vec<UserSummary>>> {
    let users = User::list_summaries(&state.db, UserRole::User).await?;
    Ok(ApiResponse::ok(users, "Users list fetched"))
}

pub async fn update_user_role(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<UpdateRoleRequest>,
) -> ApiResult<ApiResponse<User>> {
    let (Some(email), Some(role)) = (present(req.email), present(req.role)) else {
        return Err(ApiError::BadRequest("Please provide email and role".to_string()));
    };

    let role: UserRole = role
        .to_lowercase()
        .parse()
        .map_err(|_| ApiError::Unprocessable("Role must be either user or admin".to_string()))?;

    let user = User::set_role_by_email(&state.db, &normalize_email(&email), role)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %user.id, role = %role, "User role changed");

    Ok(ApiResponse::ok(user, "User role updated"))
}

/// Deletes an account and its avatar folder
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    let user_id = parse_id(&user_id)?;

    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if user.avatar.is_some() {
        if let Err(e) = state
            .services
            .media
            .delete_by_prefix(&avatar_folder(&user), ResourceKind::Image)
            .await
        {
            tracing::warn!(error = %e, user_id = %user.id, "Failed to delete avatar");
        }
    }

    if !User::delete(&state.db, user_id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %user_id, "User deleted");

    Ok(ApiResponse::message("User account deleted"))
}

pub async fn mark_video_viewed(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<VideoViewedRequest>,
) -> ApiResult<ApiResponse<()>> {
    let (Some(course_id), Some(video_id)) = (present(req.course_id), present(req.video_id)) else {
        return Err(ApiError::BadRequest(
            "Please provide courseId and videoId".to_string(),
        ));
    };
    let course_id = parse_id(&course_id)?;
    let video_id = parse_id(&video_id)?;

    if !User::mark_video_viewed(&state.db, user.id, course_id, video_id).await? {
        return Err(ApiError::NotFound(
            "Lesson not found in your enrolled courses".to_string(),
        ));
    }

    Ok(ApiResponse::message_with_status(
        axum::http::StatusCode::CREATED,
        "You have completed this lesson. Well done!",
    ))
}

/// Builds dashboard rows in enrollment order, skipping deleted courses
fn summarize(user: &User, courses: &[Course]) -> Vec<CourseSummary> {
    user.courses
        .iter()
        .filter_map(|enrollment| {
            let course = courses.iter().find(|c| c.id == enrollment.course_id)?;
            Some(CourseSummary {
                id: course.id,
                name: course.name.clone(),
                thumbnail: course.thumbnail.as_ref().map(|t| t.0.clone()),
                ratings: course.ratings,
                purchase: course.purchase,
                progress: enrollment.progress.clone(),
                reviewed: enrollment.reviewed,
            })
        })
        .collect()
}

pub async fn courses_summary(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<ApiResponse<Vec<CourseSummary>>> {
    let ids: Vec<Uuid> = user.courses.iter().map(|e| e.course_id).collect();
    let courses = Course::find_many(&state.db, &ids).await?;

    Ok(ApiResponse::ok(
        summarize(&user, &courses),
        "Courses summary fetched",
    ))
}
