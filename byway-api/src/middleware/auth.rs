/// Cookie session authentication
///
/// [`require_user`] resolves the `access_token` cookie to a [`User`] and
/// inserts it as [`CurrentUser`]; [`require_admin`] runs after it and checks
/// the role. Handlers read the user with `Extension<CurrentUser>`.
///
/// # Errors
///
/// - 400: no access cookie
/// - 401: token expired or invalid
/// - 403: role not allowed
/// - 404: the token's user no longer exists

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use byway_shared::auth::{authorization::require_role, jwt::validate_access_token};
use byway_shared::models::user::{User, UserRole};

use crate::{app::AppState, cookies, error::ApiError};

pub const LOGIN_REQUIRED: &str = "Authentication required. Please log in to continue.";
pub const USER_GONE: &str = "Please login to access this";

/// Authenticated user for the current request
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

pub async fn require_user(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = cookies::read(&jar, cookies::ACCESS_TOKEN)
        .ok_or_else(|| ApiError::BadRequest(LOGIN_REQUIRED.to_string()))?;

    let claims = validate_access_token(&token, &state.config.tokens.access_secret)?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::NotFound(USER_GONE.to_string()))?;

    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}

/// Admin-only guard; must run after [`require_user`]
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let CurrentUser(user) = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ApiError::internal("Role check ran without an authenticated user"))?;

    require_role(user.role, &[UserRole::Admin])?;

    Ok(next.run(req).await)
}
