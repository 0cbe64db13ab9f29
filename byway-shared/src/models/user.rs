/// User model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash TEXT NOT NULL,
///     avatar JSONB,
///     role user_role NOT NULL DEFAULT 'user',
///     is_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     courses JSONB NOT NULL DEFAULT '[]',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// `courses` holds the user's enrollments. An enrollment is appended at
/// purchase time with one progress entry per content unit of the course,
/// and a user never holds two enrollments for the same course.
///
/// # Example
///
/// ```no_run
/// use byway_shared::models::user::{CreateUser, User, UserRole};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(
///     &pool,
///     CreateUser {
///         name: "Ada".to_string(),
///         email: "ada@example.com".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///         avatar: None,
///         role: UserRole::User,
///         is_verified: true,
///     },
/// )
/// .await?;
///
/// let found = User::find_by_email(&pool, "ada@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgConnection, PgPool};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::course::Author;
use super::MediaRef;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, avatar, role, is_verified, courses, created_at, updated_at";

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Learner
    User,

    /// Course author / platform operator
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Watched state of one content unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoProgress {
    pub video_id: Uuid,
    pub viewed: bool,
}

/// A purchased course and the learner's progress through it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub course_id: Uuid,

    #[serde(default)]
    pub progress: Vec<VideoProgress>,

    #[serde(default)]
    pub reviewed: bool,
}

impl Enrollment {
    /// Creates an enrollment with every video unwatched
    pub fn new(course_id: Uuid, video_ids: Vec<Uuid>) -> Self {
        Self {
            course_id,
            progress: video_ids
                .into_iter()
                .map(|video_id| VideoProgress {
                    video_id,
                    viewed: false,
                })
                .collect(),
            reviewed: false,
        }
    }

    /// Marks a video as watched
    ///
    /// Returns `false` when the video is not part of this enrollment.
    pub fn mark_viewed(&mut self, video_id: Uuid) -> bool {
        match self.progress.iter_mut().find(|p| p.video_id == video_id) {
            Some(entry) => {
                entry.viewed = true;
                true
            }
            None => false,
        }
    }
}

/// User model representing an account
///
/// The password hash is never serialized into API responses.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,

    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub avatar: Option<Json<MediaRef>>,
    pub role: UserRole,
    pub is_verified: bool,
    pub courses: Json<Vec<Enrollment>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the user already holds an enrollment for `course_id`
    pub fn is_enrolled(&self, course_id: Uuid) -> bool {
        self.enrollment(course_id).is_some()
    }

    pub fn enrollment(&self, course_id: Uuid) -> Option<&Enrollment> {
        self.courses.iter().find(|e| e.course_id == course_id)
    }

    pub fn enrollment_mut(&mut self, course_id: Uuid) -> Option<&mut Enrollment> {
        self.courses.iter_mut().find(|e| e.course_id == course_id)
    }

    /// Snapshot embedded in questions, answers and reviews
    pub fn author(&self) -> Author {
        Author {
            id: self.id,
            name: self.name.clone(),
            avatar: self.avatar.as_ref().map(|a| a.0.clone()),
            role: self.role,
        }
    }
}

/// Public listing projection
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<Json<MediaRef>>,
    pub role: UserRole,
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,

    /// Normalized (trimmed, lowercase) address
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    pub avatar: Option<MediaRef>,
    pub role: UserRole,
    pub is_verified: bool,
}

/// Input for updating an existing user
///
/// All fields are optional. Only non-None fields will be updated.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub avatar: Option<MediaRef>,
    pub role: Option<UserRole>,
}

impl User {
    /// Creates a new user in the database
    ///
    /// # Errors
    ///
    /// Returns a database error carrying the `users_email_key` constraint
    /// when the address is already registered.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO users (name, email, password_hash, avatar, role, is_verified)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(data.name)
            .bind(data.email)
            .bind(data.password_hash)
            .bind(data.avatar.map(Json))
            .bind(data.role)
            .bind(data.is_verified)
            .fetch_one(pool)
            .await
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by (normalized) email address
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Whether `email` belongs to an account other than `except_id`
    pub async fn email_taken_by_other(
        pool: &PgPool,
        email: &str,
        except_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 AND id <> $2)")
            .bind(email)
            .bind(except_id)
            .fetch_one(pool)
            .await
    }

    /// Updates an existing user
    ///
    /// Only non-None fields in `data` are written. `updated_at` is always
    /// bumped. Returns `None` when the user doesn't exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.email.is_some() {
            bind_count += 1;
            query.push_str(&format!(", email = ${}", bind_count));
        }
        if data.password_hash.is_some() {
            bind_count += 1;
            query.push_str(&format!(", password_hash = ${}", bind_count));
        }
        if data.avatar.is_some() {
            bind_count += 1;
            query.push_str(&format!(", avatar = ${}", bind_count));
        }
        if data.role.is_some() {
            bind_count += 1;
            query.push_str(&format!(", role = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {USER_COLUMNS}"));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(email) = data.email {
            q = q.bind(email);
        }
        if let Some(password_hash) = data.password_hash {
            q = q.bind(password_hash);
        }
        if let Some(avatar) = data.avatar {
            q = q.bind(Json(avatar));
        }
        if let Some(role) = data.role {
            q = q.bind(role);
        }

        q.fetch_optional(pool).await
    }

    /// Sets the role of the account registered under `email`
    pub async fn set_role_by_email(
        pool: &PgPool,
        email: &str,
        role: UserRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE email = $1 RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .bind(role)
            .fetch_optional(pool)
            .await
    }

    /// Deletes a user by ID
    ///
    /// Orders cascade; notifications keep their text with the actor cleared.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists every account, newest first
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");

        sqlx::query_as::<_, User>(&query).fetch_all(pool).await
    }

    /// Lists accounts holding `role`, newest first
    pub async fn list_by_role(pool: &PgPool, role: UserRole) -> Result<Vec<Self>, sqlx::Error> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY created_at DESC");

        sqlx::query_as::<_, User>(&query)
            .bind(role)
            .fetch_all(pool)
            .await
    }

    /// Lists the public projection of accounts holding `role`
    pub async fn list_summaries(
        pool: &PgPool,
        role: UserRole,
    ) -> Result<Vec<UserSummary>, sqlx::Error> {
        sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT id, name, avatar, role
            FROM users
            WHERE role = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(role)
        .fetch_all(pool)
        .await
    }

    /// Finds the most recently created admin
    pub async fn find_newest_admin(pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = 'admin' ORDER BY created_at DESC LIMIT 1"
        );

        sqlx::query_as::<_, User>(&query).fetch_optional(pool).await
    }

    /// Loads a user and locks the row until the surrounding transaction ends
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Writes the enrollment list back
    pub async fn save_courses(
        conn: &mut PgConnection,
        id: Uuid,
        courses: &[Enrollment],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET courses = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(Json(courses))
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Marks a video of an enrolled course as watched
    ///
    /// Returns `false` when the user is not enrolled in the course or the
    /// video is not part of it.
    pub async fn mark_video_viewed(
        pool: &PgPool,
        user_id: Uuid,
        course_id: Uuid,
        video_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(mut user) = Self::lock_for_update(&mut tx, user_id).await? else {
            return Ok(false);
        };

        let updated = user
            .enrollment_mut(course_id)
            .map(|enrollment| enrollment.mark_viewed(video_id))
            .unwrap_or(false);

        if updated {
            Self::save_courses(&mut tx, user_id, &user.courses).await?;
            tx.commit().await?;
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing_and_display() {
        assert_eq!("admin".parse::<UserRole>(), Ok(UserRole::Admin));
        assert_eq!("user".parse::<UserRole>(), Ok(UserRole::User));
        assert!("owner".parse::<UserRole>().is_err());
        assert_eq!(UserRole::Admin.to_string(), "admin");
    }

    #[test]
    fn test_enrollment_starts_unwatched() {
        let videos = vec![Uuid::new_v4(), Uuid::new_v4()];
        let enrollment = Enrollment::new(Uuid::new_v4(), videos.clone());

        assert!(!enrollment.reviewed);
        assert_eq!(enrollment.progress.len(), 2);
        assert!(enrollment.progress.iter().all(|p| !p.viewed));
        assert_eq!(enrollment.progress[1].video_id, videos[1]);
    }

    #[test]
    fn test_mark_viewed() {
        let video = Uuid::new_v4();
        let mut enrollment = Enrollment::new(Uuid::new_v4(), vec![video, Uuid::new_v4()]);

        assert!(enrollment.mark_viewed(video));
        assert!(enrollment.progress[0].viewed);
        assert!(!enrollment.progress[1].viewed);
        assert!(!enrollment.mark_viewed(Uuid::new_v4()));
    }

    #[test]
    fn test_user_serialization_hides_password() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            avatar: None,
            role: UserRole::User,
            is_verified: true,
            courses: Json(vec![Enrollment::new(Uuid::new_v4(), vec![])]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["role"], "user");
        assert_eq!(json["isVerified"], true);
        assert!(json["courses"][0]["courseId"].is_string());
    }
}
