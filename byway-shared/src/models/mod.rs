/// Database models for ByWay
///
/// Each model is a `sqlx::FromRow` struct with its queries as associated
/// functions. Nested, document-shaped data (enrollments, course content,
/// Q&A threads, reviews, layout payloads) is stored as JSONB and edited in
/// Rust while the owning row is locked.
///
/// # Models
///
/// - `user`: accounts, roles and enrollments
/// - `course`: catalog entries with content units, Q&A and reviews
/// - `order`: purchases
/// - `notification`: admin-facing event log
/// - `layout`: homepage banner, FAQ and categories
/// - `analytics`: 12-window creation counts
///
/// # Example
///
/// ```no_run
/// use byway_shared::models::user::User;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// if let Some(user) = User::find_by_email(&pool, "ada@example.com").await? {
///     println!("{} holds {} enrollments", user.name, user.courses.len());
/// }
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};

pub mod analytics;
pub mod course;
pub mod layout;
pub mod notification;
pub mod order;
pub mod user;

/// Reference to an asset hosted by the media store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    /// Identifier used to delete or transform the asset
    pub public_id: String,

    /// Public delivery URL
    pub url: String,
}

/// A bare `{ title }` entry (benefits, prerequisites, objectives, categories)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleItem {
    #[serde(default)]
    pub title: String,
}
