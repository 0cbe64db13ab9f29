/// Notification model and database operations
///
/// Notifications are the admin-facing event log: every question, answer,
/// review and order writes one. Read notifications are purged by the worker
/// once they are older than [`RETENTION_DAYS`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Age after which read notifications are deleted
pub const RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Unread,
    Read,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Unread => "unread",
            NotificationStatus::Read => "read",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,

    /// Actor that triggered the event; cleared if the account is deleted
    pub user_id: Option<Uuid>,

    pub title: String,
    pub message: String,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for recording a notification
#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
}

/// Cutoff for the purge job: anything created before it is stale
pub fn retention_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(RETENTION_DAYS)
}

impl Notification {
    pub async fn create(pool: &PgPool, data: CreateNotification) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, title, message)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, title, message, status, created_at, updated_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.title)
        .bind(data.message)
        .fetch_one(pool)
        .await
    }

    /// Lists every notification, newest first
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, title, message, status, created_at, updated_at
            FROM notifications
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Marks a notification as read
    ///
    /// Returns `None` when it doesn't exist.
    pub async fn mark_read(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET status = 'read', updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, title, message, status, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Deletes read notifications created before `cutoff`
    ///
    /// Returns the number of rows removed.
    pub async fn purge_read_older_than(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM notifications WHERE status = 'read' AND created_at < $1")
                .bind(cutoff)
                .execute(pool)
                .await?;

        Ok(result.rows_affected())
    }
}
