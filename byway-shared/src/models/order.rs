/// Order model and database operations
///
/// An order records one user's purchase of one course. The pair is unique
/// (`orders_user_course_key`), which backs the "no duplicate enrollment" rule
/// at the storage level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, PgConnection, PgPool};
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, course_id, user_id, payment_info, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,

    /// Payment provider payload as sent by the client
    #[serde(rename = "payment_info")]
    pub payment_info: Option<Json<Value>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Inserts an order inside the caller's transaction
    pub async fn create(
        conn: &mut PgConnection,
        course_id: Uuid,
        user_id: Uuid,
        payment_info: Option<Value>,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO orders (course_id, user_id, payment_info)
            VALUES ($1, $2, $3)
            RETURNING {ORDER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Order>(&query)
            .bind(course_id)
            .bind(user_id)
            .bind(payment_info.map(Json))
            .fetch_one(conn)
            .await
    }

    /// Lists every order, newest first
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC");

        sqlx::query_as::<_, Order>(&query).fetch_all(pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_order_serialization() {
        let order = Order {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            payment_info: Some(Json(json!({"id": "pi_123"}))),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["payment_info"]["id"], "pi_123");
        assert!(value["courseId"].is_string());
        assert!(value["userId"].is_string());
    }
}
