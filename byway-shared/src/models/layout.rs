/// Homepage layout model
///
/// At most one layout exists per [`LayoutType`]. Only the payload column
/// matching the type is meaningful; the others keep their defaults.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{MediaRef, TitleItem};

const LAYOUT_COLUMNS: &str = "id, layout_type, banner, faq, categories, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "layout_type")]
pub enum LayoutType {
    Banner,

    #[sqlx(rename = "FAQ")]
    #[serde(rename = "FAQ")]
    Faq,

    Categories,
}

impl LayoutType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutType::Banner => "Banner",
            LayoutType::Faq => "FAQ",
            LayoutType::Categories => "Categories",
        }
    }
}

impl fmt::Display for LayoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Banner" => Ok(LayoutType::Banner),
            "FAQ" => Ok(LayoutType::Faq),
            "Categories" => Ok(LayoutType::Categories),
            other => Err(format!("Unknown layout type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub image: MediaRef,
    pub title: String,
    pub sub_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqItem {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub id: Uuid,

    #[serde(rename = "type")]
    pub layout_type: LayoutType,

    pub banner: Option<Json<Banner>>,
    pub faq: Json<Vec<FaqItem>>,
    pub categories: Json<Vec<TitleItem>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload of a layout, one variant per type
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutData {
    Banner(Banner),
    Faq(Vec<FaqItem>),
    Categories(Vec<TitleItem>),
}

impl LayoutData {
    pub fn layout_type(&self) -> LayoutType {
        match self {
            LayoutData::Banner(_) => LayoutType::Banner,
            LayoutData::Faq(_) => LayoutType::Faq,
            LayoutData::Categories(_) => LayoutType::Categories,
        }
    }

    fn columns(self) -> (Option<Banner>, Vec<FaqItem>, Vec<TitleItem>) {
        match self {
            LayoutData::Banner(banner) => (Some(banner), Vec::new(), Vec::new()),
            LayoutData::Faq(faq) => (None, faq, Vec::new()),
            LayoutData::Categories(categories) => (None, Vec::new(), categories),
        }
    }
}

impl Layout {
    pub async fn find_by_type(
        pool: &PgPool,
        layout_type: LayoutType,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {LAYOUT_COLUMNS} FROM layouts WHERE layout_type = $1");

        sqlx::query_as::<_, Layout>(&query)
            .bind(layout_type)
            .fetch_optional(pool)
            .await
    }

    /// Inserts a layout
    ///
    /// # Errors
    ///
    /// Returns a database error carrying `layouts_layout_type_key` when a
    /// layout of this type already exists.
    pub async fn create(pool: &PgPool, data: LayoutData) -> Result<Self, sqlx::Error> {
        let layout_type = data.layout_type();
        let (banner, faq, categories) = data.columns();

        let query = format!(
            r#"
            INSERT INTO layouts (layout_type, banner, faq, categories)
            VALUES ($1, $2, $3, $4)
            RETURNING {LAYOUT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Layout>(&query)
            .bind(layout_type)
            .bind(banner.map(Json))
            .bind(Json(faq))
            .bind(Json(categories))
            .fetch_one(pool)
            .await
    }

    /// Replaces the payload of an existing layout
    ///
    /// Returns `None` when no layout of this type exists.
    pub async fn replace(pool: &PgPool, data: LayoutData) -> Result<Option<Self>, sqlx::Error> {
        let layout_type = data.layout_type();
        let (banner, faq, categories) = data.columns();

        let query = format!(
            r#"
            UPDATE layouts
            SET banner = $2, faq = $3, categories = $4, updated_at = NOW()
            WHERE layout_type = $1
            RETURNING {LAYOUT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Layout>(&query)
            .bind(layout_type)
            .bind(banner.map(Json))
            .bind(Json(faq))
            .bind(Json(categories))
            .fetch_optional(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_type_round_trips_through_strings() {
        for ty in [LayoutType::Banner, LayoutType::Faq, LayoutType::Categories] {
            assert_eq!(ty.as_str().parse::<LayoutType>(), Ok(ty));
        }
        assert!("faq".parse::<LayoutType>().is_err());
        assert_eq!(serde_json::to_value(LayoutType::Faq).unwrap(), "FAQ");
    }

    #[test]
    fn test_layout_data_columns() {
        let data = LayoutData::Faq(vec![FaqItem {
            question: "Refunds?".into(),
            answer: "Within 14 days".into(),
        }]);
        assert_eq!(data.layout_type(), LayoutType::Faq);

        let (banner, faq, categories) = data.columns();
        assert!(banner.is_none());
        assert_eq!(faq.len(), 1);
        assert!(categories.is_empty());
    }
}
