/// Course model and database operations
///
/// A course row owns its content units, Q&A threads and reviews as JSONB.
/// Threads are edited in memory with the methods on [`Course`] and written
/// back with [`Course::save_threads`] while the row is locked.
///
/// # Example
///
/// ```no_run
/// use byway_shared::models::course::Course;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, id: Uuid) -> Result<(), sqlx::Error> {
/// if let Some(course) = Course::find_by_id(&pool, id).await? {
///     let public = course.public_view();
///     println!("{} has {} lessons", public.name, public.course_data.len());
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgConnection, PgPool};
use thiserror::Error;
use uuid::Uuid;

use super::user::UserRole;
use super::{MediaRef, TitleItem};

const COURSE_COLUMNS: &str = "id, name, description, price, estimated_price, thumbnail, \
     demo_video, demo_url, tags, level, category, benefits, prerequisites, reviews, \
     course_data, ratings, purchase, created_at, updated_at";

/// Errors raised while editing Q&A threads and reviews
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThreadError {
    #[error("Content not found")]
    ContentNotFound,

    #[error("Question not found")]
    QuestionNotFound,

    #[error("Review not found")]
    ReviewNotFound,
}

/// Snapshot of the user who wrote a question, answer, review or reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<MediaRef>,
    pub role: UserRole,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Link {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: Uuid,
    pub user: Author,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub user: Author,
    pub question: String,

    #[serde(default)]
    pub question_replies: Vec<Answer>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReply {
    pub id: Uuid,
    pub user: Author,
    pub reply: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub user: Author,

    /// 1 to 5 inclusive
    pub rating: u8,

    pub comment: String,

    #[serde(default)]
    pub comment_replies: Vec<ReviewReply>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One lesson of a course
///
/// Every field defaults so partially filled units from the course editor
/// deserialize; a unit sent without an id receives a fresh one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourseContent {
    pub id: Uuid,
    pub video_url: String,
    pub title: String,
    pub video_duration: f64,
    pub video_description: String,
    pub video_section: String,
    pub video_player: String,
    pub links: Vec<Link>,
    pub objectives: Vec<TitleItem>,
    pub suggestion: String,
    pub questions: Vec<Question>,
}

impl Default for CourseContent {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            video_url: String::new(),
            title: String::new(),
            video_duration: 0.0,
            video_description: String::new(),
            video_section: String::new(),
            video_player: String::new(),
            links: Vec::new(),
            objectives: Vec::new(),
            suggestion: String::new(),
            questions: Vec::new(),
        }
    }
}

/// Content unit as shown to visitors who haven't bought the course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicContent {
    pub id: Uuid,
    pub title: String,
    pub video_duration: f64,
    pub video_description: String,
    pub video_section: String,
    pub video_player: String,
    pub objectives: Vec<TitleItem>,
}

impl From<&CourseContent> for PublicContent {
    fn from(content: &CourseContent) -> Self {
        Self {
            id: content.id,
            title: content.title.clone(),
            video_duration: content.video_duration,
            video_description: content.video_description.clone(),
            video_section: content.video_section.clone(),
            video_player: content.video_player.clone(),
            objectives: content.objectives.clone(),
        }
    }
}

/// Course model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub estimated_price: Option<f64>,
    pub thumbnail: Option<Json<MediaRef>>,
    pub demo_video: Option<Json<MediaRef>>,
    pub demo_url: Option<String>,
    pub tags: String,
    pub level: String,
    pub category: String,
    pub benefits: Json<Vec<TitleItem>>,
    pub prerequisites: Json<Vec<TitleItem>>,
    pub reviews: Json<Vec<Review>>,
    pub course_data: Json<Vec<CourseContent>>,

    /// Mean review rating, two decimals
    pub ratings: f64,

    /// Number of completed orders
    pub purchase: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Course with private lesson fields stripped
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCourse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub estimated_price: Option<f64>,
    pub thumbnail: Option<MediaRef>,
    pub demo_video: Option<MediaRef>,
    pub demo_url: Option<String>,
    pub tags: String,
    pub level: String,
    pub category: String,
    pub benefits: Vec<TitleItem>,
    pub prerequisites: Vec<TitleItem>,
    pub reviews: Vec<Review>,
    pub course_data: Vec<PublicContent>,
    pub ratings: f64,
    pub purchase: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable course fields, used for both creation and full edits
#[derive(Debug, Clone)]
pub struct CourseInput {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub estimated_price: Option<f64>,
    pub thumbnail: Option<MediaRef>,
    pub demo_video: Option<MediaRef>,
    pub demo_url: Option<String>,
    pub tags: String,
    pub level: String,
    pub category: String,
    pub benefits: Vec<TitleItem>,
    pub prerequisites: Vec<TitleItem>,
    pub course_data: Vec<CourseContent>,
}

impl CourseInput {
    /// Keeps the Q&A of lessons that survive an edit
    ///
    /// The editor sends lessons back without their question threads. A
    /// lesson whose id matches an existing one and arrives with no questions
    /// inherits the stored thread.
    pub fn carry_threads_from(&mut self, existing: &[CourseContent]) {
        for unit in self.course_data.iter_mut().filter(|u| u.questions.is_empty()) {
            if let Some(old) = existing.iter().find(|old| old.id == unit.id) {
                unit.questions = old.questions.clone();
            }
        }
    }
}

/// Arithmetic mean of review ratings rounded to two decimals, 0 when empty
pub fn average_rating(reviews: &[Review]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }

    let total: f64 = reviews.iter().map(|r| f64::from(r.rating)).sum();
    let mean = total / reviews.len() as f64;

    (mean * 100.0).round() / 100.0
}

impl Course {
    pub fn public_view(&self) -> PublicCourse {
        PublicCourse {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            estimated_price: self.estimated_price,
            thumbnail: self.thumbnail.as_ref().map(|m| m.0.clone()),
            demo_video: self.demo_video.as_ref().map(|m| m.0.clone()),
            demo_url: self.demo_url.clone(),
            tags: self.tags.clone(),
            level: self.level.clone(),
            category: self.category.clone(),
            benefits: self.benefits.0.clone(),
            prerequisites: self.prerequisites.0.clone(),
            reviews: self.reviews.0.clone(),
            course_data: self.course_data.iter().map(PublicContent::from).collect(),
            ratings: self.ratings,
            purchase: self.purchase,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Ids of every lesson, in order
    pub fn video_ids(&self) -> Vec<Uuid> {
        self.course_data.iter().map(|c| c.id).collect()
    }

    /// Appends a question to a lesson and returns the lesson title
    pub fn add_question(
        &mut self,
        content_id: Uuid,
        author: Author,
        question: String,
    ) -> Result<String, ThreadError> {
        let content = self
            .course_data
            .iter_mut()
            .find(|c| c.id == content_id)
            .ok_or(ThreadError::ContentNotFound)?;

        let now = Utc::now();
        content.questions.push(Question {
            id: Uuid::new_v4(),
            user: author,
            question,
            question_replies: Vec::new(),
            created_at: now,
            updated_at: now,
        });

        Ok(content.title.clone())
    }

    /// Appends an answer to a question
    ///
    /// Returns the lesson title and a copy of the answered question.
    pub fn add_answer(
        &mut self,
        content_id: Uuid,
        question_id: Uuid,
        author: Author,
        answer: String,
    ) -> Result<(String, Question), ThreadError> {
        let content = self
            .course_data
            .iter_mut()
            .find(|c| c.id == content_id)
            .ok_or(ThreadError::ContentNotFound)?;

        let question = content
            .questions
            .iter_mut()
            .find(|q| q.id == question_id)
            .ok_or(ThreadError::QuestionNotFound)?;

        let now = Utc::now();
        question.question_replies.push(Answer {
            id: Uuid::new_v4(),
            user: author,
            answer,
            created_at: now,
        });
        question.updated_at = now;

        Ok((content.title.clone(), question.clone()))
    }

    /// Appends a review and recomputes `ratings`
    pub fn add_review(&mut self, author: Author, rating: u8, comment: String) {
        let now = Utc::now();
        self.reviews.push(Review {
            id: Uuid::new_v4(),
            user: author,
            rating,
            comment,
            comment_replies: Vec::new(),
            created_at: now,
            updated_at: now,
        });

        self.ratings = average_rating(&self.reviews);
    }

    pub fn reply_to_review(
        &mut self,
        review_id: Uuid,
        author: Author,
        reply: String,
    ) -> Result<(), ThreadError> {
        let review = self
            .reviews
            .iter_mut()
            .find(|r| r.id == review_id)
            .ok_or(ThreadError::ReviewNotFound)?;

        let now = Utc::now();
        review.comment_replies.push(ReviewReply {
            id: Uuid::new_v4(),
            user: author,
            reply,
            created_at: now,
        });
        review.updated_at = now;

        Ok(())
    }
}

impl Course {
    /// Inserts a new course
    ///
    /// # Errors
    ///
    /// Returns a database error carrying `courses_name_key` when the name is
    /// already used.
    pub async fn create(pool: &PgPool, data: CourseInput) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO courses (
                name, description, price, estimated_price, thumbnail, demo_video,
                demo_url, tags, level, category, benefits, prerequisites, course_data
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {COURSE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Course>(&query)
            .bind(data.name)
            .bind(data.description)
            .bind(data.price)
            .bind(data.estimated_price)
            .bind(data.thumbnail.map(Json))
            .bind(data.demo_video.map(Json))
            .bind(data.demo_url)
            .bind(data.tags)
            .bind(data.level)
            .bind(data.category)
            .bind(Json(data.benefits))
            .bind(Json(data.prerequisites))
            .bind(Json(data.course_data))
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1");

        sqlx::query_as::<_, Course>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn name_taken(pool: &PgPool, name: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM courses WHERE name = $1)")
            .bind(name)
            .fetch_one(pool)
            .await
    }

    /// Replaces the editable fields of a course
    ///
    /// Reviews, ratings and the purchase counter are untouched. Returns
    /// `None` when the course doesn't exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: CourseInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE courses SET
                name = $2, description = $3, price = $4, estimated_price = $5,
                thumbnail = $6, demo_video = $7, demo_url = $8, tags = $9,
                level = $10, category = $11, benefits = $12, prerequisites = $13,
                course_data = $14, updated_at = NOW()
            WHERE id = $1
            RETURNING {COURSE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Course>(&query)
            .bind(id)
            .bind(data.name)
            .bind(data.description)
            .bind(data.price)
            .bind(data.estimated_price)
            .bind(data.thumbnail.map(Json))
            .bind(data.demo_video.map(Json))
            .bind(data.demo_url)
            .bind(data.tags)
            .bind(data.level)
            .bind(data.category)
            .bind(Json(data.benefits))
            .bind(Json(data.prerequisites))
            .bind(Json(data.course_data))
            .fetch_optional(pool)
            .await
    }

    /// Deletes a course; its orders cascade
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists every course, newest first
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY created_at DESC");

        sqlx::query_as::<_, Course>(&query).fetch_all(pool).await
    }

    /// Loads several courses by id, in no particular order
    pub async fn find_many(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ANY($1)");

        sqlx::query_as::<_, Course>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// Loads a course and locks the row until the surrounding transaction ends
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1 FOR UPDATE");

        sqlx::query_as::<_, Course>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Writes lessons, reviews and ratings back after an in-memory edit
    pub async fn save_threads(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE courses
            SET course_data = $2, reviews = $3, ratings = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(&self.course_data)
        .bind(&self.reviews)
        .bind(self.ratings)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn increment_purchase(conn: &mut PgConnection, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE courses SET purchase = purchase + 1, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(())
    }
}
