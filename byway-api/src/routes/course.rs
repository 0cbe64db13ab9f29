/// Course endpoints
///
/// Catalog management is admin-only and multipart: text fields plus JSON
/// encoded `benefits`, `prerequisites` and `courseData`, with `thumbnail`
/// and `demoVideo` files. Visitors see public views; enrolled learners get
/// the full lesson list and can ask questions and leave one review.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{parse_id, ApiJson, FormData, UploadedFile},
    middleware::auth::CurrentUser,
    response::ApiResponse,
    routes::{asset_id, present, replace_media},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension,
};
use byway_shared::{
    auth::authorization::require_enrollment,
    integrations::{MailTemplate, MediaError, MediaStore, ResourceKind, UploadOptions, VideoOtp},
    models::{
        course::{Course, CourseContent, CourseInput, PublicCourse},
        user::User,
        MediaRef, TitleItem,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Largest accepted intro video
pub const MAX_VIDEO_BYTES: usize = 10 * 1024 * 1024;

const COURSE_NOT_FOUND: &str = "Course not found";
const THUMBNAIL_TRANSFORMATION: &str = "g_face";
const DEMO_VIDEO_EAGER: &str = "w_640,h_360,c_scale";

const NOT_ELIGIBLE: &str = "You are not eligible to access this course";

fn course_not_found() -> ApiError {
    ApiError::NotFound(COURSE_NOT_FOUND.to_string())
}

fn not_allowed() -> ApiError {
    ApiError::Forbidden("You are not allowed access to this course".to_string())
}

fn already_reviewed() -> ApiError {
    ApiError::Conflict("You have already reviewed this course".to_string())
}

/// Media folders of a course
fn thumbnail_folder(name: &str) -> String {
    format!("byWay/courses/{}/thumbnail", name)
}

fn demo_video_folder(name: &str) -> String {
    format!("byWay/courses/{}/demoVideo", name)
}

/// Picks the single image of a `thumbnail` upload
fn single_image(files: Vec<UploadedFile>) -> ApiResult<Option<UploadedFile>> {
    let mut files = files;
    if files.len() > 1 {
        return Err(ApiError::Unprocessable("Multiple images not allowed".to_string()));
    }

    match files.pop() {
        Some(file) if !file.is_image() => Err(ApiError::Unprocessable(
            "Invalid image format. File must be an image(.jpg, .png, .jpeg)".to_string(),
        )),
        other => Ok(other),
    }
}

/// Picks the single video of a `demoVideo` upload
fn single_video(files: Vec<UploadedFile>) -> ApiResult<Option<UploadedFile>> {
    let mut files = files;
    if files.len() > 1 {
        return Err(ApiError::Unprocessable("Multiple videos not allowed".to_string()));
    }

    match files.pop() {
        Some(file) if !file.is_video() => Err(ApiError::Unprocessable(
            "Invalid video format. File must be a video (e.g., .mp4, .mov)".to_string(),
        )),
        Some(file) if file.size() > MAX_VIDEO_BYTES => Err(ApiError::PayloadTooLarge(
            "Video exceeds 10MB limit".to_string(),
        )),
        other => Ok(other),
    }
}

fn parse_price(form: &FormData, field: &str) -> ApiResult<Option<f64>> {
    form.text(field)
        .map(|raw| {
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|p| p.is_finite() && *p >= 0.0)
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid {} value", field)))
        })
        .transpose()
}

/// Reads the editable fields of a course form; media is filled in later
fn course_input(form: &FormData) -> ApiResult<CourseInput> {
    let required = |field: &str| {
        form.text(field)
            .map(|v| v.trim().to_string())
            .ok_or_else(|| ApiError::BadRequest(format!("Please provide the course {}", field)))
    };

    Ok(CourseInput {
        name: required("name")?,
        description: required("description")?,
        price: parse_price(form, "price")?
            .ok_or_else(|| ApiError::BadRequest("Please provide the course price".to_string()))?,
        estimated_price: parse_price(form, "estimatedPrice")?,
        thumbnail: None,
        demo_video: None,
        demo_url: form.text("demoUrl").map(str::to_string),
        tags: form.text("tags").unwrap_or_default().to_string(),
        level: required("level")?,
        category: form.text("category").unwrap_or_default().to_string(),
        benefits: form.json::<Vec<TitleItem>>("benefits")?.unwrap_or_default(),
        prerequisites: form.json::<Vec<TitleItem>>("prerequisites")?.unwrap_or_default(),
        course_data: form.json::<Vec<CourseContent>>("courseData")?.unwrap_or_default(),
    })
}

/// Uploads a thumbnail, then drops the asset with full id `replaced`
async fn upload_thumbnail(
    state: &AppState,
    name: &str,
    file: UploadedFile,
    replaced: Option<String>,
) -> ApiResult<MediaRef> {
    Ok(replace_media(
        state.services.media.as_ref(),
        file.into_media_source(),
        UploadOptions::image(thumbnail_folder(name)).with_transformation(THUMBNAIL_TRANSFORMATION),
        replaced,
    )
    .await?)
}

async fn upload_demo_video(
    state: &AppState,
    name: &str,
    file: UploadedFile,
    replaced: Option<String>,
) -> ApiResult<MediaRef> {
    Ok(replace_media(
        state.services.media.as_ref(),
        file.into_media_source(),
        UploadOptions::video(demo_video_folder(name)).with_eager(DEMO_VIDEO_EAGER),
        replaced,
    )
    .await?)
}

/// Moves a kept asset into the folder of the course's current name
async fn relocate_media(
    media: &dyn MediaStore,
    kept: MediaRef,
    from_folder: &str,
    to_folder: &str,
    kind: ResourceKind,
) -> Result<MediaRef, MediaError> {
    if from_folder == to_folder {
        return Ok(kept);
    }

    media
        .rename(&asset_id(from_folder, &kept), &asset_id(to_folder, &kept), kind)
        .await
}

/// Creates a course
///
/// # Errors
///
/// - `400`: no intro video or banner, missing field, malformed JSON field
/// - `413`: intro video over 10 MB
/// - `422`: name taken, several files, wrong file type
pub async fn create_course(
    State(state): State<AppState>,
    mut form: FormData,
) -> ApiResult<ApiResponse<Course>> {
    let videos = form.take_files("demoVideo");
    if videos.is_empty() {
        return Err(ApiError::BadRequest("Upload Course Intro Video".to_string()));
    }

    let mut input = course_input(&form)?;
    if Course::name_taken(&state.db, &input.name).await? {
        return Err(ApiError::Unprocessable("Course already exists".to_string()));
    }

    let images = form.take_files("thumbnail");
    if images.is_empty() {
        return Err(ApiError::BadRequest("Upload Course Banner".to_string()));
    }

    let image = single_image(images)?.ok_or_else(|| ApiError::internal("thumbnail vanished"))?;
    let video = single_video(videos)?.ok_or_else(|| ApiError::internal("demo video vanished"))?;

    input.thumbnail = Some(upload_thumbnail(&state, &input.name, image, None).await?);
    input.demo_video = Some(upload_demo_video(&state, &input.name, video, None).await?);

    let course = Course::create(&state.db, input).await?;
    tracing::info!(course_id = %course.id, name = %course.name, "Course created");

    Ok(ApiResponse::created(course, "Course created"))
}

/// Replaces a course's editable fields
///
/// Existing media is kept when the form carries it back as JSON in the
/// `thumbnail` / `demoVideo` text fields; otherwise a new file is required
/// and the previous asset is dropped once it is stored. Kept media moves to
/// the new name's folders on a rename. Lesson Q&A threads survive the edit.
pub async fn edit_course(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    mut form: FormData,
) -> ApiResult<ApiResponse<Course>> {
    let course_id = parse_id(&course_id)?;
    let existing = Course::find_by_id(&state.db, course_id)
        .await?
        .ok_or_else(course_not_found)?;

    let mut input = course_input(&form)?;
    if input.name != existing.name && Course::name_taken(&state.db, &input.name).await? {
        return Err(ApiError::Unprocessable("Course already exists".to_string()));
    }

    let media = state.services.media.as_ref();
    let (old_images, new_images) = (thumbnail_folder(&existing.name), thumbnail_folder(&input.name));
    let (old_videos, new_videos) = (demo_video_folder(&existing.name), demo_video_folder(&input.name));

    input.thumbnail = match form.json::<MediaRef>("thumbnail")? {
        Some(kept) => {
            Some(relocate_media(media, kept, &old_images, &new_images, ResourceKind::Image).await?)
        }
        None => {
            let image = single_image(form.take_files("thumbnail"))?
                .ok_or_else(|| ApiError::BadRequest("Upload Course Banner".to_string()))?;
            let replaced = existing.thumbnail.as_ref().map(|old| asset_id(&old_images, &old.0));
            Some(upload_thumbnail(&state, &input.name, image, replaced).await?)
        }
    };

    input.demo_video = match form.json::<MediaRef>("demoVideo")? {
        Some(kept) => {
            Some(relocate_media(media, kept, &old_videos, &new_videos, ResourceKind::Video).await?)
        }
        None => {
            let video = single_video(form.take_files("demoVideo"))?
                .ok_or_else(|| ApiError::BadRequest("Upload Course Intro Video".to_string()))?;
            let replaced = existing.demo_video.as_ref().map(|old| asset_id(&old_videos, &old.0));
            Some(upload_demo_video(&state, &input.name, video, replaced).await?)
        }
    };

    input.carry_threads_from(&existing.course_data);

    let course = Course::update(&state.db, course_id, input)
        .await?
        .ok_or_else(course_not_found)?;
    tracing::info!(course_id = %course.id, "Course updated");

    Ok(ApiResponse::created(course, "Course updated"))
}

async fn public_course(state: &AppState, course_id: &str) -> ApiResult<PublicCourse> {
    let course_id = parse_id(course_id)?;
    let course = Course::find_by_id(&state.db, course_id)
        .await?
        .ok_or_else(course_not_found)?;
    Ok(course.public_view())
}

pub async fn get_course(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> ApiResult<ApiResponse<PublicCourse>> {
    Ok(ApiResponse::ok(
        public_course(&state, &course_id).await?,
        "Course fetched",
    ))
}

pub async fn get_course_free(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> ApiResult<ApiResponse<PublicCourse>> {
    Ok(ApiResponse::ok(
        public_course(&state, &course_id).await?,
        "Course fetched",
    ))
}

pub async fn get_courses(
    State(state): State<AppState>,
) -> ApiResult<ApiResponse<Vec<PublicCourse>>> {
    let courses = Course::list_all(&state.db).await?;
    Ok(ApiResponse::ok(
        courses.iter().map(Course::public_view).collect(),
        "Courses fetched",
    ))
}

pub async fn get_all_courses(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<Course>>> {
    let courses = Course::list_all(&state.db).await?;
    Ok(ApiResponse::ok(courses, "All courses fetched"))
}

/// Full lesson list for enrolled learners
pub async fn get_course_content(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(course_id): Path<String>,
) -> ApiResult<ApiResponse<Vec<CourseContent>>> {
    let course_id = parse_id(&course_id)?;

    require_enrollment(&user, course_id)
        .map_err(|_| ApiError::Forbidden(NOT_ELIGIBLE.to_string()))?;

    let course = Course::find_by_id(&state.db, course_id)
        .await?
        .ok_or_else(course_not_found)?;

    Ok(ApiResponse::ok(course.course_data.0, "Course content fetched"))
}

/// Deletes a course and its media folders
pub async fn delete_course(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    let course_id = parse_id(&course_id)?;
    let course = Course::find_by_id(&state.db, course_id)
        .await?
        .ok_or_else(course_not_found)?;

    let media = &state.services.media;
    for (folder, kind) in [
        (thumbnail_folder(&course.name), ResourceKind::Image),
        (demo_video_folder(&course.name), ResourceKind::Video),
    ] {
        if let Err(e) = media.delete_by_prefix(&folder, kind).await {
            tracing::warn!(error = %e, folder = %folder, "Failed to delete course media");
        }
    }

    if !Course::delete(&state.db, course_id).await? {
        return Err(course_not_found());
    }
    tracing::info!(course_id = %course_id, "Course deleted");

    Ok(ApiResponse::message("Course deleted"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(default)]
    pub content_id: Option<String>,
}

fn content_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest("Invalid content id".to_string()))
}

/// Asks a question on a lesson
pub async fn add_question(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<QuestionRequest>,
) -> ApiResult<ApiResponse<()>> {
    let (Some(question), Some(course_id), Some(raw_content_id)) = (
        present(req.question),
        present(req.course_id),
        present(req.content_id),
    ) else {
        return Err(ApiError::Unprocessable("Invalid entry".to_string()));
    };
    let course_id = parse_id(&course_id)?;
    let content_id = content_id(&raw_content_id)?;

    let mut tx = state.db.begin().await?;
    let mut course = Course::lock_for_update(&mut tx, course_id)
        .await?
        .ok_or_else(course_not_found)?;

    let lesson = course.add_question(content_id, user.author(), question)?;
    course.save_threads(&mut tx).await?;
    tx.commit().await?;

    state
        .notify(
            user.id,
            "New Question Received",
            format!(
                "You have a new question from {} course in the {} section",
                course.name, lesson
            ),
        )
        .await?;

    Ok(ApiResponse::message("Question submitted"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(default)]
    pub content_id: Option<String>,
    #[serde(default)]
    pub question_id: Option<String>,
}

/// Replies to a lesson question
///
/// The question's author is emailed unless they answered themselves.
pub async fn add_answer(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<AnswerRequest>,
) -> ApiResult<ApiResponse<()>> {
    let (Some(answer), Some(course_id), Some(raw_content_id), Some(question_id)) = (
        present(req.answer),
        present(req.course_id),
        present(req.content_id),
        present(req.question_id),
    ) else {
        return Err(ApiError::Unprocessable("Invalid entry".to_string()));
    };
    let course_id = parse_id(&course_id)?;
    let content_id = content_id(&raw_content_id)?;
    let question_id = Uuid::parse_str(question_id.trim())
        .map_err(|_| ApiError::BadRequest("Invalid question id".to_string()))?;

    let mut tx = state.db.begin().await?;
    let mut course = Course::lock_for_update(&mut tx, course_id)
        .await?
        .ok_or_else(course_not_found)?;

    let (lesson, question) = course.add_answer(content_id, question_id, user.author(), answer)?;
    course.save_threads(&mut tx).await?;
    tx.commit().await?;

    state
        .notify(
            user.id,
            "New Reply Received",
            format!(
                "You have a new question reply from {} course in the {} section",
                course.name, lesson
            ),
        )
        .await?;

    if question.user.id != user.id {
        match User::find_by_id(&state.db, question.user.id).await? {
            Some(author) => {
                state
                    .send_mail_best_effort(
                        &author.email,
                        MailTemplate::QuestionReply {
                            name: author.name.clone(),
                            lesson_title: lesson,
                            question: question.question,
                        },
                    )
                    .await
            }
            None => tracing::debug!(question_id = %question_id, "Question author no longer exists"),
        }
    }

    Ok(ApiResponse::message("Reply submitted"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    /// Review text
    #[serde(default)]
    #[validate(length(min = 1, message = "Please write a review"))]
    pub review: String,

    #[serde(default)]
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i64,
}

/// Leaves the caller's single review on a course they bought
pub async fn add_review(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(course_id): Path<String>,
    ApiJson(req): ApiJson<ReviewRequest>,
) -> ApiResult<ApiResponse<PublicCourse>> {
    let course_id = parse_id(&course_id)?;

    require_enrollment(&user, course_id).map_err(|_| not_allowed())?;
    if user.enrollment(course_id).is_some_and(|e| e.reviewed) {
        return Err(already_reviewed());
    }

    req.validate()?;
    let rating = u8::try_from(req.rating).map_err(ApiError::internal)?;

    let mut tx = state.db.begin().await?;
    let mut course = Course::lock_for_update(&mut tx, course_id)
        .await?
        .ok_or_else(course_not_found)?;

    let mut learner = User::lock_for_update(&mut tx, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Please login to access this".to_string()))?;
    match learner.enrollment_mut(course_id) {
        Some(enrollment) if !enrollment.reviewed => enrollment.reviewed = true,
        Some(_) => return Err(already_reviewed()),
        None => return Err(not_allowed()),
    }

    course.add_review(user.author(), rating, req.review.trim().to_string());
    course.save_threads(&mut tx).await?;
    User::save_courses(&mut tx, learner.id, &learner.courses).await?;
    tx.commit().await?;

    tracing::info!(course_id = %course.id, rating, ratings = course.ratings, "Review added");

    state
        .notify(
            user.id,
            "New Review Received",
            format!("You have a new review from {} course.", course.name),
        )
        .await?;

    Ok(ApiResponse::ok(course.public_view(), "Thanks for your feedback"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReplyRequest {
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub review_id: Option<String>,
}

pub async fn add_reply_to_review(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(course_id): Path<String>,
    ApiJson(req): ApiJson<ReviewReplyRequest>,
) -> ApiResult<ApiResponse<PublicCourse>> {
    let course_id = parse_id(&course_id)?;
    let (Some(reply), Some(review_id)) = (present(req.reply), present(req.review_id)) else {
        return Err(ApiError::Unprocessable("Invalid entry".to_string()));
    };
    let review_id = parse_id(&review_id)?;

    let mut tx = state.db.begin().await?;
    let mut course = Course::lock_for_update(&mut tx, course_id)
        .await?
        .ok_or_else(course_not_found)?;

    course.reply_to_review(review_id, user.author(), reply)?;
    course.save_threads(&mut tx).await?;
    tx.commit().await?;

    Ok(ApiResponse::ok(course.public_view(), "Reply submitted"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoUrlRequest {
    #[serde(default)]
    pub video_id: Option<String>,
}

/// One-time playback credentials for a hosted lesson video
pub async fn generate_video_url(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VideoUrlRequest>,
) -> ApiResult<ApiResponse<VideoOtp>> {
    let video_id = present(req.video_id)
        .ok_or_else(|| ApiError::BadRequest("Please provide a videoId".to_string()))?;

    let otp = state.services.video.generate_otp(&video_id).await?;

    Ok(ApiResponse::new(StatusCode::OK, Some(otp), "Video OTP generated"))
}
