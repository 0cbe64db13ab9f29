/// Homepage layout endpoints
///
/// One layout per type:
/// - `Banner`: hero image (sent as a base64 data URL), title and subtitle
/// - `FAQ`: question/answer pairs
/// - `Categories`: course category titles

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    response::ApiResponse,
    routes::{asset_id, replace_media},
};
use axum::extract::{Path, State};
use byway_shared::{
    integrations::{MediaSource, UploadOptions},
    models::{
        layout::{Banner, FaqItem, Layout, LayoutData, LayoutType},
        MediaRef, TitleItem,
    },
};
use serde::Deserialize;

pub const LAYOUT_FOLDER: &str = "byWay/layout";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRequest {
    #[serde(rename = "type", default)]
    pub layout_type: Option<String>,

    /// Banner image as a `data:image/...;base64,` URL
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sub_title: Option<String>,

    #[serde(default)]
    pub faq: Option<Vec<FaqItem>>,
    #[serde(default)]
    pub categories: Option<Vec<TitleItem>>,
}

fn parse_type(raw: Option<&str>) -> ApiResult<LayoutType> {
    let raw = raw
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Please provide a layout type".to_string()))?;

    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid layout type: {}", raw)))
}

fn is_data_url(image: &str) -> bool {
    image.starts_with("data:")
}

/// Uploads a banner image, then drops the one it replaces
async fn upload_banner_image(
    state: &AppState,
    data_url: String,
    replaced: Option<&MediaRef>,
) -> ApiResult<MediaRef> {
    Ok(replace_media(
        state.services.media.as_ref(),
        MediaSource::DataUrl(data_url),
        UploadOptions::image(LAYOUT_FOLDER),
        replaced.map(|old| asset_id(LAYOUT_FOLDER, old)),
    )
    .await?)
}

/// Payload for FAQ and Categories; Banner is handled by the callers
fn list_payload(layout_type: LayoutType, req: LayoutRequest) -> LayoutData {
    match layout_type {
        LayoutType::Faq => LayoutData::Faq(req.faq.unwrap_or_default()),
        _ => LayoutData::Categories(req.categories.unwrap_or_default()),
    }
}

pub async fn create_layout(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LayoutRequest>,
) -> ApiResult<ApiResponse<Layout>> {
    let layout_type = parse_type(req.layout_type.as_deref())?;

    if Layout::find_by_type(&state.db, layout_type).await?.is_some() {
        return Err(ApiError::BadRequest(format!("{} already exist", layout_type)));
    }

    let data = match layout_type {
        LayoutType::Banner => {
            let image = req
                .image
                .filter(|i| is_data_url(i))
                .ok_or_else(|| ApiError::BadRequest("Please provide a banner image".to_string()))?;

            LayoutData::Banner(Banner {
                image: upload_banner_image(&state, image, None).await?,
                title: req.title.unwrap_or_default(),
                sub_title: req.sub_title.unwrap_or_default(),
            })
        }
        other => list_payload(other, req),
    };

    let layout = Layout::create(&state.db, data).await?;
    tracing::info!(layout_type = %layout_type, "Layout created");

    Ok(ApiResponse::created(layout, "Layout created successfully"))
}

/// Replaces a layout; a banner keeps its image unless a new data URL is sent
pub async fn edit_layout(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LayoutRequest>,
) -> ApiResult<ApiResponse<Layout>> {
    let layout_type = parse_type(req.layout_type.as_deref())?;
    let not_found = || ApiError::NotFound(format!("{} layout not found", layout_type));

    let existing = Layout::find_by_type(&state.db, layout_type)
        .await?
        .ok_or_else(not_found)?;

    let data = match layout_type {
        LayoutType::Banner => {
            let current = existing.banner.map(|b| b.0);

            let image = match (req.image.filter(|i| is_data_url(i)), current.as_ref()) {
                (Some(data_url), old) => {
                    upload_banner_image(&state, data_url, old.map(|b| &b.image)).await?
                }
                (None, Some(old)) => old.image.clone(),
                (None, None) => {
                    return Err(ApiError::BadRequest(
                        "Please provide a banner image".to_string(),
                    ))
                }
            };

            LayoutData::Banner(Banner {
                image,
                title: req.title.unwrap_or_default(),
                sub_title: req.sub_title.unwrap_or_default(),
            })
        }
        other => list_payload(other, req),
    };

    let layout = Layout::replace(&state.db, data)
        .await?
        .ok_or_else(not_found)?;

    Ok(ApiResponse::ok(layout, "Layout updated successfully"))
}

pub async fn get_layout(
    State(state): State<AppState>,
    Path(layout_type): Path<String>,
) -> ApiResult<ApiResponse<Layout>> {
    let layout_type = parse_type(Some(layout_type.as_str()))?;

    let layout = Layout::find_by_type(&state.db, layout_type)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{} layout not found", layout_type)))?;

    Ok(ApiResponse::ok(layout, "Layout fetched"))
}
