/// API route handlers, one module per resource
///
/// - `health`: liveness and database checks
/// - `user`: registration, sessions, profiles, admin user management
/// - `course`: catalog, lesson content, Q&A, reviews, video playback
/// - `order`: purchases and payment intents
/// - `notification`: admin event log and its live stream
/// - `analytics`: 12-window creation counts
/// - `layout`: homepage banner, FAQ and categories

pub mod analytics;
pub mod course;
pub mod health;
pub mod layout;
pub mod notification;
pub mod order;
pub mod user;

use byway_shared::integrations::{MediaError, MediaSource, MediaStore, UploadOptions};
use byway_shared::models::MediaRef;

/// Trimmed value of an optional body field, `None` when blank
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Full public id of an asset stored under `folder`
pub(crate) fn asset_id(folder: &str, media: &MediaRef) -> String {
    format!("{}/{}", folder, media.public_id)
}

/// Uploads `source`, then deletes the asset it replaces
///
/// `stale` is the full public id of the previous asset. Nothing is deleted
/// when the upload fails; a failed delete is only logged.
pub(crate) async fn replace_media(
    media: &dyn MediaStore,
    source: MediaSource,
    options: UploadOptions,
    stale: Option<String>,
) -> Result<MediaRef, MediaError> {
    let kind = options.kind;
    let uploaded = media.upload(source, options).await?;

    if let Some(stale) = stale {
        if let Err(e) = media.delete_by_prefix(&stale, kind).await {
            tracing::warn!(error = %e, public_id = %stale, "Failed to delete replaced media");
        }
    }

    Ok(uploaded)
}
