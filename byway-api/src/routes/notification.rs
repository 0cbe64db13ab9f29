/// Admin notification endpoints
///
/// Notifications record questions, answers, reviews and orders. Admins list
/// them, mark them read and follow new ones live over Server-Sent Events.
///
/// # SSE
///
/// `GET /notifications/stream` emits one `newNotification` event per
/// notification created after the client connected; a keep-alive comment is
/// sent every 25 seconds.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::parse_id,
    response::ApiResponse,
};
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use byway_shared::models::notification::Notification;
use futures::stream::{Stream, StreamExt};
use std::{convert::Infallible, time::Duration};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

pub const EVENT_NAME: &str = "newNotification";
const KEEP_ALIVE_SECS: u64 = 25;

pub async fn get_all_notifications(
    State(state): State<AppState>,
) -> ApiResult<ApiResponse<Vec<Notification>>> {
    let notifications = Notification::list_all(&state.db).await?;
    Ok(ApiResponse::ok(notifications, "Notifications list fetched"))
}

pub async fn update_notification_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Notification>> {
    let id = parse_id(&id)?;
    let notification = Notification::mark_read(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Notification not found".to_string()))?;

    Ok(ApiResponse::ok(notification, "Notification updated"))
}

/// SSE event for one notification; `None` for a lagged receiver
fn to_event(item: Result<Notification, BroadcastStreamRecvError>) -> Option<Event> {
    match item {
        Ok(notification) => match Event::default().event(EVENT_NAME).json_data(&notification) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode notification event");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "Notification stream lagged");
            None
        }
    }
}

pub async fn stream_notifications(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.hub.subscribe();
    tracing::debug!(subscribers = state.hub.subscriber_count(), "Notification stream opened");

    let stream = BroadcastStream::new(receiver)
        .filter_map(|item| async move { to_event(item).map(Ok) });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECS)))
}
