use actix_web::http::header;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use std::convert::Infallible;

use super::{ApiError, AppState};
use crate::auth::AuthUser;

/// Server-sent events for the viewer's room: a `session` event first, then
/// `privateMessage`, `notification`, and `notificationRemoved` as they happen.
/// Nothing sent while the stream is closed is replayed.
pub async fn stream(state: web::Data<AppState>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    let connection = state.hub.join_room(&auth.user_id);
    log::info!("Realtime session {} opened for {}", connection.session_id, auth.user_id);

    let frames = connection.into_stream().filter_map(|event| async move {
        match event.to_sse_frame() {
            Ok(frame) => Some(Ok::<_, Infallible>(web::Bytes::from(frame))),
            Err(e) => {
                log::warn!("Dropping {} event: {}", event.name(), e);
                None
            }
        }
    });

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(frames))
}
