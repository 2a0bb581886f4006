use actix_web::{web, HttpResponse};
use serde_json::json;

use super::{checked_page, ok, paged, ApiError, AppState, OrNotFound};
use crate::auth::AuthUser;
use crate::events::mention_notifications;
use crate::models::*;
use crate::social::annotate;

pub async fn list(
    state: web::Data<AppState>,
    auth: AuthUser,
    query: web::Query<Pagination>,
) -> Result<HttpResponse, ApiError> {
    let page = checked_page(*query, "Get Notifications Error")?;
    let (notifs, count) = state.store.list_notifications(&auth.user_id, &page)?;
    let mut views = state.store.notification_views(notifs)?;
    annotate(&state.store, &auth.user_id, &mut views)?;
    Ok(ok(paged("notifications", views, count, &page)?, "Notifications fetched"))
}

/// Mention notifications for users tagged in a post or reply.
pub async fn mention(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<MentionRequest>,
) -> Result<HttpResponse, ApiError> {
    let location = ContentRef::new(body.mention_location_type, body.mention_location.clone());
    state
        .store
        .get_content(&location)
        .or_not_found("Mention Error", &format!("{} not found", location.kind))?;

    let known = state.store.get_users_by_ids(&body.mentioned_targets)?;
    let targets: Vec<String> = body
        .mentioned_targets
        .iter()
        .filter(|id| known.contains_key(id.as_str()))
        .cloned()
        .collect();
    let created = state
        .events
        .notify_all(mention_notifications(&auth.user_id, &location, &targets))?;
    Ok(ok(created, "Mentions created"))
}

pub async fn mark_read(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<NotificationStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let updated = state
        .store
        .mark_notifications_read(&auth.user_id, &body.notifs)
        .or_not_found("Update Notifications Error", "Notification not found")?;
    Ok(ok(json!({ "updated": updated }), "Notifications marked as read"))
}
