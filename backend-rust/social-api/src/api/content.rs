//! Behavior shared by the post and reply endpoints. Each takes the content
//! reference and the error category of the calling endpoint.

use serde_json::json;

use super::{check_self_engagement, paged, validated, ApiError, AppState, OrNotFound};
use crate::events::repost_notification;
use crate::models::*;
use crate::social::{annotate, bump_view_counts, delete_content_cascade, recount, Annotatable, Counter};

/// Populates, annotates, and counts a view of each returned item.
pub(super) fn feed_page(
    state: &AppState,
    viewer_id: &str,
    key: &str,
    threads: Vec<UserThread>,
    count: i64,
    page: &Pagination,
) -> Result<serde_json::Value, ApiError> {
    let mut views = state.store.thread_views(threads)?;
    annotate(&state.store, viewer_id, &mut views)?;
    bump_views_of(state, &views);
    paged(key, views, count, page)
}

pub(super) fn bump_views_of<T: Annotatable>(state: &AppState, entries: &[T]) {
    let refs: Vec<ContentRef> = entries
        .iter()
        .flat_map(|e| e.payloads())
        .map(|view| view.item.content_ref())
        .collect();
    bump_view_counts(&state.store, &refs);
}

/// One item as seen by the viewer.
pub(super) fn annotated_view(
    state: &AppState,
    viewer_id: &str,
    target: &ContentRef,
    category: &str,
) -> Result<ContentView, ApiError> {
    let view = state
        .store
        .content_view(target)?
        .ok_or_else(|| ApiError::not_found(category, format!("{} not found", target.kind)))?;
    let mut views = [view];
    annotate(&state.store, viewer_id, &mut views)?;
    let [view] = views;
    Ok(view)
}

/// Loads the item and checks that the viewer wrote it.
fn owned_item(state: &AppState, viewer_id: &str, target: &ContentRef, category: &str) -> Result<ContentItem, ApiError> {
    let item = state
        .store
        .get_content(target)
        .or_not_found(category, &format!("{} not found", target.kind))?;
    if item.author_id() != viewer_id {
        return Err(ApiError::forbidden(
            category,
            format!("You can only modify your own {}", target.kind.as_str().to_lowercase()),
        ));
    }
    Ok(item)
}

pub(super) fn update_owned(
    state: &AppState,
    viewer_id: &str,
    target: &ContentRef,
    update: &UpdateContentRequest,
    category: &str,
) -> Result<ContentView, ApiError> {
    validated(update.validate(), category)?;
    owned_item(state, viewer_id, target, category)?;
    state.store.update_content(target, update).or_not_found(category, "Content not found")?;
    annotated_view(state, viewer_id, target, category)
}

/// Cascade delete of the viewer's own item. Recipients of the removed
/// notifications are told in real time and listed in the response.
pub(super) fn delete_owned(
    state: &AppState,
    viewer_id: &str,
    target: &ContentRef,
    category: &str,
) -> Result<serde_json::Value, ApiError> {
    owned_item(state, viewer_id, target, category)?;
    let outcome = delete_content_cascade(&state.store, target)?;
    state.events.announce_removed(&outcome.removed_notifications);

    Ok(json!({
        "id": target.id,
        "deletedReplies": outcome.deleted_replies,
        "notificationRecipients": outcome.notification_recipients(),
    }))
}

/// Adds a repost entry to the viewer's timeline and notifies the author.
pub(super) fn repost(
    state: &AppState,
    viewer_id: &str,
    target: ContentRef,
    category: &str,
) -> Result<ContentView, ApiError> {
    let item = state
        .store
        .get_content(&target)
        .or_not_found(category, &format!("{} not found", target.kind))?;
    check_self_engagement(state, viewer_id, item.author_id(), category)?;

    if state.store.find_repost(viewer_id, &target.id)?.is_some() {
        return Err(ApiError::conflict(category, "Already reposted"));
    }
    let mut thread = UserThread {
        id: String::new(),
        user_id: viewer_id.to_string(),
        activity: ThreadActivity::Repost { repost: target.clone() },
        created_at: chrono::Utc::now(),
    };
    state.store.create_thread(&mut thread).map_err(|e| match e {
        e if e.is_unique_violation() => ApiError::conflict(category, "Already reposted"),
        e => ApiError::from(e),
    })?;

    recount(&state.store, &Counter::Reposts(target.clone()))?;
    recount(&state.store, &Counter::Posts(viewer_id.to_string()))?;
    if item.author_id() != viewer_id {
        state
            .events
            .notify(repost_notification(viewer_id, item.author_id(), target.clone()))?;
    }
    log::info!("User {} reposted {} {}", viewer_id, target.kind, target.id);

    annotated_view(state, viewer_id, &target, category)
}

/// Removes the viewer's repost of `repost_id` and the notification it caused.
pub(super) fn undo_repost(
    state: &AppState,
    viewer_id: &str,
    kind: ContentKind,
    repost_id: &str,
    category: &str,
) -> Result<serde_json::Value, ApiError> {
    let thread = state
        .store
        .find_repost(viewer_id, repost_id)?
        .filter(|t| t.activity.content_ref().kind == kind)
        .ok_or_else(|| ApiError::not_found(category, "Repost not found"))?;
    let target = thread.activity.content_ref();

    state.store.delete_thread(&thread.id).or_not_found(category, "Repost not found")?;
    let notifs = state.store.find_repost_notifications(viewer_id, &target)?;
    state.events.retract(&notifs)?;

    let repost_count = recount(&state.store, &Counter::Reposts(target.clone()))?;
    recount(&state.store, &Counter::Posts(viewer_id.to_string()))?;
    log::info!("User {} undid repost of {} {}", viewer_id, target.kind, target.id);

    Ok(json!({
        "id": target.id,
        "repostCount": repost_count,
        "isReposted": false,
    }))
}
