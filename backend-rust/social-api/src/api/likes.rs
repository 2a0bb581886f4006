use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;

use super::{check_self_engagement, checked_page, ok, paged, ApiError, AppState, OrNotFound};
use crate::auth::AuthUser;
use crate::models::*;
use crate::social::{annotate, recount, Counter};

// ==================== Likes ====================

/// Flips the viewer's like on a target: a second identical request unlikes.
/// Retrying a request therefore changes its meaning.
pub async fn toggle_like(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<LikeRequest>,
) -> Result<HttpResponse, ApiError> {
    let target = ContentRef::new(body.target_type, body.target.clone());
    let item = state
        .store
        .get_content(&target)
        .or_not_found("Like Error", &format!("{} not found", target.kind))?;
    check_self_engagement(&state, &auth.user_id, item.author_id(), "Like Error")?;

    let is_liked = match state.store.find_like(&auth.user_id, &target)? {
        Some(like) => {
            state.store.delete_like(&like.id)?;
            false
        }
        None => {
            let mut like = Like {
                id: String::new(),
                author_id: auth.user_id.clone(),
                target: target.clone(),
                created_at: Utc::now(),
            };
            state.store.create_like(&mut like).map_err(|e| match e {
                e if e.is_unique_violation() => ApiError::conflict("Like Error", "Like is being updated, try again"),
                e => ApiError::from(e),
            })?;
            true
        }
    };
    let like_count = recount(&state.store, &Counter::Likes(target.clone()))?;
    log::debug!("User {} like on {} {} is now {}", auth.user_id, target.kind, target.id, is_liked);

    Ok(ok(
        json!({ "id": target.id, "likeCount": like_count, "isLiked": is_liked }),
        if is_liked { "Liked" } else { "Unliked" },
    ))
}

/// What a user has liked, annotated for the viewer.
pub async fn user_likes(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
    query: web::Query<Pagination>,
) -> Result<HttpResponse, ApiError> {
    let page = checked_page(*query, "Get Likes Error")?;
    let (likes, count) = state.store.list_likes_by(&path, &page)?;
    let mut views = state.store.like_views(likes)?;
    annotate(&state.store, &auth.user_id, &mut views)?;
    Ok(ok(paged("likes", views, count, &page)?, "Likes fetched"))
}

// ==================== Bookmarks ====================

pub async fn list_bookmarks(
    state: web::Data<AppState>,
    auth: AuthUser,
    query: web::Query<Pagination>,
) -> Result<HttpResponse, ApiError> {
    let page = checked_page(*query, "Get Bookmarks Error")?;
    let (bookmarks, count) = state.store.list_bookmarks(&auth.user_id, &page)?;
    let mut views = state.store.bookmark_views(bookmarks)?;
    annotate(&state.store, &auth.user_id, &mut views)?;
    Ok(ok(paged("bookmarks", views, count, &page)?, "Bookmarks fetched"))
}

pub async fn create_bookmark(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<BookmarkRequest>,
) -> Result<HttpResponse, ApiError> {
    let target = ContentRef::new(body.target_type, body.target_id.clone());
    let item = state
        .store
        .get_content(&target)
        .or_not_found("Bookmark Error", &format!("{} not found", target.kind))?;
    check_self_engagement(&state, &auth.user_id, item.author_id(), "Bookmark Error")?;

    let mut bookmark = Bookmark {
        id: String::new(),
        user_id: auth.user_id.clone(),
        target: target.clone(),
        created_at: Utc::now(),
    };
    state.store.create_bookmark(&mut bookmark).map_err(|e| match e {
        e if e.is_unique_violation() => ApiError::conflict("Bookmark Error", "Already bookmarked"),
        e => ApiError::from(e),
    })?;
    let bookmark_count = recount(&state.store, &Counter::Bookmarks(target))?;

    Ok(ok(
        json!({ "bookmark": bookmark, "bookmarkCount": bookmark_count, "isBookmarked": true }),
        "Bookmarked",
    ))
}

pub async fn delete_bookmark(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<BookmarkRequest>,
) -> Result<HttpResponse, ApiError> {
    let target = ContentRef::new(body.target_type, body.target_id.clone());
    if state.store.delete_bookmark(&auth.user_id, &target)? == 0 {
        return Err(ApiError::not_found("Bookmark Error", "Bookmark not found"));
    }
    let bookmark_count = recount(&state.store, &Counter::Bookmarks(target.clone()))?;

    Ok(ok(
        json!({ "id": target.id, "bookmarkCount": bookmark_count, "isBookmarked": false }),
        "Bookmark removed",
    ))
}
