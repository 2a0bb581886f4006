use actix_web::{web, HttpResponse};
use chrono::Utc;

use super::{checked_page, ok, paged, ApiError, AppState, OrNotFound};
use crate::auth::AuthUser;
use crate::events::follow_notification;
use crate::models::*;
use crate::social::{annotate_users, recount_follow, resolve_single};

pub async fn follow(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<FollowRequest>,
) -> Result<HttpResponse, ApiError> {
    let followee = state
        .store
        .get_user(&body.followee_id)
        .or_not_found("Follow Error", "User not found")?;
    if followee.id == auth.user_id && !state.config.policy.allow_self_follow {
        return Err(ApiError::validation("Follow Error", "You cannot follow yourself"));
    }

    let mut edge = Follow {
        id: String::new(),
        follower_id: auth.user_id.clone(),
        followee_id: followee.id.clone(),
        created_at: Utc::now(),
    };
    state.store.create_follow(&mut edge).map_err(|e| match e {
        e if e.is_unique_violation() => ApiError::conflict("Follow Error", "Already following this user"),
        e => ApiError::from(e),
    })?;
    recount_follow(&state.store, &auth.user_id, &followee.id)?;
    state.events.notify(follow_notification(&auth.user_id, &followee.id))?;
    log::info!("User {} followed {}", auth.user_id, followee.id);

    let user = state.store.get_user(&followee.id)?;
    let relationship = resolve_single(&state.store, &auth.user_id, &user.id)?;
    Ok(ok(AuthorView { user, relationship }, "Followed"))
}

pub async fn unfollow(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<FollowRequest>,
) -> Result<HttpResponse, ApiError> {
    let followee_id = body.into_inner().followee_id;
    if state.store.delete_follow(&auth.user_id, &followee_id)? == 0 {
        return Err(ApiError::not_found("Unfollow Error", "You are not following this user"));
    }
    let notifs = state.store.find_follow_notifications(&auth.user_id, &followee_id)?;
    state.events.retract(&notifs)?;
    recount_follow(&state.store, &auth.user_id, &followee_id)?;
    log::info!("User {} unfollowed {}", auth.user_id, followee_id);

    let user = state
        .store
        .get_user(&followee_id)
        .or_not_found("Unfollow Error", "User not found")?;
    let relationship = resolve_single(&state.store, &auth.user_id, &user.id)?;
    Ok(ok(AuthorView { user, relationship }, "Unfollowed"))
}

pub async fn followers(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
    query: web::Query<Pagination>,
) -> Result<HttpResponse, ApiError> {
    let page = checked_page(*query, "Get Followers Error")?;
    let (ids, count) = state.store.list_follower_ids(&path, &page)?;
    let users = users_in_order(&state, &auth.user_id, &ids)?;
    Ok(ok(paged("followers", users, count, &page)?, "Followers fetched"))
}

pub async fn followees(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
    query: web::Query<Pagination>,
) -> Result<HttpResponse, ApiError> {
    let page = checked_page(*query, "Get Followees Error")?;
    let (ids, count) = state.store.list_followee_ids(&path, &page)?;
    let users = users_in_order(&state, &auth.user_id, &ids)?;
    Ok(ok(paged("followees", users, count, &page)?, "Followees fetched"))
}

/// Live users for `ids`, keeping the page order, with their relationship to the viewer.
fn users_in_order(state: &AppState, viewer_id: &str, ids: &[String]) -> Result<Vec<AuthorView>, ApiError> {
    let mut found = state.store.get_users_by_ids(ids)?;
    let users = ids.iter().filter_map(|id| found.remove(id)).collect();
    Ok(annotate_users(&state.store, viewer_id, users)?)
}
