use actix_web::{web, HttpResponse};
use chrono::Utc;

use super::content::{self, annotated_view, bump_views_of, feed_page};
use super::{checked_page, ok, paged, validated, ApiError, AppState, OrNotFound};
use crate::auth::AuthUser;
use crate::events::reply_notification;
use crate::models::*;
use crate::social::{annotate, recount_all, Counter};
use crate::store::FeedFilter;

pub async fn create_reply(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<CreateReplyRequest>,
) -> Result<HttpResponse, ApiError> {
    validated(body.validate(), "Create Reply Error")?;
    let body = body.into_inner();
    let target = ContentRef::new(body.target_type, body.target_id);

    let parent = state
        .store
        .get_content(&target)
        .or_not_found("Create Reply Error", &format!("{} not found", target.kind))?;
    // Root first, direct parent last.
    let links = match &parent {
        ContentItem::Post(post) => vec![post.id.clone()],
        ContentItem::Reply(reply) => {
            let mut links = reply.links.clone();
            links.push(reply.id.clone());
            links
        }
    };

    let mut reply = Reply {
        id: String::new(),
        author_id: auth.user_id.clone(),
        content: body.content,
        media_file: body.media_file,
        target: target.clone(),
        links,
        counters: ContentCounters::default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    state.store.create_reply(&mut reply)?;

    let mut thread = UserThread {
        id: String::new(),
        user_id: auth.user_id.clone(),
        activity: ThreadActivity::Reply { reply: reply.id.clone() },
        created_at: reply.created_at,
    };
    state.store.create_thread(&mut thread)?;
    recount_all(
        &state.store,
        &[Counter::Posts(auth.user_id.clone()), Counter::Replies(target.clone())],
    )?;

    if parent.author_id() != auth.user_id {
        state
            .events
            .notify(reply_notification(&auth.user_id, parent.author_id(), &reply.id))?;
    }

    let view = annotated_view(&state, &auth.user_id, &ContentRef::reply(&reply.id), "Create Reply Error")?;
    Ok(ok(view, "Reply created"))
}

/// Direct replies under a post or reply, newest first.
pub async fn replies_of(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<(String, String)>,
    query: web::Query<Pagination>,
) -> Result<HttpResponse, ApiError> {
    let page = checked_page(*query, "Get Replies Error")?;
    let (target_type, target_id) = path.into_inner();
    let kind: ContentKind = target_type
        .parse()
        .map_err(|e: String| ApiError::validation("Get Replies Error", e))?;
    let target = ContentRef::new(kind, target_id);

    let (replies, count) = state.store.list_replies_of(&target, &page)?;
    let refs: Vec<ContentRef> = replies.iter().map(|r| ContentRef::reply(&r.id)).collect();
    let mut found = state.store.content_views(&refs)?;
    let mut views: Vec<ContentView> = refs.iter().filter_map(|r| found.remove(r)).collect();

    annotate(&state.store, &auth.user_id, &mut views)?;
    bump_views_of(&state, &views);
    Ok(ok(paged("replies", views, count, &page)?, "Replies fetched"))
}

pub async fn user_replies(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
    query: web::Query<Pagination>,
) -> Result<HttpResponse, ApiError> {
    let page = checked_page(*query, "Get Replies Error")?;
    let (threads, count) = state
        .store
        .list_threads(FeedFilter::UserReplies { user_id: &path }, &page)?;
    let body = feed_page(&state, &auth.user_id, "replies", threads, count, &page)?;
    Ok(ok(body, "Replies fetched"))
}

pub async fn get_reply(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let view = annotated_view(&state, &auth.user_id, &ContentRef::reply(path.into_inner()), "Get Reply Error")?;
    bump_views_of(&state, std::slice::from_ref(&view));
    Ok(ok(view, "Reply fetched"))
}

pub async fn update_reply(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdateContentRequest>,
) -> Result<HttpResponse, ApiError> {
    let target = ContentRef::reply(path.into_inner());
    let view = content::update_owned(&state, &auth.user_id, &target, &body, "Update Reply Error")?;
    Ok(ok(view, "Reply updated"))
}

pub async fn delete_reply(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let target = ContentRef::reply(path.into_inner());
    let body = content::delete_owned(&state, &auth.user_id, &target, "Delete Reply Error")?;
    Ok(ok(body, "Reply deleted"))
}

pub async fn repost(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<RepostRequest>,
) -> Result<HttpResponse, ApiError> {
    if body.repost_type != ContentKind::Reply {
        return Err(ApiError::validation("Repost Error", "repostType must be Reply"));
    }
    let view = content::repost(&state, &auth.user_id, ContentRef::reply(&body.repost_id), "Repost Error")?;
    Ok(ok(view, "Reply reposted"))
}

pub async fn undo_repost(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<UndoRepostRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = content::undo_repost(&state, &auth.user_id, ContentKind::Reply, &body.repost_id, "Undo Repost Error")?;
    Ok(ok(body, "Repost removed"))
}
