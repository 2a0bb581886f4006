use actix_web::{web, HttpResponse};
use chrono::Utc;

use super::content::{self, annotated_view, feed_page};
use super::{checked_page, ok, validated, ApiError, AppState};
use crate::auth::AuthUser;
use crate::models::*;
use crate::social::{recount, Counter};
use crate::store::FeedFilter;

pub async fn create_post(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<CreatePostRequest>,
) -> Result<HttpResponse, ApiError> {
    validated(body.validate(), "Create Post Error")?;
    let body = body.into_inner();

    let mut post = Post {
        id: String::new(),
        author_id: auth.user_id.clone(),
        content: body.content,
        media_file: body.media_file,
        counters: ContentCounters::default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    state.store.create_post(&mut post)?;

    let mut thread = UserThread {
        id: String::new(),
        user_id: auth.user_id.clone(),
        activity: ThreadActivity::Post { post: post.id.clone() },
        created_at: post.created_at,
    };
    state.store.create_thread(&mut thread)?;
    recount(&state.store, &Counter::Posts(auth.user_id.clone()))?;

    let view = annotated_view(&state, &auth.user_id, &ContentRef::post(&post.id), "Create Post Error")?;
    Ok(ok(view, "Post created"))
}

/// Original posts of everyone, newest first.
pub async fn original_feed(
    state: web::Data<AppState>,
    auth: AuthUser,
    query: web::Query<PostsQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = checked_page(query.pagination(), "Get Posts Error")?;
    let filter = FeedFilter::OriginalPosts {
        exclude_user: query.ignore_current.then_some(auth.user_id.as_str()),
        search_text: query.search_text.as_deref(),
    };
    let (threads, count) = state.store.list_threads(filter, &page)?;
    let body = feed_page(&state, &auth.user_id, "posts", threads, count, &page)?;
    Ok(ok(body, "Posts fetched"))
}

/// Everything the viewer and the people they follow did.
pub async fn followees_feed(
    state: web::Data<AppState>,
    auth: AuthUser,
    query: web::Query<Pagination>,
) -> Result<HttpResponse, ApiError> {
    let page = checked_page(*query, "Get Posts Error")?;
    let (threads, count) = state
        .store
        .list_threads(FeedFilter::Followees { user_id: &auth.user_id }, &page)?;
    let body = feed_page(&state, &auth.user_id, "posts", threads, count, &page)?;
    Ok(ok(body, "Posts fetched"))
}

pub async fn user_posts(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
    query: web::Query<UserPostsQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = checked_page(query.pagination(), "Get Posts Error")?;
    let filter = FeedFilter::UserPosts {
        user_id: &path,
        original: query.original,
    };
    let (threads, count) = state.store.list_threads(filter, &page)?;
    let body = feed_page(&state, &auth.user_id, "posts", threads, count, &page)?;
    Ok(ok(body, "Posts fetched"))
}

pub async fn get_post(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let view = annotated_view(&state, &auth.user_id, &ContentRef::post(path.into_inner()), "Get Post Error")?;
    content::bump_views_of(&state, std::slice::from_ref(&view));
    Ok(ok(view, "Post fetched"))
}

pub async fn update_post(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdateContentRequest>,
) -> Result<HttpResponse, ApiError> {
    let target = ContentRef::post(path.into_inner());
    let view = content::update_owned(&state, &auth.user_id, &target, &body, "Update Post Error")?;
    Ok(ok(view, "Post updated"))
}

pub async fn delete_post(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let target = ContentRef::post(path.into_inner());
    let body = content::delete_owned(&state, &auth.user_id, &target, "Delete Post Error")?;
    Ok(ok(body, "Post deleted"))
}

pub async fn repost(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<RepostRequest>,
) -> Result<HttpResponse, ApiError> {
    if body.repost_type != ContentKind::Post {
        return Err(ApiError::validation("Repost Error", "repostType must be Post"));
    }
    let view = content::repost(&state, &auth.user_id, ContentRef::post(&body.repost_id), "Repost Error")?;
    Ok(ok(view, "Post reposted"))
}

pub async fn undo_repost(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<UndoRepostRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = content::undo_repost(&state, &auth.user_id, ContentKind::Post, &body.repost_id, "Undo Repost Error")?;
    Ok(ok(body, "Repost removed"))
}
