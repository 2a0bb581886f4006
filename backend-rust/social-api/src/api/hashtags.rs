use actix_web::{web, HttpResponse};

use super::{ok, validated, ApiError, AppState, OrNotFound};
use crate::auth::AuthUser;
use crate::models::*;

pub async fn search(
    state: web::Data<AppState>,
    _auth: AuthUser,
    query: web::Query<HashtagQuery>,
) -> Result<HttpResponse, ApiError> {
    let hashtags = state.store.search_hashtags(query.search_text.as_deref())?;
    Ok(ok(hashtags, "Hashtags fetched"))
}

/// Tags one of the viewer's posts. Only newly created hashtags are returned.
pub async fn attach(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<CreateHashtagsRequest>,
) -> Result<HttpResponse, ApiError> {
    validated(body.validate(), "Create Hashtags Error")?;
    let post = state
        .store
        .get_post(&body.post_id)
        .or_not_found("Create Hashtags Error", "Post not found")?;
    if post.author_id != auth.user_id {
        return Err(ApiError::forbidden("Create Hashtags Error", "You can only tag your own posts"));
    }

    let created = state.store.attach_hashtags(&post.id, &body.hashtags)?;
    Ok(ok(created, "Hashtags created"))
}
