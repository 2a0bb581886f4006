use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

mod content;
mod error;
mod follows;
mod hashtags;
mod likes;
mod messages;
mod notifications;
mod posts;
mod realtime;
mod replies;
mod users;

pub use error::{ApiError, ErrorKind};
pub(crate) use error::{validated, OrNotFound};

use crate::auth::AuthService;
use crate::config::Config;
use crate::events::EventProcessor;
use crate::models::{ApiResponse, Pagination};
use crate::realtime::RoomHub;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<Store>,
    pub auth_service: Arc<AuthService>,
    pub events: Arc<EventProcessor>,
    pub hub: Arc<RoomHub>,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<Store>, config: Config) -> Self {
        let auth_service = Arc::new(AuthService::new(
            config.jwt_secret.clone(),
            config.jwt_ttl_hours,
            config.bcrypt_cost,
        ));
        let hub = Arc::new(RoomHub::new());
        let events = Arc::new(EventProcessor::new(store.clone(), hub.clone()));
        Self {
            store,
            auth_service,
            events,
            hub,
            config,
        }
    }
}

// ==================== Response helpers ====================

pub(crate) fn ok<T: Serialize>(data: T, message: &str) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(data, message))
}

/// `{<key>: items, totalPages, count}`
pub(crate) fn paged<T: Serialize>(
    key: &str,
    items: T,
    count: i64,
    page: &Pagination,
) -> Result<serde_json::Value, ApiError> {
    let mut body = serde_json::Map::new();
    body.insert(key.to_string(), serde_json::to_value(items)?);
    body.insert("totalPages".to_string(), serde_json::json!(page.total_pages(count)));
    body.insert("count".to_string(), serde_json::json!(count));
    Ok(serde_json::Value::Object(body))
}

pub(crate) fn checked_page(page: Pagination, category: &str) -> Result<Pagination, ApiError> {
    validated(page.validate(), category)?;
    Ok(page)
}

/// Rejects engaging with one's own content when the policy forbids it.
pub(crate) fn check_self_engagement(
    state: &AppState,
    viewer_id: &str,
    author_id: &str,
    category: &str,
) -> Result<(), ApiError> {
    if viewer_id == author_id && !state.config.policy.allow_self_engagement {
        return Err(ApiError::validation(category, "You cannot do this on your own content"));
    }
    Ok(())
}

// ==================== Health Check ====================

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

fn bad_request(message: String) -> actix_web::Error {
    ApiError::validation("Validation Error", message).into()
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| bad_request(err.to_string())))
        .app_data(web::QueryConfig::default().error_handler(|err, _req| bad_request(err.to_string())))
        .app_data(web::PathConfig::default().error_handler(|err, _req| bad_request(err.to_string())))
        // Health check
        .route("/health", web::get().to(health))
        // Auth and users
        .route("/api/auth/login", web::post().to(users::login))
        .route("/api/users", web::post().to(users::register))
        .route("/api/users", web::get().to(users::list_users))
        .route("/api/users/me", web::get().to(users::current_user))
        .route("/api/users/{username}", web::get().to(users::get_user))
        .route("/api/users/{id}", web::put().to(users::update_profile))
        // Posts
        .route("/api/posts", web::get().to(posts::original_feed))
        .route("/api/posts", web::post().to(posts::create_post))
        .route("/api/posts/followees", web::get().to(posts::followees_feed))
        .route("/api/posts/user/{user_id}", web::get().to(posts::user_posts))
        .route("/api/posts/repost", web::post().to(posts::repost))
        .route("/api/posts/repost", web::delete().to(posts::undo_repost))
        .route("/api/posts/original/{id}", web::get().to(posts::get_post))
        .route("/api/posts/original/{id}", web::put().to(posts::update_post))
        .route("/api/posts/original/{id}", web::delete().to(posts::delete_post))
        // Replies
        .route("/api/replies", web::post().to(replies::create_reply))
        .route("/api/replies/target/{target_type}/{target_id}", web::get().to(replies::replies_of))
        .route("/api/replies/user/{user_id}", web::get().to(replies::user_replies))
        .route("/api/replies/repost", web::post().to(replies::repost))
        .route("/api/replies/repost", web::delete().to(replies::undo_repost))
        .route("/api/replies/original/{id}", web::get().to(replies::get_reply))
        .route("/api/replies/original/{id}", web::put().to(replies::update_reply))
        .route("/api/replies/original/{id}", web::delete().to(replies::delete_reply))
        // Likes and bookmarks
        .route("/api/likes", web::post().to(likes::toggle_like))
        .route("/api/likes/user/{user_id}", web::get().to(likes::user_likes))
        .route("/api/bookmarks", web::get().to(likes::list_bookmarks))
        .route("/api/bookmarks", web::post().to(likes::create_bookmark))
        .route("/api/bookmarks", web::delete().to(likes::delete_bookmark))
        // Follows
        .route("/api/follows", web::post().to(follows::follow))
        .route("/api/follows", web::delete().to(follows::unfollow))
        .route("/api/follows/{user_id}/followers", web::get().to(follows::followers))
        .route("/api/follows/{user_id}/followees", web::get().to(follows::followees))
        // Hashtags
        .route("/api/hashtags", web::get().to(hashtags::search))
        .route("/api/hashtags", web::post().to(hashtags::attach))
        // Notifications
        .route("/api/notifications", web::get().to(notifications::list))
        .route("/api/notifications/mentions", web::post().to(notifications::mention))
        .route("/api/notifications/status", web::put().to(notifications::mark_read))
        // Messages
        .route("/api/messages/users", web::get().to(messages::chat_users))
        .route("/api/messages/users/{user_id}", web::get().to(messages::chat_user))
        .route("/api/messages", web::post().to(messages::send))
        .route("/api/messages/status", web::put().to(messages::mark_read))
        // Real-time stream
        .route("/api/realtime", web::get().to(realtime::stream));
}
