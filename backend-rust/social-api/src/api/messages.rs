use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;

use super::{ok, validated, ApiError, AppState, OrNotFound};
use crate::auth::AuthUser;
use crate::models::*;

/// Everyone the viewer has exchanged messages with, most recent conversation first.
pub async fn chat_users(state: web::Data<AppState>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    let messages = state.store.list_messages_of(&auth.user_id)?;

    let mut order: Vec<String> = Vec::new();
    let mut threads: HashMap<String, Vec<Message>> = HashMap::new();
    for message in messages {
        let partner = if message.from_id == auth.user_id {
            message.to_id.clone()
        } else {
            message.from_id.clone()
        };
        if !threads.contains_key(&partner) {
            order.push(partner.clone());
        }
        threads.entry(partner).or_default().push(message);
    }
    order.sort_by_key(|id| std::cmp::Reverse(threads[id].last().map(|m| m.created_at)));

    let mut users = state.store.get_users_by_ids(&order)?;
    let chats: Vec<ChatUser> = order
        .iter()
        .filter_map(|id| {
            let user = users.remove(id)?;
            let messages = threads.remove(id)?;
            Some(ChatUser { user, messages })
        })
        .collect();
    Ok(ok(chats, "Chats fetched"))
}

pub async fn chat_user(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user = state
        .store
        .get_user(&path)
        .or_not_found("Get Chat Error", "User not found")?;
    let messages = state.store.list_conversation(&auth.user_id, &user.id)?;
    Ok(ok(ChatUser { user, messages }, "Chat fetched"))
}

pub async fn send(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<CreateMessageRequest>,
) -> Result<HttpResponse, ApiError> {
    validated(body.validate(), "Send Message Error")?;
    let body = body.into_inner();
    let recipient = state
        .store
        .get_user(&body.to)
        .or_not_found("Send Message Error", "Recipient not found")?;

    let mut message = Message {
        id: String::new(),
        from_id: auth.user_id.clone(),
        to_id: recipient.id,
        content: body.content,
        is_read: false,
        created_at: Utc::now(),
    };
    state.store.create_message(&mut message)?;
    state.events.deliver_message(&message);

    Ok(ok(message, "Message sent"))
}

pub async fn mark_read(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<MessageStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let updated = state
        .store
        .mark_messages_read(&auth.user_id, &body.messages)
        .or_not_found("Update Messages Error", "Message not found")?;
    Ok(ok(json!({ "updated": updated }), "Messages marked as read"))
}
