use actix_web::{http::StatusCode, test, web, App};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use social_api::api::{self, AppState};
use social_api::config::Config;
use social_api::models::*;
use social_api::social::{recount, Counter};
use social_api::store::Store;

fn create_app_state() -> web::Data<AppState> {
    let store = Arc::new(Store::new(":memory:").unwrap());
    web::Data::new(AppState::new(store, Config::for_tests()))
}

fn seed_user(state: &AppState, username: &str) -> User {
    let mut user = User::new(username, username, &format!("{}@example.com", username), "hash".to_string());
    state.store.create_user(&mut user).unwrap();
    user
}

fn seed_post(state: &AppState, author: &User, content: &str) -> Post {
    let mut post = Post {
        id: String::new(),
        author_id: author.id.clone(),
        content: content.to_string(),
        media_file: String::new(),
        counters: ContentCounters::default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    state.store.create_post(&mut post).unwrap();
    let mut thread = UserThread {
        id: String::new(),
        user_id: author.id.clone(),
        activity: ThreadActivity::Post { post: post.id.clone() },
        created_at: post.created_at,
    };
    state.store.create_thread(&mut thread).unwrap();
    recount(&state.store, &Counter::Posts(author.id.clone())).unwrap();
    post
}

fn bearer(state: &AppState, user: &User) -> (&'static str, String) {
    let token = state.auth_service.generate_token(&user.id).unwrap();
    ("Authorization", format!("Bearer {}", token))
}

fn reply_request(state: &AppState, author: &User, target_type: &str, target_id: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/replies")
        .insert_header(bearer(state, author))
        .set_json(json!({ "content": "a reply", "targetType": target_type, "targetId": target_id }))
}

// ==================== Reply creation ====================

#[actix_web::test]
async fn test_reply_chain_links_and_counts() {
    let state = create_app_state();
    let alice = seed_user(&state, "alice");
    let bob = seed_user(&state, "bob");
    let carol = seed_user(&state, "carol");
    let post = seed_post(&state, &alice, "root post");
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure_routes)).await;

    let body: serde_json::Value =
        test::call_and_read_body_json(&app, reply_request(&state, &bob, "Post", &post.id).to_request()).await;
    assert_eq!(body["data"]["type"], "Reply");
    assert_eq!(body["data"]["links"], json!([post.id]));
    let r1 = body["data"]["id"].as_str().unwrap().to_string();

    let body: serde_json::Value = test::call_and_read_body_json(&app, reply_request(&state, &carol, "Reply", &r1).to_request()).await;
    assert_eq!(body["data"]["links"], json!([post.id, r1]));
    assert_eq!(body["data"]["target"], json!({ "kind": "Reply", "id": r1 }));

    assert_eq!(state.store.get_post(&post.id).unwrap().counters.reply_count, 1);
    assert_eq!(state.store.get_reply(&r1).unwrap().counters.reply_count, 1);
    assert_eq!(state.store.get_user(&bob.id).unwrap().post_count, 1);

    // Each parent author got one reply notification
    for recipient in [&alice, &bob] {
        let (notifs, count) = state.store.list_notifications(&recipient.id, &Pagination::default()).unwrap();
        assert_eq!(count, 1);
        assert_eq!(notifs[0].subject.event(), NotificationEvent::Reply);
    }
    let (_, count) = state.store.list_notifications(&carol.id, &Pagination::default()).unwrap();
    assert_eq!(count, 0);
}

#[actix_web::test]
async fn test_replying_to_own_post_does_not_notify() {
    let state = create_app_state();
    let alice = seed_user(&state, "alice");
    let post = seed_post(&state, &alice, "talking to myself");
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure_routes)).await;

    let resp = test::call_service(&app, reply_request(&state, &alice, "Post", &post.id).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let (_, count) = state.store.list_notifications(&alice.id, &Pagination::default()).unwrap();
    assert_eq!(count, 0);
}

#[actix_web::test]
async fn test_reply_to_missing_target() {
    let state = create_app_state();
    let alice = seed_user(&state, "alice");
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure_routes)).await;

    let resp = test::call_service(&app, reply_request(&state, &alice, "Post", "missing").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = test::call_service(&app, reply_request(&state, &alice, "Comment", "missing").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ==================== Listing ====================

#[actix_web::test]
async fn test_replies_of_target() {
    let state = create_app_state();
    let alice = seed_user(&state, "alice");
    let bob = seed_user(&state, "bob");
    let post = seed_post(&state, &alice, "root post");
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure_routes)).await;

    for _ in 0..3 {
        test::call_service(&app, reply_request(&state, &bob, "Post", &post.id).to_request()).await;
    }

    let req = test::TestRequest::get()
        .uri(&format!("/api/replies/target/post/{}?limit=2", post.id))
        .insert_header(bearer(&state, &alice))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["count"], 3);
    assert_eq!(body["data"]["totalPages"], 2);
    let replies = body["data"]["replies"].as_array().unwrap();
    assert_eq!(replies.len(), 2);
    assert!(replies.iter().all(|r| r["author"]["username"] == "bob"));

    let req = test::TestRequest::get()
        .uri(&format!("/api/replies/target/comment/{}", post.id))
        .insert_header(bearer(&state, &alice))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Get Replies Error");

    let req = test::TestRequest::get()
        .uri(&format!("/api/replies/user/{}", bob.id))
        .insert_header(bearer(&state, &alice))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["count"], 3);
    assert_eq!(body["data"]["replies"][0]["reply"]["type"], "Reply");
}

// ==================== Reply reposts ====================

#[actix_web::test]
async fn test_reply_repost_endpoints_are_kind_scoped() {
    let state = create_app_state();
    let alice = seed_user(&state, "alice");
    let bob = seed_user(&state, "bob");
    let post = seed_post(&state, &alice, "root post");
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure_routes)).await;

    let body: serde_json::Value =
        test::call_and_read_body_json(&app, reply_request(&state, &bob, "Post", &post.id).to_request()).await;
    let r1 = body["data"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/replies/repost")
        .insert_header(bearer(&state, &alice))
        .set_json(json!({ "repostType": "Reply", "repostId": r1 }))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["repostCount"], 1);

    // The post endpoint does not undo a reply repost
    let req = test::TestRequest::delete()
        .uri("/api/posts/repost")
        .insert_header(bearer(&state, &alice))
        .set_json(json!({ "repostId": r1 }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::delete()
        .uri("/api/replies/repost")
        .insert_header(bearer(&state, &alice))
        .set_json(json!({ "repostId": r1 }))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["repostCount"], 0);
}

// ==================== Cascade delete ====================

#[actix_web::test]
async fn test_delete_post_cascades() {
    let state = create_app_state();
    let alice = seed_user(&state, "alice");
    let bob = seed_user(&state, "bob");
    let carol = seed_user(&state, "carol");
    let post = seed_post(&state, &alice, "doomed");
    let survivor = seed_post(&state, &alice, "survivor");
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure_routes)).await;

    let body: serde_json::Value =
        test::call_and_read_body_json(&app, reply_request(&state, &bob, "Post", &post.id).to_request()).await;
    let r1 = body["data"]["id"].as_str().unwrap().to_string();
    let body: serde_json::Value = test::call_and_read_body_json(&app, reply_request(&state, &carol, "Reply", &r1).to_request()).await;
    let r2 = body["data"]["id"].as_str().unwrap().to_string();

    // Carol reposts the post and likes R1
    let req = test::TestRequest::post()
        .uri("/api/posts/repost")
        .insert_header(bearer(&state, &carol))
        .set_json(json!({ "repostType": "Post", "repostId": post.id }))
        .to_request();
    test::call_service(&app, req).await;
    let req = test::TestRequest::post()
        .uri("/api/likes")
        .insert_header(bearer(&state, &carol))
        .set_json(json!({ "targetType": "Reply", "target": r1 }))
        .to_request();
    test::call_service(&app, req).await;
    assert_eq!(state.store.get_user(&carol.id).unwrap().post_count, 2);

    // Only the author may delete
    let req = test::TestRequest::delete()
        .uri(&format!("/api/posts/original/{}", post.id))
        .insert_header(bearer(&state, &bob))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/posts/original/{}", post.id))
        .insert_header(bearer(&state, &alice))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["id"], post.id.as_str());
    let mut deleted: Vec<String> = body["data"]["deletedReplies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    deleted.sort();
    let mut expected = vec![r1.clone(), r2.clone()];
    expected.sort();
    assert_eq!(deleted, expected);

    let mut recipients = vec![alice.id.clone(), bob.id.clone()];
    recipients.sort();
    assert_eq!(body["data"]["notificationRecipients"], json!(recipients));

    assert!(state.store.get_post(&post.id).is_err());
    assert!(state.store.get_reply(&r1).is_err());
    assert!(state.store.get_reply(&r2).is_err());
    assert!(state.store.get_post(&survivor.id).is_ok());

    for user in [&alice, &bob, &carol] {
        let (_, count) = state.store.list_notifications(&user.id, &Pagination::default()).unwrap();
        assert_eq!(count, 0);
    }
    assert_eq!(state.store.get_user(&alice.id).unwrap().post_count, 1);
    assert_eq!(state.store.get_user(&bob.id).unwrap().post_count, 0);
    assert_eq!(state.store.get_user(&carol.id).unwrap().post_count, 0);

    let req = test::TestRequest::get()
        .uri(&format!("/api/likes/user/{}", carol.id))
        .insert_header(bearer(&state, &carol))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["count"], 0);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/posts/original/{}", post.id))
        .insert_header(bearer(&state, &alice))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_delete_reply_keeps_ancestors() {
    let state = create_app_state();
    let alice = seed_user(&state, "alice");
    let bob = seed_user(&state, "bob");
    let post = seed_post(&state, &alice, "root post");
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure_routes)).await;

    let body: serde_json::Value =
        test::call_and_read_body_json(&app, reply_request(&state, &bob, "Post", &post.id).to_request()).await;
    let r1 = body["data"]["id"].as_str().unwrap().to_string();
    let body: serde_json::Value = test::call_and_read_body_json(&app, reply_request(&state, &alice, "Reply", &r1).to_request()).await;
    let r2 = body["data"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::delete()
        .uri(&format!("/api/replies/original/{}", r1))
        .insert_header(bearer(&state, &bob))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["deletedReplies"], json!([r2]));

    assert!(state.store.get_post(&post.id).is_ok());
    assert!(state.store.get_reply(&r2).is_err());
    assert_eq!(state.store.get_post(&post.id).unwrap().counters.reply_count, 0);
    assert_eq!(state.store.get_user(&alice.id).unwrap().post_count, 1);
    assert_eq!(state.store.get_user(&bob.id).unwrap().post_count, 0);
}
