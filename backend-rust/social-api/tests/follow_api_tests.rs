use actix_web::{http::StatusCode, test, web, App};
use serde_json::json;
use std::sync::Arc;

use social_api::api::{self, AppState};
use social_api::config::{Config, InteractionPolicy};
use social_api::models::{Pagination, User};
use social_api::store::Store;

fn create_app_state_with(config: Config) -> web::Data<AppState> {
    let store = Arc::new(Store::new(":memory:").unwrap());
    web::Data::new(AppState::new(store, config))
}

fn create_app_state() -> web::Data<AppState> {
    create_app_state_with(Config::for_tests())
}

fn seed_user(state: &AppState, username: &str) -> User {
    let mut user = User::new(username, username, &format!("{}@example.com", username), "hash".to_string());
    state.store.create_user(&mut user).unwrap();
    user
}

fn bearer(state: &AppState, user: &User) -> (&'static str, String) {
    let token = state.auth_service.generate_token(&user.id).unwrap();
    ("Authorization", format!("Bearer {}", token))
}

// ==================== Follow / Unfollow ====================

#[actix_web::test]
async fn test_one_way_follow_relationships() {
    let state = create_app_state();
    let v = seed_user(&state, "viewer");
    let a = seed_user(&state, "author");
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/api/follows")
        .insert_header(bearer(&state, &v))
        .set_json(json!({ "followeeId": a.id }))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["relationship"], "followedByCurrentUser");
    assert_eq!(body["data"]["followerCount"], 1);

    // A as seen by V
    let req = test::TestRequest::get()
        .uri("/api/users/author")
        .insert_header(bearer(&state, &v))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["relationship"], "followedByCurrentUser");

    // V as seen by A
    let req = test::TestRequest::get()
        .uri("/api/users/viewer")
        .insert_header(bearer(&state, &a))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["relationship"], "followsCurrentUser");
    assert_eq!(body["data"]["followingCount"], 1);

    // A got a follow notification
    let (notifs, count) = state.store.list_notifications(&a.id, &Pagination::default()).unwrap();
    assert_eq!(count, 1);
    assert_eq!(notifs[0].sender_id, v.id);
}

#[actix_web::test]
async fn test_mutual_follow_is_symmetric() {
    let state = create_app_state();
    let a = seed_user(&state, "alpha");
    let b = seed_user(&state, "beta");
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure_routes)).await;

    for (follower, followee) in [(&a, &b), (&b, &a)] {
        let req = test::TestRequest::post()
            .uri("/api/follows")
            .insert_header(bearer(&state, follower))
            .set_json(json!({ "followeeId": followee.id }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    for (viewer, other) in [(&a, "beta"), (&b, "alpha")] {
        let req = test::TestRequest::get()
            .uri(&format!("/api/users/{}", other))
            .insert_header(bearer(&state, viewer))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["relationship"], "followEachOther");
    }

    // The users list resolves the same way in batch
    let req = test::TestRequest::get()
        .uri("/api/users")
        .insert_header(bearer(&state, &a))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let users = body["data"]["users"].as_array().unwrap();
    let beta = users.iter().find(|u| u["username"] == "beta").unwrap();
    assert_eq!(beta["relationship"], "followEachOther");
    let alpha = users.iter().find(|u| u["username"] == "alpha").unwrap();
    assert!(alpha.get("relationship").is_none());
}

#[actix_web::test]
async fn test_no_edges_means_no_relationship() {
    let state = create_app_state();
    let a = seed_user(&state, "alpha");
    seed_user(&state, "beta");
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure_routes)).await;

    let req = test::TestRequest::get()
        .uri("/api/users/beta")
        .insert_header(bearer(&state, &a))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["data"].get("relationship").is_none());
}

#[actix_web::test]
async fn test_duplicate_and_unknown_follow() {
    let state = create_app_state();
    let a = seed_user(&state, "alpha");
    let b = seed_user(&state, "beta");
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure_routes)).await;

    let follow = |id: &str| {
        test::TestRequest::post()
            .uri("/api/follows")
            .insert_header(bearer(&state, &a))
            .set_json(json!({ "followeeId": id }))
            .to_request()
    };

    assert_eq!(test::call_service(&app, follow(&b.id)).await.status(), StatusCode::OK);
    assert_eq!(test::call_service(&app, follow(&b.id)).await.status(), StatusCode::CONFLICT);
    assert_eq!(test::call_service(&app, follow("missing")).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(state.store.get_user(&b.id).unwrap().follower_count, 1);
}

#[actix_web::test]
async fn test_unfollow_removes_edge_and_notification() {
    let state = create_app_state();
    let a = seed_user(&state, "alpha");
    let b = seed_user(&state, "beta");
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/api/follows")
        .insert_header(bearer(&state, &a))
        .set_json(json!({ "followeeId": b.id }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::delete()
        .uri("/api/follows")
        .insert_header(bearer(&state, &a))
        .set_json(json!({ "followeeId": b.id }))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["data"].get("relationship").is_none());
    assert_eq!(body["data"]["followerCount"], 0);
    assert_eq!(state.store.get_user(&a.id).unwrap().following_count, 0);
    let (_, count) = state.store.list_notifications(&b.id, &Pagination::default()).unwrap();
    assert_eq!(count, 0);

    let req = test::TestRequest::delete()
        .uri("/api/follows")
        .insert_header(bearer(&state, &a))
        .set_json(json!({ "followeeId": b.id }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_follower_lists_are_annotated_for_viewer() {
    let state = create_app_state();
    let target = seed_user(&state, "target");
    let f1 = seed_user(&state, "fan1");
    let f2 = seed_user(&state, "fan2");
    let viewer = seed_user(&state, "viewer");
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure_routes)).await;

    for (follower, followee) in [(&f1, &target), (&f2, &target), (&viewer, &f1)] {
        let req = test::TestRequest::post()
            .uri("/api/follows")
            .insert_header(bearer(&state, follower))
            .set_json(json!({ "followeeId": followee.id }))
            .to_request();
        test::call_service(&app, req).await;
    }

    let req = test::TestRequest::get()
        .uri(&format!("/api/follows/{}/followers", target.id))
        .insert_header(bearer(&state, &viewer))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["count"], 2);
    let followers = body["data"]["followers"].as_array().unwrap();
    let fan1 = followers.iter().find(|u| u["username"] == "fan1").unwrap();
    assert_eq!(fan1["relationship"], "followedByCurrentUser");
    let fan2 = followers.iter().find(|u| u["username"] == "fan2").unwrap();
    assert!(fan2.get("relationship").is_none());

    let req = test::TestRequest::get()
        .uri(&format!("/api/follows/{}/followees", viewer.id))
        .insert_header(bearer(&state, &viewer))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["followees"][0]["username"], "fan1");
}

// ==================== Interaction Policy ====================

#[actix_web::test]
async fn test_self_follow_policy() {
    let state = create_app_state();
    let a = seed_user(&state, "alpha");
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure_routes)).await;
    let req = test::TestRequest::post()
        .uri("/api/follows")
        .insert_header(bearer(&state, &a))
        .set_json(json!({ "followeeId": a.id }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let strict = create_app_state_with(Config {
        policy: InteractionPolicy {
            allow_self_follow: false,
            allow_self_engagement: true,
        },
        ..Config::for_tests()
    });
    let b = seed_user(&strict, "beta");
    let app = test::init_service(App::new().app_data(strict.clone()).configure(api::configure_routes)).await;
    let req = test::TestRequest::post()
        .uri("/api/follows")
        .insert_header(bearer(&strict, &b))
        .set_json(json!({ "followeeId": b.id }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}
