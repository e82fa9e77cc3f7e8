//! Router-level tests of the authentication surface: login delegation,
//! rotation, replay containment, revocation, and role gates.

mod support;

use axum::http::StatusCode;
use serde_json::json;

use flowgate_core::users::UserStore;
use support::{
    harness, harness_with_failing_sync, login, mint_access_token, post_empty, post_json, read_json,
};

#[tokio::test]
async fn login_returns_bearer_pair_with_user() {
    let h = harness(10, Vec::new());
    let response = post_json(
        &h.app,
        "/auth/login",
        None,
        json!({"username": "alice", "password": "wonderland"}),
    )
    .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["id"], "user-alice");
    assert_eq!(body["user"]["role"], "enduser");
    assert!(body["access_token"].as_str().unwrap().contains('.'));
    assert!(body["refresh_token"].as_str().unwrap().contains('.'));
    assert_eq!(body["expires_in"], 15 * 60);
}

#[tokio::test]
async fn login_with_wrong_password_is_401() {
    let h = harness(10, Vec::new());
    let response = post_json(
        &h.app,
        "/auth/login",
        None,
        json!({"username": "alice", "password": "queen-of-hearts"}),
    )
    .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn login_creates_shadow_user() {
    let h = harness(10, Vec::new());
    login(&h.app, "alice", "wonderland").await;
    let user = h
        .users
        .find_by_external_id("user-alice")
        .await
        .unwrap()
        .expect("shadow user exists");
    assert_eq!(user.email.as_deref(), Some("alice@example.com"));
    assert_eq!(user.role, "enduser");
}

#[tokio::test]
async fn refresh_rotates_the_pair() {
    let h = harness(10, Vec::new());
    let (access, refresh) = login(&h.app, "alice", "wonderland").await;

    let response = post_json(
        &h.app,
        "/auth/refresh",
        None,
        json!({"refresh_token": refresh}),
    )
    .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["access_token"], access);
    assert_ne!(body["refresh_token"], refresh);
    assert_eq!(body["user"]["id"], "user-alice");
}

#[tokio::test]
async fn refresh_replay_revokes_the_whole_family() {
    let h = harness(10, Vec::new());
    let (_, refresh) = login(&h.app, "alice", "wonderland").await;

    let response = post_json(
        &h.app,
        "/auth/refresh",
        None,
        json!({"refresh_token": refresh}),
    )
    .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    let rotated = body["refresh_token"].as_str().unwrap().to_string();

    // Replay the rotated-away token.
    let response = post_json(
        &h.app,
        "/auth/refresh",
        None,
        json!({"refresh_token": refresh}),
    )
    .await;
    let (status, _) = read_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Containment: the fresh token died with the family.
    let response = post_json(
        &h.app,
        "/auth/refresh",
        None,
        json!({"refresh_token": rotated}),
    )
    .await;
    let (status, _) = read_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_with_garbage_token_is_401() {
    let h = harness(10, Vec::new());
    let response = post_json(
        &h.app,
        "/auth/refresh",
        None,
        json!({"refresh_token": "not-a-token"}),
    )
    .await;
    let (status, _) = read_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_route_without_bearer_is_401() {
    let h = harness(10, Vec::new());
    let response = post_empty(&h.app, "/auth/revoke", None).await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn protected_route_with_invalid_bearer_is_401() {
    let h = harness(10, Vec::new());
    let response = post_empty(&h.app, "/auth/revoke", Some("bogus.token.here")).await;
    let (status, _) = read_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_token_is_not_accepted_as_bearer() {
    let h = harness(10, Vec::new());
    let (_, refresh) = login(&h.app, "alice", "wonderland").await;
    let response = post_empty(&h.app, "/auth/revoke", Some(&refresh)).await;
    let (status, _) = read_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn shadow_sync_failure_does_not_fail_the_request() {
    // Authentication rests on the token signature alone; a dead user
    // store costs the shadow sync, not the request.
    let app = harness_with_failing_sync(10, Vec::new());
    let access = mint_access_token("user-alice", "enduser");

    let response = post_empty(&app, "/auth/revoke", Some(&access)).await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["revoked"], 0);
}

#[tokio::test]
async fn revoke_without_body_revokes_callers_family() {
    let h = harness(10, Vec::new());
    let (access, refresh) = login(&h.app, "alice", "wonderland").await;

    let response = post_empty(&h.app, "/auth/revoke", Some(&access)).await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked"], 1);

    // The refresh token is unusable afterwards.
    let response = post_json(
        &h.app,
        "/auth/refresh",
        None,
        json!({"refresh_token": refresh}),
    )
    .await;
    let (status, _) = read_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_route_is_forbidden_for_endusers() {
    let h = harness(10, Vec::new());
    let (access, _) = login(&h.app, "alice", "wonderland").await;
    let response = post_empty(
        &h.app,
        "/admin/users/user-alice/revoke-tokens",
        Some(&access),
    )
    .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn admin_can_revoke_another_users_tokens() {
    let h = harness(10, Vec::new());
    let (_, alice_refresh) = login(&h.app, "alice", "wonderland").await;
    let (root_access, _) = login(&h.app, "root", "toor").await;

    let response = post_empty(
        &h.app,
        "/admin/users/user-alice/revoke-tokens",
        Some(&root_access),
    )
    .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked"], 1);

    let response = post_json(
        &h.app,
        "/auth/refresh",
        None,
        json!({"refresh_token": alice_refresh}),
    )
    .await;
    let (status, _) = read_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
