// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end tests for the authorize -> callback flow.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{body_json, create_test_app, session_token, TestApp};
use std::sync::atomic::Ordering;
use tiktok_insights::cache::KeyValueCache;
use tiktok_insights::db::CredentialRepository;
use tiktok_insights::models::TIKTOK_PROVIDER;
use tiktok_insights::services::pkce::challenge_for;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Run the authorize route for `owner` and return the issued state.
async fn start_authorization(app: &TestApp, owner: &str) -> String {
    let response = app
        .send(
            Request::builder()
                .uri("/auth/tiktok/authorize")
                .header(header::AUTHORIZATION, format!("Bearer {}", session_token(owner)))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    json["state"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_authorize_builds_pkce_url_and_stores_request() {
    let app = create_test_app();
    let response = app
        .send(
            Request::builder()
                .uri("/auth/tiktok/authorize")
                .header(header::AUTHORIZATION, format!("Bearer {}", session_token("alice")))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let state = json["state"].as_str().unwrap();
    let url = json["authorization_url"].as_str().unwrap();

    assert_eq!(state.len(), 22);
    assert!(url.starts_with("https://www.tiktok.com/v2/auth/authorize/?client_key=test_client_key&"));
    assert!(url.contains("scope=user.info.basic%20video.list"));
    assert!(url.contains("response_type=code"));
    assert!(url.contains(&format!("state={}", state)));
    assert!(url.ends_with("code_challenge_method=S256"));

    let pending = app.state.pending.get(state).await.unwrap().unwrap();
    assert_eq!(pending.owner_id, "alice");
    assert_eq!(pending.code_verifier.len(), 43);
    assert!(url.contains(&format!("code_challenge={}", challenge_for(&pending.code_verifier))));
}

#[tokio::test]
async fn test_authorize_requires_session() {
    let app = create_test_app();
    let response = app.send(get("/auth/tiktok/authorize")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_each_attempt_gets_fresh_state() {
    let app = create_test_app();
    let first = start_authorization(&app, "alice").await;
    let second = start_authorization(&app, "alice").await;
    assert_ne!(first, second);
    assert!(app.state.pending.get(&first).await.unwrap().is_some());
    assert!(app.state.pending.get(&second).await.unwrap().is_some());
}

#[tokio::test]
async fn test_numeric_challenge_has_no_side_effects() {
    let app = create_test_app();
    let state = start_authorization(&app, "alice").await;

    let response = app.send(get("/auth/tiktok/callback?challenge=12345")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({ "challenge": 12345 }));

    assert_eq!(app.tokens.exchanges.load(Ordering::SeqCst), 0);
    assert_eq!(app.db.credential_count(), 0);
    assert!(app.state.pending.get(&state).await.unwrap().is_some());
}

#[tokio::test]
async fn test_challenge_in_json_body() {
    let app = create_test_app();
    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/auth/tiktok/callback")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"challenge":"verify-me"}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({ "challenge": "verify-me" }));
}

#[tokio::test]
async fn test_bare_callback_is_idle() {
    let app = create_test_app();
    let response = app.send(get("/auth/tiktok/callback")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "TikTok callback endpoint is active.");
    assert_eq!(app.tokens.exchanges.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_successful_connection() {
    let app = create_test_app();
    app.cache
        .set("videos:alice:all", "[]", None)
        .await
        .unwrap();
    let state = start_authorization(&app, "alice").await;

    let response = app
        .send(get(&format!("/auth/tiktok/callback?code=auth-code&state={}", state)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["open_id"], "open-123");
    assert_eq!(json["user_id"], "alice");

    assert_eq!(app.tokens.exchanges.load(Ordering::SeqCst), 1);
    let credential = app
        .db
        .get_active_credential("alice", TIKTOK_PROVIDER)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(credential.access_token_encrypted, "access-1");
    assert_eq!(credential.scopes, vec!["user.info.basic", "video.list"]);

    // Reconnecting invalidates previously fetched videos.
    assert_eq!(app.cache.get("videos:alice:all").await.unwrap(), None);
    // State is single-use.
    assert!(app.state.pending.get(&state).await.unwrap().is_none());

    let user = app.db.get_user("alice").await.unwrap().unwrap();
    assert_eq!(user.tiktok_open_id.as_deref(), Some("open-123"));
}

#[tokio::test]
async fn test_replayed_state_is_rejected_without_exchange() {
    let app = create_test_app();
    let state = start_authorization(&app, "alice").await;
    let uri = format!("/auth/tiktok/callback?code=auth-code&state={}", state);

    let first = app.send(get(&uri)).await;
    assert_eq!(first.status(), StatusCode::OK);
    let stored = app
        .db
        .get_credential("alice", TIKTOK_PROVIDER)
        .await
        .unwrap()
        .unwrap();

    let replay = app.send(get(&uri)).await;
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    let json = body_json(replay).await;
    assert_eq!(json["error"], "invalid_or_expired_state");
    assert_eq!(json["step"], "state_validation");

    assert_eq!(app.tokens.exchanges.load(Ordering::SeqCst), 1);
    let after = app
        .db
        .get_credential("alice", TIKTOK_PROVIDER)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after, stored);
    assert_eq!(app.db.credential_count(), 1);
}

#[tokio::test]
async fn test_unknown_state_creates_nothing() {
    let app = create_test_app();
    let response = app
        .send(get("/auth/tiktok/callback?code=auth-code&state=never-issued"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_or_expired_state");
    assert_eq!(app.tokens.exchanges.load(Ordering::SeqCst), 0);
    assert_eq!(app.db.credential_count(), 0);
}

#[tokio::test]
async fn test_provider_error_is_reported() {
    let app = create_test_app();
    let state = start_authorization(&app, "alice").await;
    let response = app
        .send(get(&format!(
            "/auth/tiktok/callback?error=access_denied&error_description=User+cancelled&state={}",
            state
        )))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "provider_authorization_error");
    assert_eq!(json["step"], "authorization");
    assert_eq!(json["details"], "access_denied: User cancelled");
    assert_eq!(app.tokens.exchanges.load(Ordering::SeqCst), 0);
    assert_eq!(app.db.credential_count(), 0);
}

#[tokio::test]
async fn test_half_a_code_state_pair_is_bad_request() {
    let app = create_test_app();
    let response = app.send(get("/auth/tiktok/callback?code=auth-code")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "bad_request");
}

#[tokio::test]
async fn test_failed_exchange_consumes_state_and_stores_nothing() {
    let app = create_test_app();
    app.tokens.fail.store(true, Ordering::SeqCst);
    let state = start_authorization(&app, "alice").await;
    let uri = format!("/auth/tiktok/callback?code=auth-code&state={}", state);

    let response = app.send(get(&uri)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["error"], "token_exchange_failed");
    assert_eq!(json["step"], "code_exchange");
    assert_eq!(app.db.credential_count(), 0);

    app.tokens.fail.store(false, Ordering::SeqCst);
    let retry = app.send(get(&uri)).await;
    assert_eq!(retry.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.tokens.exchanges.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reused_code_fails_upstream_and_keeps_credential() {
    let app = create_test_app();
    let state = start_authorization(&app, "alice").await;
    let response = app
        .send(get(&format!("/auth/tiktok/callback?code=one-time&state={}", state)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let stored = app
        .db
        .get_credential("alice", TIKTOK_PROVIDER)
        .await
        .unwrap()
        .unwrap();

    // Fresh state, same code: the token endpoint rejects the reused code.
    let state = start_authorization(&app, "alice").await;
    app.tokens.fail.store(true, Ordering::SeqCst);
    let response = app
        .send(get(&format!("/auth/tiktok/callback?code=one-time&state={}", state)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["error"], "token_exchange_failed");
    assert_eq!(json["step"], "code_exchange");

    assert_eq!(app.tokens.exchanges.load(Ordering::SeqCst), 2);
    let after = app
        .db
        .get_credential("alice", TIKTOK_PROVIDER)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after, stored);
    assert_eq!(app.db.credential_count(), 1);
    assert_eq!(
        app.state.credentials.access_token("alice").await.unwrap(),
        "access-1"
    );
}

#[tokio::test]
async fn test_form_post_callback() {
    let app = create_test_app();
    let state = start_authorization(&app, "bob").await;
    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/auth/tiktok/callback")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!("code=auth-code&state={}", state)))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user_id"], "bob");
    assert_eq!(app.db.credential_count(), 1);
}

#[tokio::test]
async fn test_reconnect_replaces_credential_in_place() {
    let app = create_test_app();
    for _ in 0..2 {
        let state = start_authorization(&app, "alice").await;
        let response = app
            .send(get(&format!("/auth/tiktok/callback?code=c&state={}", state)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(app.db.credential_count(), 1);
    assert_eq!(
        app.state.credentials.access_token("alice").await.unwrap(),
        "access-2"
    );
}
