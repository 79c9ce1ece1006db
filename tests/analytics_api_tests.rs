// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Analytics and account routes against a mocked TikTok Display API.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{body_json, create_test_app, create_test_app_with, session_token, token_result, TestApp};
use tiktok_insights::config::Config;
use tiktok_insights::db::CredentialRepository;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn authed(method: &str, uri: &str, owner: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", session_token(owner)))
        .body(Body::empty())
        .unwrap()
}

fn recent(days_ago: i64) -> i64 {
    chrono::Utc::now().timestamp() - days_ago * 86400
}

/// Mock TikTok with three recent videos and a profile; returns a connected app.
async fn connected_app(server: &MockServer) -> TestApp {
    let videos = serde_json::json!({
        "data": {
            "videos": [
                {
                    "id": "v1",
                    "video_description": "first #dance",
                    "create_time": recent(1),
                    "view_count": 1000, "like_count": 100, "comment_count": 10, "share_count": 5
                },
                {
                    "id": "v2",
                    "video_description": "second #dance #fyp",
                    "create_time": recent(2),
                    "view_count": 2000, "like_count": 200, "comment_count": 20, "share_count": 10
                },
                {
                    "id": "v3",
                    "video_description": "third",
                    "create_time": recent(40),
                    "view_count": 3000, "like_count": 300, "comment_count": 30, "share_count": 15
                }
            ],
            "cursor": 0,
            "has_more": false
        },
        "error": { "code": "ok", "message": "" }
    });
    Mock::given(method("POST"))
        .and(path("/v2/video/list/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(videos))
        .mount(server)
        .await;

    let profile = serde_json::json!({
        "data": {
            "user": {
                "open_id": "open-123",
                "display_name": "Alice",
                "follower_count": 42,
                "video_count": 3
            }
        },
        "error": { "code": "ok", "message": "" }
    });
    Mock::given(method("GET"))
        .and(path("/v2/user/info/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile))
        .mount(server)
        .await;

    let config = Config {
        tiktok_api_base_url: format!("{}/v2", server.uri()),
        ..Config::default()
    };
    let app = create_test_app_with(config);
    app.state
        .credentials
        .store("alice", &token_result("alice-token"))
        .await
        .unwrap();
    app
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();
    let response = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_api_requires_session() {
    let app = create_test_app();
    let response = app
        .send(
            Request::builder()
                .uri("/api/analytics/summary")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "unauthorized");

    let expired = common::signed_token("alice", -3600);
    let response = app
        .send(
            Request::builder()
                .uri("/api/analytics/summary")
                .header(header::COOKIE, format!("tiktok_insights_token={}", expired))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_not_connected() {
    let app = create_test_app();
    let response = app
        .send(authed("GET", "/api/analytics/engagement", "nobody"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "tiktok_not_connected");
    assert_eq!(json["step"], "credential_access");
}

#[tokio::test]
async fn test_engagement_over_period() {
    let server = MockServer::start().await;
    let app = connected_app(&server).await;

    let response = app
        .send(authed("GET", "/api/analytics/engagement?days=365", "alice"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total_videos"], 3);
    assert_eq!(json["total_views"], 6000);
    assert_eq!(json["avg_engagement_rate"], 11.5);
    assert_eq!(json["avg_views_per_video"], 2000.0);
    assert_eq!(json["most_viewed_video"]["id"], "v3");

    let response = app
        .send(authed("GET", "/api/analytics/engagement?days=7", "alice"))
        .await;
    let json = body_json(response).await;
    assert_eq!(json["total_videos"], 2);
    assert_eq!(json["total_views"], 3000);
}

#[tokio::test]
async fn test_query_validation() {
    let server = MockServer::start().await;
    let app = connected_app(&server).await;

    for uri in [
        "/api/analytics/engagement?days=0",
        "/api/analytics/trends?days=3",
        "/api/analytics/hashtags?limit=101",
        "/api/analytics/top-videos?limit=51",
        "/api/analytics/daily?days=31",
    ] {
        let response = app.send(authed("GET", uri, "alice")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[tokio::test]
async fn test_hashtags_and_top_videos() {
    let server = MockServer::start().await;
    let app = connected_app(&server).await;

    let response = app
        .send(authed("GET", "/api/analytics/hashtags", "alice"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let tags = json.as_array().unwrap();
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[0]["hashtag"], "fyp");
    assert_eq!(tags[0]["avg_views"], 2000.0);
    assert_eq!(tags[1]["hashtag"], "dance");
    assert_eq!(tags[1]["usage_count"], 2);

    let response = app
        .send(authed(
            "GET",
            "/api/analytics/top-videos?metric=likes&limit=1",
            "alice",
        ))
        .await;
    let json = body_json(response).await;
    let top = json.as_array().unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0]["video_id"], "v3");
}

#[tokio::test]
async fn test_recommendations_and_summary() {
    let server = MockServer::start().await;
    let app = connected_app(&server).await;

    let response = app
        .send(authed("GET", "/api/analytics/recommendations", "alice"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["current_metrics"]["total_videos"], 2);
    assert_eq!(json["current_metrics"]["total_views"], 3000);
    let messages = json["recommendations"].as_array().unwrap();
    assert!(messages[0]
        .as_str()
        .unwrap()
        .starts_with("You posted only 2 videos"));

    let response = app
        .send(authed("GET", "/api/analytics/summary", "alice"))
        .await;
    let json = body_json(response).await;
    assert_eq!(json["engagement"]["total_videos"], 3);
    assert_eq!(json["recent_videos"][0]["video_id"], "v1");
}

#[tokio::test]
async fn test_videos_are_cached_between_requests() {
    let server = MockServer::start().await;
    let app = connected_app(&server).await;

    for _ in 0..3 {
        let response = app
            .send(authed("GET", "/api/analytics/summary", "alice"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let listings = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/v2/video/list/")
        .count();
    assert_eq!(listings, 1);
}

#[tokio::test]
async fn test_sync_records_profile() {
    let server = MockServer::start().await;
    let app = connected_app(&server).await;

    let response = app.send(authed("POST", "/api/tiktok/sync", "alice")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["videos_synced"], 3);
    assert_eq!(json["profile"]["display_name"], "Alice");

    let user = app.db.get_user("alice").await.unwrap().unwrap();
    assert_eq!(user.follower_count, Some(42));
    assert!(user.last_synced_at.is_some());
}

#[tokio::test]
async fn test_disconnect() {
    let server = MockServer::start().await;
    let app = connected_app(&server).await;

    let response = app
        .send(authed("DELETE", "/api/tiktok/connection", "alice"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(authed("GET", "/api/tiktok/profile", "alice"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "tiktok_not_connected");

    let response = app
        .send(authed("DELETE", "/api/tiktok/connection", "nobody"))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rejected_token_surfaces_as_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/user/info/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let config = Config {
        tiktok_api_base_url: format!("{}/v2", server.uri()),
        ..Config::default()
    };
    let app = create_test_app_with(config);
    app.state
        .credentials
        .store("alice", &token_result("alice-token"))
        .await
        .unwrap();

    let response = app
        .send(authed("GET", "/api/tiktok/profile", "alice"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"], "tiktok_error");
}
