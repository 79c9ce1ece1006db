// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tiktok_insights::cache::MemoryCache;
use tiktok_insights::config::Config;
use tiktok_insights::db::MemoryDb;
use tiktok_insights::error::AppError;
use tiktok_insights::middleware::auth::Claims;
use tiktok_insights::routes::create_router;
use tiktok_insights::services::{TokenProvider, TokenResult};
use tiktok_insights::AppState;
use tower::ServiceExt;

/// Token endpoint stand-in that counts calls.
#[allow(dead_code)]
#[derive(Default)]
pub struct StubTokenProvider {
    pub exchanges: AtomicUsize,
    pub refreshes: AtomicUsize,
    pub fail: AtomicBool,
}

impl StubTokenProvider {
    fn issue(&self, n: usize) -> Result<TokenResult, AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::TokenExchangeFailed {
                status: Some(400),
                body: r#"{"error":"invalid_grant"}"#.to_string(),
            });
        }
        Ok(token_result(&format!("access-{}", n)))
    }
}

#[async_trait]
impl TokenProvider for StubTokenProvider {
    async fn exchange(&self, _code: &str, _code_verifier: &str) -> Result<TokenResult, AppError> {
        let n = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        self.issue(n)
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenResult, AppError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        self.issue(1000 + n)
    }
}

/// A day-long token pair for `access_token`.
#[allow(dead_code)]
pub fn token_result(access_token: &str) -> TokenResult {
    TokenResult {
        access_token: access_token.to_string(),
        refresh_token: format!("refresh-for-{}", access_token),
        open_id: "open-123".to_string(),
        scope: "user.info.basic,video.list".to_string(),
        expires_in: 86400,
        refresh_expires_in: 86400 * 365,
        token_type: "Bearer".to_string(),
    }
}

/// Offline app plus handles on its in-memory dependencies.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub db: Arc<MemoryDb>,
    pub cache: Arc<MemoryCache>,
    pub tokens: Arc<StubTokenProvider>,
}

impl TestApp {
    /// Send one request through a fresh clone of the router.
    #[allow(dead_code)]
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Create a test app with in-memory dependencies.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(Config::default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> TestApp {
    let db = Arc::new(MemoryDb::new());
    let cache = Arc::new(MemoryCache::new());
    let tokens = Arc::new(StubTokenProvider::default());

    let state = Arc::new(
        AppState::new(config, db.clone(), cache.clone(), tokens.clone())
            .expect("test app state"),
    );

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
        cache,
        tokens,
    }
}

/// Session JWT for `owner_id`, signed with the test key.
#[allow(dead_code)]
pub fn session_token(owner_id: &str) -> String {
    signed_token(owner_id, 3600)
}

/// Session JWT whose expiry is `ttl_secs` from now (negative for expired).
#[allow(dead_code)]
pub fn signed_token(owner_id: &str, ttl_secs: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: owner_id.to_string(),
        iat: now as usize,
        exp: (now + ttl_secs) as usize,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(&Config::default().jwt_signing_key),
    )
    .unwrap()
}

/// Collect a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> tiktok_insights::db::FirestoreDb {
    tiktok_insights::db::FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}
