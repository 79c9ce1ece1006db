// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TikTok Display API client and the service that feeds analytics.
//!
//! Handles:
//! - Profile fetching (`/user/info/`)
//! - Paginated video listing (`/video/list/`), bounded by a maximum count
//! - Normalization into `VideoRecord` with hashtag extraction
//! - Short-lived caching of normalized listings per owner
//! - Rate limit and token rejection detection

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::KeyValueCache;
use crate::config::Config;
use crate::db::CredentialRepository;
use crate::error::AppError;
use crate::models::{User, VideoRecord};
use crate::services::credentials::CredentialAccess;

/// Largest page `/video/list/` accepts.
pub const MAX_PAGE_SIZE: u32 = 20;

/// How long a fetched video listing is reused.
pub const VIDEO_CACHE_TTL: Duration = Duration::from_secs(300);

const USER_FIELDS: &str =
    "open_id,union_id,avatar_url,display_name,bio_description,is_verified,follower_count,following_count,likes_count,video_count";
const VIDEO_FIELDS: &str = "id,title,video_description,create_time,cover_image_url,share_url,duration,view_count,like_count,comment_count,share_count";

/// Prefix of every cache key holding videos for `owner_id`.
pub fn video_cache_prefix(owner_id: &str) -> String {
    format!("videos:{}:", owner_id)
}

fn video_cache_key(owner_id: &str) -> String {
    format!("{}all", video_cache_prefix(owner_id))
}

// ─── API types ───────────────────────────────────────────────────────────

/// Envelope every Display API response uses.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct UserData {
    user: TikTokUser,
}

/// TikTok profile as returned by `/user/info/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TikTokUser {
    #[serde(default)]
    pub open_id: String,
    #[serde(default)]
    pub union_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio_description: Option<String>,
    #[serde(default)]
    pub is_verified: Option<bool>,
    #[serde(default)]
    pub follower_count: Option<u64>,
    #[serde(default)]
    pub following_count: Option<u64>,
    #[serde(default)]
    pub likes_count: Option<u64>,
    #[serde(default)]
    pub video_count: Option<u64>,
}

/// One page of `/video/list/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoPage {
    #[serde(default)]
    pub videos: Vec<TikTokVideo>,
    #[serde(default)]
    pub cursor: Option<i64>,
    #[serde(default)]
    pub has_more: bool,
}

/// Video as returned by `/video/list/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TikTokVideo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub video_description: Option<String>,
    #[serde(default)]
    pub create_time: Option<i64>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub share_url: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub comment_count: Option<u64>,
    #[serde(default)]
    pub share_count: Option<u64>,
}

impl From<TikTokVideo> for VideoRecord {
    fn from(video: TikTokVideo) -> Self {
        let description = video
            .video_description
            .filter(|d| !d.is_empty())
            .or(video.title)
            .unwrap_or_default();
        VideoRecord {
            hashtags: extract_hashtags(&description),
            id: video.id,
            created_at: video.create_time.unwrap_or(0),
            view_count: video.view_count.unwrap_or(0),
            like_count: video.like_count.unwrap_or(0),
            comment_count: video.comment_count.unwrap_or(0),
            share_count: video.share_count.unwrap_or(0),
            description,
            duration: video.duration.unwrap_or(0),
            share_url: video.share_url,
            cover_image_url: video.cover_image_url,
            engagement_rate: None,
        }
    }
}

/// `#tag` tokens in `text`, lowercased, first-seen order, no duplicates.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find('#') {
        rest = &rest[pos + 1..];
        let end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let tag = rest[..end].to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
        rest = &rest[end..];
    }
    tags
}

// ─── Client ──────────────────────────────────────────────────────────────

/// Display API client.
#[derive(Clone)]
pub struct TikTokClient {
    http: reqwest::Client,
    base_url: String,
}

impl TikTokClient {
    pub fn new(
        base_url: String,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            config.tiktok_api_base_url.clone(),
            config.http_connect_timeout,
            config.http_timeout,
        )
    }

    /// Get the authenticated user's profile.
    pub async fn user_info(&self, access_token: &str) -> Result<TikTokUser, AppError> {
        let response = self
            .http
            .get(format!("{}/user/info/", self.base_url))
            .bearer_auth(access_token)
            .query(&[("fields", USER_FIELDS)])
            .send()
            .await
            .map_err(|e| AppError::TikTokApi(e.to_string()))?;

        let data: UserData = self.check_response_json(response).await?;
        Ok(data.user)
    }

    /// One page of the user's videos, newest first.
    pub async fn list_videos(
        &self,
        access_token: &str,
        cursor: Option<i64>,
        max_count: u32,
    ) -> Result<VideoPage, AppError> {
        let mut body = serde_json::json!({ "max_count": max_count.clamp(1, MAX_PAGE_SIZE) });
        if let Some(cursor) = cursor {
            body["cursor"] = cursor.into();
        }

        let response = self
            .http
            .post(format!("{}/video/list/", self.base_url))
            .bearer_auth(access_token)
            .query(&[("fields", VIDEO_FIELDS)])
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::TikTokApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Page through videos until exhausted or `limit` are collected.
    pub async fn all_videos(
        &self,
        access_token: &str,
        limit: usize,
    ) -> Result<Vec<TikTokVideo>, AppError> {
        let mut videos = Vec::new();
        let mut cursor = None;

        while videos.len() < limit {
            let remaining = (limit - videos.len()).min(MAX_PAGE_SIZE as usize) as u32;
            let page = self.list_videos(access_token, cursor, remaining).await?;
            let fetched = page.videos.len();
            videos.extend(page.videos);

            if !page.has_more || fetched == 0 {
                break;
            }
            cursor = page.cursor;
        }

        videos.truncate(limit);
        Ok(videos)
    }

    /// Check response status and API error envelope, returning `data`.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();

        if status.as_u16() == 429 {
            tracing::warn!("TikTok rate limit hit (429)");
            return Err(AppError::TikTokApi(AppError::TIKTOK_RATE_LIMIT.to_string()));
        }
        if status.as_u16() == 401 {
            return Err(AppError::TikTokApi(AppError::TIKTOK_TOKEN_ERROR.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::TikTokApi(format!("HTTP {}: {}", status, body)));
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|e| AppError::TikTokApi(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = envelope.error {
            match error.code.as_str() {
                "" | "ok" => {}
                "access_token_invalid" => {
                    return Err(AppError::TikTokApi(AppError::TIKTOK_TOKEN_ERROR.to_string()))
                }
                "rate_limit_exceeded" => {
                    return Err(AppError::TikTokApi(AppError::TIKTOK_RATE_LIMIT.to_string()))
                }
                code => {
                    return Err(AppError::TikTokApi(format!("{}: {}", code, error.message)));
                }
            }
        }

        let data = envelope
            .data
            .ok_or_else(|| AppError::TikTokApi("Response has no data".to_string()))?;
        serde_json::from_value(data)
            .map_err(|e| AppError::TikTokApi(format!("Unexpected response shape: {}", e)))
    }
}

// ─── Service ─────────────────────────────────────────────────────────────

/// Result of a full sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub videos_synced: usize,
    pub profile: TikTokUser,
    pub synced_at: String,
}

/// Per-owner access to TikTok data using vaulted credentials.
pub struct TikTokService {
    client: TikTokClient,
    credentials: Arc<CredentialAccess>,
    cache: Arc<dyn KeyValueCache>,
    db: Arc<dyn CredentialRepository>,
    max_videos: usize,
}

impl TikTokService {
    pub fn new(
        client: TikTokClient,
        credentials: Arc<CredentialAccess>,
        cache: Arc<dyn KeyValueCache>,
        db: Arc<dyn CredentialRepository>,
        max_videos: usize,
    ) -> Self {
        Self {
            client,
            credentials,
            cache,
            db,
            max_videos,
        }
    }

    /// Drop the cached access token when TikTok rejects it.
    fn on_error(&self, owner_id: &str, e: AppError) -> AppError {
        if e.is_tiktok_token_error() {
            tracing::info!(owner_id, "TikTok rejected access token, dropping cached token");
            self.credentials.invalidate(owner_id);
        }
        e
    }

    /// Current TikTok profile.
    pub async fn profile(&self, owner_id: &str) -> Result<TikTokUser, AppError> {
        let token = self.credentials.access_token(owner_id).await?;
        self.client
            .user_info(&token)
            .await
            .map_err(|e| self.on_error(owner_id, e))
    }

    /// Normalized videos, served from cache when fresh.
    pub async fn videos(&self, owner_id: &str) -> Result<Vec<VideoRecord>, AppError> {
        let key = video_cache_key(owner_id);
        if let Some(cached) = self.cache.get(&key).await? {
            match serde_json::from_str(&cached) {
                Ok(videos) => return Ok(videos),
                Err(e) => tracing::warn!(owner_id, error = %e, "Discarding unreadable video cache"),
            }
        }
        self.fetch_and_cache(owner_id).await
    }

    async fn fetch_and_cache(&self, owner_id: &str) -> Result<Vec<VideoRecord>, AppError> {
        let token = self.credentials.access_token(owner_id).await?;
        let videos: Vec<VideoRecord> = self
            .client
            .all_videos(&token, self.max_videos)
            .await
            .map_err(|e| self.on_error(owner_id, e))?
            .into_iter()
            .map(VideoRecord::from)
            .collect();

        match serde_json::to_string(&videos) {
            Ok(value) => {
                if let Err(e) = self
                    .cache
                    .set(&video_cache_key(owner_id), &value, Some(VIDEO_CACHE_TTL))
                    .await
                {
                    tracing::warn!(owner_id, error = %e, "Failed to cache videos");
                }
            }
            Err(e) => tracing::warn!(owner_id, error = %e, "Failed to serialize videos"),
        }

        tracing::debug!(owner_id, count = videos.len(), "Fetched TikTok videos");
        Ok(videos)
    }

    /// Refetch profile and videos, recording profile counters on the user row.
    pub async fn sync(&self, owner_id: &str) -> Result<SyncSummary, AppError> {
        self.cache.clear_by_prefix(&video_cache_prefix(owner_id)).await?;

        let profile = self.profile(owner_id).await?;
        let videos = self.fetch_and_cache(owner_id).await?;
        let now = chrono::Utc::now().to_rfc3339();

        let mut user = self
            .db
            .get_user(owner_id)
            .await?
            .unwrap_or_else(|| User::new(owner_id, &now));
        if !profile.open_id.is_empty() {
            user.tiktok_open_id = Some(profile.open_id.clone());
        }
        user.display_name = profile.display_name.clone();
        user.avatar_url = profile.avatar_url.clone();
        user.follower_count = profile.follower_count;
        user.following_count = profile.following_count;
        user.likes_count = profile.likes_count;
        user.video_count = profile.video_count;
        user.last_synced_at = Some(now.clone());
        user.updated_at = now.clone();
        self.db.upsert_user(&user).await?;

        tracing::info!(owner_id, videos = videos.len(), "TikTok sync complete");

        Ok(SyncSummary {
            videos_synced: videos.len(),
            profile,
            synced_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TikTokClient {
        TikTokClient::new(
            format!("{}/v2", server.uri()),
            Duration::from_secs(1),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn video_json(id: u32) -> serde_json::Value {
        serde_json::json!({
            "id": id.to_string(),
            "video_description": format!("video {} #Fun", id),
            "create_time": 1_700_000_000 + id as i64,
            "view_count": 100 * id,
            "like_count": id,
            "comment_count": 0,
            "share_count": 0,
        })
    }

    fn page(ids: std::ops::Range<u32>, cursor: i64, has_more: bool) -> serde_json::Value {
        serde_json::json!({
            "data": {
                "videos": ids.map(video_json).collect::<Vec<_>>(),
                "cursor": cursor,
                "has_more": has_more,
            },
            "error": { "code": "ok", "message": "" }
        })
    }

    #[test]
    fn test_extract_hashtags() {
        assert_eq!(
            extract_hashtags("Morning run #Fitness #running, again #fitness!#fyp #"),
            vec!["fitness", "running", "fyp"]
        );
        assert!(extract_hashtags("no tags here").is_empty());
        assert_eq!(extract_hashtags("#café_time"), vec!["café_time"]);
    }

    #[test]
    fn test_normalize_keeps_zero_counters() {
        let record = VideoRecord::from(TikTokVideo {
            id: "v".to_string(),
            title: Some("Title #a".to_string()),
            video_description: Some(String::new()),
            create_time: Some(42),
            view_count: Some(0),
            ..Default::default()
        });
        assert_eq!(record.description, "Title #a");
        assert_eq!(record.hashtags, vec!["a"]);
        assert_eq!(record.view_count, 0);
        assert_eq!(record.created_at, 42);
    }

    #[tokio::test]
    async fn test_all_videos_paginates_until_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/video/list/"))
            .and(header("authorization", "Bearer act.1"))
            .and(body_partial_json(serde_json::json!({ "cursor": 111 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(20..40, 222, true)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/video/list/"))
            .and(body_partial_json(serde_json::json!({ "max_count": 20 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(0..20, 111, true)))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let videos = client(&server).all_videos("act.1", 25).await.unwrap();
        assert_eq!(videos.len(), 25);
        assert_eq!(videos[0].id, "0");
        assert_eq!(videos[24].id, "24");
    }

    #[tokio::test]
    async fn test_all_videos_stops_when_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/video/list/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(0..3, 0, false)))
            .expect(1)
            .mount(&server)
            .await;

        let videos = client(&server).all_videos("t", 100).await.unwrap();
        assert_eq!(videos.len(), 3);
    }

    #[tokio::test]
    async fn test_user_info_and_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/user/info/"))
            .and(header("authorization", "Bearer good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "user": { "open_id": "o1", "display_name": "Ada", "follower_count": 7 } },
                "error": { "code": "ok", "message": "" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/user/info/"))
            .and(header("authorization", "Bearer revoked"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/user/info/"))
            .and(header("authorization", "Bearer busy"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let c = client(&server);
        let user = c.user_info("good").await.unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Ada"));
        assert_eq!(user.follower_count, Some(7));

        assert!(c.user_info("revoked").await.unwrap_err().is_tiktok_token_error());
        let busy = c.user_info("busy").await.unwrap_err();
        assert!(matches!(busy, AppError::TikTokApi(msg) if msg == AppError::TIKTOK_RATE_LIMIT));
    }

    #[tokio::test]
    async fn test_error_envelope_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {},
                "error": { "code": "scope_not_authorized", "message": "missing scope" }
            })))
            .mount(&server)
            .await;

        let err = client(&server).user_info("t").await.unwrap_err();
        assert!(matches!(err, AppError::TikTokApi(msg) if msg.contains("scope_not_authorized")));
    }
}
