// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    AnalyticsSummary, DailyPerformance, EngagementMetrics, GrowthTrends, HashtagPerformance,
    Recommendations, TopVideo,
};
use crate::services::analytics::{within_days, TopMetric};
use crate::services::tiktok::{SyncSummary, TikTokUser};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tiktok/profile", get(get_profile))
        .route("/api/tiktok/sync", post(sync))
        .route("/api/tiktok/connection", delete(disconnect))
        .route("/api/analytics/summary", get(get_summary))
        .route("/api/analytics/engagement", get(get_engagement))
        .route("/api/analytics/trends", get(get_trends))
        .route("/api/analytics/hashtags", get(get_hashtags))
        .route("/api/analytics/top-videos", get(get_top_videos))
        .route("/api/analytics/daily", get(get_daily))
        .route("/api/analytics/recommendations", get(get_recommendations))
}

fn validated<T: Validate>(query: T) -> Result<T> {
    query
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(query)
}

// ─── TikTok Account ──────────────────────────────────────────

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TikTokUser>> {
    Ok(Json(state.tiktok.profile(&user.owner_id).await?))
}

/// Refetch everything from TikTok.
async fn sync(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SyncSummary>> {
    tracing::info!(owner_id = %user.owner_id, "User-initiated sync");
    Ok(Json(state.tiktok.sync(&user.owner_id).await?))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DisconnectResponse {
    pub success: bool,
    pub message: String,
}

/// Deactivate the stored credential and drop cached data.
async fn disconnect(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DisconnectResponse>> {
    let removed = state.credentials.disconnect(&user.owner_id).await?;
    if !removed {
        return Err(AppError::NotFound("No TikTok connection".to_string()));
    }

    if let Err(e) = state
        .cache
        .clear_by_prefix(&crate::services::tiktok::video_cache_prefix(&user.owner_id))
        .await
    {
        tracing::warn!(owner_id = %user.owner_id, error = %e, "Failed to clear video cache");
    }

    tracing::info!(owner_id = %user.owner_id, "TikTok account disconnected");
    Ok(Json(DisconnectResponse {
        success: true,
        message: "TikTok account disconnected".to_string(),
    }))
}

// ─── Analytics ───────────────────────────────────────────────

async fn get_summary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<AnalyticsSummary>> {
    let videos = state.tiktok.videos(&user.owner_id).await?;
    Ok(Json(state.aggregator.summary(&videos)))
}

#[derive(Deserialize, Validate)]
struct EngagementQuery {
    #[serde(default = "default_engagement_days")]
    #[validate(range(min = 1, max = 365))]
    days: u32,
}

fn default_engagement_days() -> u32 {
    30
}

async fn get_engagement(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<EngagementQuery>,
) -> Result<Json<EngagementMetrics>> {
    let params = validated(params)?;
    let videos = state.tiktok.videos(&user.owner_id).await?;
    let mut recent = within_days(&videos, params.days, Utc::now());
    Ok(Json(state.aggregator.engagement(&mut recent)))
}

#[derive(Deserialize, Validate)]
struct TrendsQuery {
    #[serde(default = "default_trend_days")]
    #[validate(range(min = 7, max = 365))]
    days: u32,
}

fn default_trend_days() -> u32 {
    90
}

async fn get_trends(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<TrendsQuery>,
) -> Result<Json<GrowthTrends>> {
    let params = validated(params)?;
    let videos = state.tiktok.videos(&user.owner_id).await?;
    let recent = within_days(&videos, params.days, Utc::now());
    Ok(Json(state.aggregator.growth_trends(&recent)))
}

#[derive(Deserialize, Validate)]
struct HashtagsQuery {
    #[serde(default = "default_hashtag_limit")]
    #[validate(range(min = 1, max = 100))]
    limit: usize,
}

fn default_hashtag_limit() -> usize {
    20
}

async fn get_hashtags(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HashtagsQuery>,
) -> Result<Json<Vec<HashtagPerformance>>> {
    let params = validated(params)?;
    let videos = state.tiktok.videos(&user.owner_id).await?;
    Ok(Json(
        state.aggregator.hashtag_performance(&videos, params.limit),
    ))
}

#[derive(Deserialize, Validate)]
struct TopVideosQuery {
    #[serde(default)]
    metric: TopMetric,
    #[serde(default = "default_top_limit")]
    #[validate(range(min = 1, max = 50))]
    limit: usize,
}

fn default_top_limit() -> usize {
    10
}

async fn get_top_videos(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<TopVideosQuery>,
) -> Result<Json<Vec<TopVideo>>> {
    let params = validated(params)?;
    let videos = state.tiktok.videos(&user.owner_id).await?;
    Ok(Json(state.aggregator.top_videos(
        &videos,
        params.metric,
        params.limit,
    )))
}

#[derive(Deserialize, Validate)]
struct DailyQuery {
    #[serde(default = "default_daily_days")]
    #[validate(range(min = 1, max = 30))]
    days: u32,
}

fn default_daily_days() -> u32 {
    7
}

async fn get_daily(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<DailyQuery>,
) -> Result<Json<Vec<DailyPerformance>>> {
    let params = validated(params)?;
    let videos = state.tiktok.videos(&user.owner_id).await?;
    let recent = within_days(&videos, params.days, Utc::now());
    Ok(Json(state.aggregator.daily_performance(&recent)))
}

async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Recommendations>> {
    let videos = state.tiktok.videos(&user.owner_id).await?;
    Ok(Json(state.aggregator.recommendations(&videos, Utc::now())))
}
