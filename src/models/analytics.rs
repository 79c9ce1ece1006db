// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Derived analytics returned by the API.
//!
//! Everything here is recomputed from video records on each request and
//! never persisted.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Aggregate engagement over a set of videos.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EngagementMetrics {
    pub total_videos: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_views: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_likes: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_comments: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_shares: u64,
    /// Mean per-video rate over videos with views, 2 decimals
    pub avg_engagement_rate: f64,
    /// Total views / all videos, whole number
    pub avg_views_per_video: f64,
    pub most_viewed_video: Option<VideoHighlight>,
    pub best_engagement_video: Option<VideoHighlight>,
}

/// A single video singled out by an aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct VideoHighlight {
    pub id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub view_count: u64,
    pub engagement_rate: f64,
    /// First 100 characters of the description
    pub description: String,
}

/// Week-over-week growth signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GrowthTrends {
    /// Percent change in views across the recent weeks
    pub weekly_view_trend: f64,
    /// Percent change in mean engagement across the recent weeks
    pub weekly_engagement_trend: f64,
    /// Videos per active week
    pub posting_frequency: f64,
    /// Week key with the most views
    pub best_performing_week: Option<String>,
    /// Every active week, oldest first
    pub weeks: Vec<WeekSummary>,
}

/// Totals for one ISO week bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct WeekSummary {
    /// `YYYY-Www`
    pub week: String,
    pub video_count: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub views: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub likes: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub comments: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub shares: u64,
    pub avg_engagement_rate: f64,
}

/// Totals for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DailyPerformance {
    /// `YYYY-MM-DD`
    pub date: String,
    pub video_count: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_views: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_likes: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_comments: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_shares: u64,
    pub engagement_rate: f64,
}

/// Per-hashtag aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HashtagPerformance {
    pub hashtag: String,
    pub usage_count: u32,
    pub avg_views: f64,
    pub avg_engagement_rate: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_views: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_likes: u64,
}

/// A video row in a top-N listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TopVideo {
    pub video_id: String,
    pub description: String,
    /// ISO 8601
    pub created_at: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub view_count: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub like_count: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub comment_count: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub share_count: u64,
    pub engagement_rate: f64,
    pub share_url: Option<String>,
    pub cover_image_url: Option<String>,
}

/// Recommendation output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Recommendations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_metrics: Option<CurrentMetrics>,
    pub recommendations: Vec<String>,
}

/// Last-30-days snapshot that recommendations are based on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CurrentMetrics {
    pub avg_engagement_rate: f64,
    pub total_videos: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_views: u64,
    pub avg_views_per_video: f64,
}

/// Dashboard summary: all-time engagement, trends and latest videos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AnalyticsSummary {
    pub engagement: EngagementMetrics,
    pub trends: GrowthTrends,
    /// Newest first
    pub recent_videos: Vec<TopVideo>,
}
