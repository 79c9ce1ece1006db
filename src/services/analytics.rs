// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Metrics aggregator: engagement, growth trends, hashtags and
//! recommendations computed from video records.
//!
//! Everything here is a pure function of its inputs (plus the configured
//! timezone and the caller-supplied "now"), so results are recomputed on
//! each request.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::models::{
    AnalyticsSummary, CurrentMetrics, DailyPerformance, EngagementMetrics, GrowthTrends,
    HashtagPerformance, Recommendations, TopVideo, VideoHighlight, VideoRecord, WeekSummary,
};
use crate::time_utils::{format_utc_rfc3339, local_hour, local_time, week_bucket_key};

/// Weeks considered for trend percentages.
const RECENT_WEEKS: usize = 4;
/// Window recommendations look at.
const RECOMMENDATION_WINDOW_DAYS: u32 = 30;
/// Below this mean engagement (percent) we suggest more interaction.
const LOW_ENGAGEMENT_THRESHOLD: f64 = 5.0;
/// Below this many videos per window we suggest posting more.
const LOW_POSTING_THRESHOLD: usize = 10;
const HIGHLIGHT_DESCRIPTION_CHARS: usize = 100;
const SUMMARY_RECENT_VIDEOS: usize = 10;

pub const NO_DATA_MESSAGE: &str =
    "Not enough data yet. Sync your TikTok account and publish a few videos.";
pub const HASHTAGS_GOOD_MESSAGE: &str =
    "Your hashtag usage looks good. Review your top hashtags and reuse them on similar content.";
pub const HASHTAGS_MISSING_MESSAGE: &str =
    "Your videos carry no hashtags. Adding relevant hashtags can widen your reach.";

/// Metric to rank videos by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopMetric {
    #[default]
    Views,
    Likes,
    Comments,
    Shares,
    Engagement,
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Mean of the first half against mean of the second half, in percent.
///
/// The split is at `len / 2`. A zero first half yields 100 when the second
/// half is positive, else 0.
pub fn trend_percentage(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mid = values.len() / 2;
    let (first, second) = values.split_at(mid);
    let first_avg = first.iter().sum::<f64>() / first.len() as f64;
    let second_avg = second.iter().sum::<f64>() / second.len() as f64;

    if first_avg == 0.0 {
        return if second_avg > 0.0 { 100.0 } else { 0.0 };
    }
    (second_avg - first_avg) / first_avg * 100.0
}

/// Videos created at or after `now - days`.
pub fn within_days(videos: &[VideoRecord], days: u32, now: DateTime<Utc>) -> Vec<VideoRecord> {
    let since = (now - Duration::days(i64::from(days))).timestamp();
    videos
        .iter()
        .filter(|v| v.created_at >= since)
        .cloned()
        .collect()
}

#[derive(Default)]
struct Totals {
    count: u32,
    views: u64,
    likes: u64,
    comments: u64,
    shares: u64,
    /// Sum of per-video engagement rates
    engagement_sum: f64,
}

impl Totals {
    fn add(&mut self, video: &VideoRecord) {
        self.count += 1;
        self.views += video.view_count;
        self.likes += video.like_count;
        self.comments += video.comment_count;
        self.shares += video.share_count;
        self.engagement_sum += video.compute_engagement_rate();
    }

    fn interactions(&self) -> u64 {
        self.likes + self.comments + self.shares
    }

    /// Aggregate interactions over aggregate views.
    fn pooled_engagement(&self) -> f64 {
        if self.views == 0 {
            0.0
        } else {
            self.interactions() as f64 * 100.0 / self.views as f64
        }
    }

    fn mean_engagement(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.engagement_sum / f64::from(self.count)
        }
    }
}

/// Computes analytics with hours and weeks in one timezone.
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    tz: Tz,
}

impl MetricsAggregator {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Engagement metrics. Annotates each video with its `engagement_rate`.
    pub fn engagement(&self, videos: &mut [VideoRecord]) -> EngagementMetrics {
        if videos.is_empty() {
            return EngagementMetrics::default();
        }

        let mut totals = Totals::default();
        let mut rated = 0u32;
        let mut rated_sum = 0.0;
        for video in videos.iter_mut() {
            let rate = video.compute_engagement_rate();
            video.engagement_rate = Some(rate);
            totals.add(video);
            if video.view_count > 0 {
                rated += 1;
                rated_sum += rate;
            }
        }

        let avg_engagement_rate = if rated == 0 {
            0.0
        } else {
            rated_sum / f64::from(rated)
        };

        // Strict comparisons keep the first occurrence on ties.
        let mut most_viewed = &videos[0];
        let mut best_engagement = &videos[0];
        for video in videos.iter() {
            if video.view_count > most_viewed.view_count {
                most_viewed = video;
            }
            if video.engagement_rate > best_engagement.engagement_rate {
                best_engagement = video;
            }
        }

        EngagementMetrics {
            total_videos: totals.count,
            total_views: totals.views,
            total_likes: totals.likes,
            total_comments: totals.comments,
            total_shares: totals.shares,
            avg_engagement_rate: round_to(avg_engagement_rate, 2),
            avg_views_per_video: round_to(totals.views as f64 / f64::from(totals.count), 0),
            most_viewed_video: Some(highlight(most_viewed)),
            best_engagement_video: Some(highlight(best_engagement)),
        }
    }

    /// Week-bucketed growth signals.
    pub fn growth_trends(&self, videos: &[VideoRecord]) -> GrowthTrends {
        if videos.len() < 2 {
            return GrowthTrends::default();
        }

        let mut weeks: BTreeMap<String, Totals> = BTreeMap::new();
        // A zero timestamp means the creation time is unknown.
        for video in videos.iter().filter(|v| v.created_at != 0) {
            weeks
                .entry(week_bucket_key(video.created_at, self.tz))
                .or_default()
                .add(video);
        }

        let recent: Vec<&Totals> = weeks
            .values()
            .skip(weeks.len().saturating_sub(RECENT_WEEKS))
            .collect();

        let (weekly_view_trend, weekly_engagement_trend) = if recent.len() >= 2 {
            let views: Vec<f64> = recent.iter().map(|w| w.views as f64).collect();
            let engagement: Vec<f64> = recent.iter().map(|w| w.mean_engagement()).collect();
            (trend_percentage(&views), trend_percentage(&engagement))
        } else {
            (0.0, 0.0)
        };

        let posting_frequency = if weeks.is_empty() {
            0.0
        } else {
            videos.len() as f64 / weeks.len() as f64
        };

        // Keys iterate oldest first, so strict `>` keeps the earliest week.
        let mut best: Option<(&String, u64)> = None;
        for (key, totals) in &weeks {
            if best.map_or(true, |(_, views)| totals.views > views) {
                best = Some((key, totals.views));
            }
        }

        GrowthTrends {
            weekly_view_trend: round_to(weekly_view_trend, 2),
            weekly_engagement_trend: round_to(weekly_engagement_trend, 2),
            posting_frequency: round_to(posting_frequency, 2),
            best_performing_week: best.map(|(key, _)| key.clone()),
            weeks: weeks
                .iter()
                .map(|(key, w)| WeekSummary {
                    week: key.clone(),
                    video_count: w.count,
                    views: w.views,
                    likes: w.likes,
                    comments: w.comments,
                    shares: w.shares,
                    avg_engagement_rate: round_to(w.mean_engagement(), 2),
                })
                .collect(),
        }
    }

    /// Per-day totals, oldest first.
    pub fn daily_performance(&self, videos: &[VideoRecord]) -> Vec<DailyPerformance> {
        let mut days: BTreeMap<String, Totals> = BTreeMap::new();
        for video in videos.iter().filter(|v| v.created_at != 0) {
            let date = local_time(video.created_at, self.tz)
                .format("%Y-%m-%d")
                .to_string();
            days.entry(date).or_default().add(video);
        }

        days.into_iter()
            .map(|(date, d)| DailyPerformance {
                date,
                video_count: d.count,
                total_views: d.views,
                total_likes: d.likes,
                total_comments: d.comments,
                total_shares: d.shares,
                engagement_rate: round_to(d.pooled_engagement(), 2),
            })
            .collect()
    }

    /// Per-hashtag performance, best average views first.
    pub fn hashtag_performance(&self, videos: &[VideoRecord], limit: usize) -> Vec<HashtagPerformance> {
        let mut order: Vec<String> = Vec::new();
        let mut stats: HashMap<String, Totals> = HashMap::new();

        for video in videos {
            let mut seen = HashSet::new();
            for tag in &video.hashtags {
                if !seen.insert(tag.as_str()) {
                    continue;
                }
                if !stats.contains_key(tag) {
                    order.push(tag.clone());
                }
                stats.entry(tag.clone()).or_default().add(video);
            }
        }

        let mut result: Vec<HashtagPerformance> = order
            .into_iter()
            .filter_map(|tag| {
                let s = stats.remove(&tag)?;
                Some(HashtagPerformance {
                    usage_count: s.count,
                    avg_views: round_to(s.views as f64 / f64::from(s.count), 0),
                    avg_engagement_rate: round_to(s.pooled_engagement(), 2),
                    total_views: s.views,
                    total_likes: s.likes,
                    hashtag: tag,
                })
            })
            .collect();

        // Stable: first-seen order survives among equal averages.
        result.sort_by(|a, b| b.avg_views.total_cmp(&a.avg_views));
        result.truncate(limit);
        result
    }

    /// Rule-based suggestions from the last 30 days of videos.
    pub fn recommendations(&self, videos: &[VideoRecord], now: DateTime<Utc>) -> Recommendations {
        let recent = within_days(videos, RECOMMENDATION_WINDOW_DAYS, now);
        if recent.is_empty() {
            return Recommendations {
                current_metrics: None,
                recommendations: vec![NO_DATA_MESSAGE.to_string()],
            };
        }

        let mut messages = Vec::new();
        let count = recent.len();

        // Zero-view videos count toward this mean.
        let avg_engagement =
            recent.iter().map(VideoRecord::compute_engagement_rate).sum::<f64>() / count as f64;
        if avg_engagement < LOW_ENGAGEMENT_THRESHOLD {
            messages.push(format!(
                "Your engagement rate is low ({:.1}%). Try interacting more with your audience.",
                avg_engagement
            ));
        }

        if count < LOW_POSTING_THRESHOLD {
            messages.push(format!(
                "You posted only {} videos in the last 30 days. Posting more often is recommended.",
                count
            ));
        }

        if let Some(hour) = self.best_posting_hour(&recent) {
            messages.push(format!(
                "Your best performing posting time: {:02}:00\u{2013}{:02}:00",
                hour,
                hour + 1
            ));
        }

        if recent.iter().any(|v| !v.hashtags.is_empty()) {
            messages.push(HASHTAGS_GOOD_MESSAGE.to_string());
        } else {
            messages.push(HASHTAGS_MISSING_MESSAGE.to_string());
        }

        let total_views: u64 = recent.iter().map(|v| v.view_count).sum();
        Recommendations {
            current_metrics: Some(CurrentMetrics {
                avg_engagement_rate: round_to(avg_engagement, 2),
                total_videos: count as u32,
                total_views,
                avg_views_per_video: round_to(total_views as f64 / count as f64, 0),
            }),
            recommendations: messages,
        }
    }

    /// Hour with the highest views per video; earliest-seen hour wins ties.
    fn best_posting_hour(&self, videos: &[VideoRecord]) -> Option<u32> {
        let mut hours: Vec<(u32, u64, u64)> = Vec::new();
        for video in videos {
            let hour = local_hour(video.created_at, self.tz);
            match hours.iter_mut().find(|(h, _, _)| *h == hour) {
                Some((_, count, views)) => {
                    *count += 1;
                    *views += video.view_count;
                }
                None => hours.push((hour, 1, video.view_count)),
            }
        }

        let mut best: Option<(u32, f64)> = None;
        for (hour, count, views) in hours {
            let avg = views as f64 / count as f64;
            if best.map_or(true, |(_, top)| avg > top) {
                best = Some((hour, avg));
            }
        }
        best.map(|(hour, _)| hour)
    }

    /// Top `limit` videos by `metric`, ties in input order.
    pub fn top_videos(&self, videos: &[VideoRecord], metric: TopMetric, limit: usize) -> Vec<TopVideo> {
        let mut ranked: Vec<&VideoRecord> = videos.iter().collect();
        ranked.sort_by(|a, b| match metric {
            TopMetric::Views => b.view_count.cmp(&a.view_count),
            TopMetric::Likes => b.like_count.cmp(&a.like_count),
            TopMetric::Comments => b.comment_count.cmp(&a.comment_count),
            TopMetric::Shares => b.share_count.cmp(&a.share_count),
            TopMetric::Engagement => b
                .compute_engagement_rate()
                .total_cmp(&a.compute_engagement_rate()),
        });
        ranked.into_iter().take(limit).map(top_video).collect()
    }

    /// Engagement and trends over everything plus the newest videos.
    pub fn summary(&self, videos: &[VideoRecord]) -> AnalyticsSummary {
        let mut all = videos.to_vec();
        let engagement = self.engagement(&mut all);
        let trends = self.growth_trends(&all);

        let mut newest: Vec<&VideoRecord> = all.iter().collect();
        newest.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        AnalyticsSummary {
            engagement,
            trends,
            recent_videos: newest
                .into_iter()
                .take(SUMMARY_RECENT_VIDEOS)
                .map(top_video)
                .collect(),
        }
    }
}

fn highlight(video: &VideoRecord) -> VideoHighlight {
    VideoHighlight {
        id: video.id.clone(),
        view_count: video.view_count,
        engagement_rate: round_to(video.compute_engagement_rate(), 2),
        description: truncate_chars(&video.description, HIGHLIGHT_DESCRIPTION_CHARS),
    }
}

fn top_video(video: &VideoRecord) -> TopVideo {
    let created_at = DateTime::<Utc>::from_timestamp(video.created_at, 0)
        .map(format_utc_rfc3339)
        .unwrap_or_default();
    TopVideo {
        video_id: video.id.clone(),
        description: video.description.clone(),
        created_at,
        view_count: video.view_count,
        like_count: video.like_count,
        comment_count: video.comment_count,
        share_count: video.share_count,
        engagement_rate: round_to(video.compute_engagement_rate(), 2),
        share_url: video.share_url.clone(),
        cover_image_url: video.cover_image_url.clone(),
    }
}
