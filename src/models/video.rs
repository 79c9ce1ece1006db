// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Normalized video record fed to the metrics aggregator.

use serde::{Deserialize, Serialize};

/// One video with its public counters.
///
/// Counters of 0 are real values, not missing data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    /// Creation time (epoch seconds)
    pub created_at: i64,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    /// Length in seconds
    #[serde(default)]
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    /// Set by `MetricsAggregator::engagement`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement_rate: Option<f64>,
}

impl VideoRecord {
    /// Likes + comments + shares.
    pub fn interactions(&self) -> u64 {
        self.like_count + self.comment_count + self.share_count
    }

    /// Engagement rate in percent, 0 when the video has no views.
    pub fn compute_engagement_rate(&self) -> f64 {
        if self.view_count == 0 {
            0.0
        } else {
            self.interactions() as f64 * 100.0 / self.view_count as f64
        }
    }
}
