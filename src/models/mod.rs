// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod analytics;
pub mod credential;
pub mod user;
pub mod video;

pub use analytics::{
    AnalyticsSummary, CurrentMetrics, DailyPerformance, EngagementMetrics, GrowthTrends,
    HashtagPerformance, Recommendations, TopVideo, VideoHighlight, WeekSummary,
};
pub use credential::{Credential, CredentialUpsert, TIKTOK_PROVIDER};
pub use user::User;
pub use video::VideoRecord;
