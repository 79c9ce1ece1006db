//! User side table for storage and API.

use serde::{Deserialize, Serialize};

/// Per-owner profile data cached from TikTok.
///
/// Stored at: `users/{owner_id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// This system's user identity (also used as document ID)
    pub owner_id: String,
    /// TikTok open_id of the connected account
    #[serde(default)]
    pub tiktok_open_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub follower_count: Option<u64>,
    #[serde(default)]
    pub following_count: Option<u64>,
    #[serde(default)]
    pub likes_count: Option<u64>,
    #[serde(default)]
    pub video_count: Option<u64>,
    /// Last successful sync (ISO 8601)
    #[serde(default)]
    pub last_synced_at: Option<String>,
    /// When the user row was created (ISO 8601)
    pub created_at: String,
    /// Last modification (ISO 8601)
    pub updated_at: String,
}

impl User {
    /// A fresh row for `owner_id` stamped with `now`.
    pub fn new(owner_id: &str, now: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            created_at: now.to_string(),
            updated_at: now.to_string(),
            ..Default::default()
        }
    }
}
