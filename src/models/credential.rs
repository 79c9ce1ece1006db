// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stored provider credentials.
//!
//! Token fields always hold vault ciphertext; plaintext tokens never reach
//! this type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider name used for TikTok credentials.
pub const TIKTOK_PROVIDER: &str = "tiktok";

/// One provider credential for one owner.
///
/// Stored at: `credentials/{owner_id}_{provider}`, so there is structurally
/// at most one record per (owner, provider) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub owner_id: String,
    pub provider: String,
    /// Encrypted access token (base64)
    pub access_token_encrypted: String,
    /// Encrypted refresh token (base64)
    pub refresh_token_encrypted: String,
    /// Provider-side user id
    pub open_id: String,
    /// Granted OAuth scopes
    pub scopes: Vec<String>,
    /// When the access token expires (ISO 8601)
    pub expires_at: String,
    /// When the refresh token expires (ISO 8601)
    pub refresh_expires_at: String,
    pub is_active: bool,
    /// When the current tokens were issued (ISO 8601)
    pub issued_at: String,
    /// Last modification (ISO 8601)
    pub updated_at: String,
}

impl Credential {
    /// Document ID for an (owner, provider) pair.
    pub fn document_id(owner_id: &str, provider: &str) -> String {
        format!("{}_{}", owner_id, provider)
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.expires_at)
    }

    pub fn refresh_expires_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.refresh_expires_at)
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// New token material for an (owner, provider) pair.
///
/// Applied by the repository together with the owner's user row
/// (`tiktok_open_id`) in one transaction.
#[derive(Debug, Clone)]
pub struct CredentialUpsert {
    pub owner_id: String,
    pub provider: String,
    pub access_token_encrypted: String,
    pub refresh_token_encrypted: String,
    pub open_id: String,
    pub scopes: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}
