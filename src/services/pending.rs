// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Short-lived store of in-flight authorization attempts.
//!
//! Entries are keyed by the random state token, so concurrent attempts from
//! different users never collide. Unknown, consumed and expired states all
//! look the same to callers: `None`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::KeyValueCache;
use crate::error::AppError;

/// How long an authorization attempt stays valid.
pub const PENDING_AUTHORIZATION_TTL: Duration = Duration::from_secs(600);

const KEY_PREFIX: &str = "oauth_state:";

/// One in-flight authorization attempt.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub state: String,
    pub code_verifier: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for AuthorizationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationRequest")
            .field("state", &"[REDACTED]")
            .field("code_verifier", &"[REDACTED]")
            .field("owner_id", &self.owner_id)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Pending-authorization store on top of a key-value cache.
#[derive(Clone)]
pub struct PendingAuthorizationStore {
    cache: Arc<dyn KeyValueCache>,
    ttl: Duration,
}

impl PendingAuthorizationStore {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self::with_ttl(cache, PENDING_AUTHORIZATION_TTL)
    }

    pub fn with_ttl(cache: Arc<dyn KeyValueCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    fn key(state: &str) -> String {
        format!("{}{}", KEY_PREFIX, state)
    }

    /// Store a request under its state token.
    pub async fn put(&self, request: &AuthorizationRequest) -> Result<(), AppError> {
        let value = serde_json::to_string(request)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Serialize pending auth: {}", e)))?;
        self.cache
            .set(&Self::key(&request.state), &value, Some(self.ttl))
            .await
    }

    /// Look up a request. Expired entries are `None` even if the backend
    /// still holds them.
    pub async fn get(&self, state: &str) -> Result<Option<AuthorizationRequest>, AppError> {
        let value = self.cache.get(&Self::key(state)).await?;
        Ok(value.and_then(|v| self.decode_live(&v)))
    }

    /// Remove a request.
    pub async fn delete(&self, state: &str) -> Result<(), AppError> {
        self.cache.delete(&Self::key(state)).await?;
        Ok(())
    }

    /// Single-use retrieval.
    ///
    /// The entry is removed atomically whether or not it had expired, and
    /// before the caller acts on it, so a failed or timed-out exchange
    /// cannot be replayed with the same state and two concurrent callbacks
    /// cannot both win.
    pub async fn take(&self, state: &str) -> Result<Option<AuthorizationRequest>, AppError> {
        let value = self.cache.take(&Self::key(state)).await?;
        Ok(value.and_then(|v| self.decode_live(&v)))
    }

    fn decode_live(&self, value: &str) -> Option<AuthorizationRequest> {
        let request: AuthorizationRequest = match serde_json::from_str(value) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable pending authorization");
                return None;
            }
        };

        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        (Utc::now() - request.created_at < ttl).then_some(request)
    }
}
