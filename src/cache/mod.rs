// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Key-value cache abstraction.
//!
//! The pending-authorization store and the fetched-video cache are both
//! built on [`KeyValueCache`]. The backend is picked once at startup from
//! configuration; there is no runtime fallback between backends.

mod memory;
#[cfg(feature = "redis-cache")]
mod redis;

pub use memory::MemoryCache;
#[cfg(feature = "redis-cache")]
pub use self::redis::RedisCache;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{CacheBackend, ConfigError};
use crate::error::AppError;

/// String key-value store with optional per-entry expiry.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Returns the stored value, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Stores `value` under `key`, replacing any existing value.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), AppError>;

    /// Atomically removes `key` and returns its value if it was live.
    ///
    /// Of several concurrent callers at most one receives the value.
    async fn take(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Removes `key`. Returns true if something was removed.
    async fn delete(&self, key: &str) -> Result<bool, AppError>;

    /// Removes every key starting with `prefix`. Returns the number removed.
    async fn clear_by_prefix(&self, prefix: &str) -> Result<usize, AppError>;
}

/// Build the configured cache backend.
pub async fn connect(backend: &CacheBackend) -> Result<Arc<dyn KeyValueCache>, ConfigError> {
    match backend {
        CacheBackend::Memory => {
            tracing::info!("Using in-process cache");
            Ok(Arc::new(MemoryCache::new()))
        }
        #[cfg(feature = "redis-cache")]
        CacheBackend::Redis { url } => {
            let cache = RedisCache::connect(url)
                .await
                .map_err(|e| ConfigError::Invalid("REDIS_URL", e.to_string()))?;
            tracing::info!("Using Redis cache");
            Ok(Arc::new(cache))
        }
        #[cfg(not(feature = "redis-cache"))]
        CacheBackend::Redis { .. } => Err(ConfigError::Invalid(
            "CACHE_BACKEND",
            "redis support not compiled in (enable the redis-cache feature)".to_string(),
        )),
    }
}
