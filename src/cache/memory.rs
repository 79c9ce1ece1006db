// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process cache backed by a concurrent map.
//!
//! Expired entries are dropped lazily when read. Contents do not survive a
//! process restart.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::KeyValueCache;
use crate::error::AppError;

#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, (String, Option<Instant>)>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            let (value, expires_at) = entry.value();
            if expires_at.map_or(true, |at| at > now) {
                return Ok(Some(value.clone()));
            }
        } else {
            return Ok(None);
        }
        // Expired: drop it, unless someone replaced it in the meantime.
        self.entries
            .remove_if(key, |_, (_, expires_at)| expires_at.is_some_and(|at| at <= now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), AppError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, AppError> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .and_then(|(_, (value, expires_at))| {
                expires_at.map_or(true, |at| at > now).then_some(value)
            }))
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn clear_by_prefix(&self, prefix: &str) -> Result<usize, AppError> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before.saturating_sub(self.entries.len()))
    }
}
