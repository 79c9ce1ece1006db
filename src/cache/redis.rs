// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Redis-backed cache. Expiry is delegated to Redis TTLs.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client};

use super::KeyValueCache;
use crate::error::AppError;

pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    /// Open a client and verify the server answers PING.
    pub async fn connect(url: &str) -> redis::RedisResult<Self> {
        let client = Client::open(url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(Self { client })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, AppError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(redis_error)
    }
}

fn redis_error(e: redis::RedisError) -> AppError {
    AppError::Internal(anyhow::anyhow!("Redis error: {}", e))
}

#[async_trait]
impl KeyValueCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn().await?;
        conn.get(key).await.map_err(redis_error)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), AppError> {
        let mut conn = self.conn().await?;
        match ttl {
            // Redis rejects a zero expiry.
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                .await
                .map_err(redis_error),
            None => conn.set::<_, _, ()>(key, value).await.map_err(redis_error),
        }
    }

    async fn take(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn().await?;
        conn.get_del(key).await.map_err(redis_error)
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        let mut conn = self.conn().await?;
        let removed: usize = conn.del(key).await.map_err(redis_error)?;
        Ok(removed > 0)
    }

    async fn clear_by_prefix(&self, prefix: &str) -> Result<usize, AppError> {
        let mut conn = self.conn().await?;
        let keys: Vec<String> = conn
            .keys(format!("{}*", prefix))
            .await
            .map_err(redis_error)?;
        if keys.is_empty() {
            return Ok(0);
        }
        conn.del(keys).await.map_err(redis_error)
    }
}
