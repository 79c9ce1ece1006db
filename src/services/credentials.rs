// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential access: the one place that turns a stored credential into a
//! usable plaintext access token.
//!
//! Handles:
//! - Vault encryption of new token pairs and their persistence
//! - Expiry checks with a 5-minute margin
//! - Refresh through the token endpoint while the refresh token is valid
//! - In-memory caching of decrypted tokens with per-owner refresh locks
//!
//! Every failure to produce a token is a typed `CredentialUnavailable`
//! reason; a stale token is never handed out.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::db::CredentialRepository;
use crate::error::{AppError, CredentialUnavailable};
use crate::models::{Credential, CredentialUpsert, TIKTOK_PROVIDER};
use crate::services::oauth::{TokenProvider, TokenResult};
use crate::services::vault::CredentialVault;

/// Refresh this long before the provider's expiry.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// `now` plus a provider-issued lifetime, rejecting values past chrono's range.
fn expiry_after(now: DateTime<Utc>, secs: i64, name: &str) -> Result<DateTime<Utc>, AppError> {
    Duration::try_seconds(secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            AppError::MalformedTokenResponse(format!("'{}' out of range: {}", name, secs))
        })
}

/// Decrypted access token with expiry information.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

pub struct CredentialAccess {
    db: Arc<dyn CredentialRepository>,
    vault: Arc<CredentialVault>,
    tokens: Arc<dyn TokenProvider>,
    /// Decrypted access tokens by owner.
    token_cache: DashMap<String, CachedToken>,
    /// Per-owner mutex to serialize refreshes.
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CredentialAccess {
    pub fn new(
        db: Arc<dyn CredentialRepository>,
        vault: Arc<CredentialVault>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            db,
            vault,
            tokens,
            token_cache: DashMap::new(),
            refresh_locks: DashMap::new(),
        }
    }

    /// Encrypt a freshly issued token pair and upsert it for `owner_id`.
    pub async fn store(&self, owner_id: &str, tokens: &TokenResult) -> Result<Credential, AppError> {
        let now = Utc::now();
        let expires_at = expiry_after(now, tokens.expires_in, "expires_in")?;
        let refresh_expires_at =
            expiry_after(now, tokens.refresh_expires_in, "refresh_expires_in")?;
        let upsert = CredentialUpsert {
            owner_id: owner_id.to_string(),
            provider: TIKTOK_PROVIDER.to_string(),
            access_token_encrypted: self.vault.encrypt(&tokens.access_token)?,
            refresh_token_encrypted: self.vault.encrypt(&tokens.refresh_token)?,
            open_id: tokens.open_id.clone(),
            scopes: tokens.scopes(),
            expires_at,
            refresh_expires_at,
        };
        let credential = self.db.upsert_credential(upsert).await?;
        self.invalidate(owner_id);
        Ok(credential)
    }

    /// A usable access token for `owner_id`, refreshing if needed.
    pub async fn access_token(&self, owner_id: &str) -> Result<String, AppError> {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        if let Some(token) = self.cached(owner_id, margin) {
            return Ok(token);
        }

        let lock = self
            .refresh_locks
            .entry(owner_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another task may have refreshed while we waited.
        if let Some(token) = self.cached(owner_id, margin) {
            return Ok(token);
        }

        let credential = self
            .db
            .get_credential(owner_id, TIKTOK_PROVIDER)
            .await?
            .ok_or(CredentialUnavailable::Missing)?;
        if !credential.is_active {
            return Err(CredentialUnavailable::Inactive.into());
        }

        let now = Utc::now();
        if let Some(expires_at) = credential.expires_at_utc() {
            if now + margin < expires_at {
                let access_token = self.decrypt(owner_id, &credential.access_token_encrypted)?;
                if !access_token.is_empty() {
                    self.token_cache.insert(
                        owner_id.to_string(),
                        CachedToken {
                            access_token: access_token.clone(),
                            expires_at,
                        },
                    );
                    return Ok(access_token);
                }
            }
        }

        self.refresh(owner_id, &credential, now).await
    }

    /// Refresh an expired credential. Any failure means the owner must reconnect.
    async fn refresh(
        &self,
        owner_id: &str,
        credential: &Credential,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let refresh_valid = credential
            .refresh_expires_at_utc()
            .is_some_and(|at| now < at);
        if !refresh_valid {
            tracing::info!(owner_id, "Access and refresh tokens expired");
            return Err(CredentialUnavailable::Expired.into());
        }

        let refresh_token = self.decrypt(owner_id, &credential.refresh_token_encrypted)?;
        if refresh_token.is_empty() {
            return Err(CredentialUnavailable::Expired.into());
        }

        tracing::info!(owner_id, "Access token expired, refreshing");

        let tokens = match self.tokens.refresh(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(owner_id, error = %e, "Token refresh failed");
                return Err(CredentialUnavailable::Expired.into());
            }
        };

        let stored = self.store(owner_id, &tokens).await?;
        if let Some(expires_at) = stored.expires_at_utc() {
            self.token_cache.insert(
                owner_id.to_string(),
                CachedToken {
                    access_token: tokens.access_token.clone(),
                    expires_at,
                },
            );
        }

        tracing::info!(owner_id, "Token refreshed and cached");
        Ok(tokens.access_token)
    }

    fn cached(&self, owner_id: &str, margin: Duration) -> Option<String> {
        let cached = self.token_cache.get(owner_id)?;
        (Utc::now() + margin < cached.expires_at).then(|| cached.access_token.clone())
    }

    fn decrypt(&self, owner_id: &str, ciphertext: &str) -> Result<String, AppError> {
        self.vault.decrypt(ciphertext).map_err(|e| {
            tracing::warn!(owner_id, error = %e, "Stored credential is undecryptable");
            AppError::CredentialUnavailable(CredentialUnavailable::Undecryptable)
        })
    }

    /// Drop any cached token for `owner_id`.
    pub fn invalidate(&self, owner_id: &str) {
        self.token_cache.remove(owner_id);
    }

    /// Mark the owner's credential inactive. Returns false if none existed.
    pub async fn disconnect(&self, owner_id: &str) -> Result<bool, AppError> {
        let removed = self
            .db
            .deactivate_credential(owner_id, TIKTOK_PROVIDER)
            .await?;
        self.invalidate(owner_id);
        Ok(removed)
    }
}
