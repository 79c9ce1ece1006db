// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! TikTok Insights: connect a TikTok account and analyze its videos
//!
//! This crate provides the backend API: the OAuth 2.0 + PKCE connection
//! flow with vaulted credentials, and an analytics engine over the
//! account's videos.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use cache::KeyValueCache;
use config::Config;
use db::CredentialRepository;
use services::{
    AuthorizationRequestBuilder, CallbackHandler, CredentialAccess, CredentialVault,
    MetricsAggregator, PendingAuthorizationStore, PkceGenerator, TikTokClient, TikTokService,
    TokenProvider,
};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub cache: Arc<dyn KeyValueCache>,
    pub pkce: PkceGenerator,
    pub auth_builder: AuthorizationRequestBuilder,
    pub pending: PendingAuthorizationStore,
    pub credentials: Arc<CredentialAccess>,
    pub callback: CallbackHandler,
    pub tiktok: TikTokService,
    pub aggregator: MetricsAggregator,
}

impl AppState {
    /// Wire services together.
    ///
    /// The token provider is injected so tests can run without the
    /// TikTok token endpoint.
    pub fn new(
        config: Config,
        db: Arc<dyn CredentialRepository>,
        cache: Arc<dyn KeyValueCache>,
        tokens: Arc<dyn TokenProvider>,
    ) -> anyhow::Result<Self> {
        let auth_builder = AuthorizationRequestBuilder::from_config(&config)?;
        let vault = Arc::new(CredentialVault::new(&config.token_encryption_key)?);
        let pending = PendingAuthorizationStore::new(cache.clone());
        let credentials = Arc::new(CredentialAccess::new(db.clone(), vault, tokens.clone()));
        let callback = CallbackHandler::new(
            pending.clone(),
            tokens,
            credentials.clone(),
            cache.clone(),
        );
        let tiktok = TikTokService::new(
            TikTokClient::from_config(&config)?,
            credentials.clone(),
            cache.clone(),
            db.clone(),
            config.sync_max_videos,
        );
        let aggregator = MetricsAggregator::new(config.analytics_timezone);

        Ok(Self {
            config,
            cache,
            pkce: PkceGenerator::new(),
            auth_builder,
            pending,
            credentials,
            callback,
            tiktok,
            aggregator,
        })
    }
}
