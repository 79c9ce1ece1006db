// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TikTok Insights API Server
//!
//! Connects TikTok accounts through OAuth 2.0 with PKCE and serves
//! engagement analytics over the connected account's videos.

use std::sync::Arc;

use tiktok_insights::{
    cache,
    config::{Config, DatabaseBackend},
    db::{CredentialRepository, FirestoreDb, MemoryDb},
    services::TikTokOAuthClient,
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // A bad configuration is fatal.
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting TikTok Insights API");

    let db: Arc<dyn CredentialRepository> = match config.database_backend {
        DatabaseBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        DatabaseBackend::Memory => {
            tracing::warn!("Using in-memory credential store; data is lost on restart");
            Arc::new(MemoryDb::new())
        }
    };

    let cache = cache::connect(&config.cache_backend).await?;

    let tokens = Arc::new(TikTokOAuthClient::from_config(&config)?);
    tracing::info!(
        scopes = %config.tiktok_scopes.join(" "),
        timezone = %config.analytics_timezone,
        "TikTok OAuth client initialized"
    );

    let state = Arc::new(AppState::new(config.clone(), db, cache, tokens)?);

    // Build router
    let app = tiktok_insights::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tiktok_insights=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
