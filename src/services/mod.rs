// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod analytics;
pub mod callback;
pub mod credentials;
pub mod oauth;
pub mod pending;
pub mod pkce;
pub mod tiktok;
pub mod vault;

pub use analytics::{MetricsAggregator, TopMetric};
pub use callback::{CallbackHandler, CallbackOutcome, CallbackParams};
pub use credentials::CredentialAccess;
pub use oauth::{AuthorizationRequestBuilder, TikTokOAuthClient, TokenProvider, TokenResult};
pub use pending::{AuthorizationRequest, PendingAuthorizationStore};
pub use pkce::{PkceGenerator, PkcePair};
pub use tiktok::{SyncSummary, TikTokClient, TikTokService};
pub use vault::CredentialVault;
