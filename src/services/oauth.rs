// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TikTok OAuth2: consent-screen URL construction and the token endpoint.
//!
//! Handles:
//! - Authorization URL with PKCE (S256) and state
//! - Authorization code exchange
//! - Refresh token grant
//!
//! Exchange and refresh are never retried here; an authorization code is
//! single-use, so a retry cannot succeed.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{Config, ConfigError};
use crate::error::AppError;

/// Builds consent-screen URLs from fixed client configuration.
#[derive(Debug, Clone)]
pub struct AuthorizationRequestBuilder {
    auth_url: String,
    client_key: String,
    scopes: Vec<String>,
    redirect_uri: String,
}

impl AuthorizationRequestBuilder {
    /// Validate configuration once at startup.
    pub fn new(
        auth_url: &str,
        client_key: &str,
        scopes: &[String],
        redirect_uri: &str,
    ) -> Result<Self, ConfigError> {
        if client_key.trim().is_empty() {
            return Err(ConfigError::Missing("TIKTOK_CLIENT_KEY"));
        }
        if redirect_uri.trim().is_empty() {
            return Err(ConfigError::Missing("TIKTOK_REDIRECT_URI"));
        }
        if scopes.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::Missing("TIKTOK_SCOPES"));
        }
        Ok(Self {
            auth_url: auth_url.to_string(),
            client_key: client_key.to_string(),
            scopes: scopes.to_vec(),
            redirect_uri: redirect_uri.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(
            &config.tiktok_auth_url,
            &config.tiktok_client_key,
            &config.tiktok_scopes,
            &config.tiktok_redirect_uri,
        )
    }

    /// Consent-screen URL for one authorization attempt.
    ///
    /// Scopes are joined with single spaces.
    pub fn build(&self, state: &str, code_challenge: &str) -> String {
        let scope = self
            .scopes
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let separator = if self.auth_url.contains('?') { '&' } else { '?' };

        format!(
            "{}{}client_key={}&\
             scope={}&\
             response_type=code&\
             redirect_uri={}&\
             state={}&\
             code_challenge={}&\
             code_challenge_method=S256",
            self.auth_url,
            separator,
            urlencoding::encode(&self.client_key),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(code_challenge),
        )
    }
}

/// Tokens issued by the provider.
#[derive(Clone, PartialEq)]
pub struct TokenResult {
    pub access_token: String,
    pub refresh_token: String,
    pub open_id: String,
    /// Comma-separated scope list as granted
    pub scope: String,
    /// Access token lifetime (seconds)
    pub expires_in: i64,
    /// Refresh token lifetime (seconds)
    pub refresh_expires_in: i64,
    pub token_type: String,
}

impl std::fmt::Debug for TokenResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResult")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("open_id", &self.open_id)
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .field("refresh_expires_in", &self.refresh_expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

impl TokenResult {
    /// Granted scopes as a list.
    pub fn scopes(&self) -> Vec<String> {
        crate::config::parse_scopes(&self.scope)
    }
}

/// Raw token endpoint body; every field is checked before use.
#[derive(Deserialize)]
struct RawTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    open_id: Option<String>,
    scope: Option<String>,
    expires_in: Option<i64>,
    refresh_expires_in: Option<i64>,
    token_type: Option<String>,
}

impl TryFrom<RawTokenResponse> for TokenResult {
    type Error = AppError;

    fn try_from(raw: RawTokenResponse) -> Result<Self, Self::Error> {
        fn field<T>(value: Option<T>, name: &str) -> Result<T, AppError> {
            value.ok_or_else(|| {
                AppError::MalformedTokenResponse(format!("missing field '{}'", name))
            })
        }

        fn lifetime(value: Option<i64>, name: &str) -> Result<i64, AppError> {
            let secs = field(value, name)?;
            if secs < 0 {
                return Err(AppError::MalformedTokenResponse(format!(
                    "negative '{}': {}",
                    name, secs
                )));
            }
            Ok(secs)
        }

        Ok(TokenResult {
            access_token: field(raw.access_token, "access_token")?,
            refresh_token: field(raw.refresh_token, "refresh_token")?,
            open_id: field(raw.open_id, "open_id")?,
            scope: field(raw.scope, "scope")?,
            expires_in: lifetime(raw.expires_in, "expires_in")?,
            refresh_expires_in: lifetime(raw.refresh_expires_in, "refresh_expires_in")?,
            token_type: field(raw.token_type, "token_type")?,
        })
    }
}

/// Token fields blanked before a provider body reaches the logs.
const SECRET_FIELDS: [&str; 2] = ["access_token", "refresh_token"];

/// A token endpoint body with token values removed, safe to log.
///
/// A body that is not JSON is only echoed if it names no token field.
fn redacted_body(body: &str) -> String {
    fn scrub(value: &mut serde_json::Value) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, field) in map.iter_mut() {
                    if SECRET_FIELDS.contains(&key.as_str()) {
                        *field = serde_json::Value::String("[REDACTED]".to_string());
                    } else {
                        scrub(field);
                    }
                }
            }
            serde_json::Value::Array(items) => items.iter_mut().for_each(scrub),
            _ => {}
        }
    }

    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(mut value) => {
            scrub(&mut value);
            value.to_string()
        }
        Err(_) if SECRET_FIELDS.iter().any(|name| body.contains(name)) => {
            format!("[REDACTED: {} bytes]", body.len())
        }
        Err(_) => body.to_string(),
    }
}

/// Token endpoint operations.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Exchange an authorization code plus PKCE verifier for tokens.
    async fn exchange(&self, code: &str, code_verifier: &str) -> Result<TokenResult, AppError>;

    /// Obtain new tokens from a refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResult, AppError>;
}

/// HTTP client for TikTok's token endpoint.
#[derive(Clone)]
pub struct TikTokOAuthClient {
    http: reqwest::Client,
    token_url: String,
    client_key: String,
    client_secret: String,
    redirect_uri: String,
}

impl TikTokOAuthClient {
    pub fn new(
        token_url: String,
        client_key: String,
        client_secret: String,
        redirect_uri: String,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            http,
            token_url,
            client_key,
            client_secret,
            redirect_uri,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            config.tiktok_token_url.clone(),
            config.tiktok_client_key.clone(),
            config.tiktok_client_secret.clone(),
            config.tiktok_redirect_uri.clone(),
            config.http_connect_timeout,
            config.http_timeout,
        )
    }

    /// POST a form to the token endpoint and parse the result.
    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<TokenResult, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .header("Cache-Control", "no-cache")
            .form(form)
            .send()
            .await
            .map_err(|e| {
                // Timeouts and connection failures have no status.
                AppError::TokenExchangeFailed {
                    status: None,
                    body: e.to_string(),
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status != reqwest::StatusCode::OK {
            return Err(AppError::TokenExchangeFailed {
                status: Some(status.as_u16()),
                body,
            });
        }

        let raw: RawTokenResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %redacted_body(&body),
                "Token endpoint returned invalid JSON"
            );
            AppError::MalformedTokenResponse(format!("invalid JSON: {}", e))
        })?;
        TokenResult::try_from(raw).inspect_err(|e| {
            tracing::error!(
                error = %e,
                body = %redacted_body(&body),
                "Token endpoint returned incomplete body"
            );
        })
    }
}

#[async_trait]
impl TokenProvider for TikTokOAuthClient {
    async fn exchange(&self, code: &str, code_verifier: &str) -> Result<TokenResult, AppError> {
        self.post_token_form(&[
            ("client_key", self.client_key.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResult, AppError> {
        self.post_token_form(&[
            ("client_key", self.client_key.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }
}
