// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Why a stored credential cannot produce a usable access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialUnavailable {
    /// No credential was ever stored for this owner.
    Missing,
    /// The credential was disconnected.
    Inactive,
    /// Access token expired and could not be refreshed.
    Expired,
    /// Ciphertext could not be decrypted with the current key.
    Undecryptable,
}

impl std::fmt::Display for CredentialUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            CredentialUnavailable::Missing => "TikTok account not connected",
            CredentialUnavailable::Inactive => "TikTok account disconnected",
            CredentialUnavailable::Expired => {
                "TikTok token expired. Please reconnect your account."
            }
            CredentialUnavailable::Undecryptable => {
                "Stored TikTok credential is unreadable. Please reconnect your account."
            }
        };
        f.write_str(msg)
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid or expired OAuth state")]
    InvalidOrExpiredState,

    #[error("TikTok authorization error {code}: {description}")]
    ProviderAuthorization { code: String, description: String },

    #[error("Token exchange failed (status {status:?})")]
    TokenExchangeFailed { status: Option<u16>, body: String },

    #[error("Malformed token response: {0}")]
    MalformedTokenResponse(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("{0}")]
    CredentialUnavailable(CredentialUnavailable),

    #[error("TikTok API error: {0}")]
    TikTokApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Message used when the provider rejects the access token (HTTP 401).
    pub const TIKTOK_TOKEN_ERROR: &'static str = "Access token rejected by TikTok";
    /// Message used when the provider rate-limits us (HTTP 429).
    pub const TIKTOK_RATE_LIMIT: &'static str = "TikTok rate limit exceeded";

    /// True when the provider rejected the access token itself.
    pub fn is_tiktok_token_error(&self) -> bool {
        matches!(self, AppError::TikTokApi(msg) if msg == Self::TIKTOK_TOKEN_ERROR)
    }

    /// The authorization step this error belongs to, if any.
    pub fn step(&self) -> Option<&'static str> {
        match self {
            AppError::Configuration(_) => Some("url_generation"),
            AppError::ProviderAuthorization { .. } => Some("authorization"),
            AppError::InvalidOrExpiredState => Some("state_validation"),
            AppError::TokenExchangeFailed { .. } | AppError::MalformedTokenResponse(_) => {
                Some("code_exchange")
            }
            AppError::Database(_) => Some("credential_storage"),
            AppError::Decryption(_) | AppError::CredentialUnavailable(_) => {
                Some("credential_access")
            }
            _ => None,
        }
    }
}

impl From<CredentialUnavailable> for AppError {
    fn from(reason: CredentialUnavailable) -> Self {
        AppError::CredentialUnavailable(reason)
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let step = self.step();
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Configuration(msg) => {
                tracing::error!(error = %msg, "Configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    None,
                )
            }
            AppError::InvalidOrExpiredState => (
                StatusCode::BAD_REQUEST,
                "invalid_or_expired_state",
                Some("Authorization session expired or was already used. Please start again.".to_string()),
            ),
            AppError::ProviderAuthorization { code, description } => (
                StatusCode::BAD_REQUEST,
                "provider_authorization_error",
                Some(format!("{}: {}", code, description)),
            ),
            AppError::TokenExchangeFailed { status, body } => {
                tracing::error!(status = ?status, body = %body, "Token exchange failed");
                let details = match status {
                    Some(code) => format!("TikTok token endpoint responded with status {}", code),
                    None => "TikTok token endpoint could not be reached".to_string(),
                };
                (StatusCode::BAD_GATEWAY, "token_exchange_failed", Some(details))
            }
            AppError::MalformedTokenResponse(msg) => {
                tracing::error!(error = %msg, "Malformed token response");
                (
                    StatusCode::BAD_GATEWAY,
                    "malformed_token_response",
                    Some(msg.clone()),
                )
            }
            AppError::Decryption(msg) => {
                tracing::warn!(error = %msg, "Credential decryption failed");
                (
                    StatusCode::UNAUTHORIZED,
                    "credential_unreadable",
                    Some(CredentialUnavailable::Undecryptable.to_string()),
                )
            }
            AppError::CredentialUnavailable(reason) => {
                let (status, code) = match reason {
                    CredentialUnavailable::Missing | CredentialUnavailable::Inactive => {
                        (StatusCode::BAD_REQUEST, "tiktok_not_connected")
                    }
                    CredentialUnavailable::Expired => (StatusCode::UNAUTHORIZED, "token_expired"),
                    CredentialUnavailable::Undecryptable => {
                        (StatusCode::UNAUTHORIZED, "credential_unreadable")
                    }
                };
                (status, code, Some(reason.to_string()))
            }
            AppError::TikTokApi(msg) => (StatusCode::BAD_GATEWAY, "tiktok_error", Some(msg.clone())),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            step,
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
