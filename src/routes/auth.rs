// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TikTok OAuth routes: starting an authorization attempt and the
//! provider callback.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, Method},
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::services::callback::CallbackParams;
use crate::services::pending::AuthorizationRequest;
use crate::AppState;

/// Routes TikTok calls directly.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/auth/tiktok/callback",
        get(auth_callback).post(auth_callback),
    )
}

/// Routes that need a signed-in owner.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/tiktok/authorize", get(auth_start))
}

/// Where to send the user to grant access.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthorizeResponse {
    pub authorization_url: String,
    pub state: String,
}

/// Start an authorization attempt for the signed-in owner.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<AuthorizeResponse>> {
    let pkce = state.pkce.pair()?;
    let oauth_state = state.pkce.state()?;
    let authorization_url = state.auth_builder.build(&oauth_state, &pkce.code_challenge);

    state
        .pending
        .put(&AuthorizationRequest {
            state: oauth_state.clone(),
            code_verifier: pkce.code_verifier,
            owner_id: user.owner_id.clone(),
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(owner_id = %user.owner_id, "Starting TikTok authorization");

    Ok(Json(AuthorizeResponse {
        authorization_url,
        state: oauth_state,
    }))
}

/// Provider callback. Parameters may arrive in the query string, a form
/// body or a JSON body; query values take precedence.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<CallbackParams>,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let params = query.merge(parse_body(&headers, &body)?);
    let outcome = state.callback.handle(&method, &params).await?;
    Ok(Json(outcome.to_json()))
}

fn parse_body(headers: &HeaderMap, body: &[u8]) -> Result<CallbackParams> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CallbackParams::default());
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("application/json") {
        parse_json_body(body)
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        parse_form_body(body)
    } else {
        // Verification pings sometimes arrive without a usable content type.
        Ok(CallbackParams::default())
    }
}

fn parse_json_body(body: &[u8]) -> Result<CallbackParams> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))?;
    let Some(object) = value.as_object() else {
        return Err(AppError::BadRequest("JSON body must be an object".to_string()));
    };

    // Numbers become their decimal text so a numeric challenge survives.
    let field = |name: &str| match object.get(name)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    };

    Ok(CallbackParams {
        challenge: field("challenge"),
        code: field("code"),
        state: field("state"),
        error: field("error"),
        error_description: field("error_description"),
    })
}

fn parse_form_body(body: &[u8]) -> Result<CallbackParams> {
    let text = std::str::from_utf8(body)
        .map_err(|_| AppError::BadRequest("form body is not UTF-8".to_string()))?;

    let mut params = CallbackParams::default();
    for pair in text.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(&value.replace('+', " "))
            .map_err(|_| AppError::BadRequest("form body is not valid UTF-8".to_string()))?
            .into_owned();
        let slot = match name {
            "challenge" => &mut params.challenge,
            "code" => &mut params.code,
            "state" => &mut params.state,
            "error" => &mut params.error,
            "error_description" => &mut params.error_description,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }
    Ok(params)
}
