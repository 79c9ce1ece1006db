// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth callback handling as an explicit state machine.
//!
//! [`decide`] is a pure function from (method, parameters) to a
//! [`CallbackDecision`], evaluating guarded transitions top to bottom:
//!
//! 1. verification challenge without a code: echo it back
//! 2. provider-reported error: fail with the provider's code and description
//! 3. code and state: consume the pending authorization and exchange the code
//! 4. only one of code/state: reject as a bad request
//! 5. anything else: neutral "endpoint active" acknowledgment
//!
//! [`CallbackDecision::commands`] lists the side effects a decision needs,
//! and [`CallbackHandler`] executes them in order. Only the exchange path
//! has any.

use std::sync::Arc;

use axum::http::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cache::KeyValueCache;
use crate::error::AppError;
use crate::models::Credential;
use crate::services::credentials::CredentialAccess;
use crate::services::oauth::{TokenProvider, TokenResult};
use crate::services::pending::{AuthorizationRequest, PendingAuthorizationStore};
use crate::services::tiktok::video_cache_prefix;

/// Parameters a callback may carry, merged from query string and body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CallbackParams {
    pub challenge: Option<String>,
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Fill fields missing here from `other`.
    pub fn merge(mut self, other: CallbackParams) -> Self {
        self.challenge = self.challenge.or(other.challenge);
        self.code = self.code.or(other.code);
        self.state = self.state.or(other.state);
        self.error = self.error.or(other.error);
        self.error_description = self.error_description.or(other.error_description);
        self
    }
}

/// A verification challenge, echoed with the type it arrived as.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChallengeValue {
    Number(i64),
    Text(String),
}

impl ChallengeValue {
    fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(n) => ChallengeValue::Number(n),
            Err(_) => ChallengeValue::Text(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackDecision {
    EchoChallenge(ChallengeValue),
    ProviderError { code: String, description: String },
    ExchangeCode { code: String, state: String },
    MissingParameters,
    Idle,
}

/// Side effects, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackCommand {
    /// Look up and delete the pending authorization for `state`.
    ConsumePendingAuthorization { state: String },
    /// Exchange `code` with the consumed request's verifier.
    ExchangeCode { code: String },
    /// Encrypt and upsert the exchanged tokens.
    StoreCredential,
    /// Drop the owner's cached video listings.
    ClearVideoCache,
}

/// Treat empty values as absent.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Classify an inbound callback.
pub fn decide(method: &Method, params: &CallbackParams) -> CallbackDecision {
    if *method != Method::GET && *method != Method::POST {
        return CallbackDecision::Idle;
    }

    let code = present(&params.code);
    let state = present(&params.state);

    if let (Some(challenge), None) = (present(&params.challenge), code) {
        return CallbackDecision::EchoChallenge(ChallengeValue::parse(challenge));
    }

    if let Some(error) = present(&params.error) {
        return CallbackDecision::ProviderError {
            code: error.to_string(),
            description: present(&params.error_description)
                .unwrap_or("Authorization was not granted")
                .to_string(),
        };
    }

    match (code, state) {
        (Some(code), Some(state)) => CallbackDecision::ExchangeCode {
            code: code.to_string(),
            state: state.to_string(),
        },
        (Some(_), None) | (None, Some(_)) => CallbackDecision::MissingParameters,
        (None, None) => CallbackDecision::Idle,
    }
}

impl CallbackDecision {
    pub fn commands(&self) -> Vec<CallbackCommand> {
        match self {
            CallbackDecision::ExchangeCode { code, state } => vec![
                CallbackCommand::ConsumePendingAuthorization {
                    state: state.clone(),
                },
                CallbackCommand::ExchangeCode { code: code.clone() },
                CallbackCommand::StoreCredential,
                CallbackCommand::ClearVideoCache,
            ],
            _ => Vec::new(),
        }
    }
}

/// Terminal success states.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    Challenge(ChallengeValue),
    Connected { owner_id: String, open_id: String },
    Idle,
}

impl CallbackOutcome {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CallbackOutcome::Challenge(value) => json!({ "challenge": value }),
            CallbackOutcome::Connected { owner_id, open_id } => json!({
                "message": "TikTok account connected successfully",
                "open_id": open_id,
                "user_id": owner_id,
            }),
            CallbackOutcome::Idle => json!({ "message": "TikTok callback endpoint is active." }),
        }
    }
}

/// Values produced while executing commands.
#[derive(Default)]
struct ExchangeProgress {
    request: Option<AuthorizationRequest>,
    tokens: Option<TokenResult>,
    credential: Option<Credential>,
}

fn out_of_order(step: &str) -> AppError {
    AppError::Internal(anyhow::anyhow!("Callback command out of order: {}", step))
}

/// Executes callback decisions.
pub struct CallbackHandler {
    pending: PendingAuthorizationStore,
    tokens: Arc<dyn TokenProvider>,
    credentials: Arc<CredentialAccess>,
    cache: Arc<dyn KeyValueCache>,
}

impl CallbackHandler {
    pub fn new(
        pending: PendingAuthorizationStore,
        tokens: Arc<dyn TokenProvider>,
        credentials: Arc<CredentialAccess>,
        cache: Arc<dyn KeyValueCache>,
    ) -> Self {
        Self {
            pending,
            tokens,
            credentials,
            cache,
        }
    }

    pub async fn handle(
        &self,
        method: &Method,
        params: &CallbackParams,
    ) -> Result<CallbackOutcome, AppError> {
        let decision = decide(method, params);
        match &decision {
            CallbackDecision::EchoChallenge(value) => {
                tracing::info!("Answering TikTok verification challenge");
                Ok(CallbackOutcome::Challenge(value.clone()))
            }
            CallbackDecision::ProviderError { code, description } => {
                tracing::warn!(error = %code, description = %description, "TikTok reported authorization error");
                Err(AppError::ProviderAuthorization {
                    code: code.clone(),
                    description: description.clone(),
                })
            }
            CallbackDecision::MissingParameters => {
                Err(AppError::BadRequest("missing code or state".to_string()))
            }
            CallbackDecision::Idle => Ok(CallbackOutcome::Idle),
            CallbackDecision::ExchangeCode { .. } => self.execute(decision.commands()).await,
        }
    }

    async fn execute(&self, commands: Vec<CallbackCommand>) -> Result<CallbackOutcome, AppError> {
        let mut progress = ExchangeProgress::default();

        for command in commands {
            match command {
                CallbackCommand::ConsumePendingAuthorization { state } => {
                    let request = self.pending.take(&state).await?.ok_or_else(|| {
                        tracing::warn!("Callback with unknown, used or expired state");
                        AppError::InvalidOrExpiredState
                    })?;
                    progress.request = Some(request);
                }
                CallbackCommand::ExchangeCode { code } => {
                    let request = progress
                        .request
                        .as_ref()
                        .ok_or_else(|| out_of_order("exchange"))?;
                    let tokens = self.tokens.exchange(&code, &request.code_verifier).await?;
                    progress.tokens = Some(tokens);
                }
                CallbackCommand::StoreCredential => {
                    let (Some(request), Some(tokens)) = (&progress.request, &progress.tokens)
                    else {
                        return Err(out_of_order("store"));
                    };
                    let credential = self.credentials.store(&request.owner_id, tokens).await?;
                    progress.credential = Some(credential);
                }
                CallbackCommand::ClearVideoCache => {
                    let request = progress
                        .request
                        .as_ref()
                        .ok_or_else(|| out_of_order("clear cache"))?;
                    if let Err(e) = self
                        .cache
                        .clear_by_prefix(&video_cache_prefix(&request.owner_id))
                        .await
                    {
                        tracing::warn!(error = %e, "Failed to clear video cache after connect");
                    }
                }
            }
        }

        let (Some(request), Some(credential)) = (progress.request, progress.credential) else {
            return Err(out_of_order("finish"));
        };

        tracing::info!(
            owner_id = %request.owner_id,
            open_id = %credential.open_id,
            "TikTok account connected"
        );

        Ok(CallbackOutcome::Connected {
            owner_id: request.owner_id,
            open_id: credential.open_id,
        })
    }
}
