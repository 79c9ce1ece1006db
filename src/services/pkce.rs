// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PKCE (RFC 7636) verifier/challenge pairs and anti-CSRF state tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Random bytes behind a code verifier (43 characters once encoded).
const VERIFIER_BYTES: usize = 32;
/// Random bytes behind a state token.
const STATE_BYTES: usize = 16;

/// A fresh verifier and its S256 challenge.
#[derive(Clone)]
pub struct PkcePair {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl std::fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkcePair")
            .field("code_verifier", &"[REDACTED]")
            .field("code_challenge", &self.code_challenge)
            .finish()
    }
}

/// Source of verifiers and state tokens.
#[derive(Clone)]
pub struct PkceGenerator {
    rng: SystemRandom,
}

impl Default for PkceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PkceGenerator {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }

    /// Generate a new verifier/challenge pair.
    pub fn pair(&self) -> Result<PkcePair, AppError> {
        let code_verifier = self.random_token(VERIFIER_BYTES)?;
        let code_challenge = challenge_for(&code_verifier);
        Ok(PkcePair {
            code_verifier,
            code_challenge,
        })
    }

    /// Generate an anti-CSRF state token, independent of any verifier.
    pub fn state(&self) -> Result<String, AppError> {
        self.random_token(STATE_BYTES)
    }

    fn random_token(&self, len: usize) -> Result<String, AppError> {
        let mut bytes = vec![0u8; len];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}

/// S256 challenge: base64url (no padding) of SHA-256 over the ASCII verifier.
pub fn challenge_for(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}
