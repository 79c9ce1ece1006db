// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential vault: authenticated encryption of provider tokens at rest.
//!
//! AES-256-GCM with a key derived from `TOKEN_ENCRYPTION_KEY` via
//! HKDF-SHA256. Ciphertext is stored as base64(nonce || ciphertext || tag).
//! The empty string maps to itself in both directions so "no token" needs
//! no special casing by callers.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hkdf::Hkdf;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;

use crate::error::AppError;

const HKDF_SALT: &[u8] = b"tiktok-insights.credential-vault";
const HKDF_INFO: &[u8] = b"aes-256-gcm token key v1";

/// Encrypts and decrypts tokens with a process-wide key.
pub struct CredentialVault {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl CredentialVault {
    /// Derive the vault key from a configuration secret.
    pub fn new(secret: &str) -> Result<Self, AppError> {
        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), secret.as_bytes());
        let mut okm = [0u8; 32];
        hk.expand(HKDF_INFO, &mut okm)
            .map_err(|_| AppError::Configuration("Vault key derivation failed".to_string()))?;
        let unbound = UnboundKey::new(&AES_256_GCM, &okm)
            .map_err(|_| AppError::Configuration("Invalid vault key".to_string()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt a token. Returns base64 ciphertext.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, AppError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Token encryption failed")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&in_out);
        Ok(BASE64.encode(out))
    }

    /// Decrypt a token produced by [`CredentialVault::encrypt`].
    ///
    /// Fails with `AppError::Decryption` for ciphertext from another key or
    /// any tampering.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, AppError> {
        if ciphertext.is_empty() {
            return Ok(String::new());
        }

        let data = BASE64
            .decode(ciphertext)
            .map_err(|e| AppError::Decryption(format!("Invalid base64: {}", e)))?;
        if data.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(AppError::Decryption("Ciphertext too short".to_string()));
        }

        let (nonce_bytes, sealed) = data.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| AppError::Decryption("Invalid nonce".to_string()))?;
        let mut in_out = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| AppError::Decryption("Authentication failed".to_string()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|e| AppError::Decryption(format!("Invalid UTF-8: {}", e)))
    }
}
