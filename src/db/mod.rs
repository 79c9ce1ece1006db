//! Database layer.
//!
//! Credentials and the user side table sit behind [`CredentialRepository`].
//! Firestore is the production backend; [`MemoryDb`] serves local
//! development and tests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{Credential, CredentialUpsert, User};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Keyed by `{owner_id}_{provider}`
    pub const CREDENTIALS: &str = "credentials";
}

/// Storage for provider credentials and per-owner profile data.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// The credential for a pair, active or not.
    async fn get_credential(
        &self,
        owner_id: &str,
        provider: &str,
    ) -> Result<Option<Credential>, AppError>;

    /// The credential for a pair, only if active.
    async fn get_active_credential(
        &self,
        owner_id: &str,
        provider: &str,
    ) -> Result<Option<Credential>, AppError> {
        Ok(self
            .get_credential(owner_id, provider)
            .await?
            .filter(|c| c.is_active))
    }

    /// Insert or overwrite the credential for a pair and record its open_id
    /// on the owner's user row, atomically.
    async fn upsert_credential(&self, upsert: CredentialUpsert) -> Result<Credential, AppError>;

    /// Mark a credential inactive. Returns false if none existed.
    async fn deactivate_credential(&self, owner_id: &str, provider: &str)
        -> Result<bool, AppError>;

    async fn get_user(&self, owner_id: &str) -> Result<Option<User>, AppError>;

    /// Create or update a user.
    async fn upsert_user(&self, user: &User) -> Result<(), AppError>;
}

/// Build the credential row an upsert produces.
///
/// Shared by backends so both apply identical overwrite semantics.
pub(crate) fn apply_upsert(upsert: &CredentialUpsert, now: &str) -> Credential {
    Credential {
        owner_id: upsert.owner_id.clone(),
        provider: upsert.provider.clone(),
        access_token_encrypted: upsert.access_token_encrypted.clone(),
        refresh_token_encrypted: upsert.refresh_token_encrypted.clone(),
        open_id: upsert.open_id.clone(),
        scopes: upsert.scopes.clone(),
        expires_at: crate::time_utils::format_utc_rfc3339(upsert.expires_at),
        refresh_expires_at: crate::time_utils::format_utc_rfc3339(upsert.refresh_expires_at),
        is_active: true,
        issued_at: now.to_string(),
        updated_at: now.to_string(),
    }
}

/// Apply an upsert's open_id to the owner's user row.
pub(crate) fn apply_user_link(existing: Option<User>, upsert: &CredentialUpsert, now: &str) -> User {
    let mut user = existing.unwrap_or_else(|| User::new(&upsert.owner_id, now));
    user.tiktok_open_id = Some(upsert.open_id.clone());
    user.updated_at = now.to_string();
    user
}
