// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile side table)
//! - Credentials (encrypted provider tokens, one document per owner/provider)

use async_trait::async_trait;

use super::{apply_upsert, apply_user_link, CredentialRepository};
use crate::db::collections;
use crate::error::AppError;
use crate::models::{Credential, CredentialUpsert, User};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a disconnected client. Every operation returns an error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }
}

#[async_trait]
impl CredentialRepository for FirestoreDb {
    // ─── Credential Operations ─────────────────────────────────────

    async fn get_credential(
        &self,
        owner_id: &str,
        provider: &str,
    ) -> Result<Option<Credential>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CREDENTIALS)
            .obj()
            .one(&Credential::document_id(owner_id, provider))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Writes the credential document and the owner's user document in one
    /// transaction. Racing upserts for the same pair resolve last-writer-wins.
    async fn upsert_credential(&self, upsert: CredentialUpsert) -> Result<Credential, AppError> {
        let client = self.get_client()?;
        let now = chrono::Utc::now().to_rfc3339();
        let credential_id = Credential::document_id(&upsert.owner_id, &upsert.provider);

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Read the user row so profile fields survive the overwrite.
        let existing_user: Option<User> = client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&upsert.owner_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read user in transaction: {}", e))
            })?;

        let credential = apply_upsert(&upsert, &now);
        let user = apply_user_link(existing_user, &upsert, &now);

        client
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(&credential_id)
            .object(&credential)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add credential to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&upsert.owner_id)
            .object(&user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add user to transaction: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            owner_id = %upsert.owner_id,
            provider = %upsert.provider,
            open_id = %upsert.open_id,
            "Credential stored"
        );

        Ok(credential)
    }

    async fn deactivate_credential(
        &self,
        owner_id: &str,
        provider: &str,
    ) -> Result<bool, AppError> {
        let Some(mut credential) = self.get_credential(owner_id, provider).await? else {
            return Ok(false);
        };
        credential.is_active = false;
        credential.updated_at = chrono::Utc::now().to_rfc3339();

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(Credential::document_id(owner_id, provider))
            .object(&credential)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(true)
    }

    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, owner_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(owner_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.owner_id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
