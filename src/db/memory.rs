// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process credential repository.
//!
//! One mutex guards both tables, so an upsert is applied to the credential
//! and user rows as a unit.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{apply_upsert, apply_user_link, CredentialRepository};
use crate::error::AppError;
use crate::models::{Credential, CredentialUpsert, User};

#[derive(Default)]
struct Tables {
    credentials: HashMap<String, Credential>,
    users: HashMap<String, User>,
}

#[derive(Default)]
pub struct MemoryDb {
    tables: Mutex<Tables>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::Database("Memory database lock poisoned".to_string()))
    }

    /// Number of stored credential rows, active or not.
    pub fn credential_count(&self) -> usize {
        self.lock().map(|t| t.credentials.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CredentialRepository for MemoryDb {
    async fn get_credential(
        &self,
        owner_id: &str,
        provider: &str,
    ) -> Result<Option<Credential>, AppError> {
        let id = Credential::document_id(owner_id, provider);
        Ok(self.lock()?.credentials.get(&id).cloned())
    }

    async fn upsert_credential(&self, upsert: CredentialUpsert) -> Result<Credential, AppError> {
        let now = chrono::Utc::now().to_rfc3339();
        let id = Credential::document_id(&upsert.owner_id, &upsert.provider);

        let mut tables = self.lock()?;
        let credential = apply_upsert(&upsert, &now);
        let user = apply_user_link(tables.users.get(&upsert.owner_id).cloned(), &upsert, &now);

        tables.credentials.insert(id, credential.clone());
        tables.users.insert(upsert.owner_id.clone(), user);
        Ok(credential)
    }

    async fn deactivate_credential(
        &self,
        owner_id: &str,
        provider: &str,
    ) -> Result<bool, AppError> {
        let id = Credential::document_id(owner_id, provider);
        let mut tables = self.lock()?;
        match tables.credentials.get_mut(&id) {
            Some(credential) => {
                credential.is_active = false;
                credential.updated_at = chrono::Utc::now().to_rfc3339();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_user(&self, owner_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.users.get(owner_id).cloned())
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.lock()?
            .users
            .insert(user.owner_id.clone(), user.clone());
        Ok(())
    }
}
