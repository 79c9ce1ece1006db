// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (`FIRESTORE_EMULATOR_HOST`); they are skipped otherwise.

use chrono::{Duration, Utc};
use tiktok_insights::db::CredentialRepository;
use tiktok_insights::models::{CredentialUpsert, User, TIKTOK_PROVIDER};

mod common;
use common::test_db;

/// Generate a unique owner ID for test isolation.
fn unique_owner_id() -> String {
    format!("owner-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

fn upsert(owner_id: &str, access: &str, open_id: &str) -> CredentialUpsert {
    CredentialUpsert {
        owner_id: owner_id.to_string(),
        provider: TIKTOK_PROVIDER.to_string(),
        access_token_encrypted: access.to_string(),
        refresh_token_encrypted: format!("refresh-{}", access),
        open_id: open_id.to_string(),
        scopes: vec!["user.info.basic".to_string()],
        expires_at: Utc::now() + Duration::hours(24),
        refresh_expires_at: Utc::now() + Duration::days(365),
    }
}

#[tokio::test]
async fn test_credential_upsert_overwrites_single_document() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_owner_id();

    assert!(db.get_credential(&owner, TIKTOK_PROVIDER).await.unwrap().is_none());

    db.upsert_credential(upsert(&owner, "enc-1", "open-a")).await.unwrap();
    db.upsert_credential(upsert(&owner, "enc-2", "open-b")).await.unwrap();

    let stored = db
        .get_active_credential(&owner, TIKTOK_PROVIDER)
        .await
        .unwrap()
        .expect("credential should exist");
    assert_eq!(stored.access_token_encrypted, "enc-2");
    assert_eq!(stored.open_id, "open-b");

    let user = db.get_user(&owner).await.unwrap().expect("user row linked");
    assert_eq!(user.tiktok_open_id.as_deref(), Some("open-b"));
}

#[tokio::test]
async fn test_deactivate_credential() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_owner_id();

    assert!(!db.deactivate_credential(&owner, TIKTOK_PROVIDER).await.unwrap());

    db.upsert_credential(upsert(&owner, "enc", "open")).await.unwrap();
    assert!(db.deactivate_credential(&owner, TIKTOK_PROVIDER).await.unwrap());

    assert!(db
        .get_active_credential(&owner, TIKTOK_PROVIDER)
        .await
        .unwrap()
        .is_none());
    let inactive = db.get_credential(&owner, TIKTOK_PROVIDER).await.unwrap().unwrap();
    assert!(!inactive.is_active);
}

#[tokio::test]
async fn test_user_upsert_preserves_credential_link() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_owner_id();
    db.upsert_credential(upsert(&owner, "enc", "open-x")).await.unwrap();

    let mut user = db.get_user(&owner).await.unwrap().unwrap();
    user.display_name = Some("Tester".to_string());
    user.follower_count = Some(10);
    db.upsert_user(&user).await.unwrap();

    let reloaded: User = db.get_user(&owner).await.unwrap().unwrap();
    assert_eq!(reloaded.display_name.as_deref(), Some("Tester"));
    assert_eq!(reloaded.tiktok_open_id.as_deref(), Some("open-x"));
}
