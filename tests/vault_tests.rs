//! # Vault Integration Tests
//!
//! Vault persistence format, full-replace semantics, internal-mode
//! redaction on the management read path, and the client/internal
//! transformation round trip.

mod common;

use std::collections::BTreeMap;

use common::{put_config, test_state, EMAIL};
use git_config_server::error::ServiceError;
use tempfile::TempDir;

fn secrets(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn vault_file_persists_encrypted_envelopes() {
    let base = TempDir::new().unwrap();
    let state = test_state(base.path());
    state.store.create_namespace("prod").await.unwrap();

    let commit = state
        .vault
        .update_vault(
            "prod",
            &secrets(&[("db.password", "s3cret"), ("api.token", "t0ken")]),
            EMAIL,
            "store credentials",
        )
        .await
        .unwrap();
    assert_eq!(commit.len(), 40);

    let raw = std::fs::read_to_string(base.path().join("prod/.vault/prod-vault.json")).unwrap();
    let stored: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored.len(), 2);
    for value in stored.values() {
        assert!(value.as_str().unwrap().starts_with("VAULT:"));
    }

    let decrypted = state.vault.get_vault("prod").await.unwrap();
    assert_eq!(decrypted.get("db.password").map(String::as_str), Some("s3cret"));
    assert_eq!(decrypted.get("api.token").map(String::as_str), Some("t0ken"));
}

#[tokio::test]
async fn missing_vault_file_is_an_empty_map() {
    let base = TempDir::new().unwrap();
    let state = test_state(base.path());
    state.store.create_namespace("prod").await.unwrap();
    assert!(state.vault.get_vault("prod").await.unwrap().is_empty());
}

#[tokio::test]
async fn vault_write_is_a_full_replace() {
    let base = TempDir::new().unwrap();
    let state = test_state(base.path());
    state.store.create_namespace("prod").await.unwrap();
    state
        .vault
        .update_vault(
            "prod",
            &secrets(&[("db.password", "s3cret"), ("api.token", "t0ken")]),
            EMAIL,
            "initial secrets",
        )
        .await
        .unwrap();

    state
        .vault
        .update_vault("prod", &secrets(&[("db.password", "rotated")]), EMAIL, "rotate")
        .await
        .unwrap();
    let after = state.vault.get_vault("prod").await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after.get("db.password").map(String::as_str), Some("rotated"));

    // Empty replace erases everything and still commits
    state
        .vault
        .update_vault("prod", &BTreeMap::new(), EMAIL, "wipe secrets")
        .await
        .unwrap();
    assert!(state.vault.get_vault("prod").await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_secret_keys_are_rejected() {
    let base = TempDir::new().unwrap();
    let state = test_state(base.path());
    state.store.create_namespace("prod").await.unwrap();
    for bad in ["", ".lead", "trail.", "a..b", "bad key"] {
        let err = state
            .vault
            .update_vault("prod", &secrets(&[(bad, "v")]), EMAIL, "bad key")
            .await
            .unwrap_err();
        assert!(
            matches!(err, ServiceError::InvalidSecretKey(_)),
            "'{bad}' should be rejected"
        );
    }
}

#[tokio::test]
async fn management_fetch_redacts_vault_backed_leaves() {
    let base = TempDir::new().unwrap();
    let state = test_state(base.path());
    state.store.create_namespace("prod").await.unwrap();
    state
        .vault
        .update_vault("prod", &secrets(&[("db.password", "s3cret")]), EMAIL, "creds")
        .await
        .unwrap();
    put_config(
        &state,
        "prod/user-svc.yml",
        "user-svc",
        "db:\n  password: stub\n  host: localhost\n",
    )
    .await;

    let content = state.store.read("prod/user-svc.yml").await.unwrap();
    assert!(content.contains("password: <ENCRYPTED_VALUE>"));
    assert!(content.contains("host: localhost"));
    assert!(!content.contains("s3cret"));
    assert!(!content.contains("stub"));
}

#[tokio::test]
async fn internal_then_client_restores_vault_values() {
    let base = TempDir::new().unwrap();
    let state = test_state(base.path());
    state.store.create_namespace("prod").await.unwrap();
    state
        .vault
        .update_vault("prod", &secrets(&[("db.password", "s3cret")]), EMAIL, "creds")
        .await
        .unwrap();

    let original = "db:\n  password: s3cret\n  host: localhost\n";
    let redacted = state
        .processor
        .process_for_internal(original, "prod")
        .await
        .unwrap();
    assert!(redacted.contains("<ENCRYPTED_VALUE>"));
    let restored = state
        .processor
        .process_for_client(&redacted, "prod")
        .await
        .unwrap();
    assert_eq!(restored, original);
}

#[tokio::test]
async fn vault_for_unknown_namespace_is_not_found() {
    let base = TempDir::new().unwrap();
    let state = test_state(base.path());
    let err = state.vault.get_vault("nowhere").await.unwrap_err();
    assert!(matches!(err, ServiceError::NamespaceNotFound(_)));
}
