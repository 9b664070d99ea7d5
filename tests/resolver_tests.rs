//! # Resolver Integration Tests
//!
//! Source precedence, profile handling, label parsing, secret
//! substitution, and the version identifier contract.

mod common;

use std::collections::BTreeMap;

use common::{put_config, test_state, EMAIL};
use git_config_server::error::ServiceError;
use tempfile::TempDir;

fn property<'a>(
    resolved: &'a git_config_server::resolver::ResolvedConfig,
    key: &str,
) -> Option<&'a serde_json::Value> {
    resolved.property_sources[0].source.get(key)
}

#[tokio::test]
async fn merge_precedence_base_then_app_then_profile() {
    let base = TempDir::new().unwrap();
    let state = test_state(base.path());
    state.store.create_namespace("prod").await.unwrap();
    put_config(
        &state,
        "prod/application.yml",
        "application",
        "server:\n  port: 1000\nlogging:\n  level: INFO\nshared: base\n",
    )
    .await;
    put_config(
        &state,
        "prod/user-svc.yml",
        "user-svc",
        "server:\n  port: 2000\napp: user-svc\n",
    )
    .await;
    put_config(
        &state,
        "prod/user-svc-dev.yml",
        "user-svc-dev",
        "server:\n  port: 3000\ndebug: true\n",
    )
    .await;

    let resolved = state
        .resolver
        .resolve("user-svc", "dev", Some("prod"))
        .await
        .unwrap();

    assert_eq!(resolved.property_sources.len(), 1);
    assert_eq!(resolved.property_sources[0].name, "merged-user-svc-dev");
    assert_eq!(property(&resolved, "server.port"), Some(&serde_json::json!(3000)));
    assert_eq!(
        property(&resolved, "logging.level"),
        Some(&serde_json::json!("INFO"))
    );
    assert_eq!(property(&resolved, "shared"), Some(&serde_json::json!("base")));
    assert_eq!(property(&resolved, "app"), Some(&serde_json::json!("user-svc")));
    assert_eq!(property(&resolved, "debug"), Some(&serde_json::json!(true)));

    // Version is the latest commit of the application base file
    let expected = state
        .store
        .latest_commit_id("prod/user-svc.yml")
        .await
        .unwrap();
    assert_eq!(resolved.version.as_deref(), Some(expected.as_str()));
}

#[tokio::test]
async fn default_profile_loads_no_overlay() {
    let base = TempDir::new().unwrap();
    let state = test_state(base.path());
    state.store.create_namespace("prod").await.unwrap();
    put_config(&state, "prod/user-svc.yml", "user-svc", "app: base\n").await;
    put_config(
        &state,
        "prod/user-svc-default.yml",
        "user-svc-default",
        "app: overlay\n",
    )
    .await;

    let resolved = state
        .resolver
        .resolve("user-svc", "default", Some("prod"))
        .await
        .unwrap();
    assert_eq!(resolved.property_sources[0].name, "merged-user-svc-default");
    // The `default` segment never loads `<app>-default.yml`
    assert_eq!(property(&resolved, "app"), Some(&serde_json::json!("base")));
}

#[tokio::test]
async fn profile_list_applies_left_to_right() {
    let base = TempDir::new().unwrap();
    let state = test_state(base.path());
    state.store.create_namespace("prod").await.unwrap();
    put_config(&state, "prod/user-svc.yml", "user-svc", "a: app\nb: app\n").await;
    put_config(&state, "prod/user-svc-one.yml", "user-svc-one", "a: one\n").await;
    put_config(&state, "prod/user-svc-two.yml", "user-svc-two", "a: two\nb: two\n").await;

    let resolved = state
        .resolver
        .resolve("user-svc", "one, two", Some("prod"))
        .await
        .unwrap();
    assert_eq!(resolved.profiles, vec!["one", "two"]);
    assert_eq!(property(&resolved, "a"), Some(&serde_json::json!("two")));
    assert_eq!(property(&resolved, "b"), Some(&serde_json::json!("two")));
}

#[tokio::test]
async fn secrets_substitute_on_the_read_path() {
    let base = TempDir::new().unwrap();
    let state = test_state(base.path());
    state.store.create_namespace("prod").await.unwrap();
    let secrets: BTreeMap<String, String> =
        [("db.password".to_string(), "s3cret".to_string())].into();
    state
        .vault
        .update_vault("prod", &secrets, EMAIL, "creds")
        .await
        .unwrap();
    put_config(
        &state,
        "prod/user-svc.yml",
        "user-svc",
        "db:\n  password: stub\n  host: localhost\n",
    )
    .await;

    let resolved = state
        .resolver
        .resolve("user-svc", "default", Some("prod"))
        .await
        .unwrap();
    assert_eq!(
        property(&resolved, "db.password"),
        Some(&serde_json::json!("s3cret"))
    );
    assert_eq!(
        property(&resolved, "db.host"),
        Some(&serde_json::json!("localhost"))
    );
}

#[tokio::test]
async fn missing_label_uses_main_namespace() {
    let base = TempDir::new().unwrap();
    let state = test_state(base.path());
    state.store.create_namespace("main").await.unwrap();
    put_config(&state, "main/user-svc.yml", "user-svc", "app: main-ns\n").await;

    let resolved = state.resolver.resolve("user-svc", "", None).await.unwrap();
    assert_eq!(resolved.profiles, vec!["default"]);
    assert_eq!(property(&resolved, "app"), Some(&serde_json::json!("main-ns")));
}

#[tokio::test]
async fn label_subpath_selects_nested_files() {
    let base = TempDir::new().unwrap();
    let state = test_state(base.path());
    state.store.create_namespace("prod").await.unwrap();
    put_config(
        &state,
        "prod/team/billing/user-svc.yml",
        "user-svc",
        "app: nested\n",
    )
    .await;

    let resolved = state
        .resolver
        .resolve("user-svc", "default", Some("prod/team/billing"))
        .await
        .unwrap();
    assert_eq!(property(&resolved, "app"), Some(&serde_json::json!("nested")));
    assert_eq!(resolved.label.as_deref(), Some("prod/team/billing"));
}

#[tokio::test]
async fn no_sources_is_not_found() {
    let base = TempDir::new().unwrap();
    let state = test_state(base.path());
    state.store.create_namespace("prod").await.unwrap();
    let err = state
        .resolver
        .resolve("ghost", "default", Some("prod"))
        .await
        .unwrap_err();
    match err {
        ServiceError::ConfigFileNotFound(path) => assert_eq!(path, "prod/ghost.yml"),
        other => panic!("expected CONFIG_FILE_NOT_FOUND, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_source_is_skipped_best_effort() {
    let base = TempDir::new().unwrap();
    let state = test_state(base.path());
    state.store.create_namespace("prod").await.unwrap();
    put_config(&state, "prod/user-svc.yml", "user-svc", "app: ok\n").await;
    // Corrupt the profile overlay on disk, bypassing write validation
    std::fs::write(
        base.path().join("prod/user-svc-dev.yml"),
        "app: [broken\n",
    )
    .unwrap();

    let resolved = state
        .resolver
        .resolve("user-svc", "dev", Some("prod"))
        .await
        .unwrap();
    assert_eq!(property(&resolved, "app"), Some(&serde_json::json!("ok")));
}
