//! Shared helpers for the filesystem-backed integration tests.
//!
//! Each test gets its own temp base directory and a fully wired
//! [`AppState`]; the real `git` binary does the repository work.

use std::collections::HashMap;
use std::path::Path;

use git_config_server::config::Settings;
use git_config_server::runtime::initialization::{build_state, AppState};

pub const EMAIL: &str = "dev@example.com";

/// Base64 of a fixed 32-byte test master key.
pub const TEST_MASTER_KEY: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";

pub fn test_state(base_path: &Path) -> AppState {
    let settings = Settings {
        base_path: base_path.to_path_buf(),
        vault_master_key: Some(TEST_MASTER_KEY.to_string()),
        commit_history_size: 20,
        cache_ttl: 600,
        refresh_notify_url: HashMap::new(),
        port: 0,
    };
    build_state(settings).expect("state wiring")
}

/// Create a config file and replace its template with `content`.
/// Returns the commit id of the content write.
pub async fn put_config(state: &AppState, path: &str, app_name: &str, content: &str) -> String {
    let first = state
        .store
        .initialize(path, app_name, EMAIL)
        .await
        .expect("initialize config");
    state
        .store
        .update(path, app_name, content, "seed content", Some(&first), EMAIL)
        .await
        .expect("seed config content")
}
