//! # Secret Processor
//!
//! Two-mode transformation over YAML text using the namespace vault.
//! Client mode substitutes decrypted secrets at matching leaf paths so
//! pull clients never see placeholders; internal mode overwrites matching
//! leaves with `<ENCRYPTED_VALUE>` so management surfaces never see
//! plaintext. One traversal, two leaf operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::constants::ENCRYPTED_VALUE_SENTINEL;
use crate::error::Result;
use crate::vault::VaultStore;
use crate::yaml;

pub struct SecretProcessor {
    vault: Arc<VaultStore>,
}

impl std::fmt::Debug for SecretProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretProcessor").finish_non_exhaustive()
    }
}

impl SecretProcessor {
    pub fn new(vault: Arc<VaultStore>) -> Self {
        Self { vault }
    }

    /// Client-facing transformation: leaves whose dotted path has a vault
    /// entry are replaced with the decrypted value.
    ///
    /// Callers on the read path treat an `Err` as "return the original
    /// text"; the sentinel must never reach a pull client.
    pub async fn process_for_client(&self, yaml_text: &str, namespace: &str) -> Result<String> {
        let secrets = self.vault.get_vault(namespace).await?;
        let mut tree = yaml::parse(yaml_text)?;
        walk(&mut tree, &mut String::new(), &mut |path, leaf| {
            if let Some(secret) = secrets.get(path) {
                *leaf = Value::String(secret.clone());
            } else if is_sentinel(leaf) {
                warn!("no vault entry in {namespace} for placeholder at '{path}'");
            }
        });
        yaml::dump(&tree)
    }

    /// Internal transformation: leaves whose dotted path has a vault entry
    /// are overwritten with the `<ENCRYPTED_VALUE>` placeholder.
    pub async fn process_for_internal(&self, yaml_text: &str, namespace: &str) -> Result<String> {
        let secrets = self.vault.get_vault(namespace).await?;
        let mut tree = yaml::parse(yaml_text)?;
        redact(&mut tree, &secrets);
        yaml::dump(&tree)
    }
}

/// Redact every leaf whose dotted path appears in the secret map.
pub fn redact(tree: &mut Mapping, secrets: &BTreeMap<String, String>) {
    walk(tree, &mut String::new(), &mut |path, leaf| {
        if secrets.contains_key(path) {
            *leaf = Value::String(ENCRYPTED_VALUE_SENTINEL.to_string());
        }
    });
}

fn is_sentinel(leaf: &Value) -> bool {
    matches!(leaf, Value::String(s) if s == ENCRYPTED_VALUE_SENTINEL)
}

/// Depth-first traversal invoking `leaf_op(dotted_path, leaf)` at every
/// non-mapping node. Sequences are leaves.
fn walk(map: &mut Mapping, path: &mut String, leaf_op: &mut impl FnMut(&str, &mut Value)) {
    for (key, value) in map.iter_mut() {
        let segment = yaml::key_to_string(key);
        let parent_len = path.len();
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(&segment);
        match value {
            Value::Mapping(nested) => walk(nested, path, leaf_op),
            leaf => leaf_op(path, leaf),
        }
        path.truncate(parent_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn redact_replaces_known_paths_only() {
        let mut tree = yaml::parse("db:\n  password: stub\n  host: localhost\n").unwrap();
        redact(&mut tree, &secrets(&[("db.password", "s3cret")]));
        let flat = yaml::flatten(&tree);
        assert_eq!(
            flat.get("db.password"),
            Some(&Value::String(ENCRYPTED_VALUE_SENTINEL.into()))
        );
        assert_eq!(flat.get("db.host"), Some(&Value::String("localhost".into())));
    }

    #[test]
    fn walk_visits_sequences_as_leaves() {
        let mut tree = yaml::parse("a:\n  b:\n    - 1\n    - 2\n").unwrap();
        let mut visited = Vec::new();
        walk(&mut tree, &mut String::new(), &mut |path, _| {
            visited.push(path.to_string());
        });
        assert_eq!(visited, vec!["a.b".to_string()]);
    }

    #[test]
    fn walk_paths_are_dotted() {
        let mut tree = yaml::parse("a:\n  b:\n    c: 1\nd: 2\n").unwrap();
        let mut visited = Vec::new();
        walk(&mut tree, &mut String::new(), &mut |path, _| {
            visited.push(path.to_string());
        });
        assert_eq!(visited, vec!["a.b.c".to_string(), "d".to_string()]);
    }
}
