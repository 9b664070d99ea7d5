//! # Config Store
//!
//! File-level CRUD on configuration files, backed by the repository
//! gateway. Every mutation produces exactly one commit, runs its cache
//! invalidation row, and (for updates) enqueues a refresh notification.
//! Reads pass through the internal-mode secret processor so management
//! surfaces never see plaintext secrets.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::{self, invalidation, Cache};
use crate::constants::DEFAULT_CONFIG_TEMPLATE;
use crate::error::{Result, ServiceError};
use crate::git::{CommitRecord, RepoGateway};
use crate::notify::Notifier;
use crate::validation;
use crate::vault::SecretProcessor;

/// Commit metadata plus the cleaned unified diff of that commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitChanges {
    #[serde(flatten)]
    pub commit: CommitRecord,
    pub changes: String,
}

pub struct ConfigStore {
    gateway: Arc<RepoGateway>,
    processor: Arc<SecretProcessor>,
    cache: Arc<Cache>,
    notifier: Arc<Notifier>,
    history_size: usize,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("history_size", &self.history_size)
            .finish_non_exhaustive()
    }
}

impl ConfigStore {
    pub fn new(
        gateway: Arc<RepoGateway>,
        processor: Arc<SecretProcessor>,
        cache: Arc<Cache>,
        notifier: Arc<Notifier>,
        history_size: usize,
    ) -> Self {
        Self {
            gateway,
            processor,
            cache,
            notifier,
            history_size,
        }
    }

    /// Normalize a config file path into `(full, namespace, relative)`.
    /// The namespace prefix must be a valid namespace and the file a
    /// `.yml` under it.
    fn split_path(path: &str) -> Result<(String, String, String)> {
        let full = validation::validate_safe_path(path)?;
        let Some((namespace, relative)) = full.split_once('/') else {
            return Err(ServiceError::InvalidPath(format!(
                "'{path}' must start with a namespace prefix"
            )));
        };
        validation::validate_namespace(namespace)?;
        if relative.is_empty() {
            return Err(ServiceError::InvalidPath(format!(
                "'{path}' has no file component"
            )));
        }
        if !relative.ends_with(".yml") {
            return Err(ServiceError::InvalidPath(format!(
                "'{path}' must end with .yml"
            )));
        }
        Ok((
            full.clone(),
            namespace.to_string(),
            relative.to_string(),
        ))
    }

    /// Create a configuration file from the default template.
    /// Returns the id of the first commit.
    pub async fn initialize(&self, path: &str, app_name: &str, email: &str) -> Result<String> {
        validation::validate_app_name(app_name)?;
        validation::validate_email(email)?;
        let (_, namespace, relative) = Self::split_path(path)?;

        let lease = self.gateway.open(&namespace).await?;
        if lease.dir().join(&relative).exists() {
            return Err(ServiceError::ConfigFileAlreadyExists(path.to_string()));
        }
        let content = DEFAULT_CONFIG_TEMPLATE.replace("<app-name>", app_name);
        let commit_id = lease
            .commit_file(
                &relative,
                &content,
                email,
                &format!("First commit ApplicationName - {app_name}"),
            )
            .await?;
        drop(lease);

        invalidation::on_config_created(&self.cache, &namespace);
        Ok(commit_id)
    }

    /// Read a configuration file with internal-mode secret redaction.
    /// Cached under `config-content[path]`.
    pub async fn read(&self, path: &str) -> Result<String> {
        let (full, namespace, relative) = Self::split_path(path)?;
        if let Some(content) = self.cache.get::<String>(cache::CONFIG_CONTENT, &full) {
            return Ok(content);
        }

        let lease = self.gateway.open(&namespace).await?;
        let raw = match tokio::fs::read_to_string(lease.dir().join(&relative)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ServiceError::ConfigFileNotFound(full));
            }
            Err(e) => {
                return Err(ServiceError::ConfigFileReadFailed(format!("{full}: {e}")));
            }
        };
        // Release the namespace lease before the processor takes its own
        drop(lease);

        let content = match self.processor.process_for_internal(&raw, &namespace).await {
            Ok(processed) => processed,
            Err(e) => {
                // Read path is best-effort: surface the raw file instead
                warn!("secret redaction failed for {full}: {e}");
                raw
            }
        };
        self.cache.put(cache::CONFIG_CONTENT, &full, &content);
        Ok(content)
    }

    /// Read a resolver source: `None` when the file does not exist.
    pub async fn read_optional(&self, path: &str) -> Result<Option<String>> {
        match self.read(path).await {
            Ok(content) => Ok(Some(content)),
            Err(ServiceError::ConfigFileNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Update a configuration file under optimistic concurrency.
    /// Returns the new commit id.
    #[allow(clippy::too_many_arguments, reason = "mirrors the wire payload")]
    pub async fn update(
        &self,
        path: &str,
        app_name: &str,
        content: &str,
        message: &str,
        expected_commit_id: Option<&str>,
        email: &str,
    ) -> Result<String> {
        validation::validate_app_name(app_name)?;
        validation::validate_email(email)?;
        validation::validate_yaml_content(content)?;
        validation::validate_commit_message(message)?;
        let expected = expected_commit_id.ok_or(ServiceError::MissingCommitId)?;
        validation::validate_commit_id(expected)?;
        let (full, namespace, relative) = Self::split_path(path)?;

        // Secret redaction is fatal on the write path; plaintext for keys
        // absent from the vault is written through as supplied
        let processed = self
            .processor
            .process_for_internal(content, &namespace)
            .await?;

        let lease = self.gateway.open(&namespace).await?;
        let current = lease
            .latest_commit_for(&relative)
            .await?
            .ok_or_else(|| ServiceError::ConfigFileNotFound(full.clone()))?;
        if current != expected {
            return Err(ServiceError::ConfigConflict {
                expected: expected.to_string(),
                actual: current,
            });
        }
        let new_commit = lease
            .commit_file(&relative, &processed, email, message)
            .await
            .map_err(|e| match e {
                ServiceError::GitRepositoryAccessFailed(msg) => {
                    ServiceError::ConfigFileUpdateFailed(msg)
                }
                other => other,
            })?;
        drop(lease);

        invalidation::on_config_updated(&self.cache, &full, &namespace);
        self.notifier
            .send_refresh(&namespace, app_name, Some(&new_commit))
            .await;
        Ok(new_commit)
    }

    /// Delete a configuration file via a commit removing it.
    pub async fn delete(&self, path: &str, message: &str, email: &str) -> Result<String> {
        validation::validate_email(email)?;
        validation::validate_commit_message(message)?;
        let (full, namespace, relative) = Self::split_path(path)?;

        let lease = self.gateway.open(&namespace).await?;
        if !lease.dir().join(&relative).exists() {
            return Err(ServiceError::ConfigFileNotFound(full));
        }
        let commit_id = lease
            .remove_file_and_commit(&relative, email, message)
            .await?;
        drop(lease);

        invalidation::on_config_deleted(&self.cache, &full, &namespace);
        Ok(commit_id)
    }

    /// First commit id touching the file, walking from HEAD.
    /// Cached under `latest-commit[path]`.
    pub async fn latest_commit_id(&self, path: &str) -> Result<String> {
        let (full, namespace, relative) = Self::split_path(path)?;
        if let Some(commit) = self.cache.get::<String>(cache::LATEST_COMMIT, &full) {
            return Ok(commit);
        }
        let lease = self.gateway.open(&namespace).await?;
        let commit = lease
            .latest_commit_for(&relative)
            .await?
            .ok_or(ServiceError::ConfigFileNotFound(full.clone()))?;
        drop(lease);
        self.cache.put(cache::LATEST_COMMIT, &full, &commit);
        Ok(commit)
    }

    /// Latest commit id, or `None` when the file has no history.
    pub async fn try_latest_commit_id(&self, path: &str) -> Result<Option<String>> {
        match self.latest_commit_id(path).await {
            Ok(commit) => Ok(Some(commit)),
            Err(ServiceError::ConfigFileNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Most recent commits touching the file, newest first.
    /// Cached under `commit-history[path]`.
    pub async fn history(&self, path: &str) -> Result<Vec<CommitRecord>> {
        let (full, namespace, relative) = Self::split_path(path)?;
        if let Some(records) = self
            .cache
            .get::<Vec<CommitRecord>>(cache::COMMIT_HISTORY, &full)
        {
            return Ok(records);
        }
        let lease = self.gateway.open(&namespace).await?;
        let records = lease.history_for(&relative, self.history_size).await?;
        drop(lease);
        if records.is_empty() {
            return Err(ServiceError::ConfigFileNotFound(full));
        }
        self.cache.put(cache::COMMIT_HISTORY, &full, &records);
        Ok(records)
    }

    /// Commit metadata plus its cleaned diff against the first parent
    /// (or the empty tree for a root commit).
    /// Cached under `commit-details[commitId_namespace]`.
    pub async fn commit_changes(&self, commit_id: &str, namespace: &str) -> Result<CommitChanges> {
        validation::validate_commit_id(commit_id)?;
        validation::validate_namespace(namespace)?;
        let key = format!("{commit_id}_{namespace}");
        if let Some(changes) = self.cache.get::<CommitChanges>(cache::COMMIT_DETAILS, &key) {
            return Ok(changes);
        }

        let lease = self.gateway.open(namespace).await?;
        let commit = lease.commit_record(commit_id).await?.ok_or_else(|| {
            ServiceError::ConfigFileNotFound(format!(
                "commit {commit_id} in namespace {namespace}"
            ))
        })?;
        let diff = lease.diff(commit_id).await?;
        drop(lease);

        let changes = CommitChanges {
            commit,
            changes: strip_diff_metadata(&diff),
        };
        self.cache.put(cache::COMMIT_DETAILS, &key, &changes);
        Ok(changes)
    }

    /// Most recent commits on the namespace's default branch; an empty
    /// repository yields an empty list.
    /// Cached under `namespace-events[namespace]`.
    pub async fn namespace_events(&self, namespace: &str) -> Result<Vec<CommitRecord>> {
        validation::validate_namespace(namespace)?;
        if let Some(records) = self
            .cache
            .get::<Vec<CommitRecord>>(cache::NAMESPACE_EVENTS, namespace)
        {
            return Ok(records);
        }
        let lease = self.gateway.open(namespace).await?;
        let records = lease.recent_commits(self.history_size).await?;
        drop(lease);
        self.cache.put(cache::NAMESPACE_EVENTS, namespace, &records);
        Ok(records)
    }

    /// Names under a namespace directory: `.yml` files with the suffix
    /// stripped, subdirectories with `/` appended, dotfiles excluded,
    /// sorted case-insensitively.
    pub async fn list_directory(&self, namespace: &str, path: Option<&str>) -> Result<Vec<String>> {
        validation::validate_namespace(namespace)?;
        let subpath = match path {
            Some(p) if !p.trim().is_empty() => validation::validate_safe_path(p)?,
            _ => String::new(),
        };
        let key = format!("{namespace}/{subpath}");
        if let Some(names) = self
            .cache
            .get::<Vec<String>>(cache::DIRECTORY_LISTING, &key)
        {
            return Ok(names);
        }

        let lease = self.gateway.open(namespace).await?;
        let dir = if subpath.is_empty() {
            lease.dir().to_path_buf()
        } else {
            lease.dir().join(&subpath)
        };
        if !dir.is_dir() {
            return Err(ServiceError::ConfigFileNotFound(key));
        }
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| ServiceError::ConfigFileReadFailed(e.to_string()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ServiceError::ConfigFileReadFailed(e.to_string()))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if entry.path().is_dir() {
                names.push(format!("{name}/"));
            } else if let Some(base) = name.strip_suffix(".yml") {
                names.push(base.to_string());
            }
        }
        drop(lease);
        names.sort_by_key(|name| name.to_lowercase());
        self.cache.put(cache::DIRECTORY_LISTING, &key, &names);
        Ok(names)
    }

    /// Namespaces on disk: base-path subdirectories that validate and
    /// contain a repository. Cached under `namespaces[all]`.
    pub async fn list_namespaces(&self) -> Result<Vec<String>> {
        if let Some(names) = self
            .cache
            .get::<Vec<String>>(cache::NAMESPACES, invalidation::ALL_NAMESPACES_KEY)
        {
            return Ok(names);
        }
        let names = self.gateway.scan_namespaces()?;
        self.cache
            .put(cache::NAMESPACES, invalidation::ALL_NAMESPACES_KEY, &names);
        Ok(names)
    }

    /// Create a namespace: directory, empty repository, vault directory.
    pub async fn create_namespace(&self, namespace: &str) -> Result<()> {
        validation::validate_namespace(namespace)?;
        self.gateway.create_namespace(namespace).await?;
        invalidation::on_namespace_created(&self.cache);
        Ok(())
    }

    /// Delete a namespace and every cache entry scoped to it.
    pub async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        validation::validate_namespace(namespace)?;
        self.gateway.delete_namespace(namespace).await?;
        invalidation::on_namespace_deleted(&self.cache, namespace);
        Ok(())
    }
}

/// Diff header prefixes removed from commit change output. Hunk headers
/// (`@@`) and content lines are preserved.
const DIFF_METADATA_PREFIXES: [&str; 11] = [
    "diff --git",
    "index ",
    "--- ",
    "+++ ",
    "new file mode",
    "deleted file mode",
    "similarity index",
    "rename from",
    "rename to",
    "copy from",
    "copy to",
];

/// Strip git diff metadata lines.
///
/// Known limitation: the filter matches by line prefix, so a context line
/// whose text itself starts with one of the prefixes (after the leading
/// space) is kept, but an unprefixed metadata-looking line inside a YAML
/// value would be dropped.
pub fn strip_diff_metadata(diff: &str) -> String {
    diff.lines()
        .filter(|line| {
            !DIFF_METADATA_PREFIXES
                .iter()
                .any(|prefix| line.starts_with(prefix))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_path_shapes() {
        let (full, ns, rel) = ConfigStore::split_path("/prod/team/user-svc.yml").unwrap();
        assert_eq!(full, "prod/team/user-svc.yml");
        assert_eq!(ns, "prod");
        assert_eq!(rel, "team/user-svc.yml");

        assert!(ConfigStore::split_path("prod").is_err());
        assert!(ConfigStore::split_path("prod/app.yaml").is_err());
        assert!(ConfigStore::split_path("prod/../x/app.yml").is_err());
        assert!(ConfigStore::split_path("system/app.yml").is_err());
    }

    #[test]
    fn diff_metadata_is_stripped() {
        let diff = "\
diff --git a/prod/app.yml b/prod/app.yml
new file mode 100644
index 0000000..3b18e51
--- /dev/null
+++ b/prod/app.yml
@@ -0,0 +1,2 @@
+server:
+  port: 8080";
        let cleaned = strip_diff_metadata(diff);
        assert_eq!(
            cleaned,
            "@@ -0,0 +1,2 @@\n+server:\n+  port: 8080"
        );
    }

    #[test]
    fn diff_content_lines_survive() {
        let diff = "@@ -1,2 +1,2 @@\n-old: 1\n+new: 2\n context line";
        assert_eq!(strip_diff_metadata(diff), diff);
    }
}
