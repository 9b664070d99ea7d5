//! # Repository Gateway
//!
//! Owns the namespace-directory-to-repository mapping and serializes all
//! git work within a namespace. Every operation goes through a
//! [`RepoLease`]: opening validates the namespace, acquires the
//! namespace-scoped mutex, and the lease releases it on every exit path
//! when dropped. Operations across namespaces run fully in parallel.
//!
//! All git work shells out to the `git` binary; we deliberately avoid
//! linking a git library (OpenSSL coupling, cross-compilation pain).

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::{Arc, Mutex as StdMutex};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::constants::VAULT_DIR;
use crate::error::{Result, ServiceError};
use crate::observability::metrics;

/// Unit separator; never appears in commit metadata.
const FIELD_SEP: char = '\u{1f}';

const LOG_FORMAT: &str = "%H%x1f%an%x1f%ae%x1f%ad%x1f%s";
const LOG_DATE: &str = "format-local:%Y-%m-%d %H:%M:%S";

/// Canonical structured form of a git commit returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    pub commit_id: String,
    pub author: String,
    pub email: String,
    /// `YYYY-MM-DD HH:MM:SS` in the server's local zone.
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
}

/// Opens per-namespace repositories and serializes operations on them.
pub struct RepoGateway {
    base_path: PathBuf,
    locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl std::fmt::Debug for RepoGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoGateway")
            .field("base_path", &self.base_path)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to one namespace repository. The namespace mutex is
/// held from open to drop.
pub struct RepoLease {
    namespace: String,
    dir: PathBuf,
    _guard: OwnedMutexGuard<()>,
}

impl std::fmt::Debug for RepoLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoLease")
            .field("namespace", &self.namespace)
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl RepoGateway {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn lock_for(&self, namespace: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().expect("namespace lock table poisoned");
        Arc::clone(locks.entry(namespace.to_string()).or_default())
    }

    /// Open the namespace repository, acquiring its mutex.
    ///
    /// Fails with `NAMESPACE_NOT_FOUND` when the directory or its `.git/`
    /// is missing. Existence is re-checked after the mutex is acquired so
    /// a waiter queued behind a delete observes the deletion.
    pub async fn open(&self, namespace: &str) -> Result<RepoLease> {
        let dir = self.base_path.join(namespace);
        self.check_exists(namespace, &dir)?;
        let guard = self.lock_for(namespace).lock_owned().await;
        self.check_exists(namespace, &dir)?;
        Ok(RepoLease {
            namespace: namespace.to_string(),
            dir,
            _guard: guard,
        })
    }

    fn check_exists(&self, namespace: &str, dir: &Path) -> Result<()> {
        if !dir.is_dir() || !dir.join(".git").is_dir() {
            return Err(ServiceError::NamespaceNotFound(namespace.to_string()));
        }
        Ok(())
    }

    /// Create the namespace directory, initialize an empty repository, and
    /// create the `.vault/` subdirectory.
    pub async fn create_namespace(&self, namespace: &str) -> Result<()> {
        let lock = self.lock_for(namespace);
        let _guard = lock.lock_owned().await;
        let dir = self.base_path.join(namespace);
        if dir.exists() {
            return Err(ServiceError::NamespaceAlreadyExists(namespace.to_string()));
        }
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ServiceError::NamespaceCreationFailed(format!("{namespace}: {e}")))?;
        metrics::record_git_operation("init");
        let output = run_git(&dir, ["init", "--quiet"]).await?;
        if !output.status.success() {
            metrics::record_git_failure("init");
            let _ = tokio::fs::remove_dir_all(&dir).await;
            return Err(ServiceError::GitInitFailed(stderr_of(&output)));
        }
        tokio::fs::create_dir_all(dir.join(VAULT_DIR))
            .await
            .map_err(|e| ServiceError::NamespaceCreationFailed(format!("{namespace}: {e}")))?;
        Ok(())
    }

    /// Recursively delete the namespace directory. The caller runs the
    /// cache invalidation row afterwards.
    pub async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        let lease = self.open(namespace).await?;
        tokio::fs::remove_dir_all(&lease.dir)
            .await
            .map_err(|e| ServiceError::GitRepositoryAccessFailed(format!("{namespace}: {e}")))?;
        drop(lease);
        self.locks
            .lock()
            .expect("namespace lock table poisoned")
            .remove(namespace);
        Ok(())
    }

    /// Names of base-path subdirectories that look like namespaces
    /// (pass validation and contain `.git/`), sorted alphabetically.
    pub fn scan_namespaces(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = std::fs::read_dir(&self.base_path)
            .map_err(|e| ServiceError::GitRepositoryAccessFailed(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| ServiceError::GitRepositoryAccessFailed(e.to_string()))?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if crate::validation::validate_namespace(&name).is_err() {
                continue;
            }
            if entry.path().join(".git").is_dir() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

impl RepoLease {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Absolute directory of the namespace repository.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve HEAD, or `None` for a repository with no commits yet.
    pub async fn head_commit(&self) -> Result<Option<String>> {
        let output = run_git(&self.dir, ["rev-parse", "--verify", "HEAD"]).await?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(stdout_of(&output).trim().to_string()))
    }

    /// Most recent commit id touching `relative_path`, walking from HEAD.
    pub async fn latest_commit_for(&self, relative_path: &str) -> Result<Option<String>> {
        if self.head_commit().await?.is_none() {
            return Ok(None);
        }
        metrics::record_git_operation("log");
        let output = run_git(
            &self.dir,
            ["log", "-n", "1", "--format=%H", "--", relative_path],
        )
        .await?;
        if !output.status.success() {
            metrics::record_git_failure("log");
            return Err(ServiceError::GitLogFailed(stderr_of(&output)));
        }
        let commit = stdout_of(&output).trim().to_string();
        Ok((!commit.is_empty()).then_some(commit))
    }

    /// Write file content (creating parent directories), stage it, and
    /// commit. Returns the new commit id.
    pub async fn commit_file(
        &self,
        relative_path: &str,
        content: &str,
        email: &str,
        message: &str,
    ) -> Result<String> {
        let file = self.dir.join(relative_path);
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ServiceError::GitRepositoryAccessFailed(e.to_string()))?;
        }
        tokio::fs::write(&file, content)
            .await
            .map_err(|e| ServiceError::GitRepositoryAccessFailed(e.to_string()))?;
        self.stage(relative_path).await?;
        self.commit_staged(email, message).await
    }

    /// Remove a file from the working tree and the index, then commit.
    pub async fn remove_file_and_commit(
        &self,
        relative_path: &str,
        email: &str,
        message: &str,
    ) -> Result<String> {
        let output = run_git(&self.dir, ["rm", "--quiet", "--", relative_path]).await?;
        if !output.status.success() {
            metrics::record_git_failure("commit");
            return Err(ServiceError::GitCommitFailed(stderr_of(&output)));
        }
        self.commit_staged(email, message).await
    }

    async fn stage(&self, relative_path: &str) -> Result<()> {
        let output = run_git(&self.dir, ["add", "--", relative_path]).await?;
        if !output.status.success() {
            metrics::record_git_failure("commit");
            return Err(ServiceError::GitCommitFailed(stderr_of(&output)));
        }
        Ok(())
    }

    /// Commit whatever is staged. Author name is the email's local part.
    pub async fn commit_staged(&self, email: &str, message: &str) -> Result<String> {
        let author = author_name(email);
        metrics::record_git_operation("commit");
        let args: Vec<String> = vec![
            "-c".into(),
            format!("user.name={author}"),
            "-c".into(),
            format!("user.email={email}"),
            "commit".into(),
            "--quiet".into(),
            // Identical content must still produce a commit, never a
            // silent no-op
            "--allow-empty".into(),
            "-m".into(),
            message.into(),
            "--author".into(),
            format!("{author} <{email}>"),
        ];
        let output = run_git(&self.dir, &args).await?;
        if !output.status.success() {
            metrics::record_git_failure("commit");
            return Err(ServiceError::GitCommitFailed(stderr_of(&output)));
        }
        self.head_commit()
            .await?
            .ok_or_else(|| ServiceError::GitCommitFailed("no HEAD after commit".into()))
    }

    /// Up to `limit` most recent commits touching `relative_path`.
    pub async fn history_for(&self, relative_path: &str, limit: usize) -> Result<Vec<CommitRecord>> {
        if self.head_commit().await?.is_none() {
            return Ok(Vec::new());
        }
        self.log_records(limit, Some(relative_path)).await
    }

    /// Up to `limit` most recent commits on the default branch. An empty
    /// repository yields an empty list.
    pub async fn recent_commits(&self, limit: usize) -> Result<Vec<CommitRecord>> {
        if self.head_commit().await?.is_none() {
            return Ok(Vec::new());
        }
        self.log_records(limit, None).await
    }

    async fn log_records(
        &self,
        limit: usize,
        relative_path: Option<&str>,
    ) -> Result<Vec<CommitRecord>> {
        metrics::record_git_operation("log");
        let mut args: Vec<String> = vec![
            "log".into(),
            "-n".into(),
            limit.to_string(),
            format!("--format={LOG_FORMAT}"),
            format!("--date={LOG_DATE}"),
        ];
        if let Some(path) = relative_path {
            args.push("--".into());
            args.push(path.into());
        }
        let output = run_git(&self.dir, &args).await?;
        if !output.status.success() {
            metrics::record_git_failure("log");
            return Err(ServiceError::GitLogFailed(stderr_of(&output)));
        }
        Ok(stdout_of(&output)
            .lines()
            .filter_map(parse_log_line)
            .collect())
    }

    /// Metadata for a single commit, or `None` when the id does not
    /// resolve in this repository.
    pub async fn commit_record(&self, commit_id: &str) -> Result<Option<CommitRecord>> {
        metrics::record_git_operation("log");
        let args: Vec<String> = vec![
            "log".into(),
            "-1".into(),
            format!("--format={LOG_FORMAT}"),
            format!("--date={LOG_DATE}"),
            commit_id.into(),
            "--".into(),
        ];
        let output = run_git(&self.dir, &args).await?;
        if !output.status.success() {
            debug!(
                "commit {commit_id} not resolvable in {}: {}",
                self.namespace,
                stderr_of(&output)
            );
            return Ok(None);
        }
        Ok(stdout_of(&output).lines().next().and_then(parse_log_line))
    }

    /// Unified diff of a commit against its first parent, or against the
    /// empty tree for a root commit.
    pub async fn diff(&self, commit_id: &str) -> Result<String> {
        metrics::record_git_operation("diff");
        let output = run_git(
            &self.dir,
            [
                "diff-tree",
                "-p",
                "--root",
                "--no-commit-id",
                "--no-color",
                commit_id,
            ],
        )
        .await?;
        if !output.status.success() {
            metrics::record_git_failure("diff");
            return Err(ServiceError::GitDiffFailed(stderr_of(&output)));
        }
        Ok(stdout_of(&output))
    }
}

/// Commit author convention: the local part of the email address.
pub fn author_name(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

fn parse_log_line(line: &str) -> Option<CommitRecord> {
    let mut fields = line.split(FIELD_SEP);
    let commit_id = fields.next()?.to_string();
    let author = fields.next()?.to_string();
    let email = fields.next()?.to_string();
    let date = fields.next()?.to_string();
    let message = fields.next().map(str::to_string);
    Some(CommitRecord {
        commit_id,
        author,
        email,
        date,
        commit_message: message,
    })
}

async fn run_git<I, S>(dir: &Path, args: I) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .await
        .map_err(|e| ServiceError::GitRepositoryAccessFailed(format!("failed to run git: {e}")))
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_name_is_local_part() {
        assert_eq!(author_name("jane.doe@example.com"), "jane.doe");
        assert_eq!(author_name("no-at"), "no-at");
    }

    #[test]
    fn log_line_parsing() {
        let line = format!(
            "abc123{sep}jane{sep}jane@example.com{sep}2026-08-01 10:00:00{sep}first commit",
            sep = FIELD_SEP
        );
        let record = parse_log_line(&line).unwrap();
        assert_eq!(record.commit_id, "abc123");
        assert_eq!(record.author, "jane");
        assert_eq!(record.email, "jane@example.com");
        assert_eq!(record.date, "2026-08-01 10:00:00");
        assert_eq!(record.commit_message.as_deref(), Some("first commit"));
        assert!(parse_log_line("not-a-log-line").is_none());
    }
}
