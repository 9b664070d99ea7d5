//! # Validation
//!
//! Pure input validation for identifiers, paths, YAML payloads, commit ids,
//! emails, commit messages, and profile lists. Validators have no side
//! effects and run at every external boundary before any filesystem or git
//! operation.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::constants::RESERVED_NAMESPACES;
use crate::error::{Result, ServiceError};

const MAX_NAME_LEN: usize = 50;
const MAX_EMAIL_LEN: usize = 100;
const MAX_SECRET_KEY_LEN: usize = 100;
const MAX_COMMIT_MESSAGE_LEN: usize = 500;
const MAX_PROFILE_LEN: usize = 200;

static SAFE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9_-]*[A-Za-z0-9])?$").expect("safe-name regex is valid")
});

static SAFE_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9/_.\-]+$").expect("safe-path regex is valid"));

static SECRET_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._\-]+$").expect("secret-key regex is valid"));

static SECRET_KEY_SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").expect("secret-key segment regex is valid"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
        .expect("email regex is valid")
});

static COMMIT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{7,64}$").expect("commit-id regex is valid"));

/// Validate a namespace name: non-empty, bounded, safe characters, not reserved.
pub fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() {
        return Err(ServiceError::InvalidNamespace("must not be empty".into()));
    }
    if namespace.len() > MAX_NAME_LEN {
        return Err(ServiceError::InvalidNamespace(format!(
            "'{namespace}' exceeds {MAX_NAME_LEN} characters"
        )));
    }
    if !SAFE_NAME_RE.is_match(namespace) {
        return Err(ServiceError::InvalidNamespace(format!(
            "'{namespace}' contains unsafe characters"
        )));
    }
    if RESERVED_NAMESPACES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(namespace))
    {
        return Err(ServiceError::InvalidNamespace(format!(
            "'{namespace}' is reserved"
        )));
    }
    Ok(())
}

/// Validate an application name: non-empty, bounded, safe characters.
pub fn validate_app_name(app_name: &str) -> Result<()> {
    if app_name.is_empty() {
        return Err(ServiceError::InvalidAppName("must not be empty".into()));
    }
    if app_name.len() > MAX_NAME_LEN {
        return Err(ServiceError::InvalidAppName(format!(
            "'{app_name}' exceeds {MAX_NAME_LEN} characters"
        )));
    }
    if !SAFE_NAME_RE.is_match(app_name) {
        return Err(ServiceError::InvalidAppName(format!(
            "'{app_name}' contains unsafe characters"
        )));
    }
    Ok(())
}

/// Validate a repository-relative path and return its normalized form.
///
/// Rejects traversal sequences and backslashes, strips one leading `/`,
/// and restricts the remainder to `[A-Za-z0-9/_.-]`.
pub fn validate_safe_path(path: &str) -> Result<String> {
    if path.contains("..") || path.contains("./") || path.contains('\\') {
        return Err(ServiceError::InvalidPath(format!(
            "'{path}' contains a traversal sequence"
        )));
    }
    let normalized = path.strip_prefix('/').unwrap_or(path);
    if normalized.is_empty() {
        return Err(ServiceError::InvalidPath("must not be empty".into()));
    }
    if !SAFE_PATH_RE.is_match(normalized) {
        return Err(ServiceError::InvalidPath(format!(
            "'{path}' contains unsafe characters"
        )));
    }
    Ok(normalized.to_string())
}

/// Validate a dotted vault secret key.
pub fn validate_secret_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(ServiceError::InvalidSecretKey("must not be empty".into()));
    }
    if key.len() > MAX_SECRET_KEY_LEN {
        return Err(ServiceError::InvalidSecretKey(format!(
            "'{key}' exceeds {MAX_SECRET_KEY_LEN} characters"
        )));
    }
    if !SECRET_KEY_RE.is_match(key) {
        return Err(ServiceError::InvalidSecretKey(format!(
            "'{key}' contains unsafe characters"
        )));
    }
    if key.starts_with('.') || key.ends_with('.') || key.contains("..") {
        return Err(ServiceError::InvalidSecretKey(format!(
            "'{key}' has a leading, trailing, or consecutive dot"
        )));
    }
    for segment in key.split('.') {
        if !SECRET_KEY_SEGMENT_RE.is_match(segment) {
            return Err(ServiceError::InvalidSecretKey(format!(
                "'{key}' has an invalid segment '{segment}'"
            )));
        }
    }
    Ok(())
}

/// Validate a commit author email.
pub fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() {
        return Err(ServiceError::InvalidEmail("must not be empty".into()));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(ServiceError::InvalidEmail(format!(
            "'{email}' exceeds {MAX_EMAIL_LEN} characters"
        )));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ServiceError::InvalidEmail(format!(
            "'{email}' is not a valid address"
        )));
    }
    Ok(())
}

/// Validate a commit id: hex, 7 to 64 characters.
pub fn validate_commit_id(commit_id: &str) -> Result<()> {
    if !COMMIT_ID_RE.is_match(commit_id) {
        return Err(ServiceError::InvalidCommitId(format!(
            "'{commit_id}' is not a 7-64 character hex string"
        )));
    }
    Ok(())
}

/// Validate that content parses as one or more YAML documents.
pub fn validate_yaml_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(ServiceError::InvalidContent("must not be empty".into()));
    }
    for document in serde_yaml::Deserializer::from_str(content) {
        serde_yaml::Value::deserialize(document)
            .map_err(|e| ServiceError::InvalidYaml(e.to_string()))?;
    }
    Ok(())
}

/// Validate a commit message: non-empty, bounded, no script-injection markers.
pub fn validate_commit_message(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(ServiceError::InvalidCommitMessage(
            "must not be empty".into(),
        ));
    }
    if message.len() > MAX_COMMIT_MESSAGE_LEN {
        return Err(ServiceError::InvalidCommitMessage(format!(
            "exceeds {MAX_COMMIT_MESSAGE_LEN} characters"
        )));
    }
    let lowered = message.to_lowercase();
    for marker in ["<script", "javascript:", "data:text/html"] {
        if lowered.contains(marker) {
            return Err(ServiceError::InvalidCommitMessage(format!(
                "contains disallowed sequence '{marker}'"
            )));
        }
    }
    Ok(())
}

/// Validate a comma-separated profile list.
///
/// An empty string is allowed and resolves to the `default` profile.
pub fn validate_profile(profile: &str) -> Result<()> {
    if profile.len() > MAX_PROFILE_LEN {
        return Err(ServiceError::InvalidProfile(format!(
            "exceeds {MAX_PROFILE_LEN} characters"
        )));
    }
    if profile.trim().is_empty() {
        return Ok(());
    }
    for segment in profile.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(ServiceError::InvalidProfile(
                "contains an empty segment".into(),
            ));
        }
        if segment.len() > MAX_NAME_LEN {
            return Err(ServiceError::InvalidProfile(format!(
                "segment '{segment}' exceeds {MAX_NAME_LEN} characters"
            )));
        }
        if segment != "default" && !SAFE_NAME_RE.is_match(segment) {
            return Err(ServiceError::InvalidProfile(format!(
                "segment '{segment}' contains unsafe characters"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_length_boundary() {
        let fifty = "a".repeat(50);
        assert!(validate_namespace(&fifty).is_ok());
        let fifty_one = "a".repeat(51);
        assert!(validate_namespace(&fifty_one).is_err());
    }

    #[test]
    fn namespace_reserved_any_case() {
        for name in ["system", "System", "ADMIN", "Dashboard", "default", "ROOT"] {
            assert!(validate_namespace(name).is_err(), "{name} should be rejected");
        }
    }

    #[test]
    fn namespace_edge_characters() {
        assert!(validate_namespace("prod").is_ok());
        assert!(validate_namespace("a").is_ok());
        assert!(validate_namespace("my-team_1").is_ok());
        assert!(validate_namespace("-prod").is_err());
        assert!(validate_namespace("prod-").is_err());
        assert!(validate_namespace("pr od").is_err());
    }

    #[test]
    fn safe_path_strips_leading_slash() {
        assert_eq!(validate_safe_path("/prod/app.yml").unwrap(), "prod/app.yml");
        assert_eq!(validate_safe_path("prod/app.yml").unwrap(), "prod/app.yml");
    }

    #[test]
    fn safe_path_rejects_traversal() {
        assert!(validate_safe_path("prod/../etc/passwd").is_err());
        assert!(validate_safe_path("./prod/app.yml").is_err());
        assert!(validate_safe_path("prod\\app.yml").is_err());
        assert!(validate_safe_path("prod/app space.yml").is_err());
    }

    #[test]
    fn secret_key_dots() {
        assert!(validate_secret_key("db.password").is_ok());
        assert!(validate_secret_key("a.b.c-d_e").is_ok());
        assert!(validate_secret_key(".db.password").is_err());
        assert!(validate_secret_key("db.password.").is_err());
        assert!(validate_secret_key("db..password").is_err());
        assert!(validate_secret_key(&"k".repeat(101)).is_err());
    }

    #[test]
    fn email_basic() {
        assert!(validate_email("dev@example.com").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("dev@localhost").is_err());
    }

    #[test]
    fn commit_id_bounds() {
        assert!(validate_commit_id("abc1234").is_ok());
        assert!(validate_commit_id(&"a".repeat(64)).is_ok());
        assert!(validate_commit_id("abc123").is_err());
        assert!(validate_commit_id(&"a".repeat(65)).is_err());
        assert!(validate_commit_id("abc123g").is_err());
    }

    #[test]
    fn yaml_content_multi_document() {
        assert!(validate_yaml_content("a: 1\n---\nb: 2\n").is_ok());
        assert!(validate_yaml_content("a: [unclosed\n").is_err());
        assert!(validate_yaml_content("   ").is_err());
    }

    #[test]
    fn commit_message_injection_markers() {
        assert!(validate_commit_message("update db pool size").is_ok());
        assert!(validate_commit_message("<SCRIPT>alert(1)</SCRIPT>").is_err());
        assert!(validate_commit_message("see javascript:void(0)").is_err());
        assert!(validate_commit_message(&"m".repeat(501)).is_err());
    }

    #[test]
    fn profile_lists() {
        assert!(validate_profile("").is_ok());
        assert!(validate_profile("default").is_ok());
        assert!(validate_profile("dev, staging ,prod").is_ok());
        assert!(validate_profile("dev,,prod").is_err());
        assert!(validate_profile(&"p".repeat(201)).is_err());
        assert!(validate_profile("bad profile").is_err());
    }
}
