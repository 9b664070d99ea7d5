//! # Error Types
//!
//! Every failure that can cross the API boundary carries a stable,
//! machine-readable error code and an HTTP status. Internal plumbing uses
//! `anyhow`; anything escaping to a handler is converted into a
//! [`ServiceError`] first (or falls back to `INTERNAL_ERROR`).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

/// Service-level error with a stable code and HTTP mapping.
#[derive(Debug, Error)]
pub enum ServiceError {
    // Validation
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid application name: {0}")]
    InvalidAppName(String),
    #[error("invalid email: {0}")]
    InvalidEmail(String),
    #[error("invalid commit id: {0}")]
    InvalidCommitId(String),
    #[error("invalid content: {0}")]
    InvalidContent(String),
    #[error("invalid YAML: {0}")]
    InvalidYaml(String),
    #[error("invalid commit message: {0}")]
    InvalidCommitMessage(String),
    #[error("commit id is required for this operation")]
    MissingCommitId,
    #[error("invalid action type: {0}")]
    InvalidActionType(String),
    #[error("invalid profile: {0}")]
    InvalidProfile(String),
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    // Namespace
    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),
    #[error("namespace already exists: {0}")]
    NamespaceAlreadyExists(String),
    #[error("namespace creation failed: {0}")]
    NamespaceCreationFailed(String),

    // Config file
    #[error("configuration file not found: {0}")]
    ConfigFileNotFound(String),
    #[error("configuration file already exists: {0}")]
    ConfigFileAlreadyExists(String),
    #[error("failed to read configuration file: {0}")]
    ConfigFileReadFailed(String),
    #[error("failed to update configuration file: {0}")]
    ConfigFileUpdateFailed(String),
    #[error("failed to create configuration file: {0}")]
    ConfigFileCreationFailed(String),

    // Optimistic concurrency
    #[error("configuration was modified concurrently: expected commit {expected}, found {actual}")]
    ConfigConflict { expected: String, actual: String },

    // Vault
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("failed to load vault master key: {0}")]
    KeyLoadFailed(String),
    #[error("vault master key initialization failed: {0}")]
    KeyInitializationFailed(String),
    #[error("vault file not found for namespace: {0}")]
    VaultFileNotFound(String),
    #[error("vault operation failed: {0}")]
    VaultOperationFailed(String),
    #[error("secret not found: {0}")]
    SecretNotFound(String),

    // Git
    #[error("git init failed: {0}")]
    GitInitFailed(String),
    #[error("git commit failed: {0}")]
    GitCommitFailed(String),
    #[error("git log failed: {0}")]
    GitLogFailed(String),
    #[error("git diff failed: {0}")]
    GitDiffFailed(String),
    #[error("git repository access failed: {0}")]
    GitRepositoryAccessFailed(String),

    // Catch-all
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable machine-readable code returned in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidNamespace(_) => "INVALID_NAMESPACE",
            Self::InvalidPath(_) => "INVALID_PATH",
            Self::InvalidAppName(_) => "INVALID_APP_NAME",
            Self::InvalidEmail(_) => "INVALID_EMAIL",
            Self::InvalidCommitId(_) => "INVALID_COMMIT_ID",
            Self::InvalidContent(_) => "INVALID_CONTENT",
            Self::InvalidYaml(_) => "INVALID_YAML",
            Self::InvalidCommitMessage(_) => "INVALID_COMMIT_MESSAGE",
            Self::MissingCommitId => "MISSING_COMMIT_ID",
            Self::InvalidActionType(_) => "INVALID_ACTION_TYPE",
            Self::InvalidProfile(_) => "INVALID_PROFILE",
            Self::InvalidSecretKey(_) => "INVALID_SECRET_KEY",
            Self::NamespaceNotFound(_) => "NAMESPACE_NOT_FOUND",
            Self::NamespaceAlreadyExists(_) => "NAMESPACE_ALREADY_EXISTS",
            Self::NamespaceCreationFailed(_) => "NAMESPACE_CREATION_FAILED",
            Self::ConfigFileNotFound(_) => "CONFIG_FILE_NOT_FOUND",
            Self::ConfigFileAlreadyExists(_) => "CONFIG_FILE_ALREADY_EXISTS",
            Self::ConfigFileReadFailed(_) => "CONFIG_FILE_READ_FAILED",
            Self::ConfigFileUpdateFailed(_) => "CONFIG_FILE_UPDATE_FAILED",
            Self::ConfigFileCreationFailed(_) => "CONFIG_FILE_CREATION_FAILED",
            Self::ConfigConflict { .. } => "CONFIG_CONFLICT",
            Self::EncryptionFailed(_) => "ENCRYPTION_FAILED",
            Self::DecryptionFailed(_) => "DECRYPTION_FAILED",
            Self::KeyLoadFailed(_) => "KEY_LOAD_FAILED",
            Self::KeyInitializationFailed(_) => "KEY_INITIALIZATION_FAILED",
            Self::VaultFileNotFound(_) => "VAULT_FILE_NOT_FOUND",
            Self::VaultOperationFailed(_) => "VAULT_OPERATION_FAILED",
            Self::SecretNotFound(_) => "SECRET_NOT_FOUND",
            Self::GitInitFailed(_) => "GIT_INIT_FAILED",
            Self::GitCommitFailed(_) => "GIT_COMMIT_FAILED",
            Self::GitLogFailed(_) => "GIT_LOG_FAILED",
            Self::GitDiffFailed(_) => "GIT_DIFF_FAILED",
            Self::GitRepositoryAccessFailed(_) => "GIT_REPOSITORY_ACCESS_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for the error kind.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidNamespace(_)
            | Self::InvalidPath(_)
            | Self::InvalidAppName(_)
            | Self::InvalidEmail(_)
            | Self::InvalidCommitId(_)
            | Self::InvalidContent(_)
            | Self::InvalidYaml(_)
            | Self::InvalidCommitMessage(_)
            | Self::MissingCommitId
            | Self::InvalidActionType(_)
            | Self::InvalidProfile(_)
            | Self::InvalidSecretKey(_) => StatusCode::BAD_REQUEST,

            Self::NamespaceNotFound(_)
            | Self::ConfigFileNotFound(_)
            | Self::VaultFileNotFound(_)
            | Self::SecretNotFound(_) => StatusCode::NOT_FOUND,

            Self::NamespaceAlreadyExists(_)
            | Self::ConfigFileAlreadyExists(_)
            | Self::ConfigConflict { .. } => StatusCode::CONFLICT,

            Self::NamespaceCreationFailed(_)
            | Self::ConfigFileReadFailed(_)
            | Self::ConfigFileUpdateFailed(_)
            | Self::ConfigFileCreationFailed(_)
            | Self::EncryptionFailed(_)
            | Self::DecryptionFailed(_)
            | Self::KeyLoadFailed(_)
            | Self::KeyInitializationFailed(_)
            | Self::VaultOperationFailed(_)
            | Self::GitInitFailed(_)
            | Self::GitCommitFailed(_)
            | Self::GitLogFailed(_)
            | Self::GitDiffFailed(_)
            | Self::GitRepositoryAccessFailed(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Stack/context is logged here; the response body stays generic
            error!(code = self.code(), "request failed: {self:#}");
        }
        let body = serde_json::json!({
            "errorCode": self.code(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
