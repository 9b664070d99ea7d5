//! # API Handlers
//!
//! Management endpoints (namespace, config, vault) and the
//! Spring-Cloud-Config-compatible resolver endpoints.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::info;

use crate::cache;
use crate::constants::NOTIFICATION_LOG_CAPACITY;
use crate::error::{Result, ServiceError};
use crate::notify::Notification;
use crate::observability::metrics::registry;
use crate::runtime::AppState;
use crate::server::dto::{ChangesRequest, ConfigRequest, NamespaceFilesRequest, NamespaceRequest};
use crate::validation;

fn ensure_action(actual: Option<&str>, expected: &str) -> Result<()> {
    match actual {
        Some(action) if action == expected => Ok(()),
        Some(action) => Err(ServiceError::InvalidActionType(action.to_string())),
        None => Err(ServiceError::InvalidActionType(format!(
            "missing action, expected '{expected}'"
        ))),
    }
}

// ---- namespace endpoints ----

pub async fn create_namespace(
    State(state): State<AppState>,
    Json(request): Json<NamespaceRequest>,
) -> Result<impl IntoResponse> {
    state.store.create_namespace(&request.namespace).await?;
    info!("created namespace {}", request.namespace);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "namespace": request.namespace, "status": "created" })),
    ))
}

pub async fn list_namespaces(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let namespaces = state.store.list_namespaces().await?;
    Ok(Json(json!({ "namespaces": namespaces })))
}

pub async fn namespace_files(
    State(state): State<AppState>,
    Json(request): Json<NamespaceFilesRequest>,
) -> Result<impl IntoResponse> {
    let files = state
        .store
        .list_directory(&request.namespace, request.path.as_deref())
        .await?;
    Ok(Json(json!({ "files": files })))
}

pub async fn delete_namespace(
    State(state): State<AppState>,
    Json(request): Json<NamespaceRequest>,
) -> Result<impl IntoResponse> {
    state.store.delete_namespace(&request.namespace).await?;
    info!("deleted namespace {}", request.namespace);
    Ok(Json(
        json!({ "namespace": request.namespace, "status": "deleted" }),
    ))
}

pub async fn namespace_events(
    State(state): State<AppState>,
    Json(request): Json<NamespaceRequest>,
) -> Result<impl IntoResponse> {
    let commits = state.store.namespace_events(&request.namespace).await?;
    Ok(Json(json!({ "commits": commits })))
}

pub async fn namespace_notifications(
    State(state): State<AppState>,
    Json(request): Json<NamespaceRequest>,
) -> Result<impl IntoResponse> {
    validation::validate_namespace(&request.namespace)?;
    if let Some(notifications) = state
        .cache
        .get::<Vec<Notification>>(cache::NAMESPACE_NOTIFICATIONS, &request.namespace)
    {
        return Ok(Json(json!({ "notifications": notifications })));
    }
    // Namespace must exist even though the log itself is in-memory
    drop(state.gateway.open(&request.namespace).await?);
    let notifications = state
        .notify_store
        .recent(&request.namespace, NOTIFICATION_LOG_CAPACITY);
    state.cache.put(
        cache::NAMESPACE_NOTIFICATIONS,
        &request.namespace,
        &notifications,
    );
    Ok(Json(json!({ "notifications": notifications })))
}

// ---- config endpoints ----

pub async fn config_create(
    State(state): State<AppState>,
    Json(request): Json<ConfigRequest>,
) -> Result<impl IntoResponse> {
    ensure_action(request.action.as_deref(), "create")?;
    let path = request.file_path();
    let commit_id = state
        .store
        .initialize(&path, &request.app_name, &request.email)
        .await?;
    info!("created config {path} at {commit_id}");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "path": path, "commitId": commit_id })),
    ))
}

pub async fn config_fetch(
    State(state): State<AppState>,
    Json(request): Json<ConfigRequest>,
) -> Result<impl IntoResponse> {
    ensure_action(request.action.as_deref(), "fetch")?;
    let path = request.file_path();
    let content = state.store.read(&path).await?;
    let commit_id = state.store.latest_commit_id(&path).await?;
    Ok(Json(json!({ "content": content, "commitId": commit_id })))
}

pub async fn config_update(
    State(state): State<AppState>,
    Json(request): Json<ConfigRequest>,
) -> Result<impl IntoResponse> {
    ensure_action(request.action.as_deref(), "update")?;
    let path = request.file_path();
    let content = request
        .content
        .as_deref()
        .ok_or_else(|| ServiceError::InvalidContent("content is required".into()))?;
    let message = request
        .message
        .as_deref()
        .ok_or_else(|| ServiceError::InvalidCommitMessage("message is required".into()))?;
    let commit_id = state
        .store
        .update(
            &path,
            &request.app_name,
            content,
            message,
            request.commit_id.as_deref(),
            &request.email,
        )
        .await?;
    info!("updated config {path} at {commit_id}");
    Ok(Json(json!({ "commitId": commit_id })))
}

pub async fn config_history(
    State(state): State<AppState>,
    Json(request): Json<ConfigRequest>,
) -> Result<impl IntoResponse> {
    ensure_action(request.action.as_deref(), "history")?;
    let commits = state.store.history(&request.file_path()).await?;
    Ok(Json(json!({ "commits": commits })))
}

pub async fn config_changes(
    State(state): State<AppState>,
    Json(request): Json<ChangesRequest>,
) -> Result<impl IntoResponse> {
    ensure_action(request.action.as_deref(), "changes")?;
    let changes = state
        .store
        .commit_changes(&request.commit_id, &request.namespace)
        .await?;
    Ok(Json(changes))
}

pub async fn config_delete(
    State(state): State<AppState>,
    Json(request): Json<ConfigRequest>,
) -> Result<impl IntoResponse> {
    ensure_action(request.action.as_deref(), "delete")?;
    let path = request.file_path();
    let message = request
        .message
        .as_deref()
        .ok_or_else(|| ServiceError::InvalidCommitMessage("message is required".into()))?;
    let commit_id = state.store.delete(&path, message, &request.email).await?;
    info!("deleted config {path} at {commit_id}");
    Ok(Json(json!({ "commitId": commit_id })))
}

// ---- vault endpoints ----

pub async fn vault_get(
    State(state): State<AppState>,
    Json(request): Json<NamespaceRequest>,
) -> Result<impl IntoResponse> {
    validation::validate_namespace(&request.namespace)?;
    let secrets = state.vault.get_vault(&request.namespace).await?;
    Ok(Json(
        json!({ "namespace": request.namespace, "secrets": secrets }),
    ))
}

/// Vault update carries its secrets as top-level k/v pairs next to the
/// addressing fields, so the body is taken as a raw JSON object.
pub async fn vault_update(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Map<String, serde_json::Value>>,
) -> Result<impl IntoResponse> {
    let mut body = body;
    let namespace = take_string(&mut body, "namespace")?;
    let email = take_string(&mut body, "email")?;
    let message = take_string(&mut body, "commitMessage")?;
    validation::validate_namespace(&namespace)?;
    validation::validate_email(&email)?;
    validation::validate_commit_message(&message)?;

    let mut secrets = BTreeMap::new();
    for (key, value) in body {
        let serde_json::Value::String(value) = value else {
            return Err(ServiceError::InvalidContent(format!(
                "secret '{key}' must be a string"
            )));
        };
        secrets.insert(key, value);
    }
    let commit_id = state
        .vault
        .update_vault(&namespace, &secrets, &email, &message)
        .await?;
    info!(
        "vault updated for {namespace} ({} secrets) at {commit_id}",
        secrets.len()
    );
    Ok(Json(
        json!({ "namespace": namespace, "commitId": commit_id }),
    ))
}

fn take_string(
    body: &mut serde_json::Map<String, serde_json::Value>,
    field: &str,
) -> Result<String> {
    match body.remove(field) {
        Some(serde_json::Value::String(value)) => Ok(value),
        Some(_) => Err(ServiceError::InvalidContent(format!(
            "field '{field}' must be a string"
        ))),
        None => Err(ServiceError::InvalidContent(format!(
            "field '{field}' is required"
        ))),
    }
}

// ---- resolver endpoints ----

pub async fn resolve(
    State(state): State<AppState>,
    Path((application, profile)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let resolved = state.resolver.resolve(&application, &profile, None).await?;
    Ok(Json(resolved))
}

pub async fn resolve_with_label(
    State(state): State<AppState>,
    Path((application, profile, label)): Path<(String, String, String)>,
) -> Result<impl IntoResponse> {
    let resolved = state
        .resolver
        .resolve(&application, &profile, Some(&label))
        .await?;
    Ok(Json(resolved))
}

// ---- probes and metrics ----

pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.ready.load(std::sync::atomic::Ordering::Relaxed) {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "starting" })),
        )
    }
}

pub async fn metrics_text() -> impl IntoResponse {
    registry::gather()
}
