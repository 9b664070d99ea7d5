//! # HTTP Server
//!
//! Axum router wiring the management API, the resolver API, probes, and
//! metrics, with graceful shutdown on ctrl-c.

pub mod dto;
pub mod handlers;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::runtime::AppState;

/// Build the full route table.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Probes and metrics
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics_text))
        // Namespace management
        .route("/namespace/create", post(handlers::create_namespace))
        .route("/namespace/list", post(handlers::list_namespaces))
        .route("/namespace/files", post(handlers::namespace_files))
        .route("/namespace/delete", post(handlers::delete_namespace))
        .route("/namespace/events", post(handlers::namespace_events))
        .route("/namespace/notify", post(handlers::namespace_notifications))
        // Config file management
        .route("/config/create", post(handlers::config_create))
        .route("/config/fetch", post(handlers::config_fetch))
        .route("/config/update", post(handlers::config_update))
        .route("/config/history", post(handlers::config_history))
        .route("/config/changes", post(handlers::config_changes))
        .route("/config/delete", post(handlers::config_delete))
        // Vault management
        .route("/vault/get", post(handlers::vault_get))
        .route("/vault/update", post(handlers::vault_update))
        // Pull-client resolver (Spring Cloud Config shape); static routes
        // above take precedence over the captures
        .route("/{application}/{profile}", get(handlers::resolve))
        .route(
            "/{application}/{profile}/{*label}",
            get(handlers::resolve_with_label),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn start(state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.settings.port));
    let router = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    state
        .ready
        .store(true, std::sync::atomic::Ordering::Relaxed);
    info!("listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
