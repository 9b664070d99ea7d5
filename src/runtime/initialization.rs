//! # Initialization
//!
//! Loads settings, initializes tracing and metrics, verifies the base
//! directory, and wires the component graph: cache, repository gateway,
//! vault, config store, resolver, and notifier pool.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::cache::Cache;
use crate::config::Settings;
use crate::git::RepoGateway;
use crate::notify::{Notifier, NotifyStore};
use crate::observability::metrics;
use crate::resolver::Resolver;
use crate::store::ConfigStore;
use crate::vault::{Cipher, SecretProcessor, VaultStore};

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub cache: Arc<Cache>,
    pub gateway: Arc<RepoGateway>,
    pub vault: Arc<VaultStore>,
    pub processor: Arc<SecretProcessor>,
    pub store: Arc<ConfigStore>,
    pub resolver: Arc<Resolver>,
    pub notify_store: Arc<NotifyStore>,
    pub notifier: Arc<Notifier>,
    /// Flipped once the listener is bound; `/readyz` reports it.
    pub ready: Arc<AtomicBool>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Initialize the service runtime.
///
/// Fails (and the process exits non-zero) when the configured base
/// directory does not exist.
pub async fn initialize(config_path: &Path) -> Result<AppState> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "git_config_server=info".into()),
        )
        .init();

    let settings = Settings::load(config_path)?;
    info!("starting git-config-server");

    metrics::register_metrics().context("failed to register metrics")?;

    if !settings.base_path.is_dir() {
        bail!(
            "base path {} does not exist or is not a directory",
            settings.base_path.display()
        );
    }

    let state = build_state(settings)?;
    info!(
        "serving {} namespaces from {}",
        state.gateway.scan_namespaces().map(|n| n.len()).unwrap_or(0),
        state.settings.base_path.display()
    );
    Ok(state)
}

/// Wire the component graph from loaded settings. Split from
/// [`initialize`] so tests can build a state without touching global
/// tracing/metrics.
pub fn build_state(settings: Settings) -> Result<AppState> {
    let cipher = Cipher::initialize(settings.vault_master_key.as_deref())?;
    if settings.vault_master_key.is_none()
        && std::env::var(crate::constants::VAULT_MASTER_KEY_ENV).is_err()
    {
        warn!("vault is running on the embedded development key");
    }

    let settings = Arc::new(settings);
    let cache = Arc::new(Cache::new(settings.cache_ttl()));
    let gateway = Arc::new(RepoGateway::new(settings.base_path.clone()));
    let vault = Arc::new(VaultStore::new(
        Arc::clone(&gateway),
        Arc::new(cipher),
        Arc::clone(&cache),
    ));
    let processor = Arc::new(SecretProcessor::new(Arc::clone(&vault)));
    let notify_store = Arc::new(NotifyStore::new());
    let notifier = Arc::new(Notifier::new(
        Arc::clone(&notify_store),
        settings.refresh_notify_url.clone(),
    )?);
    let store = Arc::new(ConfigStore::new(
        Arc::clone(&gateway),
        Arc::clone(&processor),
        Arc::clone(&cache),
        Arc::clone(&notifier),
        settings.commit_history_size,
    ));
    let resolver = Arc::new(Resolver::new(Arc::clone(&store), Arc::clone(&processor)));

    Ok(AppState {
        settings,
        cache,
        gateway,
        vault,
        processor,
        store,
        resolver,
        notify_store,
        notifier,
        ready: Arc::new(AtomicBool::new(false)),
    })
}
