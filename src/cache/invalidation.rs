//! # Cache Invalidation
//!
//! The single table mapping write events to cache evictions. Writers call
//! exactly one function here before returning, so a read that follows a
//! completed write always observes it.

use super::{
    Cache, COMMIT_DETAILS, COMMIT_HISTORY, CONFIG_CONTENT, DIRECTORY_LISTING, LATEST_COMMIT,
    NAMESPACES, NAMESPACE_EVENTS, NAMESPACE_NOTIFICATIONS, VAULT_SECRETS,
};

/// Key under which the full namespace listing is cached.
pub const ALL_NAMESPACES_KEY: &str = "all";

/// Namespace created: the namespace listing and every directory listing go.
pub fn on_namespace_created(cache: &Cache) {
    cache.evict_key(NAMESPACES, ALL_NAMESPACES_KEY);
    cache.evict_all(DIRECTORY_LISTING);
}

/// Namespace deleted: listing evictions plus every entry keyed under the
/// namespace across the content, history, and vault regions.
pub fn on_namespace_deleted(cache: &Cache, namespace: &str) {
    cache.evict_key(NAMESPACES, ALL_NAMESPACES_KEY);
    cache.evict_all(DIRECTORY_LISTING);
    evict_namespace_scoped(cache, namespace);
    cache.evict_key(NAMESPACE_EVENTS, namespace);
    cache.evict_key(NAMESPACE_NOTIFICATIONS, namespace);
}

/// Config file created or deleted (file-set change).
pub fn on_config_created(cache: &Cache, namespace: &str) {
    cache.evict_all(DIRECTORY_LISTING);
    cache.evict_key(NAMESPACE_EVENTS, namespace);
    cache.evict_key(NAMESPACE_NOTIFICATIONS, namespace);
}

/// Config file updated in place.
pub fn on_config_updated(cache: &Cache, path: &str, namespace: &str) {
    cache.evict_key(CONFIG_CONTENT, path);
    cache.evict_key(COMMIT_HISTORY, path);
    cache.evict_key(LATEST_COMMIT, path);
    cache.evict_key(NAMESPACE_EVENTS, namespace);
    cache.evict_key(NAMESPACE_NOTIFICATIONS, namespace);
}

/// Config file deleted: the per-path rows plus the file-set rows.
pub fn on_config_deleted(cache: &Cache, path: &str, namespace: &str) {
    cache.evict_key(CONFIG_CONTENT, path);
    cache.evict_key(COMMIT_HISTORY, path);
    cache.evict_key(LATEST_COMMIT, path);
    on_config_created(cache, namespace);
}

/// Vault replaced: the decrypted secret map and everything whose rendered
/// content may embed secrets for this namespace.
pub fn on_vault_updated(cache: &Cache, namespace: &str) {
    cache.evict_key(VAULT_SECRETS, namespace);
    evict_namespace_scoped(cache, namespace);
}

fn evict_namespace_scoped(cache: &Cache, namespace: &str) {
    let prefix = format!("{namespace}/");
    cache.evict_by_prefix(CONFIG_CONTENT, &prefix);
    cache.evict_by_prefix(COMMIT_HISTORY, &prefix);
    cache.evict_by_prefix(LATEST_COMMIT, &prefix);
    cache.evict_by_suffix(COMMIT_DETAILS, &format!("_{namespace}"));
    cache.evict_key(VAULT_SECRETS, namespace);
}
