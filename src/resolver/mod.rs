//! # Resolver
//!
//! Implements the pull-client contract: merge the namespace base,
//! application base, and per-profile overlays, flatten to dot notation,
//! substitute decrypted secrets, and return a single versioned property
//! source.

use std::sync::Arc;

use serde::Serialize;
use serde_yaml::Mapping;
use tracing::{debug, warn};

use crate::error::{Result, ServiceError};
use crate::observability::metrics;
use crate::store::ConfigStore;
use crate::validation;
use crate::vault::SecretProcessor;
use crate::yaml;

/// Default namespace when the client sends no label.
const DEFAULT_NAMESPACE: &str = "main";

#[derive(Debug, Clone, Serialize)]
pub struct PropertySource {
    pub name: String,
    pub source: serde_json::Map<String, serde_json::Value>,
}

/// The resolver response: one merged property source plus the commit id
/// of the application base file as the version.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub name: String,
    pub profiles: Vec<String>,
    pub label: Option<String>,
    pub version: Option<String>,
    pub property_sources: Vec<PropertySource>,
}

pub struct Resolver {
    store: Arc<ConfigStore>,
    processor: Arc<SecretProcessor>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

impl Resolver {
    pub fn new(store: Arc<ConfigStore>, processor: Arc<SecretProcessor>) -> Self {
        Self { store, processor }
    }

    /// Resolve `(application, profile, label)` into a merged property view.
    ///
    /// The label has the shape `<namespace>[/<subpath>]`; a missing or
    /// empty label selects the `main` namespace. Missing source files are
    /// skipped; if none loads the application base path is reported as
    /// not found.
    pub async fn resolve(
        &self,
        application: &str,
        profile: &str,
        label: Option<&str>,
    ) -> Result<ResolvedConfig> {
        metrics::record_resolver_request();
        validation::validate_app_name(application)?;
        validation::validate_profile(profile)?;

        let (namespace, subpath) = split_label(label)?;
        let prefix = if subpath.is_empty() {
            namespace.clone()
        } else {
            format!("{namespace}/{subpath}")
        };

        let mut sources = vec![
            format!("{prefix}/application.yml"),
            format!("{prefix}/{application}.yml"),
        ];
        let profiles = active_profiles(profile);
        for overlay in &profiles {
            if overlay != "default" {
                sources.push(format!("{prefix}/{application}-{overlay}.yml"));
            }
        }
        let primary = format!("{prefix}/{application}.yml");

        let mut merged = Mapping::new();
        let mut loaded_any = false;
        for source in &sources {
            match self.store.read_optional(source).await? {
                Some(text) => {
                    loaded_any = true;
                    debug!("resolver loaded source {source}");
                    yaml::deep_merge(&mut merged, yaml::parse_lenient(&text, source));
                }
                None => debug!("resolver source {source} missing; skipped"),
            }
        }
        if !loaded_any {
            return Err(ServiceError::ConfigFileNotFound(primary));
        }

        let flat = yaml::flatten(&merged);
        let dumped = yaml::dump(&flat)?;
        let resolved_text = match self.processor.process_for_client(&dumped, &namespace).await {
            Ok(resolved) => resolved,
            Err(e) => {
                // Best-effort: the merged view is served without
                // substitution rather than failing the pull
                warn!("secret resolution failed for {primary}: {e}");
                dumped
            }
        };
        let resolved = yaml::parse_lenient(&resolved_text, &primary);

        let mut source = serde_json::Map::new();
        for (key, value) in &resolved {
            let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
            source.insert(yaml::key_to_string(key), value);
        }

        let version = self.store.try_latest_commit_id(&primary).await?;
        let profile_tag = if profile.trim().is_empty() {
            "default"
        } else {
            profile.trim()
        };
        Ok(ResolvedConfig {
            name: application.to_string(),
            profiles,
            label: label.map(str::to_string),
            version,
            property_sources: vec![PropertySource {
                name: format!("merged-{application}-{profile_tag}"),
                source,
            }],
        })
    }
}

/// Split a label into `(namespace, subpath)`, defaulting to the `main`
/// namespace.
fn split_label(label: Option<&str>) -> Result<(String, String)> {
    let label = label.unwrap_or("").trim();
    if label.is_empty() {
        return Ok((DEFAULT_NAMESPACE.to_string(), String::new()));
    }
    let normalized = validation::validate_safe_path(label)?;
    let (namespace, subpath) = match normalized.split_once('/') {
        Some((namespace, subpath)) => (namespace.to_string(), subpath.trim_matches('/').to_string()),
        None => (normalized, String::new()),
    };
    validation::validate_namespace(&namespace)?;
    Ok((namespace, subpath))
}

/// Comma-separated profile list, trimmed, in order; empty input yields
/// `["default"]`.
fn active_profiles(profile: &str) -> Vec<String> {
    let profiles: Vec<String> = profile
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();
    if profiles.is_empty() {
        vec!["default".to_string()]
    } else {
        profiles
    }
}
