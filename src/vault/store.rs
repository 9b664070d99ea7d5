//! # Vault Store
//!
//! Loads, mutates, and persists the namespace secret map. On disk the
//! vault is a pretty-printed JSON object at
//! `<namespace>/.vault/<namespace>-vault.json` whose values carry the
//! `VAULT:` envelope; in memory (and in cache) the map is decrypted.
//! Writes fully replace the secret set and produce one commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::{self, invalidation, Cache};
use crate::constants::VAULT_DIR;
use crate::error::{Result, ServiceError};
use crate::git::RepoGateway;
use crate::validation;
use crate::vault::Cipher;

pub struct VaultStore {
    gateway: Arc<RepoGateway>,
    cipher: Arc<Cipher>,
    cache: Arc<Cache>,
}

impl std::fmt::Debug for VaultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultStore").finish_non_exhaustive()
    }
}

impl VaultStore {
    pub fn new(gateway: Arc<RepoGateway>, cipher: Arc<Cipher>, cache: Arc<Cache>) -> Self {
        Self {
            gateway,
            cipher,
            cache,
        }
    }

    fn vault_relative_path(namespace: &str) -> String {
        format!("{VAULT_DIR}/{namespace}-vault.json")
    }

    /// Decrypted secret map for the namespace. A missing vault file is an
    /// empty map. Cached under `vault-secrets[namespace]`.
    pub async fn get_vault(&self, namespace: &str) -> Result<BTreeMap<String, String>> {
        if let Some(secrets) = self
            .cache
            .get::<BTreeMap<String, String>>(cache::VAULT_SECRETS, namespace)
        {
            return Ok(secrets);
        }
        let lease = self.gateway.open(namespace).await?;
        let file = lease.dir().join(Self::vault_relative_path(namespace));
        let raw = match tokio::fs::read_to_string(&file).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                drop(lease);
                let empty = BTreeMap::new();
                self.cache.put(cache::VAULT_SECRETS, namespace, &empty);
                return Ok(empty);
            }
            Err(e) => {
                return Err(ServiceError::VaultOperationFailed(format!(
                    "failed to read vault for {namespace}: {e}"
                )));
            }
        };
        drop(lease);

        let stored: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            ServiceError::VaultOperationFailed(format!("vault for {namespace} is not JSON: {e}"))
        })?;
        let serde_json::Value::Object(entries) = stored else {
            return Err(ServiceError::VaultOperationFailed(format!(
                "vault for {namespace} must be a JSON object"
            )));
        };

        let mut secrets = BTreeMap::new();
        for (key, value) in entries {
            let serde_json::Value::String(value) = value else {
                return Err(ServiceError::VaultOperationFailed(format!(
                    "vault entry '{key}' in {namespace} is not a string"
                )));
            };
            secrets.insert(key, self.cipher.decrypt(&value)?);
        }
        self.cache.put(cache::VAULT_SECRETS, namespace, &secrets);
        Ok(secrets)
    }

    /// Replace the namespace's secret set. Every key is validated, every
    /// value encrypted; keys absent from `secrets` are removed. Returns
    /// the commit id of the vault write.
    pub async fn update_vault(
        &self,
        namespace: &str,
        secrets: &BTreeMap<String, String>,
        email: &str,
        message: &str,
    ) -> Result<String> {
        for key in secrets.keys() {
            validation::validate_secret_key(key)?;
        }
        let mut encrypted = BTreeMap::new();
        for (key, value) in secrets {
            encrypted.insert(key.clone(), self.cipher.encrypt(value)?);
        }
        let json = serde_json::to_string_pretty(&encrypted)
            .map_err(|e| ServiceError::VaultOperationFailed(e.to_string()))?;

        let lease = self.gateway.open(namespace).await?;
        let commit_id = lease
            .commit_file(
                &Self::vault_relative_path(namespace),
                &format!("{json}\n"),
                email,
                message,
            )
            .await?;
        drop(lease);

        invalidation::on_vault_updated(&self.cache, namespace);
        Ok(commit_id)
    }
}
