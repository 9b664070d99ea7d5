//! # Vault Cipher
//!
//! Authenticated encryption for vault values: AES-256-GCM with a fresh
//! 96-bit nonce per call and a 128-bit tag, wrapped in a
//! `VAULT:<base64(iv || ciphertext || tag)>` envelope. The master key is
//! sourced at startup from the `VAULT_MASTER_KEY` environment variable
//! (preferred) or the settings file, base64-encoded, exactly 32 bytes
//! after decoding.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use tracing::warn;
use zeroize::ZeroizeOnDrop;

use crate::constants::{EMBEDDED_DEV_MASTER_KEY, VAULT_MASTER_KEY_ENV, VAULT_VALUE_PREFIX};
use crate::error::{Result, ServiceError};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Symmetric cipher holding the process-wide vault master key.
///
/// The key is read-only after initialization and wiped on drop.
#[derive(ZeroizeOnDrop)]
pub struct Cipher {
    key: [u8; KEY_LEN],
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

impl Cipher {
    /// Initialize from the environment or a configured key, falling back to
    /// the embedded development key with a prominent warning.
    pub fn initialize(configured_key: Option<&str>) -> Result<Self> {
        let (encoded, source) = match std::env::var(VAULT_MASTER_KEY_ENV) {
            Ok(value) if !value.trim().is_empty() => (value, "environment"),
            _ => match configured_key {
                Some(key) if !key.trim().is_empty() => (key.to_string(), "settings"),
                _ => {
                    warn!(
                        "no vault master key configured ({VAULT_MASTER_KEY_ENV} unset) - \
                         using the embedded development key; secrets are NOT safe in production"
                    );
                    (EMBEDDED_DEV_MASTER_KEY.to_string(), "embedded-default")
                }
            },
        };
        let decoded = BASE64_STANDARD
            .decode(encoded.trim())
            .map_err(|e| ServiceError::KeyLoadFailed(format!("invalid base64 ({source}): {e}")))?;
        let key: [u8; KEY_LEN] = decoded.try_into().map_err(|v: Vec<u8>| {
            ServiceError::KeyInitializationFailed(format!(
                "master key must decode to {KEY_LEN} bytes, got {} ({source})",
                v.len()
            ))
        })?;
        Ok(Self { key })
    }

    /// Build a cipher from raw key bytes.
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Encrypt a plaintext into the `VAULT:` envelope.
    ///
    /// A fresh random nonce is drawn per call, so encrypting the same value
    /// twice never yields the same envelope.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        if plaintext.trim().is_empty() {
            return Err(ServiceError::EncryptionFailed(
                "refusing to encrypt empty value".into(),
            ));
        }
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| ServiceError::EncryptionFailed(e.to_string()))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| ServiceError::EncryptionFailed(e.to_string()))?;
        let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(nonce.as_slice());
        envelope.extend_from_slice(&ciphertext);
        Ok(format!(
            "{VAULT_VALUE_PREFIX}{}",
            BASE64_STANDARD.encode(envelope)
        ))
    }

    /// Decrypt a `VAULT:` envelope. Values without the prefix are plaintext
    /// and returned unchanged.
    pub fn decrypt(&self, value: &str) -> Result<String> {
        let Some(encoded) = value.strip_prefix(VAULT_VALUE_PREFIX) else {
            return Ok(value.to_string());
        };
        let envelope = BASE64_STANDARD
            .decode(encoded)
            .map_err(|e| ServiceError::DecryptionFailed(format!("invalid base64: {e}")))?;
        if envelope.len() < NONCE_LEN + TAG_LEN {
            return Err(ServiceError::DecryptionFailed(format!(
                "envelope too short: {} bytes",
                envelope.len()
            )));
        }
        let (nonce, ciphertext) = envelope.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| ServiceError::DecryptionFailed(e.to_string()))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| ServiceError::DecryptionFailed("authentication failed".into()))?;
        String::from_utf8(plaintext)
            .map_err(|e| ServiceError::DecryptionFailed(format!("not valid UTF-8: {e}")))
    }

    /// Whether the value carries the encrypted-envelope prefix.
    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(VAULT_VALUE_PREFIX)
    }
}
