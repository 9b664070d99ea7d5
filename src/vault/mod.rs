//! # Vault
//!
//! Per-namespace encrypted secret storage: the cipher, the JSON-backed
//! store, and the two-mode YAML secret processor.

pub mod cipher;
pub mod processor;
pub mod store;

pub use cipher::Cipher;
pub use processor::SecretProcessor;
pub use store::VaultStore;
