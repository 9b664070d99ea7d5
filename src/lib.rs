//! # git-config-server
//!
//! Git-backed configuration and secret management service. Clients
//! organize configuration into isolated namespaces, each backed by its
//! own local git repository; YAML files are versioned with full commit
//! history and sensitive values live in an encrypted per-namespace vault.
//! The service exposes a management API (CRUD on files and secrets) and a
//! pull-client resolution API that merges base, application, and profile
//! YAML, substitutes decrypted secrets, and returns a flattened property
//! view with a version identifier.

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod git;
pub mod notify;
pub mod observability;
pub mod resolver;
pub mod runtime;
pub mod server;
pub mod store;
pub mod validation;
pub mod vault;
pub mod yaml;
