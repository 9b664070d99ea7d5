//! # Constants
//!
//! Process-wide defaults and fixed protocol strings.

/// Default HTTP port for the management and resolver APIs
pub const DEFAULT_SERVER_PORT: u16 = 8888;

/// Default time-to-live for cache entries (seconds)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;

/// Maximum number of entries held per cache region
pub const CACHE_REGION_CAPACITY: usize = 500;

/// Default number of commits returned by history queries
pub const DEFAULT_COMMIT_HISTORY_SIZE: usize = 20;

/// Maximum notifications retained per namespace
pub const NOTIFICATION_LOG_CAPACITY: usize = 20;

/// Number of long-lived refresh-callback workers
pub const NOTIFY_WORKER_COUNT: usize = 4;

/// Bound of the refresh-callback queue
pub const NOTIFY_QUEUE_CAPACITY: usize = 64;

/// Connect + read timeout for refresh callbacks (seconds)
pub const NOTIFY_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Auxiliary subdirectory holding the namespace vault file
pub const VAULT_DIR: &str = ".vault";

/// Envelope prefix marking an encrypted vault value
pub const VAULT_VALUE_PREFIX: &str = "VAULT:";

/// Placeholder written over secret leaves on internal (management) surfaces
pub const ENCRYPTED_VALUE_SENTINEL: &str = "<ENCRYPTED_VALUE>";

/// Namespace names that can never be created, compared case-insensitively
pub const RESERVED_NAMESPACES: [&str; 6] =
    ["system", "admin", "dashboard", "default", "log", "root"];

/// Environment variable carrying the base64-encoded 256-bit vault master key.
/// Takes precedence over the key configured in the settings file.
pub const VAULT_MASTER_KEY_ENV: &str = "VAULT_MASTER_KEY";

/// Built-in development master key (base64 of 32 bytes). Only used when no
/// key is configured; startup logs a prominent warning when this is active.
pub const EMBEDDED_DEV_MASTER_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

/// Template committed when a configuration file is initialized.
/// `<app-name>` is substituted with the application name.
pub const DEFAULT_CONFIG_TEMPLATE: &str = "\
application:
  name: <app-name>

server:
  port: 8080

logging:
  level: INFO
";
