//! # Refresh Notifications
//!
//! Best-effort HTTP refresh callbacks to pull clients after config writes,
//! plus the in-memory per-namespace notification log.

pub mod log;
pub mod notifier;

pub use log::{Notification, NotificationStatus, NotifyStore};
pub use notifier::Notifier;
