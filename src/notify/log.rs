//! # Notification Log
//!
//! In-memory bounded FIFO of refresh notifications per namespace. All
//! reads, writes, and in-place updates go through the same mutex, so the
//! find-and-transform path can never observe a half-applied write.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::constants::NOTIFICATION_LOG_CAPACITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    InProgress,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub status: NotificationStatus,
    /// Milliseconds since the epoch.
    pub initiated_time: i64,
}

/// Per-namespace bounded notification log.
#[derive(Debug)]
pub struct NotifyStore {
    capacity: usize,
    inner: Mutex<HashMap<String, VecDeque<Notification>>>,
}

impl Default for NotifyStore {
    fn default() -> Self {
        Self::with_capacity(NOTIFICATION_LOG_CAPACITY)
    }
}

impl NotifyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Append a notification; at capacity the oldest entry is dropped
    /// first.
    pub fn store(&self, namespace: &str, notification: Notification) {
        let mut inner = self.inner.lock().expect("notification log poisoned");
        let queue = inner.entry(namespace.to_string()).or_default();
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(notification);
    }

    /// Find the entry by id and apply `transform` in place, preserving its
    /// position. Returns the updated entry, or `None` if absent.
    pub fn update_atomic(
        &self,
        namespace: &str,
        id: &str,
        transform: impl FnOnce(&mut Notification),
    ) -> Option<Notification> {
        let mut inner = self.inner.lock().expect("notification log poisoned");
        let entry = inner
            .get_mut(namespace)?
            .iter_mut()
            .find(|notification| notification.id == id)?;
        transform(entry);
        Some(entry.clone())
    }

    /// Transition an entry out of `IN_PROGRESS`. Terminal entries are left
    /// untouched (the only legal transitions are IN_PROGRESS → SUCCESS and
    /// IN_PROGRESS → FAILED).
    pub fn update_status(
        &self,
        namespace: &str,
        id: &str,
        status: NotificationStatus,
    ) -> Option<Notification> {
        self.update_atomic(namespace, id, |notification| {
            if notification.status == NotificationStatus::InProgress {
                notification.status = status;
            }
        })
    }

    /// Up to `max` entries sorted by initiation time, newest first.
    pub fn recent(&self, namespace: &str, max: usize) -> Vec<Notification> {
        let inner = self.inner.lock().expect("notification log poisoned");
        let Some(queue) = inner.get(namespace) else {
            return Vec::new();
        };
        let mut entries: Vec<Notification> = queue.iter().cloned().collect();
        entries.sort_by(|a, b| b.initiated_time.cmp(&a.initiated_time));
        entries.truncate(max);
        entries
    }

    /// Mark every still-IN_PROGRESS entry FAILED. Used by notifier
    /// shutdown; returns how many entries were swept.
    pub fn fail_in_progress(&self) -> usize {
        let mut inner = self.inner.lock().expect("notification log poisoned");
        let mut swept = 0;
        for queue in inner.values_mut() {
            for notification in queue.iter_mut() {
                if notification.status == NotificationStatus::InProgress {
                    notification.status = NotificationStatus::Failed;
                    swept += 1;
                }
            }
        }
        swept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(id: &str, time: i64) -> Notification {
        Notification {
            id: id.to_string(),
            status: NotificationStatus::InProgress,
            initiated_time: time,
        }
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let store = NotifyStore::with_capacity(3);
        for i in 0..5 {
            store.store("prod", notification(&format!("n{i}"), i));
        }
        let recent = store.recent("prod", 10);
        assert_eq!(recent.len(), 3);
        let ids: Vec<&str> = recent.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n4", "n3", "n2"]);
    }

    #[test]
    fn update_preserves_position() {
        let store = NotifyStore::new();
        store.store("prod", notification("a", 1));
        store.store("prod", notification("b", 2));
        let updated = store
            .update_status("prod", "a", NotificationStatus::Success)
            .unwrap();
        assert_eq!(updated.status, NotificationStatus::Success);
        let recent = store.recent("prod", 10);
        assert_eq!(recent[1].id, "a");
        assert_eq!(recent[1].status, NotificationStatus::Success);
    }

    #[test]
    fn terminal_states_are_immutable() {
        let store = NotifyStore::new();
        store.store("prod", notification("a", 1));
        store.update_status("prod", "a", NotificationStatus::Failed);
        let after = store
            .update_status("prod", "a", NotificationStatus::Success)
            .unwrap();
        assert_eq!(after.status, NotificationStatus::Failed);
    }

    #[test]
    fn unknown_entries_return_none() {
        let store = NotifyStore::new();
        assert!(store
            .update_status("prod", "missing", NotificationStatus::Success)
            .is_none());
        assert!(store.recent("nowhere", 5).is_empty());
    }

    #[test]
    fn shutdown_sweep_fails_in_progress_only() {
        let store = NotifyStore::new();
        store.store("prod", notification("a", 1));
        store.store("staging", notification("b", 2));
        store.update_status("prod", "a", NotificationStatus::Success);
        assert_eq!(store.fail_in_progress(), 1);
        assert_eq!(
            store.recent("staging", 1)[0].status,
            NotificationStatus::Failed
        );
        assert_eq!(store.recent("prod", 1)[0].status, NotificationStatus::Success);
    }
}
