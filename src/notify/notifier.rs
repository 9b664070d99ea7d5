//! # Notifier
//!
//! Long-lived worker pool dispatching HTTP refresh callbacks after config
//! writes. Delivery is best-effort: failures are recorded in the
//! notification log and never propagate to the write path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::constants::{NOTIFY_QUEUE_CAPACITY, NOTIFY_REQUEST_TIMEOUT_SECS, NOTIFY_WORKER_COUNT};
use crate::error::{Result, ServiceError};
use crate::notify::{Notification, NotificationStatus, NotifyStore};
use crate::observability::metrics;

struct RefreshJob {
    namespace: String,
    app_name: String,
    tracking_id: String,
    url: String,
}

/// Dispatches refresh callbacks on a fixed pool of workers fed by a
/// bounded queue.
pub struct Notifier {
    store: Arc<NotifyStore>,
    urls: HashMap<String, String>,
    sender: StdMutex<Option<mpsc::Sender<RefreshJob>>>,
    workers: StdMutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("urls", &self.urls.keys())
            .finish_non_exhaustive()
    }
}

impl Notifier {
    /// Build the pool. `urls` maps namespace to its refresh callback URL;
    /// namespaces without an entry get an immediate no-op SUCCESS.
    pub fn new(store: Arc<NotifyStore>, urls: HashMap<String, String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(NOTIFY_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ServiceError::Internal(format!("refresh client init failed: {e}")))?;
        let (sender, receiver) = mpsc::channel(NOTIFY_QUEUE_CAPACITY);
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let workers = (0..NOTIFY_WORKER_COUNT)
            .map(|worker| {
                let receiver = Arc::clone(&receiver);
                let client = client.clone();
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    loop {
                        let job = { receiver.lock().await.recv().await };
                        let Some(job) = job else {
                            debug!("refresh worker {worker} stopping");
                            break;
                        };
                        dispatch(&client, &store, job).await;
                    }
                })
            })
            .collect();
        Ok(Self {
            store,
            urls,
            sender: StdMutex::new(Some(sender)),
            workers: StdMutex::new(workers),
        })
    }

    /// Record and enqueue a refresh for `namespace`/`app_name`.
    ///
    /// The tracking id is the commit id when one is available, otherwise a
    /// generated `notify-<millis>-<app>` id. Never fails; every outcome
    /// lands in the notification log.
    pub async fn send_refresh(&self, namespace: &str, app_name: &str, commit_id: Option<&str>) {
        let tracking_id = commit_id.map(str::to_string).unwrap_or_else(|| {
            format!(
                "notify-{}-{app_name}",
                chrono::Utc::now().timestamp_millis()
            )
        });
        self.store.store(
            namespace,
            Notification {
                id: tracking_id.clone(),
                status: NotificationStatus::InProgress,
                initiated_time: chrono::Utc::now().timestamp_millis(),
            },
        );

        let Some(url) = self.urls.get(namespace) else {
            // No callback configured: nothing to send, the write succeeded
            debug!("no refresh URL for namespace {namespace}; marking {tracking_id} SUCCESS");
            self.store
                .update_status(namespace, &tracking_id, NotificationStatus::Success);
            metrics::record_notification_outcome("skipped");
            return;
        };

        let sender = self
            .sender
            .lock()
            .expect("notifier sender poisoned")
            .clone();
        let job = RefreshJob {
            namespace: namespace.to_string(),
            app_name: app_name.to_string(),
            tracking_id: tracking_id.clone(),
            url: url.clone(),
        };
        let enqueued = match sender {
            Some(sender) => sender.send(job).await.is_ok(),
            None => false,
        };
        if !enqueued {
            warn!("refresh queue unavailable (shutting down); marking {tracking_id} FAILED");
            self.store
                .update_status(namespace, &tracking_id, NotificationStatus::Failed);
            metrics::record_notification_outcome("failed");
        }
    }

    /// Orderly stop: refuse new enqueues, abandon in-flight requests, and
    /// mark anything still IN_PROGRESS as FAILED.
    pub async fn shutdown(&self) {
        self.sender
            .lock()
            .expect("notifier sender poisoned")
            .take();
        let workers = std::mem::take(
            &mut *self.workers.lock().expect("notifier workers poisoned"),
        );
        for worker in &workers {
            worker.abort();
        }
        for worker in workers {
            let _ = worker.await;
        }
        let swept = self.store.fail_in_progress();
        if swept > 0 {
            info!("notifier shutdown: marked {swept} in-flight notifications FAILED");
        }
    }
}

async fn dispatch(client: &reqwest::Client, store: &NotifyStore, job: RefreshJob) {
    let payload = serde_json::json!({ "appName": job.app_name });
    let result = client.post(&job.url).json(&payload).send().await;
    match result {
        Ok(response) if response.status().is_success() => {
            debug!(
                "refresh callback for {}/{} delivered ({})",
                job.namespace,
                job.app_name,
                response.status()
            );
            store.update_status(&job.namespace, &job.tracking_id, NotificationStatus::Success);
            metrics::record_notification_outcome("success");
        }
        Ok(response) => {
            warn!(
                "refresh callback for {}/{} returned {}",
                job.namespace,
                job.app_name,
                response.status()
            );
            store.update_status(&job.namespace, &job.tracking_id, NotificationStatus::Failed);
            metrics::record_notification_outcome("failed");
        }
        Err(e) => {
            warn!(
                "refresh callback for {}/{} failed: {e}",
                job.namespace, job.app_name
            );
            store.update_status(&job.namespace, &job.tracking_id, NotificationStatus::Failed);
            metrics::record_notification_outcome("failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_url_marks_success_immediately() {
        let store = Arc::new(NotifyStore::new());
        let notifier = Notifier::new(Arc::clone(&store), HashMap::new()).unwrap();
        notifier.send_refresh("prod", "user-svc", Some("abc1234")).await;
        let recent = store.recent("prod", 1);
        assert_eq!(recent[0].id, "abc1234");
        assert_eq!(recent[0].status, NotificationStatus::Success);
        notifier.shutdown().await;
    }

    #[tokio::test]
    async fn unreachable_url_marks_failed() {
        let store = Arc::new(NotifyStore::new());
        let urls = HashMap::from([(
            "prod".to_string(),
            // Reserved port on localhost; connection is refused immediately
            "http://127.0.0.1:1/refresh".to_string(),
        )]);
        let notifier = Notifier::new(Arc::clone(&store), urls).unwrap();
        notifier.send_refresh("prod", "user-svc", None).await;
        // Wait for the worker to record the terminal status
        for _ in 0..100 {
            if store.recent("prod", 1)[0].status != NotificationStatus::InProgress {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let recent = store.recent("prod", 1);
        assert!(recent[0].id.starts_with("notify-"));
        assert!(recent[0].id.ends_with("-user-svc"));
        assert_eq!(recent[0].status, NotificationStatus::Failed);
        notifier.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_fails_pending_entries() {
        let store = Arc::new(NotifyStore::new());
        let urls = HashMap::from([(
            "prod".to_string(),
            "http://127.0.0.1:1/refresh".to_string(),
        )]);
        let notifier = Notifier::new(Arc::clone(&store), urls).unwrap();
        store.store(
            "prod",
            Notification {
                id: "stuck".into(),
                status: NotificationStatus::InProgress,
                initiated_time: 1,
            },
        );
        notifier.shutdown().await;
        assert_eq!(store.recent("prod", 1)[0].status, NotificationStatus::Failed);
        // Post-shutdown sends degrade to FAILED rather than erroring
        notifier.send_refresh("prod", "user-svc", Some("deadbeef")).await;
        let entry = store
            .recent("prod", 5)
            .into_iter()
            .find(|n| n.id == "deadbeef")
            .unwrap();
        assert_eq!(entry.status, NotificationStatus::Failed);
    }
}
