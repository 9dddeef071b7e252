//! Fire-and-forget claim-log writes.
//!
//! `/verify` must never block on the document store, so log rows go through
//! a bounded in-process queue drained by a background writer. Overflow
//! drops the oldest row and bumps a counter; a graceful shutdown drains
//! whatever is queued.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::{ClaimLogRow, DocStore};

pub const DEFAULT_CAPACITY: usize = 1024;

struct Inner {
    queue: Mutex<VecDeque<ClaimLogRow>>,
    notify: Notify,
    dropped: AtomicU64,
    closed: AtomicBool,
    capacity: usize,
}

/// Handle for enqueueing claim logs. Clone freely.
#[derive(Clone)]
pub struct ClaimLogQueue {
    inner: Arc<Inner>,
}

impl ClaimLogQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                dropped: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Enqueues a row without blocking. When the queue is full the oldest
    /// row is discarded and counted.
    pub fn push(&self, row: ClaimLogRow) {
        if self.inner.closed.load(Ordering::Acquire) {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        {
            let mut queue = self.inner.queue.lock().unwrap_or_else(|e| e.into_inner());
            if queue.len() >= self.inner.capacity {
                queue.pop_front();
                let dropped = self.inner.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(dropped, "claim-log queue full, oldest entry dropped");
            }
            queue.push_back(row);
        }
        self.inner.notify.notify_one();
    }

    /// Rows discarded so far.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.inner.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawns the background writer. Returns the task handle; the task
    /// exits once the queue is closed and drained.
    pub fn spawn_writer(&self, store: DocStore) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                let batch: Vec<ClaimLogRow> = {
                    let mut queue = inner.queue.lock().unwrap_or_else(|e| e.into_inner());
                    queue.drain(..).collect()
                };

                for row in batch {
                    if let Err(e) = store.insert_claim_log(&row).await {
                        warn!(error = %e, "claim-log write failed, row lost");
                    }
                }

                if inner.closed.load(Ordering::Acquire)
                    && inner.queue.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
                {
                    debug!("claim-log writer drained and closed");
                    return;
                }

                inner.notify.notified().await;
            }
        })
    }

    /// Stops accepting rows and wakes the writer so it can drain and exit.
    /// Await the writer handle afterwards to guarantee durability.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocStore;
    use chrono::Utc;

    fn row(id: &str) -> ClaimLogRow {
        ClaimLogRow {
            log_id: id.to_string(),
            received_at: Utc::now().to_rfc3339(),
            client_fingerprint: "fp".to_string(),
            claim_text: "claim".to_string(),
            language: "en".to_string(),
            category: None,
            mode: "reasoned".to_string(),
            verdict: "unverified".to_string(),
            confidence: 0.1,
            contradiction_score: 0.0,
            sources_json: "[]".to_string(),
            model_used: None,
            latency_ms: 1,
            errors_json: "[]".to_string(),
        }
    }

    #[tokio::test]
    async fn writer_drains_rows_to_store() {
        let store = DocStore::connect_in_memory().await.unwrap();
        let queue = ClaimLogQueue::new(16);
        let writer = queue.spawn_writer(store.clone());

        queue.push(row("a"));
        queue.push(row("b"));
        queue.close();
        writer.await.unwrap();

        let logs = store.recent_claim_logs(10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(queue.dropped(), 0);
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_counts() {
        let queue = ClaimLogQueue::new(2);

        queue.push(row("a"));
        queue.push(row("b"));
        queue.push(row("c"));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);

        // The survivor set is the newest two.
        let ids: Vec<String> = {
            let inner = queue.inner.queue.lock().unwrap();
            inner.iter().map(|r| r.log_id.clone()).collect()
        };
        assert_eq!(ids, vec!["b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn close_rejects_new_rows() {
        let queue = ClaimLogQueue::new(4);
        queue.close();
        queue.push(row("late"));
        assert!(queue.is_empty());
        assert_eq!(queue.dropped(), 1);
    }
}
