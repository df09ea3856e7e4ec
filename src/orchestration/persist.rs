//! Debounced background persistence.
//!
//! Snapshots are coalesced: only the latest one queued during a debounce
//! window is written. Failures are logged and never reach the caller.

use crate::store::{save_snapshot, JournalStore, Snapshot};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct PersistenceWriter {
    tx: Mutex<Option<mpsc::UnboundedSender<Snapshot>>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl PersistenceWriter {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn JournalStore>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_writer(store, debounce, rx));
        Self {
            tx: Mutex::new(Some(tx)),
            task: tokio::sync::Mutex::new(Some(task)),
        }
    }

    /// Queue `snapshot` for writing. Returns immediately.
    pub fn enqueue(&self, snapshot: Snapshot) {
        let guard = self.tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(snapshot).is_err() {
                    warn!("Persistence writer stopped, dropping snapshot");
                }
            }
            None => warn!("Persistence writer shut down, dropping snapshot"),
        }
    }

    /// Flush anything pending and stop the writer.
    pub async fn shutdown(&self) {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        drop(tx);

        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Persistence writer task failed");
            }
        }
    }
}

async fn run_writer(
    store: Arc<dyn JournalStore>,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<Snapshot>,
) {
    while let Some(mut latest) = rx.recv().await {
        let mut coalesced = 0usize;
        let mut closed = false;

        let deadline = tokio::time::sleep(debounce);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                next = rx.recv() => match next {
                    Some(snapshot) => {
                        latest = snapshot;
                        coalesced += 1;
                        deadline.as_mut().reset(Instant::now() + debounce);
                    }
                    None => {
                        closed = true;
                        break;
                    }
                },
            }
        }

        match save_snapshot(store.as_ref(), &latest).await {
            Ok(()) => debug!(
                trades = latest.trades.len(),
                coalesced,
                "Persisted journal snapshot"
            ),
            Err(e) => warn!(error = %e, "Failed to persist journal snapshot"),
        }

        if closed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decimal, Side, Trade};
    use crate::store::MemoryStore;

    fn snapshot_with(n: usize) -> Snapshot {
        let trades = (1..=n)
            .map(|i| {
                Trade::new(
                    i.to_string(),
                    None,
                    "ACME",
                    Side::Buy,
                    Decimal::from_i64(10),
                    Decimal::from_i64(1),
                )
            })
            .collect();
        Snapshot {
            trades,
            ..Snapshot::default()
        }
    }

    #[tokio::test]
    async fn test_burst_is_coalesced_into_one_write() {
        let store = Arc::new(MemoryStore::new());
        let writer = PersistenceWriter::spawn(store.clone(), Duration::from_millis(50));

        for n in 1..=5 {
            writer.enqueue(snapshot_with(n));
        }
        writer.shutdown().await;

        assert_eq!(store.trade_saves(), 1);
        assert_eq!(store.snapshot().trades.len(), 5);
    }

    #[tokio::test]
    async fn test_failing_store_does_not_panic() {
        let store = Arc::new(MemoryStore::failing());
        let writer = PersistenceWriter::spawn(store.clone(), Duration::from_millis(10));
        writer.enqueue(snapshot_with(1));
        writer.shutdown().await;
        assert_eq!(store.trade_saves(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_dropped() {
        let store = Arc::new(MemoryStore::new());
        let writer = PersistenceWriter::spawn(store.clone(), Duration::from_millis(10));
        writer.shutdown().await;
        writer.enqueue(snapshot_with(2));
        assert_eq!(store.trade_saves(), 0);
    }
}
