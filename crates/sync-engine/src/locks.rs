// crates/sync-engine/src/locks.rs
//! Per-record critical sections
//!
//! Requests for the same record id run their read-decide-write one at a
//! time; different ids never wait on each other. An id's entry is dropped
//! as soon as nobody holds or waits for it, so the map only ever contains
//! records that are in flight.

use ledgerline_core::RecordId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<RecordId, Arc<AsyncMutex<()>>>;

/// Named async locks keyed by record id
#[derive(Debug, Clone, Default)]
pub struct RecordLocks {
    entries: Arc<Mutex<LockMap>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `id`
    pub async fn lock(&self, id: &RecordId) -> RecordGuard {
        let entry = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(entries.entry(id.clone()).or_default())
        };

        let guard = entry.lock_owned().await;
        RecordGuard {
            id: id.clone(),
            entries: Arc::clone(&self.entries),
            guard: Some(guard),
        }
    }

    /// Number of ids currently held or awaited
    pub fn active(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

/// Exclusive access to one record id, released on drop
#[derive(Debug)]
pub struct RecordGuard {
    id: RecordId,
    entries: Arc<Mutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl RecordGuard {
    pub fn record_id(&self) -> &RecordId {
        &self.id
    }
}

impl Drop for RecordGuard {
    fn drop(&mut self) {
        // Release first so the count below only sees other holders
        self.guard.take();

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get(&self.id) {
            if Arc::strong_count(entry) == 1 {
                entries.remove(&self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_evicted_after_release() {
        let locks = RecordLocks::new();
        let id = RecordId::from("tx-1");

        let guard = locks.lock(&id).await;
        assert_eq!(guard.record_id(), &id);
        assert_eq!(locks.active(), 1);

        drop(guard);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_same_id_is_serialized() {
        let locks = RecordLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock(&RecordId::from("shared")).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_different_ids_do_not_block() {
        let locks = RecordLocks::new();
        let _a = locks.lock(&RecordId::from("a")).await;

        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock(&RecordId::from("b")))
            .await
            .expect("lock on another id should not wait");

        assert_eq!(locks.active(), 2);
        drop(b);
        assert_eq!(locks.active(), 1);
    }

    #[tokio::test]
    async fn test_waiter_keeps_entry_alive() {
        let locks = RecordLocks::new();
        let id = RecordId::from("tx-1");
        let first = locks.lock(&id).await;

        let waiter = {
            let locks = locks.clone();
            let id = id.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&id).await;
            })
        };
        tokio::task::yield_now().await;

        drop(first);
        assert_eq!(locks.active(), 1);

        waiter.await.unwrap();
        assert_eq!(locks.active(), 0);
    }
}
