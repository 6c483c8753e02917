// crates/sync-engine/src/dispatcher.rs
//! Drains the local queue to the server
//!
//! One drain runs at a time. Items go out oldest first in small batches, a
//! batch never carries two mutations of the same record, and the cycle
//! stops at the first item that has to stay queued so later edits of a
//! record can never overtake earlier ones.

use crate::error::SyncResult;
use crate::protocol::{SyncRequest, SyncResponse};
use crate::queue::OperationQueue;
use crate::transport::SyncTransport;
use crate::types::{DrainOutcome, DrainReport, SyncState};
use ledgerline_core::{FailureKind, QueueItem, RecordSyncResult, Timestamp, Validator};
use ledgerline_network::{ConnectivityEvent, ConnectivityMonitor};
use ledgerline_resilience::{RetryPolicy, Timeout};
use std::collections::HashSet;
use std::future::Future;
use std::iter::Peekable;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex as AsyncMutex, Notify};

type QueuedItems = Peekable<std::vec::IntoIter<QueueItem>>;

/// Dispatcher settings
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Account the queued records are submitted for
    pub user_id: String,
    /// Maximum records per request
    pub batch_size: usize,
    /// Bound on each request; a timeout counts as a network failure
    pub request_timeout: Duration,
    /// Safety-net drain period while things are healthy
    pub drain_interval: Duration,
    /// Delay schedule after cycles that stopped early
    pub backoff: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            user_id: "local-user".to_string(),
            batch_size: 5,
            request_timeout: Duration::from_secs(15),
            drain_interval: Duration::from_secs(60),
            backoff: RetryPolicy::new(usize::MAX)
                .with_initial_delay(Duration::from_secs(5))
                .with_max_delay(Duration::from_secs(600)),
        }
    }
}

/// Client-side sync dispatcher
pub struct SyncDispatcher {
    queue: Arc<dyn OperationQueue>,
    transport: Arc<dyn SyncTransport>,
    monitor: ConnectivityMonitor,
    config: DispatcherConfig,
    state: Mutex<SyncState>,
    drain_lock: AsyncMutex<()>,
    rerun: AtomicBool,
    wake: Notify,
}

impl SyncDispatcher {
    pub fn new(
        queue: Arc<dyn OperationQueue>,
        transport: Arc<dyn SyncTransport>,
        monitor: ConnectivityMonitor,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            queue,
            transport,
            monitor,
            config,
            state: Mutex::new(SyncState::new()),
            drain_lock: AsyncMutex::new(()),
            rerun: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Snapshot of the observable sync status
    pub fn state(&self) -> SyncState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn update_state(&self, update: impl FnOnce(&mut SyncState)) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        update(&mut state);
    }

    /// Asks a running `run` loop to drain now
    pub fn trigger(&self) {
        self.wake.notify_one();
    }

    /// Sends everything currently queued
    ///
    /// If a drain is already running this returns `Coalesced` at once and
    /// the running drain performs one more full cycle when it finishes, even
    /// if its own cycle failed. The error is returned only when the last
    /// cycle run fails.
    pub async fn drain(&self) -> SyncResult<DrainReport> {
        self.rerun.store(true, Ordering::SeqCst);
        let mut combined: Option<DrainReport> = None;
        let mut last_error = None;

        while self.rerun.load(Ordering::SeqCst) {
            let Ok(guard) = self.drain_lock.try_lock() else {
                log::debug!("Drain already in flight; coalescing");
                break;
            };
            if !self.rerun.swap(false, Ordering::SeqCst) {
                break;
            }

            let cycle = self.drain_cycle().await;
            drop(guard);

            match cycle {
                Ok(cycle) => {
                    last_error = None;
                    match combined.as_mut() {
                        Some(report) => report.absorb(cycle),
                        None => combined = Some(cycle),
                    }
                }
                Err(e) => {
                    log::error!("Drain cycle failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(combined.unwrap_or_else(DrainReport::coalesced)),
        }
    }

    async fn drain_cycle(&self) -> SyncResult<DrainReport> {
        if !self.monitor.is_online() {
            let remaining = self.queue.len().await?;
            self.update_state(|s| {
                s.offline = true;
                s.pending_changes = remaining;
            });
            log::debug!("Offline; {} items stay queued", remaining);
            return Ok(DrainReport::skipped(remaining));
        }

        self.update_state(|s| {
            s.offline = false;
            s.in_progress = true;
        });
        let sent = self.send_queued().await;
        self.update_state(|s| s.in_progress = false);

        let mut report = match sent {
            Ok(report) => report,
            Err(e) => {
                self.update_state(|s| s.consecutive_failures += 1);
                return Err(e);
            }
        };
        report.remaining = self.queue.len().await?;

        self.update_state(|s| {
            s.pending_changes = report.remaining;
            if report.is_failure() {
                s.consecutive_failures += 1;
            } else {
                s.consecutive_failures = 0;
                s.last_sync = Some(Timestamp::now());
            }
        });

        log::info!(
            "Drain {:?}: {} acknowledged, {} rejected, {} remaining",
            report.outcome,
            report.acknowledged(),
            report.rejected.len(),
            report.remaining
        );
        Ok(report)
    }

    async fn send_queued(&self) -> SyncResult<DrainReport> {
        let mut report = DrainReport::new(DrainOutcome::Completed);
        let mut items = self.queue.list_all().await?.into_iter().peekable();

        loop {
            let batch = self.next_batch(&mut items, &mut report).await?;
            if batch.is_empty() {
                break;
            }

            let request = SyncRequest::new(
                self.config.user_id.as_str(),
                batch.iter().map(|item| item.payload.clone()).collect(),
            );

            let response = match self.send(&request).await {
                Ok(response) => response,
                Err(e) => {
                    log::warn!("Sending batch of {} failed: {}", batch.len(), e);
                    report.outcome = DrainOutcome::Stopped;
                    report.error = Some(e.to_string());
                    break;
                }
            };

            if !self.settle_batch(&batch, response.results, &mut report).await? {
                break;
            }
        }

        Ok(report)
    }

    /// Takes the next batch off the front of `items`
    ///
    /// Items that fail local validation are dropped from the queue here and
    /// never sent.
    async fn next_batch(
        &self,
        items: &mut QueuedItems,
        report: &mut DrainReport,
    ) -> SyncResult<Vec<QueueItem>> {
        let mut batch = Vec::new();
        let mut records = HashSet::new();

        while batch.len() < self.config.batch_size.max(1) {
            match items.peek() {
                Some(item) if records.contains(item.record_id()) => break,
                Some(_) => {}
                None => break,
            }
            let Some(item) = items.next() else {
                break;
            };

            if let Err(reasons) = item.payload.validate() {
                let message = reasons.join("; ");
                log::warn!("Dropping invalid queued item {}: {}", item.id, message);
                self.queue.remove(&item.id).await?;
                let result = RecordSyncResult::failed(
                    item.record_id().clone(),
                    FailureKind::Validation,
                    message,
                );
                report.rejected.push((item, result));
                continue;
            }

            records.insert(item.record_id().clone());
            batch.push(item);
        }

        Ok(batch)
    }

    async fn send(&self, request: &SyncRequest) -> SyncResult<SyncResponse> {
        Timeout::new(self.config.request_timeout)
            .run(self.transport.submit(request))
            .await?
    }

    /// Applies the server's verdicts to the queue
    ///
    /// Returns false when some item has to stay queued.
    async fn settle_batch(
        &self,
        batch: &[QueueItem],
        results: Vec<RecordSyncResult>,
        report: &mut DrainReport,
    ) -> SyncResult<bool> {
        let mut results = results.into_iter();
        let mut keep_going = true;

        for item in batch {
            let result = match results.next() {
                Some(result) if &result.record_id == item.record_id() => result,
                other => {
                    let message = match other {
                        Some(result) => format!("Got result for {}", result.record_id),
                        None => "No result returned".to_string(),
                    };
                    log::warn!("Result mismatch for {}: {}", item.record_id(), message);
                    keep_going = false;
                    report.results.push(RecordSyncResult::failed(
                        item.record_id().clone(),
                        FailureKind::Protocol,
                        message,
                    ));
                    continue;
                }
            };

            if result.is_acknowledged() {
                self.queue.remove(&item.id).await?;
            } else if result.is_permanent_failure() {
                log::warn!("Server rejected {} permanently", item.record_id());
                self.queue.remove(&item.id).await?;
                report.rejected.push((item.clone(), result.clone()));
            } else {
                log::info!("Keeping {} queued after a transient failure", item.record_id());
                keep_going = false;
            }
            report.results.push(result);
        }

        if results.next().is_some() {
            log::warn!("Server returned more results than records sent");
        }

        if !keep_going {
            report.outcome = DrainOutcome::Stopped;
            report
                .error
                .get_or_insert_with(|| "Some records could not be applied".to_string());
        }
        Ok(keep_going)
    }

    /// Delay before the next periodic drain
    fn next_delay(&self) -> Duration {
        let failures = self.state().consecutive_failures;
        if failures == 0 {
            self.config.drain_interval
        } else {
            self.config.backoff.delay_for_attempt(failures)
        }
    }

    /// Drains on reconnect, on `trigger`, and periodically, until `shutdown`
    /// completes
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut events = self.monitor.subscribe();
        tokio::pin!(shutdown);
        log::info!("Sync dispatcher started for {}", self.config.user_id);

        loop {
            let delay = self.next_delay();

            tokio::select! {
                _ = &mut shutdown => break,
                event = events.recv() => match event {
                    Ok(ConnectivityEvent::Restored) => log::info!("Back online; draining queue"),
                    Ok(ConnectivityEvent::Lost) => continue,
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                },
                _ = self.wake.notified() => log::debug!("Drain requested"),
                _ = tokio::time::sleep(delay) => log::debug!("Periodic drain after {:?}", delay),
            }

            if let Err(e) = self.drain().await {
                log::error!("Drain failed: {}", e);
            }
        }

        log::info!("Sync dispatcher stopped");
    }
}

impl std::fmt::Debug for SyncDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncDispatcher")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}
