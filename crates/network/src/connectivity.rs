// crates/network/src/connectivity.rs
//! Network connectivity tracking
//!
//! The monitor applies loss of connectivity immediately and only accepts a
//! return to online once the signal stream has been quiet for the debounce
//! window, so a flapping link produces a single restoration.

use crate::client::Client;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Observable connectivity state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityStatus {
    Online,
    Offline,
}

impl ConnectivityStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, ConnectivityStatus::Online)
    }
}

/// Raw reachability report from the host or a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivitySignal {
    Up,
    Down,
}

/// Completed state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// Connectivity went away
    Lost,
    /// Connectivity came back and stayed up for the debounce window
    Restored,
}

/// Debounced connectivity state machine
///
/// Cheap to clone; all clones share one background task, which stops once
/// every clone is dropped.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    signals: mpsc::UnboundedSender<ConnectivitySignal>,
    status: watch::Receiver<ConnectivityStatus>,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl ConnectivityMonitor {
    /// Starts a monitor on the current tokio runtime
    pub fn new(initial: ConnectivityStatus, debounce: Duration) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(initial);
        let (events_tx, _) = broadcast::channel(16);

        tokio::spawn(run_monitor(
            signal_rx,
            status_tx,
            events_tx.clone(),
            debounce,
        ));

        Self {
            signals: signal_tx,
            status: status_rx,
            events: events_tx,
        }
    }

    /// Feeds a reachability signal into the monitor
    pub fn report(&self, signal: ConnectivitySignal) {
        if self.signals.send(signal).is_err() {
            log::warn!("Connectivity monitor stopped; dropping {:?}", signal);
        }
    }

    /// Current state
    pub fn status(&self) -> ConnectivityStatus {
        *self.status.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.status().is_online()
    }

    /// Receiver that observes every state change
    pub fn watch(&self) -> watch::Receiver<ConnectivityStatus> {
        self.status.clone()
    }

    /// Subscribes to completed transitions
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }
}

async fn run_monitor(
    mut signals: mpsc::UnboundedReceiver<ConnectivitySignal>,
    status: watch::Sender<ConnectivityStatus>,
    events: broadcast::Sender<ConnectivityEvent>,
    debounce: Duration,
) {
    let mut pending_up: Option<Instant> = None;

    loop {
        let deadline = pending_up;
        let settle = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            signal = signals.recv() => match signal {
                None => break,
                Some(ConnectivitySignal::Down) => {
                    pending_up = None;
                    if status.borrow().is_online() {
                        status.send_replace(ConnectivityStatus::Offline);
                        log::info!("Connectivity lost");
                        let _ = events.send(ConnectivityEvent::Lost);
                    }
                }
                Some(ConnectivitySignal::Up) => {
                    if !status.borrow().is_online() {
                        // Each new signal restarts the quiet period
                        pending_up = Some(Instant::now() + debounce);
                    }
                }
            },
            _ = settle => {
                pending_up = None;
                status.send_replace(ConnectivityStatus::Online);
                log::info!("Connectivity restored");
                let _ = events.send(ConnectivityEvent::Restored);
            }
        }
    }

    log::debug!("Connectivity monitor stopped");
}

/// Network connectivity checker
///
/// Probes a list of URLs with HEAD requests; any success counts as online.
#[derive(Debug, Clone)]
pub struct ConnectivityChecker {
    client: Client,
    check_urls: Vec<String>,
}

impl ConnectivityChecker {
    /// Creates a checker for the given probe URLs
    pub fn new(client: Client, urls: Vec<String>) -> Self {
        Self {
            client,
            check_urls: urls,
        }
    }

    /// Checks if any probe URL answers
    pub async fn is_online(&self) -> bool {
        for url in &self.check_urls {
            if self.client.is_accessible(url).await {
                return true;
            }
        }
        false
    }

    /// Probes once and reports the result to `monitor`
    pub async fn probe(&self, monitor: &ConnectivityMonitor) -> ConnectivitySignal {
        let signal = if self.is_online().await {
            ConnectivitySignal::Up
        } else {
            ConnectivitySignal::Down
        };
        log::debug!("Connectivity probe: {:?}", signal);
        monitor.report(signal);
        signal
    }
}

/// Probes at a coarse interval, feeding results into `monitor`
///
/// Runs until the returned handle is aborted.
pub fn spawn_probe(
    checker: ConnectivityChecker,
    monitor: ConnectivityMonitor,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            checker.probe(&monitor).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    const DEBOUNCE: Duration = Duration::from_secs(2);

    async fn settle() {
        // Let the monitor task drain its channel
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_down_applies_immediately() {
        let monitor = ConnectivityMonitor::new(ConnectivityStatus::Online, DEBOUNCE);
        let mut events = monitor.subscribe();

        monitor.report(ConnectivitySignal::Down);
        settle().await;

        assert!(!monitor.is_online());
        assert_eq!(events.try_recv(), Ok(ConnectivityEvent::Lost));
    }

    #[tokio::test(start_paused = true)]
    async fn test_up_waits_for_debounce() {
        let monitor = ConnectivityMonitor::new(ConnectivityStatus::Offline, DEBOUNCE);
        let mut events = monitor.subscribe();

        monitor.report(ConnectivitySignal::Up);
        settle().await;
        tokio::time::sleep(Duration::from_millis(1_900)).await;
        assert!(!monitor.is_online());

        tokio::time::sleep(Duration::from_millis(200)).await;
        settle().await;
        assert!(monitor.is_online());
        assert_eq!(events.try_recv(), Ok(ConnectivityEvent::Restored));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flapping_collapses_to_one_restoration() {
        let monitor = ConnectivityMonitor::new(ConnectivityStatus::Offline, DEBOUNCE);
        let mut events = monitor.subscribe();

        for _ in 0..5 {
            monitor.report(ConnectivitySignal::Up);
            settle().await;
            tokio::time::sleep(Duration::from_millis(300)).await;
            monitor.report(ConnectivitySignal::Down);
            settle().await;
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        assert!(!monitor.is_online());

        monitor.report(ConnectivitySignal::Up);
        monitor.report(ConnectivitySignal::Up);
        settle().await;
        tokio::time::sleep(DEBOUNCE * 2).await;
        settle().await;

        assert!(monitor.is_online());
        assert_eq!(events.try_recv(), Ok(ConnectivityEvent::Restored));
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn test_up_while_online_is_ignored() {
        let monitor = ConnectivityMonitor::new(ConnectivityStatus::Online, DEBOUNCE);
        let mut events = monitor.subscribe();

        monitor.report(ConnectivitySignal::Up);
        settle().await;
        tokio::time::sleep(DEBOUNCE * 2).await;
        settle().await;

        assert!(monitor.is_online());
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_observes_changes() {
        let monitor = ConnectivityMonitor::new(ConnectivityStatus::Online, DEBOUNCE);
        let mut watch = monitor.watch();

        monitor.report(ConnectivitySignal::Down);
        let status = watch.wait_for(|s| !s.is_online()).await.map(|s| *s);
        assert_eq!(status.ok(), Some(ConnectivityStatus::Offline));
    }

    #[tokio::test]
    async fn test_probe_of_unreachable_host_reports_down() {
        let client = Client::with_config(crate::ClientConfig {
            retry_policy: None,
            ..crate::ClientConfig::default()
        })
        .unwrap();
        let checker = ConnectivityChecker::new(client, vec!["http://127.0.0.1:1/".to_string()]);
        let monitor = ConnectivityMonitor::new(ConnectivityStatus::Online, DEBOUNCE);

        assert_eq!(checker.probe(&monitor).await, ConnectivitySignal::Down);
        let mut watch = monitor.watch();
        assert!(watch.wait_for(|s| !s.is_online()).await.is_ok());
    }
}
