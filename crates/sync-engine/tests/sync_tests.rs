// crates/sync-engine/tests/sync_tests.rs
//! End-to-end tests for the offline queue, dispatcher and reconciliation engine

use async_trait::async_trait;
use ledgerline_core::{
    ConflictResolution, ConflictStrategy, Decimal, NaiveDate, QueueItem, Record, RecordId,
    SyncOutcome, Timestamp,
};
use ledgerline_database::{connect_in_memory, run_migrations, DbPool};
use ledgerline_network::{ConnectivityMonitor, ConnectivitySignal, ConnectivityStatus};
use ledgerline_sync_engine::{
    DispatcherConfig, DrainOutcome, LocalTransport, OperationQueue, ReconciliationEngine,
    RecordStore, ResolveRequest, ResolveResponse, SqliteOperationQueue, SqliteRecordStore,
    SyncClient, SyncDispatcher, SyncError, SyncRequest, SyncResponse, SyncResult, SyncTransport,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_test::{assert_err, assert_ok};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn memory_pool() -> DbPool {
    let pool = connect_in_memory().await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

async fn server() -> (ReconciliationEngine, Arc<SqliteRecordStore>) {
    let store = Arc::new(SqliteRecordStore::new(memory_pool().await));
    (ReconciliationEngine::new(store.clone()), store)
}

fn config(user_id: &str) -> DispatcherConfig {
    DispatcherConfig {
        user_id: user_id.to_string(),
        request_timeout: Duration::from_secs(5),
        ..DispatcherConfig::default()
    }
}

fn record(description: &str, amount: i64) -> Record {
    let date = NaiveDate::from_ymd_opt(2024, 11, 5).unwrap();
    Record::new("", Decimal::from(amount), description, "general", date)
}

#[tokio::test]
async fn test_queue_survives_restart() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.db");

    let items: Vec<QueueItem> = (0..3)
        .map(|i| QueueItem::create_or_update(record(&format!("offline {}", i), i).with_id(RecordId::new())))
        .map(|mut item| {
            item.payload.user_id = "alice".to_string();
            item
        })
        .collect();

    {
        let queue = SqliteOperationQueue::open(&path).await.unwrap();
        for item in &items {
            assert_ok!(queue.record_mutation(item).await);
        }
        queue.pool().close().await;
    }

    let reopened = SqliteOperationQueue::open(&path).await.unwrap();
    assert_eq!(reopened.list_all().await.unwrap(), items);
    assert_eq!(reopened.local_records("alice").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_offline_edits_arrive_in_order() {
    let (engine, store) = server().await;
    let queue = Arc::new(SqliteOperationQueue::new(memory_pool().await));
    let monitor = ConnectivityMonitor::new(ConnectivityStatus::Offline, Duration::from_millis(10));
    let client = SyncClient::new(
        queue,
        Arc::new(LocalTransport::new(engine)),
        monitor.clone(),
        config("alice"),
    );

    let mut rec = record("draft", 10);
    for (i, description) in ["draft", "edited", "final"].iter().enumerate() {
        rec.description = description.to_string();
        rec.amount = Decimal::from(10 + i as i64);
        rec.updated_at = Timestamp::from_millis(1_000 + i as i64);
        client.save(rec.clone()).await.unwrap();
    }
    assert_eq!(client.pending().await.unwrap().len(), 3);

    monitor.report(ConnectivitySignal::Up);
    let mut watch = monitor.watch();
    tokio::time::timeout(Duration::from_secs(2), watch.wait_for(|s| s.is_online()))
        .await
        .unwrap()
        .unwrap();

    let report = client.sync_now().await.unwrap();
    assert_eq!(report.outcome, DrainOutcome::Completed);
    assert_eq!(report.acknowledged(), 3);

    let stored = store.get(&rec.id).await.unwrap().unwrap();
    assert_eq!(stored.description, "final");
    assert_eq!(stored.amount, Decimal::from(12));
}

/// Applies every batch but loses the first acknowledgment
struct LostAckTransport {
    inner: LocalTransport,
    dropped: AtomicBool,
}

#[async_trait]
impl SyncTransport for LostAckTransport {
    async fn submit(&self, request: &SyncRequest) -> SyncResult<SyncResponse> {
        let response = self.inner.submit(request).await?;
        if !self.dropped.swap(true, Ordering::SeqCst) {
            return Err(SyncError::Network("connection reset".to_string()));
        }
        Ok(response)
    }

    async fn resolve(&self, request: &ResolveRequest) -> SyncResult<ResolveResponse> {
        self.inner.resolve(request).await
    }
}

#[tokio::test]
async fn test_resubmission_after_lost_ack_is_idempotent() {
    init_logging();
    let (engine, store) = server().await;
    let transport = Arc::new(LostAckTransport {
        inner: LocalTransport::new(engine),
        dropped: AtomicBool::new(false),
    });
    let queue = Arc::new(SqliteOperationQueue::new(memory_pool().await));
    let monitor = ConnectivityMonitor::new(ConnectivityStatus::Online, Duration::from_millis(10));
    let client = SyncClient::new(queue, transport, monitor, config("alice"));

    let rec = record("lunch", 12);
    let outcome = client.save(rec.clone()).await.unwrap();
    assert_eq!(outcome.drain.unwrap().outcome, DrainOutcome::Stopped);
    assert_eq!(client.pending().await.unwrap().len(), 1);

    let report = client.sync_now().await.unwrap();
    assert_eq!(report.outcome, DrainOutcome::Completed);
    assert_eq!(report.results[0].outcome, SyncOutcome::Applied);
    assert!(client.pending().await.unwrap().is_empty());

    let stored = store.get(&rec.id).await.unwrap().unwrap();
    assert_eq!(stored.amount, Decimal::from(12));
}

/// Holds each submission until a permit is released
struct GatedTransport {
    inner: LocalTransport,
    gate: Semaphore,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl SyncTransport for GatedTransport {
    async fn submit(&self, request: &SyncRequest) -> SyncResult<SyncResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let permit = self.gate.acquire().await.map_err(|e| SyncError::Custom(e.to_string()))?;
        permit.forget();

        let response = self.inner.submit(request).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }

    async fn resolve(&self, request: &ResolveRequest) -> SyncResult<ResolveResponse> {
        self.inner.resolve(request).await
    }
}

#[tokio::test]
async fn test_single_drain_in_flight() {
    init_logging();
    let (engine, store) = server().await;
    let transport = Arc::new(GatedTransport {
        inner: LocalTransport::new(engine),
        gate: Semaphore::new(0),
        in_flight: AtomicUsize::new(0),
        max_in_flight: AtomicUsize::new(0),
        calls: AtomicUsize::new(0),
    });
    let queue = Arc::new(SqliteOperationQueue::new(memory_pool().await));
    let monitor = ConnectivityMonitor::new(ConnectivityStatus::Online, Duration::from_millis(10));
    let dispatcher = Arc::new(SyncDispatcher::new(
        queue.clone(),
        transport.clone(),
        monitor,
        config("alice"),
    ));

    let first = QueueItem::create_or_update(Record {
        user_id: "alice".to_string(),
        ..record("first", 1)
    });
    queue.enqueue(&first).await.unwrap();

    let running = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.drain().await })
    };
    while transport.calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    // Arrives mid-drain: coalesced into one follow-up cycle
    let second = QueueItem::create_or_update(Record {
        user_id: "alice".to_string(),
        ..record("second", 2)
    });
    queue.enqueue(&second).await.unwrap();
    let coalesced = dispatcher.drain().await.unwrap();
    assert_eq!(coalesced.outcome, DrainOutcome::Coalesced);
    let again = dispatcher.drain().await.unwrap();
    assert_eq!(again.outcome, DrainOutcome::Coalesced);

    transport.gate.add_permits(10);
    let report = assert_ok!(running.await.unwrap());

    assert_eq!(report.outcome, DrainOutcome::Completed);
    assert_eq!(report.acknowledged(), 2);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
    assert!(queue.is_empty().await.unwrap());
    assert!(store.get(second.record_id()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_server_wins_discards_client_edits() {
    let (engine, store) = server().await;
    let transport: Arc<dyn SyncTransport> = Arc::new(LocalTransport::new(engine));

    let phone = SyncClient::new(
        Arc::new(SqliteOperationQueue::new(memory_pool().await)),
        transport.clone(),
        ConnectivityMonitor::new(ConnectivityStatus::Online, Duration::from_millis(10)),
        config("alice"),
    );
    let laptop = SyncClient::new(
        Arc::new(SqliteOperationQueue::new(memory_pool().await)),
        transport,
        ConnectivityMonitor::new(ConnectivityStatus::Offline, Duration::from_millis(10)),
        config("alice"),
    );

    let original = record("Groceries", 60);
    phone.save(original.clone()).await.unwrap();

    let mut phone_edit = original.clone();
    phone_edit.amount = Decimal::from(64);
    phone.save(phone_edit).await.unwrap();

    let mut laptop_edit = original.clone();
    laptop_edit.amount = Decimal::from(6);
    laptop.save(laptop_edit.clone()).await.unwrap();

    let resolution = ConflictResolution::new(original.id.clone(), ConflictStrategy::ServerWins)
        .with_client_version(laptop_edit);
    let response = laptop.resolve_conflict(resolution).await.unwrap();

    assert_eq!(response.outcome, SyncOutcome::ConflictResolved);
    assert_eq!(response.record.amount, Decimal::from(64));
    assert!(laptop.pending().await.unwrap().is_empty());
    assert_eq!(
        laptop.record(&original.id).await.unwrap().unwrap().amount,
        Decimal::from(64)
    );
    assert_eq!(
        store.get(&original.id).await.unwrap().unwrap().amount,
        Decimal::from(64)
    );
}

#[tokio::test]
async fn test_merge_never_shrinks_amount_end_to_end() {
    let (engine, store) = server().await;
    let client = SyncClient::new(
        Arc::new(SqliteOperationQueue::new(memory_pool().await)),
        Arc::new(LocalTransport::new(engine)),
        ConnectivityMonitor::new(ConnectivityStatus::Online, Duration::from_millis(10)),
        config("alice"),
    );

    let original = record("Taxi", -25);
    client.save(original.clone()).await.unwrap();

    let mut smaller = original.clone();
    smaller.amount = Decimal::from(-5);
    smaller.description = "Taxi to airport".to_string();

    let resolution = ConflictResolution::new(original.id.clone(), ConflictStrategy::Merge)
        .with_client_version(smaller);
    let response = client.resolve_conflict(resolution).await.unwrap();

    assert_eq!(response.record.amount, Decimal::from(-25));
    assert_eq!(response.record.description, "Taxi to airport");
    assert_eq!(store.get(&original.id).await.unwrap(), Some(response.record));
}

#[tokio::test]
async fn test_other_users_record_is_rejected_and_dropped() {
    let (engine, _) = server().await;
    let transport: Arc<dyn SyncTransport> = Arc::new(LocalTransport::new(engine));
    let monitor = || ConnectivityMonitor::new(ConnectivityStatus::Online, Duration::from_millis(10));

    let alice = SyncClient::new(
        Arc::new(SqliteOperationQueue::new(memory_pool().await)),
        transport.clone(),
        monitor(),
        config("alice"),
    );
    let mallory = SyncClient::new(
        Arc::new(SqliteOperationQueue::new(memory_pool().await)),
        transport,
        monitor(),
        config("mallory"),
    );

    let rec = record("Rent", 900);
    alice.save(rec.clone()).await.unwrap();

    let outcome = mallory.save(rec).await.unwrap();
    let report = outcome.drain.unwrap();
    assert_eq!(report.rejected.len(), 1);
    assert!(mallory.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_save_is_refused_before_queueing() {
    let (engine, _) = server().await;
    let client = SyncClient::new(
        Arc::new(SqliteOperationQueue::new(memory_pool().await)),
        Arc::new(LocalTransport::new(engine)),
        ConnectivityMonitor::new(ConnectivityStatus::Offline, Duration::from_millis(10)),
        config("alice"),
    );

    let mut rec = record("Too precise", 1);
    rec.amount = Decimal::new(12_345, 3);

    let err = assert_err!(client.save(rec).await);
    assert!(matches!(err, SyncError::InvalidData(_)));
    assert!(client.pending().await.unwrap().is_empty());
}
