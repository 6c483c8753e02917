// crates/sync-engine/src/transport.rs
//! How the dispatcher reaches the reconciliation engine

use crate::engine::ReconciliationEngine;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{ResolveRequest, ResolveResponse, SyncRequest, SyncResponse, RESOLVE_PATH, SYNC_PATH};
use async_trait::async_trait;
use ledgerline_network::{NetworkIntermediary, ResourceRequest, ResourceResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Request/response channel to the server
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Submits a batch; per-record failures come back inside the response
    async fn submit(&self, request: &SyncRequest) -> SyncResult<SyncResponse>;

    async fn resolve(&self, request: &ResolveRequest) -> SyncResult<ResolveResponse>;
}

/// Transport over HTTP, routed through the network intermediary
///
/// Sync calls are business API calls: never cached, and an unreachable
/// server surfaces as the intermediary's offline marker.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    intermediary: Arc<NetworkIntermediary>,
}

impl HttpTransport {
    pub fn new(intermediary: Arc<NetworkIntermediary>) -> Self {
        Self { intermediary }
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> SyncResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(body)?;
        let response = self
            .intermediary
            .handle(ResourceRequest::post_json(path, body))
            .await;

        if let Some(marker) = response.offline_marker() {
            return Err(SyncError::Network(marker.error));
        }
        if !response.is_success() {
            return Err(status_error(&response));
        }

        Ok(serde_json::from_slice(&response.body)?)
    }
}

/// Maps a non-success response onto a typed error
fn status_error(response: &ResourceResponse) -> SyncError {
    let message = error_message(response);
    match response.status {
        400 | 422 => SyncError::InvalidData(message),
        403 => SyncError::Ownership(message),
        404 => SyncError::NotFound(message),
        status if status >= 500 => SyncError::Server { status, message },
        status => SyncError::Rejected { status, message },
    }
}

/// Pulls `error` out of a JSON error body, falling back to the raw text
fn error_message(response: &ResourceResponse) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: String,
    }

    serde_json::from_slice::<ErrorBody>(&response.body)
        .map(|b| b.error)
        .unwrap_or_else(|_| String::from_utf8_lossy(&response.body).trim().to_string())
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn submit(&self, request: &SyncRequest) -> SyncResult<SyncResponse> {
        self.post(SYNC_PATH, request).await
    }

    async fn resolve(&self, request: &ResolveRequest) -> SyncResult<ResolveResponse> {
        self.post(RESOLVE_PATH, request).await
    }
}

/// In-process transport calling an engine directly
#[derive(Debug, Clone)]
pub struct LocalTransport {
    engine: ReconciliationEngine,
}

impl LocalTransport {
    pub fn new(engine: ReconciliationEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl SyncTransport for LocalTransport {
    async fn submit(&self, request: &SyncRequest) -> SyncResult<SyncResponse> {
        let results = self
            .engine
            .apply_batch(&request.user_id, request.records.clone())
            .await;
        Ok(SyncResponse::new(results))
    }

    async fn resolve(&self, request: &ResolveRequest) -> SyncResult<ResolveResponse> {
        self.engine
            .resolve(&request.user_id, request.resolution.clone())
            .await
    }
}
