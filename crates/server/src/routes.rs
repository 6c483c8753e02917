// crates/server/src/routes.rs

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use ledgerline_core::Timestamp;
use ledgerline_sync_engine::{
    ReconciliationEngine, ResolveRequest, ResolveResponse, SyncRequest, SyncResponse,
    RESOLVE_PATH, SYNC_PATH,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReconciliationEngine>,
}

impl AppState {
    pub fn new(engine: ReconciliationEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(SYNC_PATH, post(sync))
        .route(RESOLVE_PATH, post(resolve))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Timestamp::now().as_millis(),
    })
}

fn require_user(user_id: &str) -> Result<(), ApiError> {
    if user_id.trim().is_empty() {
        return Err(ApiError::bad_request("userId is required"));
    }
    Ok(())
}

/// Applies a batch; per-record failures travel inside the 200 body
async fn sync(
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, ApiError> {
    require_user(&request.user_id)?;
    log::debug!(
        "Sync batch of {} from {}",
        request.records.len(),
        request.user_id
    );

    let results = state
        .engine
        .apply_batch(&request.user_id, request.records)
        .await;
    Ok(Json(SyncResponse::new(results)))
}

async fn resolve(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ApiError> {
    require_user(&request.user_id)?;
    let response = state
        .engine
        .resolve(&request.user_id, request.resolution)
        .await?;
    Ok(Json(response))
}
