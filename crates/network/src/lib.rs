// crates/network/src/lib.rs
//! Client-side networking for Ledgerline
//!
//! - `Client`: reqwest wrapper with bounded timeouts and retried reads
//! - `ConnectivityMonitor`: debounced online/offline state fed by signals
//!   from the host or from `ConnectivityChecker` probes
//! - `NetworkIntermediary`: routes outbound requests, serving static
//!   resources cache-first and business calls network-first, and turns
//!   transport failures into a structured offline marker

mod cache;
mod client;
mod connectivity;
mod error;
mod intermediary;

pub use cache::{CacheStorage, ResourceCache, SqliteCacheStorage};
pub use client::{Client, ClientConfig};
pub use connectivity::{
    spawn_probe, ConnectivityChecker, ConnectivityEvent, ConnectivityMonitor, ConnectivitySignal,
    ConnectivityStatus,
};
pub use error::{NetworkError, NetworkResult};
pub use intermediary::{
    Fetcher, HttpFetcher, NetworkIntermediary, OfflineMarker, RequestClass, RequestRouter,
    ResourceRequest, ResourceResponse, ResponseSource,
};
pub use reqwest::Method;
