// crates/network/src/client.rs
//! HTTP client wrapper with resilience

use crate::error::{NetworkError, NetworkResult};
use bytes::Bytes;
use ledgerline_resilience::{with_retry, RetryPolicy};
use reqwest::{header, Client as ReqwestClient, Method, Response};
use serde::Serialize;
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// Retry policy for idempotent reads
    pub retry_policy: Option<RetryPolicy>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            user_agent: format!("Ledgerline/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 10,
            retry_policy: Some(RetryPolicy::new(3).with_initial_delay(Duration::from_millis(100))),
        }
    }
}

impl ClientConfig {
    /// Default configuration with a custom timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// HTTP client with resilience features
#[derive(Debug, Clone)]
pub struct Client {
    inner: ReqwestClient,
    config: ClientConfig,
}

impl Client {
    /// Creates a new client with default configuration
    pub fn new() -> NetworkResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> NetworkResult<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(NetworkError::Http)?;

        Ok(Self {
            inner: client,
            config,
        })
    }

    /// Returns the configured request timeout
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Performs a GET request, retrying transport failures and 5xx
    pub async fn get(&self, url: &str) -> NetworkResult<Response> {
        self.request(|| self.inner.get(url).send(), url).await
    }

    /// Performs a HEAD request, retrying transport failures and 5xx
    pub async fn head(&self, url: &str) -> NetworkResult<Response> {
        self.request(|| self.inner.head(url).send(), url).await
    }

    /// Checks if a URL is accessible
    pub async fn is_accessible(&self, url: &str) -> bool {
        self.head(url).await.is_ok()
    }

    /// POSTs a JSON body once and returns the response whatever its status
    ///
    /// Never retried here: the caller decides what a failed submission means.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> NetworkResult<Response> {
        Ok(self.inner.post(url).json(body).send().await?)
    }

    /// Sends an arbitrary request once, returning the response whatever its status
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Bytes>,
        content_type: Option<&str>,
    ) -> NetworkResult<Response> {
        let mut builder = self.inner.request(method, url);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        Ok(builder.send().await?)
    }

    /// Internal request handler: retries per policy, rejects non-2xx
    async fn request<F, Fut>(&self, request_fn: F, url: &str) -> NetworkResult<Response>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
    {
        let attempt = || async { check_status(request_fn().await, url) };

        match &self.config.retry_policy {
            Some(policy) => with_retry(policy, NetworkError::is_retryable, attempt).await,
            None => attempt().await,
        }
    }
}

fn check_status(result: Result<Response, reqwest::Error>, url: &str) -> NetworkResult<Response> {
    let response = result?;
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(NetworkError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}
