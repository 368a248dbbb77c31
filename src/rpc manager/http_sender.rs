//! JSON-RPC over HTTP

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use super::rpc_config::RpcEndpointConfig;
use super::rpc_errors::RpcError;
use super::rpc_request::RpcRequest;
use super::rpc_sender::{RpcSender, RpcTransportStats};

/// JSON-RPC envelope.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    /// Result value for successful calls (may legitimately be `null`).
    #[serde(default)]
    result: Value,
    /// Error payload for failed calls.
    error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// [`RpcSender`] backed by `reqwest`
pub struct HttpSender {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    request_id: AtomicU64,
    limiter: Option<DefaultDirectRateLimiter>,
    stats: Mutex<RpcTransportStats>,
}

impl std::fmt::Debug for HttpSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSender")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("rate_limited", &self.limiter.is_some())
            .finish()
    }
}

impl HttpSender {
    /// Sender with a 30 second request timeout and no rate limit
    pub fn new(url: impl Into<String>) -> Result<Self, RpcError> {
        Self::new_with_timeout(url, Duration::from_secs(30))
    }

    pub fn new_with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport {
                endpoint: url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            url,
            timeout,
            request_id: AtomicU64::new(0),
            limiter: None,
            stats: Mutex::new(RpcTransportStats::default()),
        })
    }

    pub fn from_config(config: &RpcEndpointConfig) -> Result<Self, RpcError> {
        let sender = Self::new_with_timeout(&config.url, Duration::from_millis(config.timeout_ms))?;
        Ok(match NonZeroU32::new(config.rate_limit_rps) {
            Some(rps) => sender.with_rate_limit(rps),
            None => sender,
        })
    }

    /// Throttle outgoing requests to `rps` per second
    pub fn with_rate_limit(mut self, rps: NonZeroU32) -> Self {
        self.limiter = Some(RateLimiter::direct(Quota::per_second(rps)));
        self
    }

    fn map_reqwest_error(&self, e: reqwest::Error) -> RpcError {
        if e.is_timeout() {
            RpcError::Timeout {
                endpoint: self.url.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            RpcError::Transport {
                endpoint: self.url.clone(),
                message: e.to_string(),
            }
        }
    }

    async fn exchange(&self, request: RpcRequest, params: Value) -> Result<Value, RpcError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = request.build_request_json(id, params);
        trace!(method = %request, id, "rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RpcError::RateLimitExceeded {
                endpoint: self.url.clone(),
            });
        }
        if !status.is_success() {
            return Err(RpcError::Transport {
                endpoint: self.url.clone(),
                message: format!("HTTP status {}", status),
            });
        }

        let parsed: JsonRpcResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.map_reqwest_error(e)
            } else {
                RpcError::invalid_response(&self.url, request, e.to_string())
            }
        })?;

        if let Some(error) = parsed.error {
            debug!(method = %request, code = error.code, message = %error.message, "rpc error response");
            return Err(RpcError::RpcResponse {
                endpoint: self.url.clone(),
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }

        Ok(parsed.result)
    }
}

#[async_trait]
impl RpcSender for HttpSender {
    async fn send(&self, request: RpcRequest, params: Value) -> Result<Value, RpcError> {
        let started = Instant::now();

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
        let waited = started.elapsed();

        let result = self.exchange(request, params).await;

        let mut stats = self.stats.lock();
        stats.request_count += 1;
        stats.elapsed_time += started.elapsed();
        stats.rate_limited_time += waited;

        result
    }

    fn get_transport_stats(&self) -> RpcTransportStats {
        self.stats.lock().clone()
    }

    fn url(&self) -> String {
        self.url.clone()
    }
}
