//! A transport for RPC calls.

use std::time::Duration;

use async_trait::async_trait;

use super::rpc_errors::RpcError;
use super::rpc_request::RpcRequest;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RpcTransportStats {
    /// Number of RPC requests issued
    pub request_count: usize,

    /// Total amount of time spent transacting with the RPC server
    pub elapsed_time: Duration,

    /// Total amount of waiting time due to client-side rate limiting
    /// (a subset of `elapsed_time`)
    pub rate_limited_time: Duration,
}

/// A transport for RPC calls.
///
/// `RpcSender` moves one JSON-RPC request to a node and returns the raw
/// `result` value. It knows nothing about method semantics; typed mapping
/// lives in [`RpcClient`](super::RpcClient) and retry policy in the
/// submission controller.
#[async_trait]
pub trait RpcSender: Send + Sync {
    async fn send(
        &self,
        request: RpcRequest,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError>;

    fn get_transport_stats(&self) -> RpcTransportStats;

    fn url(&self) -> String;
}
