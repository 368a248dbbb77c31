//! RPC Manager Module
//!
//! JSON-RPC access to the ledger: a transport trait with an HTTP
//! implementation, and a typed client on top of it.

pub mod http_sender;
pub mod rpc_client;
pub mod rpc_config;
pub mod rpc_errors;
pub mod rpc_request;
pub mod rpc_response;
pub mod rpc_sender;

// Re-exports for convenience
pub use http_sender::HttpSender;
pub use rpc_client::{RpcClient, SendTransactionConfig};
pub use rpc_config::{ConfigError, RpcEndpointConfig};
pub use rpc_errors::{RetryPolicy, RpcError};
pub use rpc_request::RpcRequest;
pub use rpc_response::{Account, ConfirmationStatus, FeeCalculator, SignatureStatus};
pub use rpc_sender::{RpcSender, RpcTransportStats};
