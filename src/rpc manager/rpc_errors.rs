use solana_sdk::signature::Signature;
use thiserror::Error;

/// Errors raised by the RPC layer
///
/// Everything here describes a failed exchange with a node, never an
/// on-ledger outcome. The submission controller retries these while
/// submitting and treats them as "no answer yet" while polling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RpcError {
    /// Transport-level errors (network, connection, HTTP status)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// The call did not complete within its per-call timeout
    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// JSON-RPC error object returned by the node
    ///
    /// Pre-ledger rejections (preflight failure, unknown blockhash, malformed
    /// transaction) arrive as this variant.
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code})")]
    RpcResponse {
        endpoint: String,
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Rate limit exceeded
    #[error("Rate limit exceeded (endpoint: {endpoint})")]
    RateLimitExceeded { endpoint: String },

    /// Response body did not have the expected shape
    #[error("Invalid response for {method}: {message} (endpoint: {endpoint})")]
    InvalidResponse {
        endpoint: String,
        method: String,
        message: String,
    },

    /// Node acknowledged a different signature than the one submitted
    #[error("Signature mismatch: submitted {expected}, node returned {returned}")]
    SignatureMismatch {
        expected: Signature,
        returned: String,
    },
}

impl RpcError {
    /// Check if this error is likely transient
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Transport { .. } => true,
            RpcError::Timeout { .. } => true,
            RpcError::RateLimitExceeded { .. } => true,

            // JSON-RPC server error range and HTTP 5xx
            RpcError::RpcResponse { code, .. } => {
                (-32099..=-32000).contains(code) || (500..600).contains(code)
            }

            RpcError::InvalidResponse { .. } => false,
            RpcError::SignatureMismatch { .. } => false,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            RpcError::Transport { .. } => "transport",
            RpcError::Timeout { .. } => "timeout",
            RpcError::RpcResponse { .. } => "rpc_response",
            RpcError::RateLimitExceeded { .. } => "rate_limit",
            RpcError::InvalidResponse { .. } => "invalid_response",
            RpcError::SignatureMismatch { .. } => "signature_mismatch",
        }
    }

    /// Get the endpoint associated with this error, if any
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            RpcError::Transport { endpoint, .. } => Some(endpoint),
            RpcError::Timeout { endpoint, .. } => Some(endpoint),
            RpcError::RpcResponse { endpoint, .. } => Some(endpoint),
            RpcError::RateLimitExceeded { endpoint } => Some(endpoint),
            RpcError::InvalidResponse { endpoint, .. } => Some(endpoint),
            RpcError::SignatureMismatch { .. } => None,
        }
    }

    pub(crate) fn invalid_response(
        endpoint: impl Into<String>,
        method: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        RpcError::InvalidResponse {
            endpoint: endpoint.into(),
            method: method.to_string(),
            message: message.into(),
        }
    }
}

/// Retry policy for RPC operations
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Base delay in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,

    /// Jitter factor (0.0 - 1.0)
    pub jitter_factor: f64,

    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 250,
            max_delay_ms: 5000,
            jitter_factor: 0.2,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (0-based)
    ///
    /// Returns `None` once the attempt ceiling is reached.
    pub fn calculate_delay(&self, attempt: u32) -> Option<std::time::Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }

        // Exponential backoff
        let delay_ms = self.base_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let delay_ms = delay_ms.min(self.max_delay_ms as f64);

        // Add jitter to prevent thundering herd
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * self.jitter_factor;
        let jittered_delay = (delay_ms * (1.0 + jitter)).max(0.0) as u64;

        Some(std::time::Duration::from_millis(jittered_delay))
    }

    /// Policy that makes a single attempt
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}
