use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for the JSON-RPC endpoint the pipeline talks to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcEndpointConfig {
    /// The RPC endpoint URL
    pub url: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Rate limit (requests per second, 0 = unlimited)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rps: u32,

    /// Skip the node's preflight simulation on `sendTransaction`
    #[serde(default)]
    pub skip_preflight: bool,

    /// Commitment used for preflight simulation
    #[serde(default = "default_preflight_commitment")]
    pub preflight_commitment: String,

    /// Ask the node to search beyond its recent status cache
    #[serde(default = "default_true")]
    pub search_transaction_history: bool,
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_rate_limit() -> u32 {
    0
}

fn default_preflight_commitment() -> String {
    "confirmed".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for RpcEndpointConfig {
    fn default() -> Self {
        Self::from_url("http://127.0.0.1:8899")
    }
}

impl RpcEndpointConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: default_timeout_ms(),
            rate_limit_rps: default_rate_limit(),
            skip_preflight: false,
            preflight_commitment: default_preflight_commitment(),
            search_transaction_history: default_true(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("Failed to read config file {}: {}", path, e)))?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("Failed to parse TOML: {}", e)))
    }

    /// Load configuration from environment variables
    ///
    /// `TXPIPE_RPC_URL` is required; `TXPIPE_RPC_TIMEOUT_MS` is optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("TXPIPE_RPC_URL")
            .map_err(|_| ConfigError::MissingEnvVar("TXPIPE_RPC_URL".to_string()))?;

        let mut config = Self::from_url(url.trim());
        if let Some(timeout_ms) = std::env::var("TXPIPE_RPC_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout_ms = timeout_ms;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "Invalid URL format: {}",
                self.url
            )));
        }

        if self.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(format!(
                "Invalid timeout for {}: must be > 0",
                self.url
            )));
        }

        match self.preflight_commitment.as_str() {
            "processed" | "confirmed" | "finalized" => Ok(()),
            other => Err(ConfigError::ValidationError(format!(
                "Unknown preflight commitment: {}",
                other
            ))),
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}
