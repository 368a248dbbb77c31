//! Configuration module for the txpipe binary
//!
//! This module handles configuration loading from TOML files, `.env` files
//! and environment variables, and converts the result into the settings the
//! library components take.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::rpc_manager::{RetryPolicy, RpcEndpointConfig};
use crate::submission::{Durability, SubmissionConfig};
use crate::tx_builder::ComputeBudget;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// RPC endpoint configuration
    #[serde(default)]
    pub rpc: RpcEndpointConfig,

    /// Wallet configuration
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Submission and confirmation behaviour
    #[serde(default)]
    pub submission: SubmissionSettings,

    /// Compute budget attached to built transactions
    #[serde(default)]
    pub compute_budget: ComputeBudgetConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to keypair file
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionSettings {
    /// Submit attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// 1.0 polls at a fixed interval
    #[serde(default = "default_poll_backoff")]
    pub poll_backoff: f64,

    #[serde(default = "default_max_poll_interval_ms")]
    pub max_poll_interval_ms: u64,

    /// Overall confirmation budget in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Per-call RPC timeout in milliseconds
    #[serde(default = "default_rpc_call_timeout_ms")]
    pub rpc_call_timeout_ms: u64,

    #[serde(default)]
    pub durability: Durability,

    #[serde(default = "default_finalized_confirmations")]
    pub finalized_confirmations: usize,

    /// Rebroadcast interval while unseen; unset disables rebroadcast
    #[serde(default)]
    pub resend_interval_ms: Option<u64>,

    /// Transactions driven at once by batch submission
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeBudgetConfig {
    #[serde(default)]
    pub unit_limit: u32,

    #[serde(default)]
    pub unit_price_micro_lamports: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default)]
    pub enable_metrics: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,
}

// Default value functions
fn default_keypair_path() -> String { "~/.config/solana/id.json".to_string() }
fn default_max_attempts() -> u32 { 5 }
fn default_base_delay_ms() -> u64 { 250 }
fn default_max_delay_ms() -> u64 { 5000 }
fn default_poll_interval_ms() -> u64 { 500 }
fn default_poll_backoff() -> f64 { 1.0 }
fn default_max_poll_interval_ms() -> u64 { 2000 }
fn default_timeout_secs() -> u64 { 60 }
fn default_rpc_call_timeout_ms() -> u64 { 5000 }
fn default_finalized_confirmations() -> usize { 32 }
fn default_batch_concurrency() -> usize { 8 }
fn default_metrics_port() -> u16 { 9090 }

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
        }
    }
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_backoff: default_poll_backoff(),
            max_poll_interval_ms: default_max_poll_interval_ms(),
            timeout_secs: default_timeout_secs(),
            rpc_call_timeout_ms: default_rpc_call_timeout_ms(),
            durability: Durability::default(),
            finalized_confirmations: default_finalized_confirmations(),
            resend_interval_ms: None,
            batch_concurrency: default_batch_concurrency(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: false,
            metrics_port: default_metrics_port(),
            json_logs: false,
        }
    }
}

impl SubmissionSettings {
    pub fn to_submission_config(&self) -> SubmissionConfig {
        SubmissionConfig {
            retry_policy: RetryPolicy {
                max_attempts: self.max_attempts,
                base_delay_ms: self.base_delay_ms,
                max_delay_ms: self.max_delay_ms,
                ..RetryPolicy::default()
            },
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            poll_backoff: self.poll_backoff,
            max_poll_interval: Duration::from_millis(self.max_poll_interval_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            rpc_call_timeout: Duration::from_millis(self.rpc_call_timeout_ms),
            durability: self.durability,
            finalized_confirmations: self.finalized_confirmations,
            resend_interval: self.resend_interval_ms.map(Duration::from_millis),
        }
    }
}

impl From<&ComputeBudgetConfig> for ComputeBudget {
    fn from(config: &ComputeBudgetConfig) -> Self {
        ComputeBudget {
            unit_limit: config.unit_limit,
            unit_price_micro_lamports: config.unit_price_micro_lamports,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        Ok(config)
    }

    /// Load configuration with `.env` and environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// `TXPIPE_RPC_URL` and `TXPIPE_KEYPAIR_PATH` replace the file values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("TXPIPE_RPC_URL") {
            self.rpc.url = url.trim().to_string();
        }
        if let Ok(path) = std::env::var("TXPIPE_KEYPAIR_PATH") {
            self.wallet.keypair_path = path.trim().to_string();
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.rpc.validate()?;

        let s = &self.submission;
        if s.max_attempts == 0 {
            anyhow::bail!("submission.max_attempts must be at least 1");
        }
        if s.poll_interval_ms == 0 || s.rpc_call_timeout_ms == 0 || s.timeout_secs == 0 {
            anyhow::bail!("submission intervals and timeouts must be non-zero");
        }
        if s.poll_backoff < 1.0 {
            anyhow::bail!("submission.poll_backoff must be >= 1.0, got {}", s.poll_backoff);
        }
        if s.finalized_confirmations == 0 {
            anyhow::bail!("submission.finalized_confirmations must be at least 1");
        }
        if s.batch_concurrency == 0 {
            anyhow::bail!("submission.batch_concurrency must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.submission.to_submission_config(), SubmissionConfig::default());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[rpc]
url = "https://rpc.example.com"
timeout_ms = 2000

[wallet]
keypair_path = "/tmp/payer.json"

[submission]
max_attempts = 3
durability = "finalized"
resend_interval_ms = 2000

[compute_budget]
unit_price_micro_lamports = 10000
"#
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.rpc.url, "https://rpc.example.com");
        assert_eq!(config.rpc.timeout_ms, 2000);
        assert_eq!(config.wallet.keypair_path, "/tmp/payer.json");

        let submission = config.submission.to_submission_config();
        assert_eq!(submission.retry_policy.max_attempts, 3);
        assert_eq!(submission.durability, Durability::Finalized);
        assert_eq!(submission.resend_interval, Some(Duration::from_secs(2)));

        let budget = ComputeBudget::from(&config.compute_budget);
        assert_eq!(budget.unit_limit, 0);
        assert_eq!(budget.unit_price_micro_lamports, 10_000);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.submission.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.submission.poll_backoff = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rpc.url = "localhost".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Config::from_file("/no/such/txpipe.toml").unwrap_err();
        assert!(err.to_string().contains("/no/such/txpipe.toml"));
    }
}
