//! txpipe - transaction construction, submission and confirmation
//!
//! Encodes instruction data, assembles and signs legacy-format messages
//! anchored to a recent blockhash or a durable nonce, submits them over
//! JSON-RPC and drives each one to exactly one terminal outcome.

pub mod config;
pub mod endpoints;
pub mod metrics;
pub mod observability;
pub mod structured_logging;
pub mod submission;
pub mod tx_builder;
pub mod wallet;

// Component modules with non-standard paths (directories with spaces)
#[path = "nonce manager/mod.rs"]
pub mod nonce_manager;

#[path = "rpc manager/mod.rs"]
pub mod rpc_manager;

pub mod test_utils;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature};
pub use submission::{SubmissionConfig, SubmissionController, SubmissionOutcome};
pub use tx_builder::{Anchor, Transaction, TransactionDraft};
