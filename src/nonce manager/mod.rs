//! Durable nonce support
//!
//! Reads nonce accounts over RPC and turns them into transaction anchors.
//! The submission controller uses the same reader to detect that a durable
//! transaction's nonce has moved on.

pub mod nonce_account;
pub mod nonce_errors;

pub use nonce_account::{fetch_durable_anchor, fetch_nonce_data, parse_nonce_account, NonceData};
pub use nonce_errors::{NonceError, NonceResult};
