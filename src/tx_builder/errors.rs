//! Error types for transaction construction
//!
//! Everything in here is raised synchronously while encoding, compiling,
//! signing, or decoding a transaction. None of these errors are transient:
//! they indicate a malformed request from the caller and are never retried
//! by the submission controller.

use solana_sdk::{hash::Hash, pubkey::Pubkey};
use thiserror::Error;

use crate::tx_builder::layout::EncodingError;

/// Error type for all transaction builder operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionBuilderError {
    /// Instruction arguments could not be encoded against their layout
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// A full message was requested before an anchor was attached
    ///
    /// Account compilation alone does not need an anchor; `compile` does.
    #[error("Message has no anchor (recent blockhash or durable nonce)")]
    MissingAnchor,

    /// Serialization was requested before every signer slot was filled
    #[error("Transaction is missing {} of {required} required signatures", .missing.len())]
    IncompleteSignatures {
        /// Signer addresses whose slots are still empty
        missing: Vec<Pubkey>,
        /// Number of signer slots in the message
        required: usize,
    },

    /// The deduplicated account table exceeds what a u8 index can address
    #[error("Too many accounts: {count} (max {max})")]
    TooManyAccounts { count: usize, max: usize },

    /// Serialized transaction exceeds the packet size limit
    #[error("Transaction too large: {size} bytes (max {max})")]
    TransactionTooLarge { size: usize, max: usize },

    /// Invalid instruction order or structure
    ///
    /// Durable nonce transactions require:
    /// 1. advance_nonce_account (first)
    /// 2. Compute budget instructions
    /// 3. Program instructions
    #[error("Invalid instruction order: {0}")]
    InvalidInstructionOrder(String),

    /// The message was compiled against a different anchor value
    #[error("Anchor mismatch: message carries {message}, anchor is {anchor}")]
    AnchorMismatch { message: Hash, anchor: Hash },

    /// Bytes could not be decoded as a message or transaction
    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),
}

impl TransactionBuilderError {
    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::Encoding(_) => "encoding",
            Self::MissingAnchor => "anchor",
            Self::IncompleteSignatures { .. } => "signing",
            Self::TooManyAccounts { .. } => "accounts",
            Self::TransactionTooLarge { .. } => "size",
            Self::InvalidInstructionOrder(_) => "validation",
            Self::AnchorMismatch { .. } => "anchor",
            Self::InvalidWireFormat(_) => "wire",
        }
    }
}

// Convenience constructors
impl TransactionBuilderError {
    /// Create an invalid instruction order error
    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionOrder(reason.into())
    }

    /// Create a wire format error
    pub fn wire(reason: impl Into<String>) -> Self {
        Self::InvalidWireFormat(reason.into())
    }
}
