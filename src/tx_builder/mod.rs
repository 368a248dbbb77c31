//! Transaction construction
//!
//! Leaf-first pipeline from typed instruction arguments to wire bytes:
//! - **layout**: binary layout encoder for instruction data
//! - **instructions**: program-agnostic instructions, system and
//!   compute-budget encoders, durable-nonce instruction planning
//! - **anchor**: recent blockhash or durable nonce validity anchor
//! - **message**: account table compilation and message wire format
//! - **transaction**: drafts, signature slots, wire serialization
//! - **shortvec**: compact-u16 length prefixes
//! - **errors**: error taxonomy for everything above
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::{Keypair, Signer}};
//! use txpipe::tx_builder::{instructions, Anchor, TransactionDraft, TransactionBuilderError};
//!
//! # fn example(payer: Keypair, blockhash: Hash) -> Result<(), TransactionBuilderError> {
//! let mut draft = TransactionDraft::new(payer.pubkey());
//! draft
//!     .add_instruction(instructions::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1_000)?)
//!     .set_anchor(Anchor::blockhash(blockhash, 1_500));
//!
//! let mut tx = draft.into_transaction()?;
//! tx.sign(&[&payer]);
//! let wire = tx.serialize()?;
//! # let _ = wire;
//! # Ok(())
//! # }
//! ```

pub mod anchor;
pub mod errors;
pub mod instructions;
pub mod layout;
pub mod message;
pub mod shortvec;
pub mod transaction;

pub use anchor::Anchor;
pub use errors::TransactionBuilderError;
pub use instructions::{
    plan_instructions, sanity_check_ix_order, AccountReference, ComputeBudget, Instruction,
    InstructionBuilder, InstructionPlan,
};
pub use layout::{Discriminant, EncodingError, FieldKind, FieldValue, Layout, LayoutValues};
pub use message::{compile_accounts, CompiledAccounts, CompiledInstruction, Message, MessageHeader};
pub use transaction::{DecodedTransaction, Transaction, TransactionDraft, MAX_TRANSACTION_SIZE};
