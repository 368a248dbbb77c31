//! Shared fixtures for in-crate scenario tests

use std::time::Duration;

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};

use crate::rpc_manager::RetryPolicy;
use crate::submission::SubmissionConfig;
use crate::tx_builder::{
    Anchor, Discriminant, FieldKind, Instruction, InstructionBuilder, Layout, LayoutValues,
    Transaction, TransactionDraft,
};

pub(crate) const COUNTER_PROGRAM: Pubkey = Pubkey::new_from_array([7u8; 32]);

/// `increment { amount: u64 }` with a one-byte discriminant: 9 data bytes
pub(crate) fn increment_layout() -> Layout {
    Layout::new("increment", Discriminant::U8(1)).field("amount", FieldKind::U64)
}

pub(crate) fn increment_ix(payer: &Pubkey, counter: &Pubkey, amount: u64) -> Instruction {
    InstructionBuilder::new(COUNTER_PROGRAM)
        .writable(*counter)
        .signer(*payer, true)
        .encode(&increment_layout(), &LayoutValues::new().with("amount", amount))
        .unwrap()
        .build()
}

pub(crate) fn signed_increment(payer: &Keypair, anchor: Anchor, amount: u64) -> Transaction {
    let mut draft = TransactionDraft::new(payer.pubkey());
    draft
        .add_instruction(increment_ix(&payer.pubkey(), &Pubkey::new_unique(), amount))
        .set_anchor(anchor);
    let mut tx = draft.into_transaction().unwrap();
    assert_eq!(tx.sign(&[payer]), 1);
    tx
}

/// Short intervals for paused-clock tests
pub(crate) fn fast_config() -> SubmissionConfig {
    SubmissionConfig {
        retry_policy: RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 10,
            max_delay_ms: 100,
            ..RetryPolicy::default()
        },
        poll_interval: Duration::from_millis(500),
        timeout: Duration::from_secs(10),
        rpc_call_timeout: Duration::from_secs(1),
        ..SubmissionConfig::default()
    }
}
