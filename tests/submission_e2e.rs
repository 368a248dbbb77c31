//! End-to-end pipeline: configuration, build, sign, submit and confirm
//!
//! Runs the public API against the scripted ledger from `test_utils`.

use std::io::Write;
use std::time::Duration;

use serde_json::json;
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use txpipe::config::Config;
use txpipe::metrics::metrics;
use txpipe::nonce_manager::{fetch_durable_anchor, NonceData};
use txpipe::rpc_manager::{ConfirmationStatus, RpcError, RpcRequest};
use txpipe::submission::{
    cancel_pair, FailureReason, SubmissionController, SubmissionOutcome, SubmissionState,
};
use txpipe::test_utils::{landed, MockLedger, SendBehavior};
use txpipe::tx_builder::instructions::{self, COMPUTE_BUDGET_PROGRAM_ID};
use txpipe::tx_builder::{ComputeBudget, DecodedTransaction, TransactionDraft};

const CONFIG: &str = r#"
[rpc]
url = "http://127.0.0.1:8899"

[submission]
max_attempts = 3
base_delay_ms = 20
max_delay_ms = 200
poll_interval_ms = 400
timeout_secs = 20
rpc_call_timeout_ms = 1000
durability = "confirmed"

[compute_budget]
unit_limit = 1400
unit_price_micro_lamports = 25
"#;

fn load_config() -> Config {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();
    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
    config.validate().unwrap();
    config
}

fn transfer_draft(config: &Config, payer: &Keypair, lamports: u64) -> TransactionDraft {
    let mut draft = TransactionDraft::new(payer.pubkey());
    draft
        .add_instruction(instructions::transfer(&payer.pubkey(), &Pubkey::new_unique(), lamports).unwrap())
        .set_compute_budget(ComputeBudget::from(&config.compute_budget));
    draft
}

#[tokio::test(start_paused = true)]
async fn test_configured_transfer_confirms() {
    let config = load_config();
    let ledger = MockLedger::new();
    ledger.land_on_accept(landed(321, ConfirmationStatus::Confirmed));
    let controller = SubmissionController::new(ledger.client(), config.submission.to_submission_config());
    let payer = Keypair::new();

    let before = metrics()
        .submission_outcomes
        .with_label_values(&["confirmed"])
        .get();

    let report = controller
        .build_and_send(transfer_draft(&config, &payer, 5_000), &[&payer])
        .await
        .unwrap();

    assert_eq!(report.outcome.slot(), Some(321));
    assert_eq!(
        report.transitions,
        vec![
            SubmissionState::Building,
            SubmissionState::Signed,
            SubmissionState::Submitted,
            SubmissionState::Confirmed,
        ]
    );
    assert_eq!(ledger.calls(RpcRequest::GetLatestBlockhash), 1);
    assert!(
        metrics()
            .submission_outcomes
            .with_label_values(&["confirmed"])
            .get()
            > before
    );

    // Budget instructions come ahead of the transfer on the wire
    let decoded = DecodedTransaction::from_wire(&ledger.received()[0]).unwrap();
    assert!(decoded.verify_signatures());
    assert_eq!(decoded.signature(), Some(&report.signature));
    let programs: Vec<Pubkey> = decoded
        .message
        .instructions
        .iter()
        .map(|ix| decoded.message.account_keys[ix.program_id_index as usize])
        .collect();
    assert_eq!(
        programs,
        vec![
            COMPUTE_BUDGET_PROGRAM_ID,
            COMPUTE_BUDGET_PROGRAM_ID,
            instructions::SYSTEM_PROGRAM_ID,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_preflight_rejection_exhausts_attempts() {
    let config = load_config();
    let ledger = MockLedger::new();
    let rejection = RpcError::RpcResponse {
        endpoint: "mock://ledger".to_string(),
        code: -32002,
        message: "Transaction simulation failed: insufficient funds for fee".to_string(),
        data: Some(json!({ "err": "InsufficientFundsForFee" })),
    };
    for _ in 0..3 {
        ledger.push_send(SendBehavior::Reject(rejection.clone()));
    }
    let controller = SubmissionController::new(ledger.client(), config.submission.to_submission_config());
    let payer = Keypair::new();

    let report = controller
        .build_and_send(transfer_draft(&config, &payer, 1), &[&payer])
        .await
        .unwrap();

    assert_eq!(report.outcome, SubmissionOutcome::Failed(FailureReason::Transport(rejection)));
    assert_eq!(report.submit_attempts, 3);
    assert_eq!(report.polls, 0);
    assert!(ledger.received().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_durable_transfer_with_compute_budget() {
    let config = load_config();
    let ledger = MockLedger::new();
    ledger.land_on_accept(landed(55, ConfirmationStatus::Finalized));
    let payer = Keypair::new();
    let nonce_account = Pubkey::new_unique();
    let nonce_value = Hash::new_unique();
    ledger.set_nonce(nonce_account, NonceData::new(payer.pubkey(), nonce_value, 5000));

    let client = ledger.client();
    let anchor = fetch_durable_anchor(&client, &nonce_account, &payer.pubkey())
        .await
        .unwrap();
    let mut draft = transfer_draft(&config, &payer, 7);
    draft.set_anchor(anchor);

    let controller = SubmissionController::new(client, config.submission.to_submission_config());
    let report = controller.build_and_send(draft, &[&payer]).await.unwrap();
    assert!(report.outcome.is_confirmed());
    // Anchor was supplied, so no blockhash fetch
    assert_eq!(ledger.calls(RpcRequest::GetLatestBlockhash), 0);

    let decoded = DecodedTransaction::from_wire(&ledger.received()[0]).unwrap();
    assert_eq!(decoded.message.recent_blockhash, nonce_value);
    let first = &decoded.message.instructions[0];
    assert_eq!(
        decoded.message.account_keys[first.program_id_index as usize],
        instructions::SYSTEM_PROGRAM_ID
    );
    assert_eq!(first.data, vec![4, 0, 0, 0]);
    let second = &decoded.message.instructions[1];
    assert_eq!(
        decoded.message.account_keys[second.program_id_index as usize],
        COMPUTE_BUDGET_PROGRAM_ID
    );
}

#[tokio::test(start_paused = true)]
async fn test_batch_confirms_each_transaction_once() {
    let config = load_config();
    let ledger = MockLedger::new();
    ledger.land_on_accept(landed(9, ConfirmationStatus::Confirmed));
    let controller = SubmissionController::new(ledger.client(), config.submission.to_submission_config());
    let (blockhash, last_valid) = ledger.latest_blockhash();

    let payers: Vec<Keypair> = (0..5).map(|_| Keypair::new()).collect();
    let txs: Vec<_> = payers
        .iter()
        .map(|payer| {
            let mut draft = transfer_draft(&config, payer, 100);
            draft.set_anchor(txpipe::Anchor::blockhash(blockhash, last_valid));
            let mut tx = draft.into_transaction().unwrap();
            tx.sign(&[payer]);
            tx
        })
        .collect();

    let results = controller
        .send_and_confirm_batch(&txs, config.submission.batch_concurrency)
        .await;

    assert_eq!(results.len(), txs.len());
    for (tx, result) in txs.iter().zip(&results) {
        let report = result.as_ref().unwrap();
        assert_eq!(Some(report.signature), tx.signature());
        assert!(report.outcome.is_confirmed());
    }
    assert_eq!(ledger.received().len(), txs.len());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_from_another_task() {
    let config = load_config();
    let ledger = MockLedger::new();
    let controller = SubmissionController::new(ledger.client(), config.submission.to_submission_config());
    let payer = Keypair::new();
    let (blockhash, last_valid) = ledger.latest_blockhash();

    let mut draft = transfer_draft(&config, &payer, 1);
    draft.set_anchor(txpipe::Anchor::blockhash(blockhash, last_valid));
    let mut tx = draft.into_transaction().unwrap();
    tx.sign(&[&payer]);

    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        handle.cancel();
    });

    let err = controller
        .send_and_confirm_with_cancel(&tx, signal)
        .await
        .unwrap_err();
    assert_eq!(err.category(), "cancelled");
    assert_eq!(ledger.received().len(), 1);
}
