//! Submission controller scenarios against the scripted ledger
//!
//! Every test runs on a paused clock, so backoff, poll intervals and
//! per-call timeouts elapse instantly.

#[cfg(test)]
mod submission_scenario_tests {
    use std::time::Duration;

    use serde_json::json;
    use solana_sdk::{
        pubkey::Pubkey,
        signature::{Keypair, Signer},
    };

    use crate::rpc_manager::{ConfirmationStatus, RpcError, RpcRequest};
    use crate::submission::{
        cancel_pair, Durability, FailureReason, LedgerExecutionError, SubmissionController,
        SubmissionError, SubmissionOutcome, SubmissionState,
    };
    use crate::test_utils::{failed, landed, MockLedger, SendBehavior, StatusBehavior};
    use crate::tests::test_helpers::{fast_config, increment_ix, signed_increment};
    use crate::tx_builder::{Anchor, DecodedTransaction, TransactionDraft};

    fn setup() -> (MockLedger, SubmissionController, Keypair, Anchor) {
        let ledger = MockLedger::new();
        let controller = SubmissionController::new(ledger.client(), fast_config());
        let (blockhash, last_valid) = ledger.latest_blockhash();
        (ledger, controller, Keypair::new(), Anchor::blockhash(blockhash, last_valid))
    }

    fn terminal_count(transitions: &[SubmissionState]) -> usize {
        transitions.iter().filter(|s| s.is_terminal()).count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_in_slot_100_with_nine_byte_payload() {
        let (ledger, controller, payer, anchor) = setup();
        ledger.land_on_accept(landed(100, ConfirmationStatus::Confirmed));

        let tx = signed_increment(&payer, anchor, 42);
        let report = controller.send_and_confirm(&tx).await.unwrap();

        match report.outcome {
            SubmissionOutcome::Confirmed { slot, signature, .. } => {
                assert_eq!(slot, 100);
                assert_eq!(Some(signature), tx.signature());
            }
            other => panic!("expected Confirmed, got {:?}", other),
        }
        assert_eq!(
            report.transitions,
            vec![
                SubmissionState::Signed,
                SubmissionState::Submitted,
                SubmissionState::Confirmed
            ]
        );
        assert_eq!(report.submit_attempts, 1);

        let received = ledger.received();
        assert_eq!(received, vec![tx.serialize().unwrap()]);
        let decoded = DecodedTransaction::from_wire(&received[0]).unwrap();
        assert!(decoded.verify_signatures());
        assert_eq!(decoded.message.instructions[0].data.len(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_once_height_passes_last_valid() {
        let (ledger, controller, payer, anchor) = setup();
        // 1000, 1100, 1200: the third check passes last_valid_block_height 1150
        ledger.set_height_step(100);

        let tx = signed_increment(&payer, anchor, 1);
        let report = controller.send_and_confirm(&tx).await.unwrap();

        assert_eq!(report.outcome, SubmissionOutcome::Expired);
        assert_eq!(
            report.transitions,
            vec![
                SubmissionState::Signed,
                SubmissionState::Submitted,
                SubmissionState::Expired
            ]
        );
        assert_eq!(ledger.calls(RpcRequest::SendTransaction), 1);
        assert_eq!(ledger.calls(RpcRequest::GetBlockHeight), 3);
        // Three polls plus the final check before declaring expiry
        assert_eq!(report.polls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_anchor_rejected_at_submit_is_expired() {
        let (ledger, controller, payer, anchor) = setup();
        let (_, last_valid) = ledger.latest_blockhash();
        ledger.set_block_height(last_valid + 500);
        for _ in 0..3 {
            ledger.push_send(SendBehavior::Reject(RpcError::RpcResponse {
                endpoint: "mock://ledger".to_string(),
                code: -32002,
                message: "Transaction simulation failed: Blockhash not found".to_string(),
                data: None,
            }));
        }

        let tx = signed_increment(&payer, anchor, 1);
        let report = controller.send_and_confirm(&tx).await.unwrap();

        assert_eq!(report.outcome, SubmissionOutcome::Expired);
        assert_eq!(
            report.transitions,
            vec![SubmissionState::Signed, SubmissionState::Expired]
        );
        assert_eq!(report.submit_attempts, 1);
        assert_eq!(ledger.calls(RpcRequest::SendTransaction), 1);
        // One status check rules out an earlier attempt having landed
        assert_eq!(ledger.calls(RpcRequest::GetSignatureStatuses), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lapsed_anchor_with_landed_status_is_polled() {
        let (ledger, controller, payer, anchor) = setup();
        ledger
            .set_block_height(5000)
            .push_send(SendBehavior::Hang)
            .land_on_accept(landed(140, ConfirmationStatus::Confirmed));

        let tx = signed_increment(&payer, anchor, 1);
        let report = controller.send_and_confirm(&tx).await.unwrap();

        assert_eq!(report.outcome.slot(), Some(140));
        assert!(report.outcome.is_confirmed());
        assert_eq!(report.submit_attempts, 1);
        assert_eq!(
            report.transitions,
            vec![
                SubmissionState::Signed,
                SubmissionState::Submitted,
                SubmissionState::Confirmed
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_submit_does_not_consume_poll_budget() {
        let (ledger, _, payer, anchor) = setup();
        let mut config = fast_config();
        config.timeout = Duration::from_secs(1);
        config.rpc_call_timeout = Duration::from_secs(1);
        let controller = SubmissionController::new(ledger.client(), config);
        ledger
            .push_send(SendBehavior::Hang)
            .land_on_accept(landed(100, ConfirmationStatus::Confirmed));

        let tx = signed_increment(&payer, anchor, 1);
        let report = controller.send_and_confirm(&tx).await.unwrap();

        assert_eq!(report.outcome.slot(), Some(100));
        assert_eq!(report.submit_attempts, 2);
        assert_eq!(report.polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_only_after_a_status_query() {
        let (ledger, _, payer, anchor) = setup();
        let mut config = fast_config();
        config.timeout = Duration::ZERO;
        let controller = SubmissionController::new(ledger.client(), config);
        ledger.land_on_accept(landed(100, ConfirmationStatus::Confirmed));

        let tx = signed_increment(&payer, anchor, 1);
        let report = controller.send_and_confirm(&tx).await.unwrap();

        assert!(report.outcome.is_confirmed());
        assert_eq!(report.polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_calls_do_not_overrun_the_budget() {
        let (ledger, _, payer, anchor) = setup();
        let mut config = fast_config();
        config.timeout = Duration::from_millis(1500);
        config.rpc_call_timeout = Duration::from_secs(1);
        config.poll_interval = Duration::from_millis(200);
        let controller = SubmissionController::new(ledger.client(), config);
        ledger.set_status_fallback(StatusBehavior::Hang);

        let tx = signed_increment(&payer, anchor, 1);
        let started = tokio::time::Instant::now();
        let report = controller
            .await_confirmation(&tx.signature().unwrap(), tx.anchor())
            .await
            .unwrap();

        assert_eq!(report.outcome, SubmissionOutcome::TimedOut);
        assert_eq!(report.polls, 2);
        assert!(started.elapsed() <= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_landing_during_expiry_check_is_not_expired() {
        let (ledger, controller, payer, anchor) = setup();
        ledger.set_block_height(5000);
        ledger
            .push_status(StatusBehavior::Unseen)
            .set_status_fallback(StatusBehavior::Landed(landed(900, ConfirmationStatus::Confirmed)));

        let tx = signed_increment(&payer, anchor, 1);
        let report = controller.send_and_confirm(&tx).await.unwrap();

        assert_eq!(report.outcome.slot(), Some(900));
        assert!(report.outcome.is_confirmed());
        assert_eq!(report.polls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execution_failure_is_never_resubmitted() {
        let (ledger, controller, payer, anchor) = setup();
        let detail = json!({"InstructionError": [0, {"Custom": 6001}]});
        ledger.land_on_accept(failed(55, detail.clone()));

        let mut config = fast_config();
        config.resend_interval = Some(Duration::from_millis(100));
        let controller = SubmissionController::new(controller.client().clone(), config);

        let tx = signed_increment(&payer, anchor, 1);
        let report = controller.send_and_confirm(&tx).await.unwrap();

        assert_eq!(
            report.outcome,
            SubmissionOutcome::Failed(FailureReason::Execution(LedgerExecutionError {
                slot: 55,
                detail,
            }))
        );
        assert_eq!(ledger.calls(RpcRequest::SendTransaction), 1);
        assert_eq!(report.resends, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubmit_after_transport_timeout_confirms_once() {
        let (ledger, controller, payer, anchor) = setup();
        ledger
            .push_send(SendBehavior::Hang)
            .land_on_accept(landed(100, ConfirmationStatus::Confirmed));

        let tx = signed_increment(&payer, anchor, 1);
        let report = controller.send_and_confirm(&tx).await.unwrap();

        assert!(report.outcome.is_confirmed());
        assert_eq!(report.submit_attempts, 2);
        assert_eq!(terminal_count(&report.transitions), 1);

        let received = ledger.received();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], received[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_attempts_exhausted_is_transport_failure() {
        let (ledger, controller, payer, anchor) = setup();
        for _ in 0..5 {
            ledger.push_send(SendBehavior::Reject(RpcError::RpcResponse {
                endpoint: "mock://ledger".to_string(),
                code: -32002,
                message: "Transaction simulation failed: Blockhash not found".to_string(),
                data: None,
            }));
        }

        let tx = signed_increment(&payer, anchor, 1);
        let report = controller.send_and_confirm(&tx).await.unwrap();

        match &report.outcome {
            SubmissionOutcome::Failed(FailureReason::Transport(RpcError::RpcResponse { code, .. })) => {
                assert_eq!(*code, -32002)
            }
            other => panic!("expected transport failure, got {:?}", other),
        }
        assert_eq!(ledger.calls(RpcRequest::SendTransaction), 3);
        assert_eq!(ledger.calls(RpcRequest::GetSignatureStatuses), 0);
        assert_eq!(
            report.transitions,
            vec![SubmissionState::Signed, SubmissionState::Failed]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_then_repoll_confirms_without_resubmit() {
        let (ledger, controller, payer, anchor) = setup();

        let tx = signed_increment(&payer, anchor, 1);
        let report = controller.send_and_confirm(&tx).await.unwrap();
        assert_eq!(report.outcome, SubmissionOutcome::TimedOut);

        ledger.set_status_fallback(StatusBehavior::Landed(landed(
            120,
            ConfirmationStatus::Finalized,
        )));
        let resumed = controller
            .await_confirmation(&report.signature, tx.anchor())
            .await
            .unwrap();

        assert_eq!(resumed.outcome.slot(), Some(120));
        assert_eq!(
            resumed.transitions,
            vec![SubmissionState::Submitted, SubmissionState::Confirmed]
        );
        assert_eq!(resumed.submit_attempts, 0);
        assert_eq!(ledger.calls(RpcRequest::SendTransaction), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_count_as_no_answer() {
        let (ledger, controller, payer, anchor) = setup();
        let unavailable = RpcError::Transport {
            endpoint: "mock://ledger".to_string(),
            message: "connection reset".to_string(),
        };
        ledger
            .push_status(StatusBehavior::Error(unavailable.clone()))
            .push_status(StatusBehavior::Hang)
            .land_on_accept(landed(100, ConfirmationStatus::Confirmed));

        let tx = signed_increment(&payer, anchor, 1);
        let report = controller.send_and_confirm(&tx).await.unwrap();

        assert!(report.outcome.is_confirmed());
        assert_eq!(report.polls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalized_durability_waits_for_finality() {
        let (ledger, _, payer, anchor) = setup();
        let mut config = fast_config();
        config.durability = Durability::Finalized;
        let controller = SubmissionController::new(ledger.client(), config);

        ledger
            .push_status(StatusBehavior::Landed(landed(100, ConfirmationStatus::Processed)))
            .push_status(StatusBehavior::Landed(landed(100, ConfirmationStatus::Confirmed)))
            .set_status_fallback(StatusBehavior::Landed(landed(100, ConfirmationStatus::Finalized)));

        let tx = signed_increment(&payer, anchor, 1);
        let report = controller.send_and_confirm(&tx).await.unwrap();

        match report.outcome {
            SubmissionOutcome::Confirmed { status, .. } => {
                assert_eq!(status, ConfirmationStatus::Finalized)
            }
            other => panic!("expected Confirmed, got {:?}", other),
        }
        assert_eq!(report.polls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seen_durability_accepts_processed() {
        let (ledger, _, payer, anchor) = setup();
        let mut config = fast_config();
        config.durability = Durability::Seen;
        let controller = SubmissionController::new(ledger.client(), config);
        ledger.land_on_accept(landed(77, ConfirmationStatus::Processed));

        let tx = signed_increment(&payer, anchor, 1);
        let report = controller.send_and_confirm(&tx).await.unwrap();
        assert_eq!(report.outcome.slot(), Some(77));
        assert_eq!(report.polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_waiting() {
        let (ledger, controller, payer, anchor) = setup();
        let tx = signed_increment(&payer, anchor, 1);

        let (handle, signal) = cancel_pair();
        let canceller = async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            handle.cancel();
        };
        let (result, ()) = tokio::join!(
            controller.send_and_confirm_with_cancel(&tx, signal),
            canceller
        );

        assert_eq!(result.unwrap_err(), SubmissionError::Cancelled);
        assert_eq!(ledger.calls(RpcRequest::SendTransaction), 1);

        // The submitted bytes can still land; a later wait observes it
        ledger.set_status_fallback(StatusBehavior::Landed(landed(
            130,
            ConfirmationStatus::Confirmed,
        )));
        let report = controller
            .await_confirmation(&tx.signature().unwrap(), tx.anchor())
            .await
            .unwrap();
        assert_eq!(report.outcome.slot(), Some(130));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebroadcasts_same_bytes_while_unseen() {
        let (ledger, _, payer, anchor) = setup();
        let mut config = fast_config();
        config.resend_interval = Some(Duration::from_secs(1));
        let controller = SubmissionController::new(ledger.client(), config);

        for _ in 0..4 {
            ledger.push_status(StatusBehavior::Unseen);
        }
        ledger.set_status_fallback(StatusBehavior::Landed(landed(
            100,
            ConfirmationStatus::Confirmed,
        )));

        let tx = signed_increment(&payer, anchor, 1);
        let report = controller.send_and_confirm(&tx).await.unwrap();

        assert!(report.outcome.is_confirmed());
        assert!(report.resends >= 1);
        let received = ledger.received();
        assert_eq!(received.len() as u32, 1 + report.resends);
        assert!(received.iter().all(|wire| wire == &received[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsigned_transaction_is_rejected_before_submit() {
        let (ledger, controller, payer, anchor) = setup();
        let mut draft = TransactionDraft::new(payer.pubkey());
        draft
            .add_instruction(increment_ix(&payer.pubkey(), &Pubkey::new_unique(), 1))
            .set_anchor(anchor);
        let tx = draft.into_transaction().unwrap();

        let err = controller.send_and_confirm(&tx).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Build(_)));
        assert_eq!(err.category(), "signing");
        assert_eq!(ledger.calls(RpcRequest::SendTransaction), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_and_send_fetches_blockhash() {
        let (ledger, controller, payer, _) = setup();
        ledger.land_on_accept(landed(100, ConfirmationStatus::Confirmed));

        let mut draft = TransactionDraft::new(payer.pubkey());
        draft.add_instruction(increment_ix(&payer.pubkey(), &Pubkey::new_unique(), 5));
        let report = controller.build_and_send(draft, &[&payer]).await.unwrap();

        assert!(report.outcome.is_confirmed());
        assert_eq!(
            report.transitions,
            vec![
                SubmissionState::Building,
                SubmissionState::Signed,
                SubmissionState::Submitted,
                SubmissionState::Confirmed
            ]
        );
        assert_eq!(ledger.calls(RpcRequest::GetLatestBlockhash), 1);

        let decoded = DecodedTransaction::from_wire(&ledger.received()[0]).unwrap();
        assert_eq!(decoded.message.recent_blockhash, ledger.latest_blockhash().0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_keeps_input_order() {
        let (ledger, controller, _, anchor) = setup();
        ledger.land_on_accept(landed(100, ConfirmationStatus::Confirmed));

        let payers: Vec<Keypair> = (0..4).map(|_| Keypair::new()).collect();
        let txs: Vec<_> = payers
            .iter()
            .enumerate()
            .map(|(i, payer)| signed_increment(payer, anchor, i as u64))
            .collect();

        let results = controller.send_and_confirm_batch(&txs, 2).await;

        assert_eq!(results.len(), txs.len());
        for (tx, result) in txs.iter().zip(&results) {
            let report = result.as_ref().unwrap();
            assert_eq!(Some(report.signature), tx.signature());
            assert!(report.outcome.is_confirmed());
        }
        assert_eq!(ledger.received().len(), 4);
    }
}
