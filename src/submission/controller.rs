//! Submission and confirmation controller
//!
//! Drives one signed transaction from `Signed` to exactly one terminal
//! state. The same wire bytes are used for every submit attempt and every
//! rebroadcast, so the ledger deduplicates them by signature.
//!
//! Poll loop, in order of precedence:
//! 1. a status with an execution error is `Failed(Execution)`, never resubmitted
//! 2. a status meeting the requested durability is `Confirmed`
//! 3. no status and a lapsed anchor is `Expired`, after one final status check
//! 4. the wall-clock budget running out is `TimedOut`
//!
//! The budget starts once the ledger has accepted the bytes, and at least one
//! status query is made before `TimedOut` is reported. Every call made while
//! polling is clamped to the remaining budget. RPC errors while polling count
//! as "no answer yet".
//!
//! A failed submit attempt checks the anchor before backing off: a lapsed
//! anchor with no status on record is `Expired` straight away.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use solana_sdk::signature::{Signature, Signer};
use tokio::time::Instant;
use tracing::{debug, Instrument};

use super::cancel::CancelSignal;
use super::errors::SubmissionError;
use super::state::{
    Durability, FailureReason, LedgerExecutionError, SubmissionOutcome, SubmissionReport,
    SubmissionState,
};
use crate::metrics::{metrics, Timer};
use crate::nonce_manager::{fetch_nonce_data, NonceError};
use crate::observability::TraceContext;
use crate::rpc_manager::{RetryPolicy, RpcClient, RpcError, SignatureStatus};
use crate::structured_logging::SubmissionLogger;
use crate::tx_builder::{Anchor, Transaction, TransactionBuilderError, TransactionDraft};

/// Controller tuning
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionConfig {
    /// Backoff for `sendTransaction` attempts
    pub retry_policy: RetryPolicy,

    /// First delay between status polls
    pub poll_interval: Duration,

    /// Growth factor applied to the poll delay after each poll; 1.0 polls
    /// at a fixed rate
    pub poll_backoff: f64,

    pub max_poll_interval: Duration,

    /// Wall-clock budget for the confirmation wait
    pub timeout: Duration,

    /// Timeout applied to each individual RPC call
    pub rpc_call_timeout: Duration,

    pub durability: Durability,

    /// Confirmation depth treated as final when the node does not report it
    pub finalized_confirmations: usize,

    /// Rebroadcast the same bytes at this interval while unseen
    pub resend_interval: Option<Duration>,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            poll_interval: Duration::from_millis(500),
            poll_backoff: 1.0,
            max_poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
            rpc_call_timeout: Duration::from_secs(5),
            durability: Durability::Confirmed,
            finalized_confirmations: 32,
            resend_interval: None,
        }
    }
}

/// Drives transactions to a terminal outcome
///
/// Holds no per-transaction state; one controller can serve many
/// concurrent submissions.
#[derive(Clone)]
pub struct SubmissionController {
    client: Arc<RpcClient>,
    config: SubmissionConfig,
}

/// Bookkeeping for one run
struct Run {
    signature: Signature,
    transitions: Vec<SubmissionState>,
    submit_attempts: u32,
    polls: u32,
    resends: u32,
    trace: TraceContext,
    logger: SubmissionLogger,
}

impl Run {
    fn new(signature: Signature, trace: &TraceContext, initial: &[SubmissionState]) -> Self {
        Self {
            signature,
            transitions: initial.to_vec(),
            submit_attempts: 0,
            polls: 0,
            resends: 0,
            trace: trace.clone(),
            logger: SubmissionLogger::new(trace.correlation_id().clone(), signature),
        }
    }

    fn enter(&mut self, state: SubmissionState) {
        if let Some(prev) = self.transitions.last() {
            self.logger.log_transition(prev.as_str(), state.as_str());
        }
        self.transitions.push(state);
    }

    fn finish(mut self, outcome: SubmissionOutcome, started: Instant) -> SubmissionReport {
        self.enter(outcome.state());

        let m = metrics();
        m.record_outcome(outcome.label());
        if outcome.is_confirmed() {
            m.confirmation_latency.observe(started.elapsed().as_secs_f64());
        }
        self.logger.log_outcome(
            outcome.label(),
            outcome.slot(),
            started.elapsed().as_millis() as u64,
        );

        SubmissionReport {
            signature: self.signature,
            outcome,
            transitions: self.transitions,
            submit_attempts: self.submit_attempts,
            polls: self.polls,
            resends: self.resends,
        }
    }
}

/// How the submit phase ended
enum SubmitResult {
    /// The ledger accepted the bytes, or a status shows they landed anyway
    Accepted,
    /// The anchor lapsed before any attempt was accepted
    Lapsed,
    Rejected(RpcError),
}

/// Keeps the active-submission gauge balanced even when a run is dropped
struct ActiveGuard;

impl ActiveGuard {
    fn enter() -> Self {
        metrics().active_submissions.inc();
        ActiveGuard
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        metrics().active_submissions.dec();
    }
}

impl SubmissionController {
    pub fn new(client: Arc<RpcClient>, config: SubmissionConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &Arc<RpcClient> {
        &self.client
    }

    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    /// Submit a fully signed transaction and wait for its terminal outcome
    pub async fn send_and_confirm(&self, tx: &Transaction) -> Result<SubmissionReport, SubmissionError> {
        self.send_and_confirm_with_cancel(tx, CancelSignal::never()).await
    }

    pub async fn send_and_confirm_with_cancel(
        &self,
        tx: &Transaction,
        cancel: CancelSignal,
    ) -> Result<SubmissionReport, SubmissionError> {
        let (wire, signature) = prepare(tx)?;
        let trace = TraceContext::new("send_and_confirm");
        let run = Run::new(signature, &trace, &[SubmissionState::Signed]);
        let span = trace.span(&signature);

        cancellable(cancel, self.submit_and_poll(wire, *tx.anchor(), run).instrument(span)).await
    }

    /// Wait on a signature that was already submitted, without resubmitting
    ///
    /// This is the way to resume after `TimedOut` or a cancelled wait.
    pub async fn await_confirmation(
        &self,
        signature: &Signature,
        anchor: &Anchor,
    ) -> Result<SubmissionReport, SubmissionError> {
        self.await_confirmation_with_cancel(signature, anchor, CancelSignal::never())
            .await
    }

    pub async fn await_confirmation_with_cancel(
        &self,
        signature: &Signature,
        anchor: &Anchor,
        cancel: CancelSignal,
    ) -> Result<SubmissionReport, SubmissionError> {
        let trace = TraceContext::new("await_confirmation");
        let mut run = Run::new(*signature, &trace, &[SubmissionState::Submitted]);
        let span = trace.span(signature);
        let anchor = *anchor;

        let fut = async move {
            let _active = ActiveGuard::enter();
            let started = Instant::now();
            let outcome = self.poll(None, &anchor, &mut run, started).await;
            run.finish(outcome, started)
        };
        cancellable(cancel, fut.instrument(span)).await
    }

    /// Fetch a blockhash when the draft has no anchor, compile, sign,
    /// submit and confirm
    pub async fn build_and_send(
        &self,
        mut draft: TransactionDraft,
        signers: &[&dyn Signer],
    ) -> Result<SubmissionReport, SubmissionError> {
        let timer = Timer::new();
        if draft.anchor().is_none() {
            let (blockhash, last_valid_block_height) =
                self.timed(self.config.rpc_call_timeout, self.client.get_latest_blockhash())
                    .await??;
            draft.set_anchor(Anchor::blockhash(blockhash, last_valid_block_height));
        }

        let mut tx = draft.into_transaction()?;
        tx.sign(signers);
        let (wire, signature) = prepare(&tx)?;
        timer.observe_duration(&metrics().build_latency);

        let trace = TraceContext::new("build_and_send");
        let run = Run::new(
            signature,
            &trace,
            &[SubmissionState::Building, SubmissionState::Signed],
        );
        let span = trace.span(&signature);
        Ok(self
            .submit_and_poll(wire, *tx.anchor(), run)
            .instrument(span)
            .await)
    }

    async fn submit_and_poll(
        &self,
        wire: Vec<u8>,
        anchor: Anchor,
        mut run: Run,
    ) -> SubmissionReport {
        let _active = ActiveGuard::enter();
        metrics().submissions_total.inc();
        let started = Instant::now();

        match self.submit(&wire, &anchor, &mut run).await {
            SubmitResult::Accepted => {}
            SubmitResult::Lapsed => return run.finish(SubmissionOutcome::Expired, started),
            SubmitResult::Rejected(e) => {
                return run.finish(SubmissionOutcome::Failed(FailureReason::Transport(e)), started)
            }
        }
        run.enter(SubmissionState::Submitted);

        let outcome = self.poll(Some(&wire), &anchor, &mut run, Instant::now()).await;
        run.finish(outcome, started)
    }

    /// `sendTransaction` with bounded exponential backoff
    ///
    /// Stops early when the anchor has lapsed, since no later attempt
    /// could be accepted.
    async fn submit(&self, wire: &[u8], anchor: &Anchor, run: &mut Run) -> SubmitResult {
        let policy = &self.config.retry_policy;
        let per_call = self.config.rpc_call_timeout;
        let mut attempt = 0u32;
        loop {
            run.submit_attempts += 1;
            metrics().submit_attempts.inc();
            run.logger.log_submit_attempt(attempt, wire.len());

            let error = match self.timed(per_call, self.client.send_transaction(wire)).await {
                Ok(Ok(_)) => return SubmitResult::Accepted,
                Ok(Err(e)) | Err(e) => e,
            };

            if self.anchor_lapsed(anchor, run, per_call).await {
                // An earlier attempt whose reply was lost may still have landed
                match self.fetch_status(run, per_call).await {
                    Some(None) => {
                        run.logger.warn(&format!("anchor lapsed before submit succeeded: {}", error));
                        return SubmitResult::Lapsed;
                    }
                    Some(Some(_)) => return SubmitResult::Accepted,
                    None => {}
                }
            }

            match policy.calculate_delay(attempt) {
                Some(delay) => {
                    metrics().submit_retries.inc();
                    run.logger.log_submit_retry(
                        attempt,
                        error.is_retryable(),
                        delay.as_millis() as u64,
                        &error.to_string(),
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return SubmitResult::Rejected(error),
            }
        }
    }

    async fn poll(
        &self,
        wire: Option<&[u8]>,
        anchor: &Anchor,
        run: &mut Run,
        from: Instant,
    ) -> SubmissionOutcome {
        let deadline = from + self.config.timeout;
        let mut interval = self.config.poll_interval;
        let mut next_resend = self.config.resend_interval.map(|every| from + every);
        let mut looked = false;

        loop {
            if looked && Instant::now() >= deadline {
                return SubmissionOutcome::TimedOut;
            }
            looked = true;

            match self.fetch_status(run, self.call_budget(deadline)).await {
                Some(Some(status)) => {
                    if let Some(outcome) = self.evaluate(&status, run.signature) {
                        return outcome;
                    }
                }
                Some(None) => {
                    if self.anchor_lapsed(anchor, run, self.call_budget(deadline)).await {
                        // The transaction may have landed between the two calls
                        match self.fetch_status(run, self.call_budget(deadline)).await {
                            Some(Some(status)) => {
                                if let Some(outcome) = self.evaluate(&status, run.signature) {
                                    return outcome;
                                }
                            }
                            Some(None) => return SubmissionOutcome::Expired,
                            None => {}
                        }
                    } else if let (Some(wire), Some(at)) = (wire, next_resend) {
                        if Instant::now() >= at {
                            self.resend(wire, run, self.call_budget(deadline)).await;
                            next_resend = self.config.resend_interval.map(|every| Instant::now() + every);
                        }
                    }
                }
                None => {}
            }

            let wake = (Instant::now() + interval).min(deadline);
            tokio::time::sleep_until(wake).await;
            interval = interval
                .mul_f64(self.config.poll_backoff.max(1.0))
                .min(self.config.max_poll_interval.max(self.config.poll_interval));
        }
    }

    /// `None` when the poll produced no answer
    async fn fetch_status(&self, run: &mut Run, budget: Duration) -> Option<Option<SignatureStatus>> {
        run.polls += 1;
        metrics().status_polls.inc();

        match self.timed(budget, self.client.get_signature_status(&run.signature)).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) | Err(e) => {
                metrics().poll_errors.inc();
                run.logger.log_poll_error(run.polls, &e.to_string());
                None
            }
        }
    }

    fn evaluate(&self, status: &SignatureStatus, signature: Signature) -> Option<SubmissionOutcome> {
        if let Some(err) = &status.err {
            return Some(SubmissionOutcome::Failed(FailureReason::Execution(
                LedgerExecutionError {
                    slot: status.slot,
                    detail: err.clone(),
                },
            )));
        }

        if self
            .config
            .durability
            .is_met_by(status, self.config.finalized_confirmations)
        {
            return Some(SubmissionOutcome::Confirmed {
                slot: status.slot,
                signature,
                confirmations: status.confirmations,
                status: status.level(self.config.finalized_confirmations),
            });
        }

        debug!(
            %signature,
            slot = status.slot,
            confirmations = ?status.confirmations,
            "included, waiting for durability"
        );
        None
    }

    /// Whether the anchor can no longer make this transaction valid
    ///
    /// RPC failures answer `false`; the next poll asks again.
    async fn anchor_lapsed(&self, anchor: &Anchor, run: &mut Run, budget: Duration) -> bool {
        match anchor {
            Anchor::Blockhash { .. } => {
                match self.timed(budget, self.client.get_block_height()).await {
                    Ok(Ok(height)) => anchor.is_expired_at(height),
                    Ok(Err(e)) | Err(e) => {
                        metrics().poll_errors.inc();
                        run.logger.log_poll_error(run.polls, &e.to_string());
                        false
                    }
                }
            }
            Anchor::DurableNonce {
                nonce_account,
                nonce_value,
                ..
            } => match self.timed(budget, fetch_nonce_data(&self.client, nonce_account)).await {
                Ok(Ok(data)) => data.durable_nonce != *nonce_value,
                Ok(Err(NonceError::Rpc(e))) | Err(e) => {
                    metrics().poll_errors.inc();
                    run.logger.log_poll_error(run.polls, &e.to_string());
                    false
                }
                // A closed or repurposed account can never advance for us
                Ok(Err(e)) => {
                    run.logger.warn(&e.to_string());
                    true
                }
            },
        }
    }

    async fn resend(&self, wire: &[u8], run: &mut Run, budget: Duration) {
        run.resends += 1;
        metrics().resends.inc();
        run.logger.log_resend(run.resends);
        let span = run.trace.child("rebroadcast").span(&run.signature);
        if let Ok(Err(e)) | Err(e) = self
            .timed(budget, self.client.send_transaction(wire))
            .instrument(span)
            .await
        {
            debug!(signature = %run.signature, error = %e, "rebroadcast failed");
        }
    }

    /// Per-call timeout, cut short by whatever is left before `deadline`
    fn call_budget(&self, deadline: Instant) -> Duration {
        self.config
            .rpc_call_timeout
            .min(deadline.saturating_duration_since(Instant::now()))
    }

    async fn timed<F: Future>(&self, budget: Duration, fut: F) -> Result<F::Output, RpcError> {
        tokio::time::timeout(budget, fut)
            .await
            .map_err(|_| RpcError::Timeout {
                endpoint: self.client.url(),
                timeout_ms: budget.as_millis() as u64,
            })
    }
}

/// Wire bytes and fee-payer signature of a fully signed transaction
fn prepare(tx: &Transaction) -> Result<(Vec<u8>, Signature), SubmissionError> {
    let wire = tx.serialize()?;
    let signature = tx.signature().ok_or_else(|| TransactionBuilderError::IncompleteSignatures {
        missing: tx.missing_signers(),
        required: tx.signatures().len(),
    })?;
    Ok((wire, signature))
}

async fn cancellable<F>(mut cancel: CancelSignal, fut: F) -> Result<SubmissionReport, SubmissionError>
where
    F: Future<Output = SubmissionReport>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SubmissionError::Cancelled),
        report = fut => Ok(report),
    }
}
