//! Structured logging for submission events

use solana_sdk::signature::Signature;

use crate::observability::CorrelationId;

/// Structured logger for one submission's lifecycle
#[derive(Debug, Clone)]
pub struct SubmissionLogger {
    correlation_id: CorrelationId,
    signature: Signature,
}

impl SubmissionLogger {
    pub fn new(correlation_id: CorrelationId, signature: Signature) -> Self {
        Self {
            correlation_id,
            signature,
        }
    }

    pub fn log_transition(&self, from: &str, to: &str) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            signature = %self.signature,
            from = %from,
            to = %to,
            "Submission state transition"
        );
    }

    pub fn log_submit_attempt(&self, attempt: u32, wire_len: usize) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            signature = %self.signature,
            attempt = %attempt,
            wire_len = %wire_len,
            "Submitting transaction"
        );
    }

    pub fn log_submit_retry(&self, attempt: u32, retryable: bool, delay_ms: u64, error: &str) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            signature = %self.signature,
            attempt = %attempt,
            retryable = %retryable,
            delay_ms = %delay_ms,
            error = %error,
            "Submit failed, retrying"
        );
    }

    pub fn log_poll_error(&self, poll: u32, error: &str) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            signature = %self.signature,
            poll = %poll,
            error = %error,
            "Status poll returned no answer"
        );
    }

    pub fn log_resend(&self, count: u32) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            signature = %self.signature,
            count = %count,
            "Rebroadcasting transaction"
        );
    }

    pub fn log_outcome(&self, outcome: &str, slot: Option<u64>, elapsed_ms: u64) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            signature = %self.signature,
            outcome = %outcome,
            slot = ?slot,
            elapsed_ms = %elapsed_ms,
            "Submission finished"
        );
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            signature = %self.signature,
            message = %message,
            "Warning"
        );
    }
}
