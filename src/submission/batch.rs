use futures::stream::{self, StreamExt};

use super::cancel::CancelSignal;
use super::controller::SubmissionController;
use super::errors::SubmissionError;
use super::state::SubmissionReport;
use crate::tx_builder::Transaction;

impl SubmissionController {
    /// Drive independent transactions with at most `concurrency` in flight
    ///
    /// Results are returned in input order. One transaction's failure does
    /// not affect the others.
    pub async fn send_and_confirm_batch(
        &self,
        transactions: &[Transaction],
        concurrency: usize,
    ) -> Vec<Result<SubmissionReport, SubmissionError>> {
        self.send_and_confirm_batch_with_cancel(transactions, concurrency, CancelSignal::never())
            .await
    }

    /// Batch variant where one signal cancels every pending wait
    pub async fn send_and_confirm_batch_with_cancel(
        &self,
        transactions: &[Transaction],
        concurrency: usize,
        cancel: CancelSignal,
    ) -> Vec<Result<SubmissionReport, SubmissionError>> {
        stream::iter(transactions)
            .map(|tx| self.send_and_confirm_with_cancel(tx, cancel.clone()))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}
