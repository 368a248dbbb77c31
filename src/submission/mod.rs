//! Submission and confirmation
//!
//! `Building -> Signed -> Submitted -> {Confirmed, Failed, Expired, TimedOut}`.
//! The controller owns retry, polling, expiry detection and cancellation;
//! the states and outcomes it reports live in [`state`].

mod batch;
pub mod cancel;
pub mod controller;
pub mod errors;
pub mod state;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use controller::{SubmissionConfig, SubmissionController};
pub use errors::SubmissionError;
pub use state::{
    Durability, FailureReason, LedgerExecutionError, SubmissionOutcome, SubmissionReport,
    SubmissionState,
};
