//! Submission lifecycle states and terminal outcomes

use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::signature::Signature;

use crate::rpc_manager::{ConfirmationStatus, RpcError, SignatureStatus};

/// How far a transaction must progress before it counts as confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    /// Included in a block
    Seen,
    /// Voted on by a supermajority
    #[default]
    Confirmed,
    /// Rooted, or at least `finalized_confirmations` deep
    Finalized,
}

impl Durability {
    pub fn is_met_by(&self, status: &SignatureStatus, finalized_confirmations: usize) -> bool {
        let level = status.level(finalized_confirmations);
        match self {
            Durability::Seen => true,
            Durability::Confirmed => level >= ConfirmationStatus::Confirmed,
            Durability::Finalized => level == ConfirmationStatus::Finalized,
        }
    }
}

impl std::str::FromStr for Durability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seen" | "processed" => Ok(Durability::Seen),
            "confirmed" => Ok(Durability::Confirmed),
            "finalized" => Ok(Durability::Finalized),
            other => Err(format!("unknown durability level: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionState {
    Building,
    Signed,
    Submitted,
    Confirmed,
    Failed,
    Expired,
    TimedOut,
}

impl SubmissionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionState::Confirmed
                | SubmissionState::Failed
                | SubmissionState::Expired
                | SubmissionState::TimedOut
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionState::Building => "building",
            SubmissionState::Signed => "signed",
            SubmissionState::Submitted => "submitted",
            SubmissionState::Confirmed => "confirmed",
            SubmissionState::Failed => "failed",
            SubmissionState::Expired => "expired",
            SubmissionState::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ledger included the transaction and its execution failed
///
/// `detail` is the node's error object, untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("transaction failed in slot {slot}: {detail}")]
pub struct LedgerExecutionError {
    pub slot: u64,
    pub detail: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// Every submit attempt failed before the ledger accepted the bytes
    Transport(RpcError),
    /// Included on the ledger with an execution error
    Execution(LedgerExecutionError),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Transport(e) => write!(f, "transport: {}", e),
            FailureReason::Execution(e) => write!(f, "execution: {}", e),
        }
    }
}

/// Terminal result of a submission
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Confirmed {
        slot: u64,
        signature: Signature,
        confirmations: Option<usize>,
        status: ConfirmationStatus,
    },
    Failed(FailureReason),
    /// The anchor lapsed without the transaction being included
    Expired,
    /// The wall-clock budget ran out without a definitive answer
    TimedOut,
}

impl SubmissionOutcome {
    pub fn state(&self) -> SubmissionState {
        match self {
            SubmissionOutcome::Confirmed { .. } => SubmissionState::Confirmed,
            SubmissionOutcome::Failed(_) => SubmissionState::Failed,
            SubmissionOutcome::Expired => SubmissionState::Expired,
            SubmissionOutcome::TimedOut => SubmissionState::TimedOut,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, SubmissionOutcome::Confirmed { .. })
    }

    /// Slot the transaction landed in, when known
    pub fn slot(&self) -> Option<u64> {
        match self {
            SubmissionOutcome::Confirmed { slot, .. } => Some(*slot),
            SubmissionOutcome::Failed(FailureReason::Execution(e)) => Some(e.slot),
            _ => None,
        }
    }

    /// Metrics label
    pub fn label(&self) -> &'static str {
        match self {
            SubmissionOutcome::Confirmed { .. } => "confirmed",
            SubmissionOutcome::Failed(FailureReason::Transport(_)) => "failed_transport",
            SubmissionOutcome::Failed(FailureReason::Execution(_)) => "failed_execution",
            SubmissionOutcome::Expired => "expired",
            SubmissionOutcome::TimedOut => "timed_out",
        }
    }
}

/// Everything a controller observed while driving one transaction
#[derive(Debug, Clone)]
pub struct SubmissionReport {
    pub signature: Signature,
    pub outcome: SubmissionOutcome,
    /// States entered, in order; ends with exactly one terminal state
    pub transitions: Vec<SubmissionState>,
    pub submit_attempts: u32,
    pub polls: u32,
    pub resends: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(confirmations: Option<usize>, reported: Option<ConfirmationStatus>) -> SignatureStatus {
        SignatureStatus {
            slot: 100,
            confirmations,
            err: None,
            confirmation_status: reported,
        }
    }

    #[test]
    fn test_durability_thresholds() {
        let processed = status(Some(0), Some(ConfirmationStatus::Processed));
        let voted = status(Some(3), Some(ConfirmationStatus::Confirmed));
        let deep = status(Some(40), None);
        let rooted = status(None, None);

        assert!(Durability::Seen.is_met_by(&processed, 32));
        assert!(!Durability::Confirmed.is_met_by(&processed, 32));
        assert!(Durability::Confirmed.is_met_by(&voted, 32));
        assert!(!Durability::Finalized.is_met_by(&voted, 32));
        assert!(Durability::Finalized.is_met_by(&deep, 32));
        assert!(Durability::Finalized.is_met_by(&rooted, 32));

        // A shallower finality depth promotes the same status
        assert!(Durability::Finalized.is_met_by(&voted, 3));
    }

    #[test]
    fn test_outcome_accessors() {
        let failed = SubmissionOutcome::Failed(FailureReason::Execution(LedgerExecutionError {
            slot: 77,
            detail: json!({"InstructionError": [0, {"Custom": 1}]}),
        }));
        assert_eq!(failed.state(), SubmissionState::Failed);
        assert_eq!(failed.slot(), Some(77));
        assert_eq!(failed.label(), "failed_execution");

        assert!(SubmissionState::TimedOut.is_terminal());
        assert!(!SubmissionState::Submitted.is_terminal());
        assert_eq!(SubmissionOutcome::Expired.slot(), None);
    }

    #[test]
    fn test_durability_from_str() {
        assert_eq!("finalized".parse::<Durability>(), Ok(Durability::Finalized));
        assert_eq!("processed".parse::<Durability>(), Ok(Durability::Seen));
        assert!("rooted".parse::<Durability>().is_err());
    }
}
