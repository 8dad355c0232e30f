use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ErrorCode, WorkflowError};

/// Lifecycle state of one logical carrier row.
///
/// All modules sharing an `original_qsa_sequence` carry the same row
/// status and transition together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    /// Queued, serials not yet reserved.
    Pending,
    /// Serials reserved and linked, artwork on the laser.
    InProgress,
    /// Serials committed, row finished.
    Done,
}

impl RowStatus {
    /// Database/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Pending => "pending",
            RowStatus::InProgress => "in_progress",
            RowStatus::Done => "done",
        }
    }

    /// Whether the row state machine allows `self` → `next`.
    ///
    /// Forward: pending → in_progress → done. Backward: done → pending
    /// (rerun) and in_progress → pending (retry, which voids serials).
    pub fn can_transition_to(&self, next: RowStatus) -> bool {
        matches!(
            (self, next),
            (RowStatus::Pending, RowStatus::InProgress)
                | (RowStatus::InProgress, RowStatus::Done)
                | (RowStatus::Done, RowStatus::Pending)
                | (RowStatus::InProgress, RowStatus::Pending)
        )
    }
}

impl FromStr for RowStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RowStatus::Pending),
            "in_progress" => Ok(RowStatus::InProgress),
            "done" => Ok(RowStatus::Done),
            other => Err(WorkflowError::validation(
                ErrorCode::InvalidRowStatus,
                format!("unknown row status '{}'", other),
            )),
        }
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of an engraving batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// At least one row is not done.
    InProgress,
    /// Every row is done. `reopen` reverts to `InProgress`.
    Completed,
}

impl BatchStatus {
    /// Database/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Completed => "completed",
        }
    }
}

impl FromStr for BatchStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(BatchStatus::InProgress),
            "completed" => Ok(BatchStatus::Completed),
            other => Err(WorkflowError::internal(format!(
                "unknown batch status '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_transitions_match_state_machine() {
        use RowStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Done));
        assert!(Done.can_transition_to(Pending));
        assert!(InProgress.can_transition_to(Pending));

        assert!(!Pending.can_transition_to(Done));
        assert!(!Done.can_transition_to(InProgress));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn statuses_round_trip_through_strings() {
        for status in [RowStatus::Pending, RowStatus::InProgress, RowStatus::Done] {
            assert_eq!(status.as_str().parse::<RowStatus>().unwrap(), status);
        }
        for status in [BatchStatus::InProgress, BatchStatus::Completed] {
            assert_eq!(status.as_str().parse::<BatchStatus>().unwrap(), status);
        }
    }
}
