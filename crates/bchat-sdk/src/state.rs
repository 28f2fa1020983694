use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a contract posting.
///
/// `Completed`, `Expired` and `Disputed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    /// Posted, waiting for an assignee.
    Available,
    /// Accepted by an assignee; the deadline clock is running.
    Claimed,
    /// Assignee has started work. Treated like `Claimed` for submission.
    InProgress,
    /// Work delivered, awaiting approval.
    Submitted,
    Completed,
    Expired,
    Disputed,
}

impl ContractStatus {
    pub const ALL: [ContractStatus; 7] = [
        Self::Available,
        Self::Claimed,
        Self::InProgress,
        Self::Submitted,
        Self::Completed,
        Self::Expired,
        Self::Disputed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Claimed => "claimed",
            Self::InProgress => "in_progress",
            Self::Submitted => "submitted",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Disputed => "disputed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Expired | Self::Disputed)
    }

    /// Someone is working on it: counted as active in the metrics.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Claimed | Self::InProgress | Self::Submitted)
    }

    /// Whether the reward still counts towards the locked value.
    pub fn locks_value(self) -> bool {
        !matches!(self, Self::Completed | Self::Expired)
    }

    pub fn can_submit(self) -> bool {
        matches!(self, Self::Claimed | Self::InProgress)
    }

    /// Legal transitions of the lifecycle state machine.
    pub fn can_transition_to(self, next: ContractStatus) -> bool {
        use ContractStatus::*;
        match (self, next) {
            (Available, Claimed) => true,
            (Claimed, InProgress) => true,
            (Claimed | InProgress, Submitted) => true,
            (Submitted, Completed) => true,
            (from, Expired | Disputed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContractStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid contract status: {s}"))
    }
}
