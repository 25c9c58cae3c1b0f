//! Per-command lifecycle

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a command is in the policy state machine
///
/// ```text
/// Pending -> Checking -> Rejected
///                     -> Committing -> Accepted -> Recalling -> Recalled
///                                   -> Rejected
///                                   -> Recalling -> Recalled | Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandStatus {
    /// Appended, not yet evaluated
    Pending,
    /// Running read-only checks
    Checking,
    /// Running the finish block
    Committing,
    /// Finish applied; facts and effects visible
    Accepted,
    /// Check failed or a block faulted; nothing applied
    Rejected,
    /// Running the recall block or being unwound
    Recalling,
    /// Compensated
    Recalled,
}

impl CommandStatus {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(self, next: CommandStatus) -> bool {
        use CommandStatus::*;
        matches!(
            (self, next),
            (Pending, Checking)
                | (Checking, Rejected)
                | (Checking, Committing)
                | (Committing, Accepted)
                | (Committing, Rejected)
                | (Committing, Recalling)
                | (Accepted, Recalling)
                | (Recalling, Recalled)
                | (Recalling, Rejected)
        )
    }

    /// Whether evaluation has finished for now
    ///
    /// `Accepted` counts as terminal even though reconciliation may later move
    /// it to `Recalling`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CommandStatus::Accepted | CommandStatus::Rejected | CommandStatus::Recalled
        )
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Checking => "checking",
            CommandStatus::Committing => "committing",
            CommandStatus::Accepted => "accepted",
            CommandStatus::Rejected => "rejected",
            CommandStatus::Recalling => "recalling",
            CommandStatus::Recalled => "recalled",
        };
        f.write_str(name)
    }
}
