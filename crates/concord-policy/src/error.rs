//! Engine errors
//!
//! Command-level failures (rejections, recalls) are outcomes, not errors.
//! These cover misuse of the engine and graph faults during reconciliation.

use crate::status::CommandStatus;
use concord_core::CommandId;
use concord_graph::GraphError;
use thiserror::Error;

/// Policy engine errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// A command reached evaluation before one of its parents
    #[error("{id} evaluated before its parent {parent}")]
    ParentNotEvaluated {
        /// Command being evaluated
        id: CommandId,
        /// Parent without an outcome
        parent: CommandId,
    },

    /// The canonical order names a command the graph cannot return
    #[error("command {0} missing from graph")]
    UnknownCommand(CommandId),

    /// The engine tried an illegal lifecycle step
    #[error("illegal transition {from} -> {to} for {id}")]
    IllegalTransition {
        id: CommandId,
        from: CommandStatus,
        to: CommandStatus,
    },

    /// The graph could not be ordered
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl PolicyError {
    /// Whether the replica must stop using its graph
    pub fn is_fatal(&self) -> bool {
        match self {
            PolicyError::Graph(e) => e.is_fatal(),
            PolicyError::UnknownCommand(_) => true,
            _ => false,
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, PolicyError>;
