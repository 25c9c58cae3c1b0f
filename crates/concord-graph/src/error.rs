//! Error types for the command graph

use concord_core::{CommandId, ConcordError, EnvelopeError};
use thiserror::Error;

/// Command graph errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// One or more declared parents are not known locally
    ///
    /// Retryable: the caller fetches the missing ancestors and appends again.
    #[error("orphan command {id}: {} missing parent(s)", missing.len())]
    OrphanCommand {
        /// The command that could not be appended
        id: CommandId,
        /// Parents not present in the graph
        missing: Vec<CommandId>,
    },

    /// Sealing or opening the envelope failed; the command never entered the graph
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] EnvelopeError),

    /// The id names no command in this graph
    #[error("unknown command {0}")]
    UnknownCommand(CommandId),

    /// A graph invariant does not hold; fatal for the replica
    #[error("command graph corrupted: {0}")]
    Corrupted(String),

    /// Durable storage failed
    #[error("graph storage failed: {0}")]
    Storage(#[from] ConcordError),
}

impl GraphError {
    /// Stable numeric code for the error class
    pub fn code(&self) -> u16 {
        match self {
            GraphError::OrphanCommand { .. } => 100,
            GraphError::SerializationFailed(_) => 101,
            GraphError::Corrupted(_) => 102,
            GraphError::Storage(_) => 103,
            GraphError::UnknownCommand(_) => 104,
        }
    }

    /// Whether the condition clears on its own once more data arrives
    pub fn is_retryable(&self) -> bool {
        matches!(self, GraphError::OrphanCommand { .. })
    }

    /// Whether the replica must stop using this graph
    pub fn is_fatal(&self) -> bool {
        matches!(self, GraphError::Corrupted(_))
    }
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
