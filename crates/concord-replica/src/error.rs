//! Replica errors

use concord_core::{ConcordError, EnvelopeError};
use concord_facts::FactError;
use concord_graph::GraphError;
use concord_policy::PolicyError;
use thiserror::Error;

/// Errors surfaced by a replica
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicaError {
    /// Store corruption; the replica refuses to continue
    #[error("replica store corrupted: {0}")]
    Corrupted(String),

    /// Graph failure that does not compromise the store
    #[error(transparent)]
    Graph(GraphError),

    /// Policy rejected a command or failed to decode it
    #[error(transparent)]
    Policy(PolicyError),

    /// Fact store failure
    #[error(transparent)]
    Fact(#[from] FactError),

    /// Envelope could not be sealed or opened
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// Configuration or storage plumbing
    #[error(transparent)]
    Core(#[from] ConcordError),
}

impl ReplicaError {
    /// Stable numeric code for the error class
    pub fn code(&self) -> u16 {
        match self {
            ReplicaError::Corrupted(_) => 400,
            ReplicaError::Graph(e) => e.code(),
            ReplicaError::Policy(_) => 401,
            ReplicaError::Fact(e) => e.code(),
            ReplicaError::Envelope(_) => 402,
            ReplicaError::Core(_) => 403,
        }
    }

    /// Whether the replica must stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReplicaError::Corrupted(_))
    }
}

impl From<GraphError> for ReplicaError {
    fn from(err: GraphError) -> Self {
        if err.is_fatal() {
            ReplicaError::Corrupted(err.to_string())
        } else {
            ReplicaError::Graph(err)
        }
    }
}

impl From<PolicyError> for ReplicaError {
    fn from(err: PolicyError) -> Self {
        if err.is_fatal() {
            ReplicaError::Corrupted(err.to_string())
        } else {
            ReplicaError::Policy(err)
        }
    }
}

/// Result type for replica operations
pub type Result<T> = std::result::Result<T, ReplicaError>;
