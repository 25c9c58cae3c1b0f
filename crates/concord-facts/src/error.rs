//! Fact database errors

use crate::key::FactKey;
use thiserror::Error;

/// Fact mutation and schema errors
///
/// Any of these raised inside a finish or recall block aborts the whole block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactError {
    /// `create` on an occupied key of a mutable fact type
    #[error("{fact_type}{key} already exists")]
    KeyExists {
        /// Fact type
        fact_type: String,
        /// Occupied key
        key: FactKey,
    },

    /// `update` or `delete` on an absent key
    #[error("{fact_type}{key} not found")]
    KeyNotFound {
        /// Fact type
        fact_type: String,
        /// Absent key
        key: FactKey,
    },

    /// Any write to an existing fact of an immutable type
    #[error("{fact_type}{key} is immutable")]
    ImmutableViolation {
        /// Fact type
        fact_type: String,
        /// Protected key
        key: FactKey,
    },

    /// Fact type not declared in the schema
    #[error("unknown fact type `{0}`")]
    UnknownFactType(String),

    /// Key arity or value fields do not match the declaration
    #[error("{fact_type} schema violation: {reason}")]
    SchemaViolation {
        /// Fact type
        fact_type: String,
        /// What did not match
        reason: String,
    },

    /// Canonical encoding failed
    #[error("fact encoding failed: {0}")]
    Encoding(String),
}

impl FactError {
    /// Stable numeric code for the error class
    pub fn code(&self) -> u16 {
        match self {
            FactError::KeyExists { .. } => 200,
            FactError::KeyNotFound { .. } => 201,
            FactError::ImmutableViolation { .. } => 202,
            FactError::UnknownFactType(_) => 203,
            FactError::SchemaViolation { .. } => 204,
            FactError::Encoding(_) => 205,
        }
    }

    pub(crate) fn key_exists(fact_type: &str, key: &FactKey) -> Self {
        Self::KeyExists {
            fact_type: fact_type.to_string(),
            key: key.clone(),
        }
    }

    pub(crate) fn key_not_found(fact_type: &str, key: &FactKey) -> Self {
        Self::KeyNotFound {
            fact_type: fact_type.to_string(),
            key: key.clone(),
        }
    }

    pub(crate) fn immutable(fact_type: &str, key: &FactKey) -> Self {
        Self::ImmutableViolation {
            fact_type: fact_type.to_string(),
            key: key.clone(),
        }
    }

    pub(crate) fn schema(fact_type: &str, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            fact_type: fact_type.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for fact operations
pub type Result<T> = std::result::Result<T, FactError>;
