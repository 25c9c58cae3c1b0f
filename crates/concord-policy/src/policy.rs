//! Policy capability traits
//!
//! A policy is a closed set of command variants. Each variant carries its own
//! check, finish and recall logic; the policy's command enum dispatches to
//! them with a plain `match`, so adding a command type means adding a variant.

use crate::context::{CheckContext, FinishContext};
use concord_core::{CommandPayload, ConcordError};
use concord_facts::{FactError, FactSchema};
use std::fmt;
use thiserror::Error;

/// A declarative policy
pub trait Policy: Send + Sync + 'static {
    /// Closed set of command variants
    type Command: PolicyCommand;

    /// Human-readable policy name, used in logs
    fn name(&self) -> &str;

    /// Every fact type the policy reads or writes
    fn schema(&self) -> FactSchema;

    /// Decode a payload into a command variant
    ///
    /// Payloads that do not decode are rejected without running any block.
    fn decode(&self, payload: &CommandPayload) -> Result<Self::Command, DecodeError>;
}

/// Check, finish and recall for one command variant
pub trait PolicyCommand {
    /// Read-only validation against current facts
    ///
    /// Fail fast: the first failing condition rejects the command.
    fn check(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure>;

    /// One atomic batch of fact writes and effect emissions
    ///
    /// Returning [`FinishError::Recall`] signals the command's own failure
    /// condition: the batch is dropped and [`PolicyCommand::recall`] runs.
    fn finish(&self, ctx: &mut FinishContext<'_>) -> Result<(), FinishError>;

    /// Compensation block, atomic like finish
    fn recall(&self, _ctx: &mut FinishContext<'_>, _reason: &str) -> Result<(), FinishError> {
        Ok(())
    }
}

/// A payload that names no known command or lacks its fields
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot decode `{command}`: {reason}")]
pub struct DecodeError {
    /// Payload name
    pub command: String,
    /// What was wrong
    pub reason: String,
}

impl DecodeError {
    /// Failure to decode `command`
    pub fn new(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Payload name matches no command variant
    pub fn unknown(payload: &CommandPayload) -> Self {
        Self::new(&payload.name, "unknown command")
    }

    /// Attach a field error to the payload it came from
    pub fn field(payload: &CommandPayload, err: ConcordError) -> Self {
        Self::new(&payload.name, err.to_string())
    }
}

/// A check predicate did not hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    reason: String,
}

impl CheckFailure {
    /// Check failure carrying `reason`
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Named reason surfaced to the caller
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for CheckFailure {}

impl From<FactError> for CheckFailure {
    fn from(err: FactError) -> Self {
        Self::new(format!("fact lookup failed: {err}"))
    }
}

impl From<ConcordError> for CheckFailure {
    fn from(err: ConcordError) -> Self {
        Self::new(err.to_string())
    }
}

/// Why a finish or recall block stopped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FinishError {
    /// A fact write broke its contract; the block is rolled back
    #[error(transparent)]
    Fact(#[from] FactError),

    /// The command signals its own failure condition
    #[error("recall requested: {0}")]
    Recall(String),

    /// Any other runtime fault; the block is rolled back
    #[error("fault: {0}")]
    Fault(String),
}

impl FinishError {
    /// Request recall from inside a finish block
    pub fn recall(reason: impl Into<String>) -> Self {
        Self::Recall(reason.into())
    }
}

impl From<ConcordError> for FinishError {
    fn from(err: ConcordError) -> Self {
        Self::Fault(err.to_string())
    }
}
