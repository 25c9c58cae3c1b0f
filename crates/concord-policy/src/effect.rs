//! Effects delivered to the application
//!
//! Effects are built from [`Fields`], so they are always serializable. They
//! are never persisted and never read back by a policy.

use concord_core::{CommandId, FieldValue, Fields};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured notification emitted by a finish or recall block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    /// Effect name, e.g. `UserAdded`
    pub name: String,
    /// Effect payload
    pub fields: Fields,
}

impl Effect {
    /// Effect with no fields
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Fields::new(),
        }
    }

    /// Builder-style field setter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name, value);
        self
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.fields)
    }
}

/// Whether the originating command's effects stand or were withdrawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectStatus {
    /// Emitted by an accepted command
    Accepted,
    /// Withdrawn when reconciliation unwound its command
    Recalled,
}

/// An effect tagged with its origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectRecord {
    /// Command that emitted the effect
    pub command: CommandId,
    /// Whether the effect stands or was withdrawn
    pub status: EffectStatus,
    /// The effect itself
    pub effect: Effect,
}

impl EffectRecord {
    /// Record tagged `Accepted`
    pub fn accepted(command: CommandId, effect: Effect) -> Self {
        Self {
            command,
            status: EffectStatus::Accepted,
            effect,
        }
    }

    /// Record tagged `Recalled`
    pub fn recalled(command: CommandId, effect: Effect) -> Self {
        Self {
            command,
            status: EffectStatus::Recalled,
            effect,
        }
    }

    /// Whether this record carries the named effect
    pub fn is(&self, name: &str) -> bool {
        self.effect.name == name
    }
}
