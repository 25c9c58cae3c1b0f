//! Command payloads before and after sealing
//!
//! An [`UnsealedCommand`] is what the envelope capability seals and what it
//! hands back when opening. The graph wraps the sealed bytes together with the
//! derived [`crate::CommandId`].

use crate::identifiers::{AuthorId, CommandId};
use crate::value::{FieldValue, Fields};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed field payload of a command
///
/// `name` selects the command variant in the policy; `fields` carries its
/// arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandPayload {
    /// Command type name, e.g. `"AddUser"`
    pub name: String,
    /// Command arguments
    pub fields: Fields,
}

impl CommandPayload {
    /// Create a payload with no fields
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Fields::new(),
        }
    }

    /// Builder-style field insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name, value);
        self
    }
}

impl fmt::Display for CommandPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.fields)
    }
}

/// Command content as seen by the envelope capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsealedCommand {
    /// Authoring device
    pub author: AuthorId,
    /// Causal predecessors, sorted ascending; empty only for genesis commands
    pub parents: Vec<CommandId>,
    /// Typed payload
    pub payload: CommandPayload,
}

impl UnsealedCommand {
    /// Create a command with its parent list normalized (sorted, deduplicated)
    pub fn new(author: AuthorId, mut parents: Vec<CommandId>, payload: CommandPayload) -> Self {
        parents.sort();
        parents.dedup();
        Self {
            author,
            parents,
            payload,
        }
    }

    /// Whether this command starts a graph
    pub fn is_genesis(&self) -> bool {
        self.parents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::Hash32;

    #[test]
    fn parents_are_normalized() {
        let a = CommandId(Hash32([2u8; 32]));
        let b = CommandId(Hash32([1u8; 32]));
        let cmd = UnsealedCommand::new(
            AuthorId::new_from_entropy([0u8; 32]),
            vec![a, b, a],
            CommandPayload::new("Noop"),
        );
        assert_eq!(cmd.parents, vec![b, a]);
        assert!(!cmd.is_genesis());
    }
}
