//! Immutable graph commands
//!
//! A [`Command`] can only be built by sealing or opening through the envelope
//! capability, so its id always matches its sealed bytes and parent list.

use crate::error::Result;
use concord_core::{
    AuthorId, CommandId, CommandPayload, EnvelopeEffects, EnvelopeError, UnsealedCommand,
};
use std::fmt;

/// A sealed, content-addressed command
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    id: CommandId,
    content: UnsealedCommand,
    sealed: Vec<u8>,
}

impl Command {
    /// Seal a new command with the envelope capability
    pub fn seal<E: EnvelopeEffects + ?Sized>(
        envelope: &E,
        content: UnsealedCommand,
    ) -> Result<Self> {
        let content = UnsealedCommand::new(content.author, content.parents, content.payload);
        let sealed = envelope.seal(&content)?;
        Ok(Self::from_parts(content, sealed))
    }

    /// Open a received envelope
    pub fn open<E: EnvelopeEffects + ?Sized>(envelope: &E, sealed: Vec<u8>) -> Result<Self> {
        let content = envelope.open(&sealed)?;
        let normalized =
            UnsealedCommand::new(content.author, content.parents.clone(), content.payload.clone());
        if normalized != content {
            return Err(EnvelopeError::Malformed(
                "parent list is not sorted and deduplicated".to_string(),
            )
            .into());
        }
        Ok(Self::from_parts(content, sealed))
    }

    fn from_parts(content: UnsealedCommand, sealed: Vec<u8>) -> Self {
        let id = CommandId::derive(&sealed, &content.parents);
        Self {
            id,
            content,
            sealed,
        }
    }

    /// Content-derived identifier
    pub fn id(&self) -> CommandId {
        self.id
    }

    /// Causal predecessors, ascending
    pub fn parents(&self) -> &[CommandId] {
        &self.content.parents
    }

    /// Authoring device
    pub fn author(&self) -> AuthorId {
        self.content.author
    }

    /// Typed payload
    pub fn payload(&self) -> &CommandPayload {
        &self.content.payload
    }

    /// Unsealed content
    pub fn content(&self) -> &UnsealedCommand {
        &self.content
    }

    /// Sealed wire bytes
    pub fn sealed(&self) -> &[u8] {
        &self.sealed
    }

    /// Whether this command has no parents
    pub fn is_genesis(&self) -> bool {
        self.content.parents.is_empty()
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("author", &self.content.author)
            .field("parents", &self.content.parents)
            .field("payload", &self.content.payload.name)
            .finish()
    }
}
