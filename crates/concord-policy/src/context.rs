//! What a command sees while it is evaluated

use crate::effect::Effect;
use crate::policy::CheckFailure;
use concord_core::{AuthorId, CommandId, Fields};
use concord_facts::{FactBatch, FactDb, FactError, FactKey, FactView, Transaction};
use concord_graph::Command;

/// Identity of the command being evaluated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMeta {
    /// Command id
    pub id: CommandId,
    /// Signing author
    pub author: AuthorId,
    /// Parents as sealed
    pub parents: Vec<CommandId>,
}

impl From<&Command> for CommandMeta {
    fn from(command: &Command) -> Self {
        Self {
            id: command.id(),
            author: command.author(),
            parents: command.parents().to_vec(),
        }
    }
}

/// Read-only view for check predicates
pub struct CheckContext<'a> {
    meta: &'a CommandMeta,
    facts: &'a FactDb,
}

impl<'a> CheckContext<'a> {
    pub(crate) fn new(meta: &'a CommandMeta, facts: &'a FactDb) -> Self {
        Self { meta, facts }
    }

    /// Id of the command under check
    pub fn id(&self) -> CommandId {
        self.meta.id
    }

    /// Author of the command under check
    pub fn author(&self) -> AuthorId {
        self.meta.author
    }

    /// Parents of the command under check
    pub fn parents(&self) -> &[CommandId] {
        &self.meta.parents
    }

    /// Read a fact; unknown fact types fail the check
    pub fn query(
        &self,
        fact_type: &str,
        key: &FactKey,
    ) -> Result<Option<&'a Fields>, CheckFailure> {
        Ok(self.facts.query(fact_type, key)?)
    }

    /// Whether a fact exists
    pub fn exists(&self, fact_type: &str, key: &FactKey) -> Result<bool, CheckFailure> {
        Ok(self.facts.exists(fact_type, key)?)
    }

    /// Facts of `fact_type` whose key starts with `prefix`
    pub fn scan(
        &self,
        fact_type: &str,
        prefix: &FactKey,
    ) -> Result<Vec<(FactKey, Fields)>, CheckFailure> {
        Ok(self.facts.scan(fact_type, prefix)?)
    }

    /// Fail with `reason` unless `condition` holds
    pub fn ensure(&self, condition: bool, reason: impl Into<String>) -> Result<(), CheckFailure> {
        if condition {
            Ok(())
        } else {
            Err(CheckFailure::new(reason))
        }
    }
}

/// Write access for finish and recall blocks
///
/// Writes go into a transaction and effects into a buffer; neither becomes
/// visible unless the engine commits the whole block.
pub struct FinishContext<'a> {
    meta: &'a CommandMeta,
    tx: Transaction<'a>,
    effects: Vec<Effect>,
}

impl<'a> FinishContext<'a> {
    pub(crate) fn new(meta: &'a CommandMeta, facts: &'a FactDb) -> Self {
        Self {
            meta,
            tx: Transaction::new(facts),
            effects: Vec::new(),
        }
    }

    /// Id of the command being finished
    pub fn id(&self) -> CommandId {
        self.meta.id
    }

    /// Author of the command being finished
    pub fn author(&self) -> AuthorId {
        self.meta.author
    }

    /// Read a fact, seeing writes already staged by this block
    pub fn query(&self, fact_type: &str, key: &FactKey) -> Result<Option<&Fields>, FactError> {
        self.tx.query(fact_type, key)
    }

    /// Whether a fact exists
    pub fn exists(&self, fact_type: &str, key: &FactKey) -> Result<bool, FactError> {
        self.tx.exists(fact_type, key)
    }

    /// Facts whose key starts with `prefix`
    pub fn scan(
        &self,
        fact_type: &str,
        prefix: &FactKey,
    ) -> Result<Vec<(FactKey, Fields)>, FactError> {
        self.tx.scan(fact_type, prefix)
    }

    /// Stage a create
    pub fn create(
        &mut self,
        fact_type: &str,
        key: FactKey,
        value: Fields,
    ) -> Result<(), FactError> {
        self.tx.create(fact_type, key, value)
    }

    /// Stage an update
    pub fn update(
        &mut self,
        fact_type: &str,
        key: FactKey,
        value: Fields,
    ) -> Result<(), FactError> {
        self.tx.update(fact_type, key, value)
    }

    /// Stage a delete
    pub fn delete(&mut self, fact_type: &str, key: FactKey) -> Result<(), FactError> {
        self.tx.delete(fact_type, key)
    }

    /// Queue an effect for delivery if the block commits
    pub fn emit(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub(crate) fn into_parts(self) -> (FactBatch, Vec<Effect>) {
        (self.tx.into_batch(), self.effects)
    }
}
