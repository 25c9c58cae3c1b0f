//! Command graph store
//!
//! An arena of commands addressed by content hash. Parent links are stored
//! identifiers resolved through the arena, never references, so the graph
//! owns every command exactly once.

use crate::command::Command;
use crate::error::{GraphError, Result};
use crate::order::linearize;
use crate::storage::{CommandStorage, MemoryStorage};
use concord_core::{AuthorId, CommandId, ConcordError, EnvelopeEffects};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Result of appending a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The command is new and was stored
    Accepted,
    /// The command was already known; nothing changed
    Duplicate,
}

/// Append-only DAG of commands
pub struct CommandGraph {
    commands: HashMap<CommandId, Command>,
    children: HashMap<CommandId, BTreeSet<CommandId>>,
    heads: BTreeSet<CommandId>,
    storage: Box<dyn CommandStorage>,
}

impl Default for CommandGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandGraph {
    /// Empty graph backed by memory
    pub fn new() -> Self {
        Self::with_storage(Box::new(MemoryStorage::new()))
    }

    /// Empty graph persisting appends into `storage`
    ///
    /// Existing records in `storage` are ignored; use [`CommandGraph::load`] to
    /// rebuild from them.
    pub fn with_storage(storage: Box<dyn CommandStorage>) -> Self {
        Self {
            commands: HashMap::new(),
            children: HashMap::new(),
            heads: BTreeSet::new(),
            storage,
        }
    }

    /// Rebuild a graph from persisted records
    ///
    /// Every record is reopened through the envelope capability. With
    /// `verify` set, the full graph invariants are checked afterwards.
    pub fn load<E: EnvelopeEffects + ?Sized>(
        mut storage: Box<dyn CommandStorage>,
        envelope: &E,
        verify: bool,
    ) -> Result<Self> {
        let records = storage.load().map_err(|e| match e {
            ConcordError::Serialization { message } => {
                GraphError::Corrupted(format!("command log is malformed: {message}"))
            }
            other => GraphError::Storage(other),
        })?;
        let mut graph = Self::with_storage(storage);
        for sealed in records {
            let command = Command::open(envelope, sealed).map_err(|e| {
                GraphError::Corrupted(format!("stored record does not open: {e}"))
            })?;
            match graph.insert(command) {
                Ok(_) => {}
                Err(GraphError::OrphanCommand { id, .. }) => {
                    return Err(GraphError::Corrupted(format!(
                        "stored command {id} precedes one of its parents"
                    )))
                }
                Err(e) => return Err(e),
            }
        }
        if verify {
            graph.verify(envelope)?;
        }
        tracing::info!(commands = graph.len(), heads = graph.heads.len(), "Loaded command graph");
        Ok(graph)
    }

    /// Append a command whose parents are all known
    ///
    /// Duplicates are idempotent no-ops. Fails with
    /// [`GraphError::OrphanCommand`] when a parent is missing.
    pub fn append(&mut self, command: Command) -> Result<AppendOutcome> {
        if self.commands.contains_key(&command.id()) {
            return Ok(AppendOutcome::Duplicate);
        }
        self.check_parents(&command)?;
        self.storage.persist(command.sealed())?;
        self.insert(command)
    }

    fn check_parents(&self, command: &Command) -> Result<()> {
        let missing: Vec<CommandId> = command
            .parents()
            .iter()
            .filter(|p| !self.commands.contains_key(p))
            .copied()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(GraphError::OrphanCommand {
                id: command.id(),
                missing,
            })
        }
    }

    fn insert(&mut self, command: Command) -> Result<AppendOutcome> {
        let id = command.id();
        if self.commands.contains_key(&id) {
            return Ok(AppendOutcome::Duplicate);
        }
        self.check_parents(&command)?;
        for parent in command.parents() {
            self.children.entry(*parent).or_default().insert(id);
            self.heads.remove(parent);
        }
        self.heads.insert(id);
        tracing::trace!(command = %id, parents = command.parents().len(), "Appended command");
        self.commands.insert(id, command);
        Ok(AppendOutcome::Accepted)
    }

    /// Look up a command
    pub fn get(&self, id: &CommandId) -> Option<&Command> {
        self.commands.get(id)
    }

    /// Whether a command is known
    pub fn contains(&self, id: &CommandId) -> bool {
        self.commands.contains_key(id)
    }

    /// Number of commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the graph is empty
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterate over all commands in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    /// Direct children of a command
    pub fn children(&self, id: &CommandId) -> impl Iterator<Item = &CommandId> {
        self.children.get(id).into_iter().flatten()
    }

    /// Current heads
    ///
    /// Without an author: commands that have no children. With an author:
    /// that author's commands that have no child by the same author.
    pub fn heads(&self, author: Option<AuthorId>) -> BTreeSet<CommandId> {
        match author {
            None => self.heads.clone(),
            Some(author) => self
                .commands
                .values()
                .filter(|c| c.author() == author)
                .filter(|c| {
                    !self.children(&c.id()).any(|child| {
                        self.commands
                            .get(child)
                            .is_some_and(|cc| cc.author() == author)
                    })
                })
                .map(Command::id)
                .collect(),
        }
    }

    /// All ancestors of `id` in canonical order, oldest first, excluding `id`
    pub fn ancestors(&self, id: &CommandId) -> Result<Vec<CommandId>> {
        let start = self
            .commands
            .get(id)
            .ok_or(GraphError::UnknownCommand(*id))?;
        let mut closure = BTreeSet::new();
        let mut stack: Vec<CommandId> = start.parents().to_vec();
        while let Some(next) = stack.pop() {
            if closure.insert(next) {
                let command = self
                    .commands
                    .get(&next)
                    .ok_or_else(|| GraphError::Corrupted(format!("dangling parent {next}")))?;
                stack.extend_from_slice(command.parents());
            }
        }
        self.linearize(&closure)
    }

    /// Deterministic total order over every known command
    pub fn canonical_order(&self) -> Result<Vec<CommandId>> {
        let all: BTreeSet<CommandId> = self.commands.keys().copied().collect();
        self.linearize(&all)
    }

    /// Commands a peer that knows `known` (and their ancestors) is missing
    ///
    /// Returned in canonical order so the peer can append them without
    /// orphans. Ids unknown to this graph are ignored.
    pub fn missing(&self, known: &[CommandId]) -> Result<Vec<&Command>> {
        let mut covered = BTreeSet::new();
        let mut stack: Vec<CommandId> = known
            .iter()
            .filter(|id| self.commands.contains_key(id))
            .copied()
            .collect();
        while let Some(next) = stack.pop() {
            if covered.insert(next) {
                if let Some(command) = self.commands.get(&next) {
                    stack.extend_from_slice(command.parents());
                }
            }
        }
        let wanted: BTreeSet<CommandId> = self
            .commands
            .keys()
            .filter(|id| !covered.contains(id))
            .copied()
            .collect();
        Ok(self
            .linearize(&wanted)?
            .into_iter()
            .filter_map(|id| self.commands.get(&id))
            .collect())
    }

    fn linearize(&self, members: &BTreeSet<CommandId>) -> Result<Vec<CommandId>> {
        linearize(members, |id| self.commands.get(id))
            .ok_or_else(|| GraphError::Corrupted("cycle detected in command graph".to_string()))
    }

    /// Check every graph invariant
    ///
    /// Each command must reopen to identical content with an identical id,
    /// every parent must exist, heads must match, and the whole graph must
    /// linearize.
    pub fn verify<E: EnvelopeEffects + ?Sized>(&self, envelope: &E) -> Result<()> {
        let mut child_counts: BTreeMap<CommandId, usize> = BTreeMap::new();
        for (id, command) in &self.commands {
            let reopened = Command::open(envelope, command.sealed().to_vec())
                .map_err(|e| GraphError::Corrupted(format!("{id} no longer opens: {e}")))?;
            if reopened.id() != *id || reopened.content() != command.content() {
                return Err(GraphError::Corrupted(format!(
                    "{id} does not match its sealed content"
                )));
            }
            for parent in command.parents() {
                if !self.commands.contains_key(parent) {
                    return Err(GraphError::Corrupted(format!(
                        "{id} references unknown parent {parent}"
                    )));
                }
                *child_counts.entry(*parent).or_default() += 1;
            }
        }
        let expected_heads: BTreeSet<CommandId> = self
            .commands
            .keys()
            .filter(|id| !child_counts.contains_key(id))
            .copied()
            .collect();
        if expected_heads != self.heads {
            return Err(GraphError::Corrupted("head set is stale".to_string()));
        }
        self.canonical_order().map(|_| ())
    }

    /// Flush durable storage
    pub fn flush(&mut self) -> Result<()> {
        self.storage.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for CommandGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandGraph")
            .field("commands", &self.commands.len())
            .field("heads", &self.heads)
            .finish()
    }
}
