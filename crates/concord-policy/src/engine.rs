//! The policy engine
//!
//! Commands are evaluated one at a time, each against the fact state left by
//! everything evaluated before it. The engine remembers, per position, the
//! outcome, the effects and the [`UndoLog`] of the committed block, which is
//! what lets reconciliation rewind a suffix exactly.

use crate::context::{CheckContext, CommandMeta, FinishContext};
use crate::effect::{Effect, EffectRecord};
use crate::error::{PolicyError, Result};
use crate::policy::{CheckFailure, DecodeError, FinishError, Policy, PolicyCommand};
use crate::status::CommandStatus;
use concord_core::CommandId;
use concord_facts::{FactBatch, FactDb, UndoLog};
use concord_graph::Command;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Why a command was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// Payload matched no command variant
    #[error("undecodable: {0}")]
    Undecodable(DecodeError),

    /// A check predicate failed
    #[error("validation failed: {0}")]
    ValidationFailed(CheckFailure),

    /// The finish block faulted and was rolled back
    #[error("finish rolled back: {0}")]
    FinishFault(FinishError),

    /// Recall was requested but the recall block faulted
    #[error("recall rolled back: {0}")]
    RecallFault(FinishError),
}

/// Terminal result of evaluating a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Check and finish both passed
    Accepted,
    /// Check failed or finish faulted
    Rejected(RejectReason),
    /// The command signalled its own failure and its recall block committed
    Recalled { reason: String },
}

impl Outcome {
    /// Flattened status
    pub fn status(&self) -> CommandStatus {
        match self {
            Outcome::Accepted => CommandStatus::Accepted,
            Outcome::Rejected(_) => CommandStatus::Rejected,
            Outcome::Recalled { .. } => CommandStatus::Recalled,
        }
    }
}

/// Everything one evaluation produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Command id
    pub id: CommandId,
    /// Verdict
    pub outcome: Outcome,
    /// States passed through, starting at `Pending`; empty for a repeat
    pub trail: Vec<CommandStatus>,
    /// Effects to deliver, in emission order
    pub effects: Vec<EffectRecord>,
}

impl CommandOutcome {
    /// Accepted or rejected
    pub fn status(&self) -> CommandStatus {
        self.outcome.status()
    }

    /// True when accepted
    pub fn is_accepted(&self) -> bool {
        self.outcome == Outcome::Accepted
    }

    /// Rejection reason, if rejected
    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match &self.outcome {
            Outcome::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

/// A command unwound by reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewoundCommand {
    /// Command id
    pub id: CommandId,
    /// Status before the rewind
    pub previous: CommandStatus,
    /// Statuses from first evaluation to now
    pub trail: Vec<CommandStatus>,
    /// Withdrawn effects, tagged `Recalled`
    pub effects: Vec<EffectRecord>,
}

struct Applied {
    id: CommandId,
    outcome: Outcome,
    effects: Vec<Effect>,
    undo: UndoLog,
}

struct Lifecycle {
    id: CommandId,
    trail: Vec<CommandStatus>,
}

impl Lifecycle {
    fn start(id: CommandId, from: CommandStatus) -> Self {
        Self {
            id,
            trail: vec![from],
        }
    }

    fn advance(&mut self, next: CommandStatus) -> Result<()> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(PolicyError::IllegalTransition {
                id: self.id,
                from: current,
                to: next,
            });
        }
        tracing::trace!(command = %self.id, from = %current, to = %next, "Command transition");
        self.trail.push(next);
        Ok(())
    }

    fn current(&self) -> CommandStatus {
        self.trail
            .last()
            .copied()
            .unwrap_or(CommandStatus::Pending)
    }
}

/// Single-writer policy engine over an owned fact database
pub struct PolicyEngine<P: Policy> {
    policy: Arc<P>,
    facts: FactDb,
    applied: Vec<Applied>,
    positions: HashMap<CommandId, usize>,
}

impl<P: Policy> PolicyEngine<P> {
    /// Engine with empty fact state
    pub fn new(policy: Arc<P>) -> Self {
        let schema = Arc::new(policy.schema());
        tracing::debug!(policy = policy.name(), fact_types = schema.len(), "Created policy engine");
        Self {
            policy,
            facts: FactDb::new(schema),
            applied: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Policy being evaluated
    pub fn policy(&self) -> &Arc<P> {
        &self.policy
    }

    /// Current fact state
    pub fn facts(&self) -> &FactDb {
        &self.facts
    }

    /// Number of evaluated commands
    pub fn len(&self) -> usize {
        self.applied.len()
    }

    /// True before any command has been evaluated
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    /// Evaluated commands in application order
    pub fn applied_order(&self) -> impl Iterator<Item = CommandId> + '_ {
        self.applied.iter().map(|a| a.id)
    }

    /// Status of a command, `None` when it has not been evaluated
    pub fn status(&self, id: &CommandId) -> Option<CommandStatus> {
        self.outcome(id).map(Outcome::status)
    }

    /// Recorded outcome of `id`
    pub fn outcome(&self, id: &CommandId) -> Option<&Outcome> {
        self.positions.get(id).map(|&i| &self.applied[i].outcome)
    }

    /// Whether `id` has an outcome
    pub fn is_evaluated(&self, id: &CommandId) -> bool {
        self.positions.contains_key(id)
    }

    /// Evaluate the next command
    ///
    /// Every parent must already have an outcome. Evaluating a command twice
    /// returns its recorded outcome without running any block again.
    pub fn evaluate(&mut self, command: &Command) -> Result<CommandOutcome> {
        let id = command.id();
        if let Some(outcome) = self.outcome(&id) {
            return Ok(CommandOutcome {
                id,
                outcome: outcome.clone(),
                trail: Vec::new(),
                effects: Vec::new(),
            });
        }
        if let Some(parent) = command.parents().iter().find(|p| !self.is_evaluated(p)) {
            return Err(PolicyError::ParentNotEvaluated { id, parent: *parent });
        }

        let meta = CommandMeta::from(command);
        let mut life = Lifecycle::start(id, CommandStatus::Pending);
        life.advance(CommandStatus::Checking)?;

        let decoded = match self.policy.decode(command.payload()) {
            Ok(decoded) => decoded,
            Err(e) => return self.reject(life, RejectReason::Undecodable(e)),
        };
        if let Err(failure) = decoded.check(&CheckContext::new(&meta, &self.facts)) {
            return self.reject(life, RejectReason::ValidationFailed(failure));
        }

        life.advance(CommandStatus::Committing)?;
        match run_block(&self.facts, &meta, |ctx| decoded.finish(ctx)) {
            Ok((batch, effects)) => match self.facts.apply(&batch) {
                Ok(undo) => {
                    life.advance(CommandStatus::Accepted)?;
                    Ok(self.record(life, Outcome::Accepted, effects, undo))
                }
                Err(e) => self.reject(life, RejectReason::FinishFault(e.into())),
            },
            Err(FinishError::Recall(reason)) => {
                life.advance(CommandStatus::Recalling)?;
                let recalled = run_block(&self.facts, &meta, |ctx| decoded.recall(ctx, &reason))
                    .and_then(|(batch, effects)| {
                        let undo = self.facts.apply(&batch)?;
                        Ok((undo, effects))
                    });
                match recalled {
                    Ok((undo, effects)) => {
                        life.advance(CommandStatus::Recalled)?;
                        Ok(self.record(life, Outcome::Recalled { reason }, effects, undo))
                    }
                    Err(e) => self.reject(life, RejectReason::RecallFault(e)),
                }
            }
            Err(e) => self.reject(life, RejectReason::FinishFault(e)),
        }
    }

    fn reject(&mut self, mut life: Lifecycle, reason: RejectReason) -> Result<CommandOutcome> {
        life.advance(CommandStatus::Rejected)?;
        tracing::debug!(command = %life.id, %reason, "Command rejected");
        Ok(self.record(life, Outcome::Rejected(reason), Vec::new(), UndoLog::default()))
    }

    fn record(
        &mut self,
        life: Lifecycle,
        outcome: Outcome,
        effects: Vec<Effect>,
        undo: UndoLog,
    ) -> CommandOutcome {
        let id = life.id;
        let records = effects
            .iter()
            .cloned()
            .map(|effect| match outcome {
                Outcome::Recalled { .. } => EffectRecord::recalled(id, effect),
                _ => EffectRecord::accepted(id, effect),
            })
            .collect();
        tracing::debug!(
            command = %id,
            status = %outcome.status(),
            facts_touched = undo.len(),
            effects = effects.len(),
            "Command evaluated"
        );
        self.positions.insert(id, self.applied.len());
        self.applied.push(Applied {
            id,
            outcome: outcome.clone(),
            effects,
            undo,
        });
        CommandOutcome {
            id,
            outcome,
            trail: life.trail,
            effects: records,
        }
    }

    /// Unwind evaluated commands, newest first, until `keep` remain
    ///
    /// Fact writes are reverted exactly. Commands that were accepted pass
    /// through `Recalling` to `Recalled` and their effects are withdrawn.
    pub(crate) fn rewind(&mut self, keep: usize) -> Result<Vec<RewoundCommand>> {
        let mut rewound = Vec::new();
        while self.applied.len() > keep {
            let Some(entry) = self.applied.pop() else {
                break;
            };
            self.positions.remove(&entry.id);
            self.facts.undo(&entry.undo);

            let previous = entry.outcome.status();
            let mut life = Lifecycle::start(entry.id, previous);
            let mut effects = Vec::new();
            if previous == CommandStatus::Accepted {
                life.advance(CommandStatus::Recalling)?;
                life.advance(CommandStatus::Recalled)?;
                effects = entry
                    .effects
                    .into_iter()
                    .map(|effect| EffectRecord::recalled(entry.id, effect))
                    .collect();
            }
            tracing::debug!(command = %entry.id, %previous, "Rewound command");
            rewound.push(RewoundCommand {
                id: entry.id,
                previous,
                trail: life.trail,
                effects,
            });
        }
        Ok(rewound)
    }

    /// Give up the fact state
    pub fn into_facts(self) -> FactDb {
        self.facts
    }
}

fn run_block<F>(
    facts: &FactDb,
    meta: &CommandMeta,
    block: F,
) -> std::result::Result<(FactBatch, Vec<Effect>), FinishError>
where
    F: FnOnce(&mut FinishContext<'_>) -> std::result::Result<(), FinishError>,
{
    let mut ctx = FinishContext::new(meta, facts);
    block(&mut ctx)?;
    Ok(ctx.into_parts())
}

impl<P: Policy> std::fmt::Debug for PolicyEngine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("policy", &self.policy.name())
            .field("applied", &self.applied.len())
            .field("facts", &self.facts.len())
            .finish()
    }
}
