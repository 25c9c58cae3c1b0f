//! Merge and reconciliation
//!
//! After new commands land in the graph, the engine's applied sequence is
//! compared with the graph's canonical order. The longest common prefix
//! stays; the rest of the applied sequence is rewound newest-first and the
//! canonical suffix is folded in. Fact state is therefore always the fold of
//! the canonical order, on every replica.

use crate::effect::EffectRecord;
use crate::engine::{CommandOutcome, PolicyEngine, RewoundCommand};
use crate::error::{PolicyError, Result};
use crate::policy::Policy;
use crate::status::CommandStatus;
use concord_core::CommandId;
use concord_graph::{Command, CommandGraph};

/// What one reconciliation pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Commands unwound, newest first
    pub rewound: Vec<RewoundCommand>,
    /// Commands evaluated, in canonical order
    pub outcomes: Vec<CommandOutcome>,
}

impl ReconcileReport {
    /// Whether nothing changed
    pub fn is_noop(&self) -> bool {
        self.rewound.is_empty() && self.outcomes.is_empty()
    }

    /// Previously accepted commands that had to be recalled
    pub fn recalled(&self) -> impl Iterator<Item = CommandId> + '_ {
        self.rewound
            .iter()
            .filter(|r| r.previous == CommandStatus::Accepted)
            .map(|r| r.id)
    }

    /// Outcome of a command evaluated in this pass
    pub fn outcome(&self, id: &CommandId) -> Option<&CommandOutcome> {
        self.outcomes.iter().find(|o| o.id == *id)
    }

    /// Every effect in delivery order: withdrawals first, then new outcomes
    pub fn effects(&self) -> impl Iterator<Item = &EffectRecord> {
        self.rewound
            .iter()
            .flat_map(|r| r.effects.iter())
            .chain(self.outcomes.iter().flat_map(|o| o.effects.iter()))
    }

    /// Consume the report, keeping only its effects
    pub fn into_effects(self) -> Vec<EffectRecord> {
        self.rewound
            .into_iter()
            .flat_map(|r| r.effects)
            .chain(self.outcomes.into_iter().flat_map(|o| o.effects))
            .collect()
    }
}

/// Work needed to align an engine with a graph
///
/// Computing the plan only reads the graph, so the caller can release its
/// graph lock before the plan is applied. The plan stays valid as long as
/// the engine is not touched in between; commands appended meanwhile are
/// picked up by the next pass.
#[derive(Debug, Clone)]
pub struct ReplayPlan {
    keep: usize,
    suffix: Vec<Command>,
}

impl ReplayPlan {
    /// Compare the engine's applied sequence with the canonical order
    pub fn compute<P: Policy>(engine: &PolicyEngine<P>, graph: &CommandGraph) -> Result<Self> {
        let order = graph.canonical_order()?;
        let keep = engine
            .applied_order()
            .zip(order.iter())
            .take_while(|(applied, canonical)| applied == *canonical)
            .count();
        let suffix = order[keep..]
            .iter()
            .map(|id| graph.get(id).cloned().ok_or(PolicyError::UnknownCommand(*id)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { keep, suffix })
    }

    /// Whether the engine is already aligned
    pub fn is_empty<P: Policy>(&self, engine: &PolicyEngine<P>) -> bool {
        self.suffix.is_empty() && engine.len() == self.keep
    }

    /// Rewind what diverges and fold the canonical suffix
    pub fn apply<P: Policy>(self, engine: &mut PolicyEngine<P>) -> Result<ReconcileReport> {
        let rewound = engine.rewind(self.keep)?;
        if !rewound.is_empty() {
            tracing::debug!(
                rewound = rewound.len(),
                recalled = rewound
                    .iter()
                    .filter(|r| r.previous == CommandStatus::Accepted)
                    .count(),
                kept = self.keep,
                "Reconciliation conflict, replaying suffix"
            );
        }

        let mut outcomes = Vec::with_capacity(self.suffix.len());
        for command in &self.suffix {
            outcomes.push(engine.evaluate(command)?);
        }
        Ok(ReconcileReport { rewound, outcomes })
    }
}

/// Bring `engine` in line with the canonical order of `graph`
pub fn reconcile<P: Policy>(
    engine: &mut PolicyEngine<P>,
    graph: &CommandGraph,
) -> Result<ReconcileReport> {
    ReplayPlan::compute(engine, graph)?.apply(engine)
}
