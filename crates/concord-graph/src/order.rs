//! Canonical total order over a set of commands
//!
//! Kahn's algorithm with a `BTreeSet` ready queue: among commands whose
//! parents have all been emitted, the smallest [`CommandId`] goes first. The
//! result depends only on the set of commands, never on arrival order.

use crate::command::Command;
use concord_core::CommandId;
use std::collections::{BTreeMap, BTreeSet};

/// Linearize `members` respecting parent links inside the set
///
/// Parents outside `members` are treated as already emitted. Returns `None`
/// when the members contain a cycle, which a well-formed graph never does.
pub(crate) fn linearize<'a, F>(members: &BTreeSet<CommandId>, lookup: F) -> Option<Vec<CommandId>>
where
    F: Fn(&CommandId) -> Option<&'a Command>,
{
    let mut pending: BTreeMap<CommandId, usize> = BTreeMap::new();
    let mut children: BTreeMap<CommandId, Vec<CommandId>> = BTreeMap::new();
    let mut ready = BTreeSet::new();

    for id in members {
        let command = lookup(id)?;
        let mut waiting = 0;
        for parent in command.parents() {
            if members.contains(parent) {
                waiting += 1;
                children.entry(*parent).or_default().push(*id);
            }
        }
        if waiting == 0 {
            ready.insert(*id);
        } else {
            pending.insert(*id, waiting);
        }
    }

    let mut order = Vec::with_capacity(members.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for child in children.get(&next).into_iter().flatten() {
            if let Some(waiting) = pending.get_mut(child) {
                *waiting -= 1;
                if *waiting == 0 {
                    pending.remove(child);
                    ready.insert(*child);
                }
            }
        }
    }

    (order.len() == members.len()).then_some(order)
}
