//! Convergence properties of the replay engine
//!
//! Replicas that hold the same command set must end with byte-identical
//! facts and identical per-command statuses, however the commands arrived.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

mod support;

use concord_core::{CommandId, CommandPayload};
use concord_graph::Command;
use concord_policy::{reconcile, CommandStatus, PolicyEngine};
use proptest::prelude::*;
use std::sync::Arc;
use support::{claim, keyed, set, CounterPolicy, Harness};

#[derive(Debug, Clone)]
struct Step {
    device: usize,
    kind: u8,
    key: u8,
    value: i64,
    parents: (usize, usize),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    (0usize..3, 0u8..5, 0u8..2, 0i64..4, any::<(usize, usize)>()).prop_map(
        |(device, kind, key, value, parents)| Step {
            device,
            kind,
            key,
            value,
            parents,
        },
    )
}

fn payload(step: &Step, index: usize) -> CommandPayload {
    let key = format!("k{}", step.key);
    match step.kind {
        0 => set(&key, step.value),
        1 => keyed("Incr", &key),
        2 => claim(&key, step.value),
        3 => keyed("Probe", &format!("{key}-{index}")),
        _ => CommandPayload::new("Note")
            .with("key", key)
            .with("text", format!("n{index}")),
    }
}

/// A random DAG rooted at one genesis command
fn build(h: &Harness, steps: &[Step]) -> Vec<Command> {
    let mut commands = vec![h.seal(0, vec![], set("root", 0))];
    for (i, step) in steps.iter().enumerate() {
        let a = commands[step.parents.0 % commands.len()].id();
        let b = commands[step.parents.1 % commands.len()].id();
        commands.push(h.seal(step.device, vec![a, b], payload(step, i)));
    }
    commands
}

fn permute(mut items: Vec<Command>, seed: u64) -> Vec<Command> {
    let mut state = seed | 1;
    for i in (1..items.len()).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        items.swap(i, (state % (i as u64 + 1)) as usize);
    }
    items
}

/// Deliver one at a time, reconciling after every successful append
fn deliver_all(h: &mut Harness, commands: &[Command]) {
    let mut pending: Vec<Command> = commands.to_vec();
    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|c| match h.graph.append(c.clone()) {
            Ok(_) => {
                reconcile(&mut h.engine, &h.graph).unwrap();
                false
            }
            Err(e) => {
                assert!(e.is_retryable());
                true
            }
        });
        assert!(pending.len() < before, "delivery made no progress");
    }
}

fn statuses(h: &Harness, ids: &[CommandId]) -> Vec<Option<CommandStatus>> {
    ids.iter().map(|id| h.engine.status(id)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn arrival_order_does_not_matter(
        steps in proptest::collection::vec(step_strategy(), 1..10),
        seed_a in any::<u64>(),
        seed_b in any::<u64>(),
    ) {
        let mut a = Harness::new();
        let mut b = Harness::new();
        let commands = build(&a, &steps);
        let ids: Vec<CommandId> = commands.iter().map(Command::id).collect();

        deliver_all(&mut a, &permute(commands.clone(), seed_a));
        deliver_all(&mut b, &permute(commands.clone(), seed_b));

        prop_assert_eq!(
            a.engine.facts().to_canonical_bytes().unwrap(),
            b.engine.facts().to_canonical_bytes().unwrap()
        );
        prop_assert_eq!(statuses(&a, &ids), statuses(&b, &ids));

        // and both equal a single fold of the canonical order
        let mut fresh = PolicyEngine::new(Arc::new(CounterPolicy));
        for id in a.graph.canonical_order().unwrap() {
            fresh.evaluate(a.graph.get(&id).unwrap()).unwrap();
        }
        prop_assert_eq!(fresh.facts().digest().unwrap(), a.engine.facts().digest().unwrap());
    }

    #[test]
    fn redelivery_is_idempotent(
        steps in proptest::collection::vec(step_strategy(), 1..8),
        seed in any::<u64>(),
    ) {
        let mut h = Harness::new();
        let commands = build(&h, &steps);
        deliver_all(&mut h, &commands);
        let digest = h.engine.facts().digest().unwrap();
        let evaluated = h.engine.len();

        deliver_all(&mut h, &permute(commands, seed));
        prop_assert_eq!(h.engine.facts().digest().unwrap(), digest);
        prop_assert_eq!(h.engine.len(), evaluated);
    }
}
