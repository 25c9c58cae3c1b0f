//! Policy engine state machine tests

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

mod support;

use assert_matches::assert_matches;
use concord_core::CommandPayload;
use concord_facts::FactError;
use concord_policy::{
    CommandStatus::*, EffectStatus, FinishError, Outcome, PolicyError, RejectReason,
};
use support::{keyed, set, Harness};

// ============================================================================
// Accept / Reject
// ============================================================================

#[test]
fn accepted_command_walks_happy_path() {
    let mut h = Harness::new();
    let outcome = h.publish(set("a", 7));

    assert_eq!(outcome.outcome, Outcome::Accepted);
    assert_eq!(outcome.trail, vec![Pending, Checking, Committing, Accepted]);
    assert_eq!(outcome.effects.len(), 1);
    assert_eq!(outcome.effects[0].status, EffectStatus::Accepted);
    assert_eq!(outcome.effects[0].command, outcome.id);
    assert!(outcome.effects[0].is("CounterSet"));
    assert_eq!(h.counter("a"), Some(7));
    assert_eq!(h.engine.status(&outcome.id), Some(Accepted));
}

#[test]
fn failing_check_rejects_without_mutation() {
    let mut h = Harness::new();
    let before = h.engine.facts().digest().unwrap();
    let outcome = h.publish(keyed("Incr", "missing"));

    assert_eq!(outcome.trail, vec![Pending, Checking, Rejected]);
    assert_matches!(
        outcome.reject_reason(),
        Some(RejectReason::ValidationFailed(f)) if f.reason() == "no such counter"
    );
    assert!(outcome.effects.is_empty());
    assert_eq!(h.engine.facts().digest().unwrap(), before);
    // rejected commands stay in the graph
    assert!(h.graph.contains(&outcome.id));
}

#[test]
fn unknown_payload_is_rejected() {
    let mut h = Harness::new();
    let outcome = h.publish(CommandPayload::new("Teleport"));
    assert_matches!(outcome.reject_reason(), Some(RejectReason::Undecodable(_)));

    let outcome = h.publish(CommandPayload::new("Set").with("key", "a"));
    assert_matches!(outcome.reject_reason(), Some(RejectReason::Undecodable(_)));
}

#[test]
fn commands_read_earlier_commands() {
    let mut h = Harness::new();
    h.publish(set("a", 1));
    let incr = h.publish(keyed("Incr", "a"));
    assert!(incr.is_accepted());
    h.publish(keyed("Incr", "a"));
    assert_eq!(h.counter("a"), Some(3));
}

// ============================================================================
// Atomic finish and recall
// ============================================================================

#[test]
fn faulting_finish_is_rolled_back() {
    let mut h = Harness::new();
    let before = h.engine.facts().to_canonical_bytes().unwrap();
    let outcome = h.publish(keyed("Broken", "n1"));

    assert_eq!(outcome.trail, vec![Pending, Checking, Committing, Rejected]);
    assert_matches!(
        outcome.reject_reason(),
        Some(RejectReason::FinishFault(FinishError::Fact(FactError::KeyNotFound { .. })))
    );
    // the note written before the fault never becomes visible
    assert_eq!(h.note("n1"), None);
    assert!(outcome.effects.is_empty());
    assert_eq!(h.engine.facts().to_canonical_bytes().unwrap(), before);
}

#[test]
fn signalled_failure_runs_recall() {
    let mut h = Harness::new();
    let outcome = h.publish(keyed("Probe", "x"));

    assert_eq!(
        outcome.trail,
        vec![Pending, Checking, Committing, Recalling, Recalled]
    );
    assert_matches!(&outcome.outcome, Outcome::Recalled { reason } if reason.contains("missing"));
    assert_eq!(h.note("x").as_deref(), Some("counter x missing"));

    // finish effects are dropped, recall effects are tagged recalled
    assert_eq!(outcome.effects.len(), 1);
    assert!(outcome.effects[0].is("ProbeRecalled"));
    assert_eq!(outcome.effects[0].status, EffectStatus::Recalled);
}

#[test]
fn signalled_success_skips_recall() {
    let mut h = Harness::new();
    h.publish(set("x", 1));
    let outcome = h.publish(keyed("Probe", "x"));
    assert!(outcome.is_accepted());
    assert_eq!(h.note("x"), None);
}

#[test]
fn faulting_recall_rejects() {
    let mut h = Harness::new();
    h.publish(
        CommandPayload::new("Note")
            .with("key", "x")
            .with("text", "first"),
    );
    let outcome = h.publish(keyed("Probe", "x"));

    assert_eq!(
        outcome.trail,
        vec![Pending, Checking, Committing, Recalling, Rejected]
    );
    assert_matches!(
        outcome.reject_reason(),
        Some(RejectReason::RecallFault(FinishError::Fact(FactError::ImmutableViolation { .. })))
    );
    assert_eq!(h.note("x").as_deref(), Some("first"));
}

#[test]
fn immutable_note_keeps_first_write() {
    let mut h = Harness::new();
    let note = |text: &str| CommandPayload::new("Note").with("key", "k").with("text", text);
    assert!(h.publish(note("one")).is_accepted());

    let second = h.publish(note("two"));
    assert_matches!(
        second.reject_reason(),
        Some(RejectReason::FinishFault(FinishError::Fact(FactError::ImmutableViolation { .. })))
    );
    assert_eq!(h.note("k").as_deref(), Some("one"));
}

// ============================================================================
// Idempotence and causal gating
// ============================================================================

#[test]
fn evaluating_twice_is_a_noop() {
    let mut h = Harness::new();
    let first = h.publish(set("a", 1));
    let command = h.graph.get(&first.id).unwrap().clone();
    let digest = h.engine.facts().digest().unwrap();

    let again = h.engine.evaluate(&command).unwrap();
    assert_eq!(again.outcome, Outcome::Accepted);
    assert!(again.trail.is_empty());
    assert!(again.effects.is_empty());
    assert_eq!(h.engine.len(), 1);
    assert_eq!(h.engine.facts().digest().unwrap(), digest);

    // duplicate delivery to the graph changes nothing either
    h.graph.append(command).unwrap();
    assert!(h.sync().is_noop());
}

#[test]
fn parents_are_evaluated_first() {
    let mut h = Harness::new();
    let root = h.seal(0, vec![], set("a", 1));
    let child = h.seal(1, vec![root.id()], keyed("Incr", "a"));

    let err = h.engine.evaluate(&child).unwrap_err();
    assert_matches!(err, PolicyError::ParentNotEvaluated { parent, .. } if parent == root.id());
    assert!(!err.is_fatal());
    assert!(h.engine.is_empty());
}
