//! Property tests for fact batches
//!
//! A batch either lands completely or leaves the database byte-identical, and
//! undoing applied batches newest-first walks back through every prior state.

#![allow(clippy::unwrap_used, missing_docs)]

use concord_core::Fields;
use concord_facts::{FactBatch, FactDb, FactDef, FactError, FactKey, FactOp, FactSchema, FactView};
use proptest::prelude::*;
use std::sync::Arc;

fn schema() -> Arc<FactSchema> {
    Arc::new(
        FactSchema::new()
            .with(FactDef::mutable("Resource", ["resource"], ["value"]))
            .with(FactDef::immutable("AuditLog", ["entry"], ["value"])),
    )
}

fn op_strategy() -> impl Strategy<Value = FactOp> {
    let fact_type = prop_oneof![Just("Resource"), Just("AuditLog")];
    let key = (0u8..4).prop_map(|k| FactKey::new([format!("k{k}")]));
    let value = (0i64..3).prop_map(|v| Fields::new().with("value", v));
    (0u8..3, fact_type, key, value).prop_map(|(kind, fact_type, key, value)| {
        let fact_type = fact_type.to_string();
        match kind {
            0 => FactOp::Create {
                fact_type,
                key,
                value,
            },
            1 => FactOp::Update {
                fact_type,
                key,
                value,
            },
            _ => FactOp::Delete { fact_type, key },
        }
    })
}

fn batch_strategy() -> impl Strategy<Value = FactBatch> {
    proptest::collection::vec(op_strategy(), 0..5).prop_map(|ops| {
        let mut batch = FactBatch::new();
        for op in ops {
            batch.push(op);
        }
        batch
    })
}

// ============================================================================
// Atomicity
// ============================================================================

proptest! {
    #[test]
    fn batches_are_all_or_nothing(batches in proptest::collection::vec(batch_strategy(), 1..8)) {
        let mut db = FactDb::new(schema());
        for batch in &batches {
            let before = db.to_canonical_bytes().unwrap();
            match db.apply(batch) {
                Ok(undo) => prop_assert!(undo.len() == batch.len()),
                Err(_) => prop_assert_eq!(db.to_canonical_bytes().unwrap(), before),
            }
        }
    }

    #[test]
    fn undo_walks_back_every_state(batches in proptest::collection::vec(batch_strategy(), 1..8)) {
        let mut db = FactDb::new(schema());
        let mut history = Vec::new();
        for batch in &batches {
            let before = db.to_canonical_bytes().unwrap();
            if let Ok(undo) = db.apply(batch) {
                history.push((before, undo));
            }
        }
        while let Some((before, undo)) = history.pop() {
            db.undo(&undo);
            prop_assert_eq!(db.to_canonical_bytes().unwrap(), before);
        }
        prop_assert!(db.is_empty());
    }
}

// ============================================================================
// Immutability
// ============================================================================

proptest! {
    #[test]
    fn immutable_fact_rejects_later_writes(op in op_strategy()) {
        let mut db = FactDb::new(schema());
        let key = FactKey::new(["k0"]);
        let original = Fields::new().with("value", 9);
        let mut seed = FactBatch::new();
        seed.push(FactOp::Create {
            fact_type: "AuditLog".into(),
            key: key.clone(),
            value: original.clone(),
        });
        db.apply(&seed).unwrap();

        if op.fact_type() == "AuditLog" && op.key() == &key {
            let mut batch = FactBatch::new();
            batch.push(op);
            let is_immutable_violation =
                matches!(db.apply(&batch), Err(FactError::ImmutableViolation { .. }));
            prop_assert!(is_immutable_violation);
        }
        prop_assert_eq!(db.query("AuditLog", &key).unwrap(), Some(&original));
    }
}
