//! Write transactions
//!
//! A [`Transaction`] is the only way to express fact mutations. It validates
//! every write eagerly against the database plus its own pending writes, and
//! never touches the database itself: committing means handing
//! [`Transaction::into_batch`] to [`FactDb::apply`]. Dropping a transaction
//! discards everything it recorded.

use crate::db::{validate, FactBatch, FactDb, FactOp, FactView};
use crate::error::Result;
use crate::key::FactKey;
use concord_core::Fields;
use std::collections::BTreeMap;

/// Pending writes over a read-only database snapshot
#[derive(Debug)]
pub struct Transaction<'a> {
    db: &'a FactDb,
    overlay: BTreeMap<(String, FactKey), Option<Fields>>,
    batch: FactBatch,
}

impl<'a> Transaction<'a> {
    /// Start an empty transaction
    pub fn new(db: &'a FactDb) -> Self {
        Self {
            db,
            overlay: BTreeMap::new(),
            batch: FactBatch::new(),
        }
    }

    /// Create a fact
    ///
    /// Fails with `KeyExists` on an occupied mutable key and with
    /// `ImmutableViolation` on an occupied immutable key.
    pub fn create(&mut self, fact_type: &str, key: FactKey, value: Fields) -> Result<()> {
        self.record(FactOp::Create {
            fact_type: fact_type.to_string(),
            key,
            value,
        })
    }

    /// Replace the value of an existing mutable fact
    pub fn update(&mut self, fact_type: &str, key: FactKey, value: Fields) -> Result<()> {
        self.record(FactOp::Update {
            fact_type: fact_type.to_string(),
            key,
            value,
        })
    }

    /// Remove an existing mutable fact
    pub fn delete(&mut self, fact_type: &str, key: FactKey) -> Result<()> {
        self.record(FactOp::Delete {
            fact_type: fact_type.to_string(),
            key,
        })
    }

    fn record(&mut self, op: FactOp) -> Result<()> {
        let db = self.db;
        let def = db.schema().get(op.fact_type())?;
        let current = self.query(def.name(), op.key())?;
        validate(def, &op, current)?;

        let slot = (def.name().to_string(), op.key().clone());
        let next = match &op {
            FactOp::Create { value, .. } | FactOp::Update { value, .. } => Some(value.clone()),
            FactOp::Delete { .. } => None,
        };
        tracing::trace!(fact_type = def.name(), key = %op.key(), "Recorded fact write");
        self.overlay.insert(slot, next);
        self.batch.push(op);
        Ok(())
    }

    /// Mutations recorded so far
    pub fn ops(&self) -> &[FactOp] {
        self.batch.ops()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Finish recording and release the snapshot
    pub fn into_batch(self) -> FactBatch {
        self.batch
    }
}

impl FactView for Transaction<'_> {
    fn query(&self, fact_type: &str, key: &FactKey) -> Result<Option<&Fields>> {
        // type/arity errors surface even when the overlay holds the key
        let stored = self.db.query(fact_type, key)?;
        match self.overlay.get(&(fact_type.to_string(), key.clone())) {
            Some(pending) => Ok(pending.as_ref()),
            None => Ok(stored),
        }
    }

    fn scan(&self, fact_type: &str, prefix: &FactKey) -> Result<Vec<(FactKey, Fields)>> {
        let mut merged: BTreeMap<FactKey, Fields> =
            self.db.scan(fact_type, prefix)?.into_iter().collect();
        for ((t, key), pending) in &self.overlay {
            if t != fact_type || !key.starts_with(prefix) {
                continue;
            }
            match pending {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FactError;
    use crate::schema::{FactDef, FactSchema};
    use assert_matches::assert_matches;
    use std::sync::Arc;

    fn db() -> FactDb {
        let schema = FactSchema::new()
            .with(FactDef::mutable("Team", ["team"], ["owner"]))
            .with(FactDef::mutable("TeamMember", ["team", "user"], ["role"]))
            .with(FactDef::immutable("AuditLog", ["entry"], ["actor", "action"]));
        FactDb::new(Arc::new(schema))
    }

    fn member(role: &str) -> Fields {
        Fields::new().with("role", role)
    }

    #[test]
    fn reads_see_pending_writes() {
        let db = db();
        let mut tx = Transaction::new(&db);
        let key = FactKey::new(["t1", "u1"]);

        tx.create("TeamMember", key.clone(), member("member")).unwrap();
        assert_eq!(tx.query("TeamMember", &key).unwrap(), Some(&member("member")));
        assert!(!db.exists("TeamMember", &key).unwrap());

        tx.update("TeamMember", key.clone(), member("admin")).unwrap();
        assert_eq!(tx.scan("TeamMember", &FactKey::new(["t1"])).unwrap().len(), 1);

        tx.delete("TeamMember", key.clone()).unwrap();
        assert!(!tx.exists("TeamMember", &key).unwrap());
        assert!(tx.scan("TeamMember", &FactKey::empty()).unwrap().is_empty());
        assert_eq!(tx.ops().len(), 3);
    }

    #[test]
    fn writes_are_validated_eagerly() {
        let db = db();
        let mut tx = Transaction::new(&db);

        assert_matches!(
            tx.update("Team", "t1".into(), Fields::new().with("owner", "a")),
            Err(FactError::KeyNotFound { .. })
        );
        tx.create("Team", "t1".into(), Fields::new().with("owner", "a"))
            .unwrap();
        assert_matches!(
            tx.create("Team", "t1".into(), Fields::new().with("owner", "b")),
            Err(FactError::KeyExists { .. })
        );
        assert_matches!(
            tx.create("Nope", "t1".into(), Fields::new()),
            Err(FactError::UnknownFactType(_))
        );
        // rejected writes are not recorded
        assert_eq!(tx.ops().len(), 1);
    }

    #[test]
    fn immutable_facts_are_write_once() {
        let mut db = db();
        let entry = || Fields::new().with("actor", "a").with("action", "login");

        let mut tx = Transaction::new(&db);
        tx.create("AuditLog", "e1".into(), entry()).unwrap();
        assert_matches!(
            tx.create("AuditLog", "e1".into(), entry()),
            Err(FactError::ImmutableViolation { .. })
        );
        let batch = tx.into_batch();
        db.apply(&batch).unwrap();

        let mut tx = Transaction::new(&db);
        assert_matches!(
            tx.update("AuditLog", "e1".into(), entry()),
            Err(FactError::ImmutableViolation { .. })
        );
        assert_matches!(
            tx.delete("AuditLog", "e1".into()),
            Err(FactError::ImmutableViolation { .. })
        );
        assert_eq!(db.query("AuditLog", &"e1".into()).unwrap(), Some(&entry()));
    }
}
