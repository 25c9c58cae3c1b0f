//! The fact database
//!
//! Facts are only ever written through [`FactDb::apply`], which takes a batch
//! produced by a [`Transaction`](crate::Transaction) and either applies all of
//! it or none of it. Every applied batch yields an [`UndoLog`] that restores
//! the exact prior state.

use crate::error::{FactError, Result};
use crate::key::FactKey;
use crate::schema::{FactDef, FactSchema};
use concord_core::{crypto::hash, Fields, Hash32};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

const DIGEST_TAG: &[u8] = b"concord/facts/v1";

/// Read-only access to fact state
///
/// Implemented by the database itself and by transactions, which see their
/// own pending writes.
pub trait FactView {
    /// Current value of a fact
    fn query(&self, fact_type: &str, key: &FactKey) -> Result<Option<&Fields>>;

    /// Whether a fact is present
    fn exists(&self, fact_type: &str, key: &FactKey) -> Result<bool> {
        Ok(self.query(fact_type, key)?.is_some())
    }

    /// Every fact of a type whose key starts with `prefix`, in key order
    fn scan(&self, fact_type: &str, prefix: &FactKey) -> Result<Vec<(FactKey, Fields)>>;
}

/// A single validated mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactOp {
    /// Insert a fact that must not exist yet
    Create {
        fact_type: String,
        key: FactKey,
        value: Fields,
    },
    /// Replace a fact that must exist
    Update {
        fact_type: String,
        key: FactKey,
        value: Fields,
    },
    /// Remove a fact that must exist
    Delete {
        fact_type: String,
        key: FactKey,
    },
}

impl FactOp {
    /// Fact type the op targets
    pub fn fact_type(&self) -> &str {
        match self {
            FactOp::Create { fact_type, .. }
            | FactOp::Update { fact_type, .. }
            | FactOp::Delete { fact_type, .. } => fact_type,
        }
    }

    /// Key the op targets
    pub fn key(&self) -> &FactKey {
        match self {
            FactOp::Create { key, .. }
            | FactOp::Update { key, .. }
            | FactOp::Delete { key, .. } => key,
        }
    }
}

/// Ordered mutations of one finish or recall block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactBatch {
    ops: Vec<FactOp>,
}

impl FactBatch {
    /// Empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an op; nothing is checked until commit
    pub fn push(&mut self, op: FactOp) {
        self.ops.push(op);
    }

    /// Queued ops in order
    pub fn ops(&self) -> &[FactOp] {
        &self.ops
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when there are none
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct UndoEntry {
    fact_type: String,
    key: FactKey,
    prior: Option<Fields>,
}

/// Prior values overwritten by one applied batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoLog {
    entries: Vec<UndoEntry>,
}

impl UndoLog {
    /// Number of facts touched
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there is nothing to undo
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Owned fact store of one replica
#[derive(Debug, Clone)]
pub struct FactDb {
    schema: Arc<FactSchema>,
    facts: BTreeMap<String, BTreeMap<FactKey, Fields>>,
}

impl FactDb {
    /// Empty database for `schema`
    pub fn new(schema: Arc<FactSchema>) -> Self {
        Self {
            schema,
            facts: BTreeMap::new(),
        }
    }

    /// Schema facts are validated against
    pub fn schema(&self) -> &Arc<FactSchema> {
        &self.schema
    }

    /// Total number of facts
    pub fn len(&self) -> usize {
        self.facts.values().map(BTreeMap::len).sum()
    }

    /// True when there are none
    pub fn is_empty(&self) -> bool {
        self.facts.values().all(BTreeMap::is_empty)
    }

    /// Every fact in (type, key) order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FactKey, &Fields)> {
        self.facts
            .iter()
            .flat_map(|(t, facts)| facts.iter().map(move |(k, v)| (t.as_str(), k, v)))
    }

    /// Apply a batch all-or-nothing
    ///
    /// Each op is validated against the state left by the ops before it. On
    /// the first failure every earlier op of the batch is reverted and the
    /// database is left exactly as it was.
    pub fn apply(&mut self, batch: &FactBatch) -> Result<UndoLog> {
        let mut undo = UndoLog::default();
        for op in batch.ops() {
            match self.apply_op(op) {
                Ok(prior) => undo.entries.push(UndoEntry {
                    fact_type: op.fact_type().to_string(),
                    key: op.key().clone(),
                    prior,
                }),
                Err(e) => {
                    tracing::debug!(error = %e, applied = undo.len(), "Rolling back fact batch");
                    self.undo(&undo);
                    return Err(e);
                }
            }
        }
        Ok(undo)
    }

    /// Restore the state from before the batch that produced `undo`
    ///
    /// Must be called newest-first when several batches are unwound.
    pub fn undo(&mut self, undo: &UndoLog) {
        for entry in undo.entries.iter().rev() {
            let facts = self.facts.entry(entry.fact_type.clone()).or_default();
            match &entry.prior {
                Some(value) => {
                    facts.insert(entry.key.clone(), value.clone());
                }
                None => {
                    facts.remove(&entry.key);
                }
            }
            if facts.is_empty() {
                self.facts.remove(&entry.fact_type);
            }
        }
    }

    fn apply_op(&mut self, op: &FactOp) -> Result<Option<Fields>> {
        let def = self.schema.get(op.fact_type())?.clone();
        let current = self.query(def.name(), op.key())?.cloned();
        validate(&def, op, current.as_ref())?;
        let facts = self.facts.entry(def.name().to_string()).or_default();
        match op {
            FactOp::Create { key, value, .. } | FactOp::Update { key, value, .. } => {
                facts.insert(key.clone(), value.clone());
            }
            FactOp::Delete { key, .. } => {
                facts.remove(key);
                if facts.is_empty() {
                    self.facts.remove(def.name());
                }
            }
        }
        Ok(current)
    }

    /// Canonical encoding of the full state
    ///
    /// Two databases holding the same facts encode to the same bytes.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(&self.facts).map_err(|e| FactError::Encoding(e.to_string()))
    }

    /// Digest of the canonical encoding
    pub fn digest(&self) -> Result<Hash32> {
        let bytes = self.to_canonical_bytes()?;
        let mut hasher = hash::tagged_hasher(DIGEST_TAG);
        hasher.update(&bytes);
        Ok(Hash32::new(hasher.finalize()))
    }
}

impl FactView for FactDb {
    fn query(&self, fact_type: &str, key: &FactKey) -> Result<Option<&Fields>> {
        self.schema.get(fact_type)?.check_key(key)?;
        Ok(self.facts.get(fact_type).and_then(|facts| facts.get(key)))
    }

    fn scan(&self, fact_type: &str, prefix: &FactKey) -> Result<Vec<(FactKey, Fields)>> {
        self.schema.get(fact_type)?.check_prefix(prefix)?;
        Ok(self
            .facts
            .get(fact_type)
            .into_iter()
            .flat_map(|facts| facts.range(prefix.clone()..))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// Validate one op against the current value of its key
pub(crate) fn validate(def: &FactDef, op: &FactOp, current: Option<&Fields>) -> Result<()> {
    let (name, key) = (def.name(), op.key());
    def.check_key(key)?;
    match op {
        FactOp::Create { value, .. } => {
            def.check_value(value)?;
            match current {
                Some(_) if def.is_immutable() => Err(FactError::immutable(name, key)),
                Some(_) => Err(FactError::key_exists(name, key)),
                None => Ok(()),
            }
        }
        FactOp::Update { value, .. } => {
            def.check_value(value)?;
            if def.is_immutable() {
                Err(FactError::immutable(name, key))
            } else if current.is_none() {
                Err(FactError::key_not_found(name, key))
            } else {
                Ok(())
            }
        }
        FactOp::Delete { .. } => {
            if def.is_immutable() {
                Err(FactError::immutable(name, key))
            } else if current.is_none() {
                Err(FactError::key_not_found(name, key))
            } else {
                Ok(())
            }
        }
    }
}
