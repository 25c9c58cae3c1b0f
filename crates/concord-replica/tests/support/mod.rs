//! Slot policy and replica fixtures for the replica tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use concord_core::{CommandPayload, ConcordError, EnvelopeEffects, Fields, ReplicaConfig};
use concord_facts::{FactDef, FactKey, FactSchema};
use concord_graph::CommandStorage;
use concord_policy::{
    CheckContext, CheckFailure, DecodeError, Effect, FinishContext, FinishError, Policy,
    PolicyCommand,
};
use concord_replica::Replica;
use concord_testkit::DeviceFixture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const SLOT: &str = "Slot";

#[derive(Debug, Default)]
pub struct SlotPolicy;

#[derive(Debug, Clone)]
pub enum SlotCommand {
    /// Create or overwrite a slot
    Put { key: String, value: i64 },
    /// Create a slot that nobody holds yet
    Reserve { key: String },
}

impl Policy for SlotPolicy {
    type Command = SlotCommand;

    fn name(&self) -> &str {
        "slots"
    }

    fn schema(&self) -> FactSchema {
        FactSchema::new().with(FactDef::mutable(SLOT, ["key"], ["value"]))
    }

    fn decode(&self, payload: &CommandPayload) -> Result<SlotCommand, DecodeError> {
        let field = |e: ConcordError| DecodeError::field(payload, e);
        let key = payload.fields.str("key").map_err(field)?.to_string();
        match payload.name.as_str() {
            "Put" => Ok(SlotCommand::Put {
                key,
                value: payload.fields.int("value").map_err(field)?,
            }),
            "Reserve" => Ok(SlotCommand::Reserve { key }),
            _ => Err(DecodeError::unknown(payload)),
        }
    }
}

impl PolicyCommand for SlotCommand {
    fn check(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        match self {
            SlotCommand::Reserve { key } => {
                ctx.ensure(!ctx.exists(SLOT, &key.as_str().into())?, "slot taken")
            }
            SlotCommand::Put { .. } => Ok(()),
        }
    }

    fn finish(&self, ctx: &mut FinishContext<'_>) -> Result<(), FinishError> {
        match self {
            SlotCommand::Put { key, value } => {
                let k = FactKey::from(key.as_str());
                let fields = Fields::new().with("value", *value);
                if ctx.exists(SLOT, &k)? {
                    ctx.update(SLOT, k, fields)?;
                } else {
                    ctx.create(SLOT, k, fields)?;
                }
                ctx.emit(Effect::new("SlotPut").with("key", key.as_str()).with("value", *value));
            }
            SlotCommand::Reserve { key } => {
                let fields = Fields::new().with("value", 0);
                ctx.create(SLOT, key.as_str().into(), fields)?;
                ctx.emit(Effect::new("SlotReserved").with("key", key.as_str()));
            }
        }
        Ok(())
    }
}

pub fn put(key: &str, value: i64) -> CommandPayload {
    CommandPayload::new("Put").with("key", key).with("value", value)
}

pub fn reserve(key: &str) -> CommandPayload {
    CommandPayload::new("Reserve").with("key", key)
}

/// In-memory replica publishing as the device with `seed`
pub fn replica(seed: u8) -> Replica<SlotPolicy> {
    replica_with(seed, ReplicaConfig::default())
}

pub fn replica_with(seed: u8, config: ReplicaConfig) -> Replica<SlotPolicy> {
    let device = DeviceFixture::new(seed);
    let envelope: Arc<dyn EnvelopeEffects> = device.envelope();
    Replica::open(config, device.author(), envelope, Arc::new(SlotPolicy)).unwrap()
}

pub fn slot(replica: &Replica<SlotPolicy>, key: &str) -> Option<i64> {
    replica
        .query(SLOT, &key.into())
        .unwrap()
        .map(|f| f.int("value").unwrap())
}

/// In-memory storage that refuses writes once its budget is spent
#[derive(Debug, Clone, Default)]
pub struct BudgetStorage {
    records: Vec<Vec<u8>>,
    budget: Arc<AtomicUsize>,
}

impl BudgetStorage {
    pub fn new(budget: usize) -> Self {
        Self {
            records: Vec::new(),
            budget: Arc::new(AtomicUsize::new(budget)),
        }
    }

    /// Handle for topping the budget up later
    pub fn budget(&self) -> Arc<AtomicUsize> {
        self.budget.clone()
    }
}

impl CommandStorage for BudgetStorage {
    fn persist(&mut self, sealed: &[u8]) -> Result<(), ConcordError> {
        let left = self.budget.load(Ordering::SeqCst);
        if left == 0 {
            return Err(ConcordError::storage("disk full"));
        }
        self.budget.store(left - 1, Ordering::SeqCst);
        self.records.push(sealed.to_vec());
        Ok(())
    }

    fn load(&mut self) -> Result<Vec<Vec<u8>>, ConcordError> {
        Ok(self.records.clone())
    }

    fn flush(&mut self) -> Result<(), ConcordError> {
        Ok(())
    }
}

/// Replica over explicit storage, publishing as the device with `seed`
pub fn replica_over(seed: u8, storage: impl CommandStorage + 'static) -> Replica<SlotPolicy> {
    let device = DeviceFixture::new(seed);
    let envelope: Arc<dyn EnvelopeEffects> = device.envelope();
    Replica::open_with_storage(
        ReplicaConfig::default(),
        device.author(),
        envelope,
        Arc::new(SlotPolicy),
        Box::new(storage),
    )
    .unwrap()
}
