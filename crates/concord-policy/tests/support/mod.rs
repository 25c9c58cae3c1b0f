//! Counter policy used by the engine tests
//!
//! Small enough to reason about by hand, but it exercises every path of the
//! state machine: accept, reject on check, roll back a faulting finish,
//! signal recall and fault inside recall.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use concord_core::{CommandId, CommandPayload, ConcordError, Fields};
use concord_facts::{FactDef, FactKey, FactSchema, FactView};
use concord_graph::{Command, CommandGraph};
use concord_policy::{
    reconcile, CheckContext, CheckFailure, CommandOutcome, DecodeError, Effect, FinishContext,
    FinishError, Policy, PolicyCommand, PolicyEngine, ReconcileReport,
};
use concord_testkit::{shared_envelope, DeviceFixture, SigningEnvelope};
use std::sync::Arc;

pub const COUNTER: &str = "Counter";
pub const NOTE: &str = "Note";

#[derive(Debug, Default)]
pub struct CounterPolicy;

#[derive(Debug, Clone)]
pub enum CounterCommand {
    /// Create or overwrite a counter
    Set { key: String, value: i64 },
    /// Increment an existing counter
    Incr { key: String },
    /// Create a counter only if nobody has yet
    Claim { key: String, value: i64 },
    /// Write a note, then update a counter that must not exist
    Broken { key: String },
    /// Recall itself when the counter is missing
    Probe { key: String },
    /// Write-once note
    Note { key: String, text: String },
}

fn value(v: i64) -> Fields {
    Fields::new().with("value", v)
}

impl Policy for CounterPolicy {
    type Command = CounterCommand;

    fn name(&self) -> &str {
        "counter"
    }

    fn schema(&self) -> FactSchema {
        FactSchema::new()
            .with(FactDef::mutable(COUNTER, ["key"], ["value"]))
            .with(FactDef::immutable(NOTE, ["key"], ["text"]))
    }

    fn decode(&self, payload: &CommandPayload) -> Result<CounterCommand, DecodeError> {
        let f = &payload.fields;
        let field = |e: ConcordError| DecodeError::field(payload, e);
        let key = || f.str("key").map(str::to_string).map_err(field);
        Ok(match payload.name.as_str() {
            "Set" => CounterCommand::Set {
                key: key()?,
                value: f.int("value").map_err(field)?,
            },
            "Incr" => CounterCommand::Incr { key: key()? },
            "Claim" => CounterCommand::Claim {
                key: key()?,
                value: f.int("value").map_err(field)?,
            },
            "Broken" => CounterCommand::Broken { key: key()? },
            "Probe" => CounterCommand::Probe { key: key()? },
            "Note" => CounterCommand::Note {
                key: key()?,
                text: f.str("text").map_err(field)?.to_string(),
            },
            _ => return Err(DecodeError::unknown(payload)),
        })
    }
}

impl PolicyCommand for CounterCommand {
    fn check(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        match self {
            CounterCommand::Incr { key } => {
                ctx.ensure(ctx.exists(COUNTER, &key.as_str().into())?, "no such counter")
            }
            CounterCommand::Claim { key, .. } => {
                ctx.ensure(!ctx.exists(COUNTER, &key.as_str().into())?, "already claimed")
            }
            _ => Ok(()),
        }
    }

    fn finish(&self, ctx: &mut FinishContext<'_>) -> Result<(), FinishError> {
        match self {
            CounterCommand::Set { key, value: v } => {
                let k = FactKey::from(key.as_str());
                if ctx.exists(COUNTER, &k)? {
                    ctx.update(COUNTER, k, value(*v))?;
                } else {
                    ctx.create(COUNTER, k, value(*v))?;
                }
                ctx.emit(Effect::new("CounterSet").with("key", key.as_str()).with("value", *v));
            }
            CounterCommand::Incr { key } => {
                let k = FactKey::from(key.as_str());
                let current = ctx
                    .query(COUNTER, &k)?
                    .map(|f| f.int("value"))
                    .transpose()?
                    .unwrap_or_default();
                ctx.update(COUNTER, k, value(current + 1))?;
                ctx.emit(Effect::new("CounterIncremented").with("key", key.as_str()));
            }
            CounterCommand::Claim { key, value: v } => {
                ctx.create(COUNTER, key.as_str().into(), value(*v))?;
                ctx.emit(Effect::new("CounterClaimed").with("key", key.as_str()));
            }
            CounterCommand::Broken { key } => {
                ctx.create(NOTE, key.as_str().into(), Fields::new().with("text", "partial"))?;
                ctx.emit(Effect::new("NoteWritten").with("key", key.as_str()));
                ctx.update(COUNTER, "never-created".into(), value(1))?;
            }
            CounterCommand::Probe { key } => {
                if !ctx.exists(COUNTER, &key.as_str().into())? {
                    ctx.emit(Effect::new("ProbeFinished"));
                    return Err(FinishError::recall(format!("counter {key} missing")));
                }
                ctx.emit(Effect::new("ProbeFinished"));
            }
            CounterCommand::Note { key, text } => {
                ctx.create(NOTE, key.as_str().into(), Fields::new().with("text", text.as_str()))?;
            }
        }
        Ok(())
    }

    fn recall(&self, ctx: &mut FinishContext<'_>, reason: &str) -> Result<(), FinishError> {
        if let CounterCommand::Probe { key } = self {
            ctx.create(NOTE, key.as_str().into(), Fields::new().with("text", reason))?;
            ctx.emit(Effect::new("ProbeRecalled").with("key", key.as_str()));
        }
        Ok(())
    }
}

pub fn set(key: &str, v: i64) -> CommandPayload {
    CommandPayload::new("Set").with("key", key).with("value", v)
}

pub fn claim(key: &str, v: i64) -> CommandPayload {
    CommandPayload::new("Claim").with("key", key).with("value", v)
}

pub fn keyed(name: &str, key: &str) -> CommandPayload {
    CommandPayload::new(name).with("key", key)
}

/// One replica's graph and engine, without the replica plumbing
pub struct Harness {
    pub devices: Vec<DeviceFixture>,
    pub envelope: Arc<SigningEnvelope>,
    pub graph: CommandGraph,
    pub engine: PolicyEngine<CounterPolicy>,
}

impl Harness {
    pub fn new() -> Self {
        let devices: Vec<DeviceFixture> = (1..=3).map(DeviceFixture::new).collect();
        let refs: Vec<&DeviceFixture> = devices.iter().collect();
        let envelope = shared_envelope(&refs);
        Self {
            devices,
            envelope,
            graph: CommandGraph::new(),
            engine: PolicyEngine::new(Arc::new(CounterPolicy)),
        }
    }

    /// Seal a command by `device` on top of explicit parents
    pub fn seal(&self, device: usize, parents: Vec<CommandId>, payload: CommandPayload) -> Command {
        let unsealed = self.devices[device].command(parents, payload);
        Command::seal(self.envelope.as_ref(), unsealed).unwrap()
    }

    /// Append under the current heads and evaluate
    pub fn publish(&mut self, payload: CommandPayload) -> CommandOutcome {
        let parents = self.graph.heads(None).into_iter().collect();
        let command = self.seal(0, parents, payload);
        let id = command.id();
        self.deliver(command);
        let report = self.sync();
        report.outcome(&id).cloned().expect("published command was evaluated")
    }

    pub fn deliver(&mut self, command: Command) {
        self.graph.append(command).unwrap();
    }

    pub fn sync(&mut self) -> ReconcileReport {
        reconcile(&mut self.engine, &self.graph).unwrap()
    }

    pub fn counter(&self, key: &str) -> Option<i64> {
        self.engine
            .facts()
            .query(COUNTER, &key.into())
            .unwrap()
            .map(|f| f.int("value").unwrap())
    }

    pub fn note(&self, key: &str) -> Option<String> {
        self.engine
            .facts()
            .query(NOTE, &key.into())
            .unwrap()
            .map(|f| f.str("text").unwrap().to_string())
    }
}
