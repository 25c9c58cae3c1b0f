//! # Concord Graph
//!
//! The durable source of truth: an append-only, content-addressed DAG of
//! signed commands.
//!
//! - **Causal delivery**: a command is only accepted once all its parents are
//!   present ([`GraphError::OrphanCommand`] otherwise)
//! - **Idempotence**: re-appending a known id is a no-op
//! - **Canonical order**: parents first, ties broken by smallest id, identical
//!   on every replica holding the same command set
//! - **Storage**: sealed envelopes in append order, in memory or on disk

mod command;
mod error;
mod order;
mod storage;
mod store;

pub use command::Command;
pub use error::{GraphError, Result};
pub use storage::{CommandStorage, FileStorage, MemoryStorage};
pub use store::{AppendOutcome, CommandGraph};
