//! # Concord Facts
//!
//! Derived key-value state produced by replaying the command graph.
//!
//! - [`FactSchema`] declares each fact type's key arity, value fields and
//!   [`Mutability`]
//! - [`Transaction`] records validated writes without touching the database
//! - [`FactDb::apply`] commits a batch all-or-nothing and returns the
//!   [`UndoLog`] that reverts it exactly
//! - [`FactDb::digest`] hashes the canonical encoding, so replicas holding the
//!   same facts report the same digest

mod db;
mod error;
mod key;
mod schema;
mod transaction;

pub use db::{FactBatch, FactDb, FactOp, FactView, UndoLog};
pub use error::{FactError, Result};
pub use key::FactKey;
pub use schema::{FactDef, FactSchema, Mutability};
pub use transaction::Transaction;
