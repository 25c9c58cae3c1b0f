//! Process-wide tracing setup

use crate::error::Result;
use concord_core::{ConcordError, ReplicaConfig};
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG`, else `config.log_filter`
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(config: &ReplicaConfig) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_filter).map_err(|e| {
            ConcordError::invalid(format!("Invalid log_filter {:?}: {e}", config.log_filter))
        })?,
    };
    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok())
}
