//! # Concord Testkit
//!
//! Shared test infrastructure:
//!
//! - [`SigningEnvelope`]: an ed25519 implementation of the envelope capability
//! - [`DeviceFixture`]: deterministic devices derived from one-byte seeds
//! - [`init_test_tracing`]: idempotent tracing subscriber for test output

#![allow(clippy::panic, clippy::expect_used)]

pub mod envelope;
pub mod fixtures;

pub use envelope::{author_for_key, SigningEnvelope};
pub use fixtures::{shared_envelope, DeviceFixture};

use tracing_subscriber::EnvFilter;

/// Install a test-friendly tracing subscriber once per process
///
/// Honors `RUST_LOG`, defaults to `warn`, and writes through the test
/// harness so output is captured per test.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
