//! Core configuration traits

use crate::ConcordError;
use std::path::Path;

/// Environment variable prefix for Concord configuration
pub const ENV_PREFIX: &str = "CONCORD_";

/// Core trait for Concord configuration types
///
/// Layering order is defaults, then file, then environment, then explicit
/// `key=value` overrides, then `validate`.
pub trait ConcordConfig: Clone + Default + Send + Sync + 'static {
    /// Get default configuration values
    fn defaults() -> Self {
        Self::default()
    }

    /// Load configuration from a `.toml` or `.json` file
    fn load_from_file(path: &Path) -> Result<Self, ConcordError>;

    /// Merge `CONCORD_*` variables from the process environment
    fn merge_with_env(&mut self) -> Result<(), ConcordError> {
        self.merge_with_vars(std::env::vars())
    }

    /// Merge `CONCORD_*` variables from an explicit iterator
    fn merge_with_vars<I>(&mut self, vars: I) -> Result<(), ConcordError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(name) = key.strip_prefix(ENV_PREFIX) {
                self.set_from_string(&name.to_lowercase(), &value)?;
            }
        }
        Ok(())
    }

    /// Merge with another configuration; non-default values in `other` win
    fn merge_with(&mut self, other: &Self) -> Result<(), ConcordError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConcordError>;

    /// Set a configuration value from a string
    fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), ConcordError>;
}

/// Read a config file, dispatching on its extension
pub fn read_config_file<T>(path: &Path) -> Result<T, ConcordError>
where
    T: serde::de::DeserializeOwned,
{
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConcordError::internal(format!("Failed to read config file: {e}")))?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => Ok(toml::from_str(&content)?),
        Some("json") => serde_json::from_str(&content)
            .map_err(|e| ConcordError::invalid(format!("Invalid JSON: {e}"))),
        _ => Err(ConcordError::invalid(format!(
            "Unsupported config file format: {}",
            path.display()
        ))),
    }
}
