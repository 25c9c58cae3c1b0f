//! Replica runtime configuration.

use super::traits::{read_config_file, ConcordConfig};
use crate::ConcordError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for one replica instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplicaConfig {
    /// Worker threads used for read-only ingestion work (envelope opening)
    pub check_workers: usize,
    /// Upper bound on buffered commands waiting for a missing ancestor
    pub max_orphans: usize,
    /// Re-derive every command id when loading persisted storage
    pub verify_on_open: bool,
    /// Append-only graph log; in-memory storage when unset
    pub storage_path: Option<PathBuf>,
    /// `tracing` filter directive
    pub log_filter: String,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            check_workers: 4,
            max_orphans: 1024,
            verify_on_open: true,
            storage_path: None,
            log_filter: "info".to_string(),
        }
    }
}

impl ReplicaConfig {
    /// Builder-style storage path
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConcordError> {
    value
        .parse()
        .map_err(|_| ConcordError::invalid(format!("Invalid value for {key}: {value:?}")))
}

impl ConcordConfig for ReplicaConfig {
    fn load_from_file(path: &Path) -> Result<Self, ConcordError> {
        read_config_file(path)
    }

    fn merge_with(&mut self, other: &Self) -> Result<(), ConcordError> {
        let defaults = Self::default();
        if other.check_workers != defaults.check_workers {
            self.check_workers = other.check_workers;
        }
        if other.max_orphans != defaults.max_orphans {
            self.max_orphans = other.max_orphans;
        }
        if other.verify_on_open != defaults.verify_on_open {
            self.verify_on_open = other.verify_on_open;
        }
        if other.storage_path.is_some() {
            self.storage_path.clone_from(&other.storage_path);
        }
        if other.log_filter != defaults.log_filter {
            self.log_filter.clone_from(&other.log_filter);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConcordError> {
        if self.check_workers == 0 {
            return Err(ConcordError::invalid("check_workers cannot be 0"));
        }
        if self.max_orphans == 0 {
            return Err(ConcordError::invalid("max_orphans cannot be 0"));
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConcordError::invalid("log_filter cannot be empty"));
        }
        Ok(())
    }

    fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), ConcordError> {
        match key {
            "check_workers" | "check-workers" => self.check_workers = parse(key, value)?,
            "max_orphans" | "max-orphans" => self.max_orphans = parse(key, value)?,
            "verify_on_open" | "verify-on-open" => self.verify_on_open = parse(key, value)?,
            "storage_path" | "storage-path" => {
                self.storage_path = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "log_filter" | "log-filter" => self.log_filter = value.to_string(),
            _ => {
                return Err(ConcordError::invalid(format!(
                    "Unknown configuration key: {key}"
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        assert!(ReplicaConfig::defaults().validate().is_ok());
    }

    #[test]
    fn zero_workers_rejected() {
        let config = ReplicaConfig {
            check_workers: 0,
            ..ReplicaConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_toml_with_partial_fields() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max_orphans = 16\nlog_filter = \"concord=debug\"").unwrap();

        let config = ReplicaConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.max_orphans, 16);
        assert_eq!(config.log_filter, "concord=debug");
        assert_eq!(config.check_workers, 4);
    }

    #[test]
    fn loads_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"check_workers": 2, "verify_on_open": false}}"#).unwrap();

        let config = ReplicaConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.check_workers, 2);
        assert!(!config.verify_on_open);
    }

    #[test]
    fn unknown_extension_rejected() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(ReplicaConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn env_vars_override_with_prefix() {
        let mut config = ReplicaConfig::default();
        config
            .merge_with_vars(vec![
                ("CONCORD_CHECK_WORKERS".to_string(), "8".to_string()),
                ("CONCORD_STORAGE_PATH".to_string(), "/tmp/graph.log".to_string()),
                ("UNRELATED".to_string(), "x".to_string()),
            ])
            .unwrap();
        assert_eq!(config.check_workers, 8);
        assert_eq!(config.storage_path, Some(PathBuf::from("/tmp/graph.log")));
    }

    #[test]
    fn bad_env_value_is_reported() {
        let mut config = ReplicaConfig::default();
        let err = config
            .merge_with_vars(vec![("CONCORD_MAX_ORPHANS".to_string(), "lots".to_string())])
            .unwrap_err();
        assert!(err.to_string().contains("max_orphans"));
    }

    #[test]
    fn merge_prefers_non_defaults() {
        let mut base = ReplicaConfig::default().with_storage_path("/var/concord");
        let overlay = ReplicaConfig {
            max_orphans: 10,
            ..ReplicaConfig::default()
        };
        base.merge_with(&overlay).unwrap();
        assert_eq!(base.max_orphans, 10);
        assert_eq!(base.storage_path, Some(PathBuf::from("/var/concord")));
    }
}
