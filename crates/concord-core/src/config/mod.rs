//! Configuration layering for Concord replicas

pub mod replica;
pub mod traits;

pub use replica::ReplicaConfig;
pub use traits::{read_config_file, ConcordConfig, ENV_PREFIX};
