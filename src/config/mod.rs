//! Store configuration.
//!
//! Loaded with layered priority:
//! 1. Hardcoded defaults
//! 2. Optional TOML file
//! 3. Environment variables (`OBJSTORE_*`, highest priority)

#[cfg(test)]
mod config_test;

use std::path::PathBuf;

use config::Config;
use config::Environment;
use config::File;
use config::FileFormat;
use serde::Deserialize;

use crate::constants::DEFAULT_WATCH_CAPACITY;
use crate::constants::RV_MAX_NODE_ID;
use crate::InitError;

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Root directory of the file backend's object tree.
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,

    /// Node id baked into every resource version this process mints. Two
    /// processes sharing a node id can mint colliding versions.
    #[serde(default = "default_node_id")]
    pub node_id: u16,

    /// Per-subscription watch buffer; overflow closes the subscription.
    #[serde(default = "default_watch_capacity")]
    pub watch_capacity: usize,
}

fn default_data_root() -> PathBuf {
    PathBuf::from("./data")
}

fn default_node_id() -> u16 {
    1
}

fn default_watch_capacity() -> usize {
    DEFAULT_WATCH_CAPACITY
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            node_id: default_node_id(),
            watch_capacity: default_watch_capacity(),
        }
    }
}

impl StoreConfig {
    /// Loads defaults, then the optional config file, then `OBJSTORE_*`
    /// environment overrides (e.g. `OBJSTORE_NODE_ID=7`).
    pub fn load(config_path: Option<&str>) -> Result<Self, InitError> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        // Missing fields fall back to the serde defaults.
        let settings: StoreConfig = builder
            .add_source(Environment::with_prefix("OBJSTORE"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), InitError> {
        if self.node_id > RV_MAX_NODE_ID {
            return Err(InitError::NodeIdOutOfRange(self.node_id));
        }
        if self.watch_capacity == 0 {
            return Err(InitError::ZeroWatchCapacity);
        }
        if self.data_root.as_os_str().is_empty() {
            return Err(InitError::InvalidConfig("data_root must not be empty".to_string()));
        }
        Ok(())
    }
}
