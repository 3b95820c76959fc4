use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::decoder::DEFAULT_GL1_PACKET_ID;
use crate::error::{Gl1Error, Result};

/// Settings for one GL1 trigger input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    /// Name used in log records
    pub name: String,
    /// 0 silent, >1 per-event trace, >2 field trace
    pub verbosity: u8,
    /// Identifier of the GL1 sub-packet inside data events
    pub packet_id: i32,
    /// Lookahead requested by `fill_pool` callers that have no preference
    pub min_keep: usize,
    /// Hex dump every decoded packet to the dump writer
    pub dump_packets: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "GL1".to_string(),
            verbosity: 0,
            packet_id: DEFAULT_GL1_PACKET_ID,
            min_keep: 2,
            dump_packets: false,
        }
    }
}

impl PoolConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_packet_id(mut self, packet_id: i32) -> Self {
        self.packet_id = packet_id;
        self
    }

    pub fn with_min_keep(mut self, min_keep: usize) -> Self {
        self.min_keep = min_keep;
        self
    }

    /// Load a config from JSON. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Gl1Error::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Gl1Error::InvalidConfig("name must not be empty".to_string()));
        }
        if self.packet_id <= 0 {
            return Err(Gl1Error::InvalidConfig(format!(
                "packet_id must be positive, got {}",
                self.packet_id
            )));
        }
        Ok(())
    }
}
