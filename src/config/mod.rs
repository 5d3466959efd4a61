//! Configuration for the block download core
//!
//! Handles configuration loading, validation, and defaults. Only the
//! settings the download core consults live here; everything else belongs
//! to the embedding node.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::network::protocol::NODE_WITNESS;

/// Block download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Desired number of download slots (one per outbound block channel)
    #[serde(default = "default_download_connections")]
    pub download_connections: u32,

    /// Per-slot inactivity timeout: a channel that delivers no block within
    /// this window is stopped and its slot freed for another peer
    #[serde(default = "default_block_timeout_seconds")]
    pub block_timeout_seconds: u32,

    /// Local service bits; only `NODE_WITNESS` is consulted here
    #[serde(default = "default_services")]
    pub services: u64,
}

fn default_download_connections() -> u32 {
    8
}

fn default_block_timeout_seconds() -> u32 {
    5
}

fn default_services() -> u64 {
    NODE_WITNESS
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_connections: default_download_connections(),
            block_timeout_seconds: default_block_timeout_seconds(),
            services: default_services(),
        }
    }
}

impl DownloadConfig {
    /// Whether local services require witness data in requested blocks
    pub fn require_witness(&self) -> bool {
        (self.services & NODE_WITNESS) != 0
    }

    /// Per-slot inactivity timeout as a duration
    pub fn block_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.block_timeout_seconds))
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DownloadConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
