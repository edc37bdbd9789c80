//! fleetplace.toml configuration parser.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ServerAddress;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid host entry {id}: {reason}")]
    InvalidHost { id: String, reason: String },

    #[error("invalid placement parameters: {0}")]
    InvalidPlacement(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub placement: PlacementConfig,
    pub store: StoreConfig,
    pub api: ApiConfig,
    pub host_client: HostClientConfig,
    pub hosts: Vec<HostEntry>,
    pub images: Vec<ImageEntry>,
}

/// Root place parameters applied when a request leaves them unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub max_fanout_count: u32,
    pub timeout_ms: u64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            max_fanout_count: 4,
            timeout_ms: 20_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the task database. In-memory when unset.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub listen: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:13010".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostClientConfig {
    pub request_timeout_ms: u64,
}

impl Default for HostClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
        }
    }
}

/// A host known to the static fleet sampler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostEntry {
    pub id: String,
    /// `host:port` of the host agent.
    pub address: String,
    #[serde(default)]
    pub datastores: BTreeSet<String>,
    #[serde(default)]
    pub datastore_tags: BTreeSet<String>,
    #[serde(default)]
    pub networks: BTreeSet<String>,
    #[serde(default)]
    pub availability_zone: Option<String>,
}

impl HostEntry {
    pub fn server_address(&self) -> Result<ServerAddress, ConfigError> {
        self.address
            .parse()
            .map_err(|reason| ConfigError::InvalidHost {
                id: self.id.clone(),
                reason,
            })
    }
}

/// Datastores an image has already been propagated to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageEntry {
    pub id: String,
    #[serde(default)]
    pub datastores: BTreeSet<String>,
}

impl SchedulerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: SchedulerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the daemon could not run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.placement.max_fanout_count == 0 {
            return Err(ConfigError::InvalidPlacement(
                "max_fanout_count must be at least 1".to_string(),
            ));
        }
        if self.placement.timeout_ms == 0 {
            return Err(ConfigError::InvalidPlacement(
                "timeout_ms must be positive".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for host in &self.hosts {
            host.server_address()?;
            if !seen.insert(host.id.as_str()) {
                return Err(ConfigError::InvalidHost {
                    id: host.id.clone(),
                    reason: "duplicate host id".to_string(),
                });
            }
        }
        Ok(())
    }
}
