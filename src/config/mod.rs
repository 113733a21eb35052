//! Cluster configuration
//!
//! Loaded from a JSON file (`cascmon.json` by convention): monitor
//! cadence, the cluster-wide durability default, and the flat node
//! list the topology builder consumes. Loading validates what a flat
//! list can (presence, uniqueness of endpoints); tree-shape rules
//! belong to the builder.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event};
use crate::topology::{DurabilityMode, Endpoint};

/// Configuration file errors. Fatal at startup.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("invalid config JSON: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Role as written in the config file.
///
/// Terminal replicas are not configured; the builder derives them from
/// tree shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigRole {
    Primary,
    Replica,
}

/// One node's configuration entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique name within the cluster
    pub name: String,

    pub role: ConfigRole,

    /// Parent node name; required for replicas, forbidden for the
    /// primary (enforced by the topology builder)
    #[serde(default)]
    pub connect_to: Option<String>,

    /// Per-node durability override; falls back to the cluster default
    #[serde(default)]
    pub durability: Option<DurabilityMode>,

    /// Pre-assigned query/control endpoint
    pub host: String,
    pub port: u16,

    /// Data directory; defaults to `data/<name>`
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl NodeConfig {
    /// The node's query/control endpoint
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    /// The data directory handed to process control
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("data").join(&self.name))
    }
}

/// Whole-cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Monitor tick interval
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-node poll budget; a poll over budget degrades that node's
    /// record to stale for the tick
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Cluster-wide durability default (per-node `durability` wins)
    #[serde(default)]
    pub durability: DurabilityMode,

    pub nodes: Vec<NodeConfig>,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_poll_timeout_ms() -> u64 {
    250
}

impl ClusterConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: ClusterConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;

        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("path", &path.display().to_string()),
                ("nodes", &config.nodes.len().to_string()),
            ],
        );

        Ok(config)
    }

    /// Flat-list validation; tree-shape rules live in the builder
    pub fn validate(&self) -> ConfigResult<()> {
        if self.nodes.is_empty() {
            return Err(ConfigError::Invalid("at least one node is required".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be > 0".into()));
        }
        if self.poll_timeout_ms == 0 {
            return Err(ConfigError::Invalid("poll_timeout_ms must be > 0".into()));
        }

        let mut endpoints = HashSet::new();
        for node in &self.nodes {
            if node.name.is_empty() {
                return Err(ConfigError::Invalid("node name must not be empty".into()));
            }
            if !endpoints.insert(node.endpoint()) {
                return Err(ConfigError::Invalid(format!(
                    "endpoint {} assigned to more than one node",
                    node.endpoint()
                )));
            }
        }
        Ok(())
    }

    /// Monitor tick interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Per-node poll budget
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

/// Concise config constructors for tests and examples
#[doc(hidden)]
pub mod test_support {
    use super::*;

    pub fn primary(name: &str, port: u16) -> NodeConfig {
        NodeConfig {
            name: name.into(),
            role: ConfigRole::Primary,
            connect_to: None,
            durability: None,
            host: "localhost".into(),
            port,
            data_dir: None,
        }
    }

    pub fn replica(name: &str, parent: &str, port: u16) -> NodeConfig {
        NodeConfig {
            name: name.into(),
            role: ConfigRole::Replica,
            connect_to: Some(parent.into()),
            durability: None,
            host: "localhost".into(),
            port,
            data_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_json() -> &'static str {
        r#"{
            "durability": "apply",
            "nodes": [
                {"name": "master", "role": "primary", "host": "localhost", "port": 6432},
                {"name": "line0-0", "role": "replica", "connect_to": "master",
                 "host": "localhost", "port": 6433, "durability": "write"}
            ]
        }"#
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_json().as_bytes()).unwrap();

        let config = ClusterConfig::load(file.path()).unwrap();
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.durability, DurabilityMode::Apply);
        assert_eq!(config.poll_interval_ms, 1000); // default
        assert_eq!(config.nodes[1].durability, Some(DurabilityMode::Write));
        assert_eq!(config.nodes[1].connect_to.as_deref(), Some("master"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ClusterConfig::load(Path::new("/no/such/cascmon.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();
        let err = ClusterConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_duplicate_endpoint_rejected() {
        let config = ClusterConfig {
            poll_interval_ms: 1000,
            poll_timeout_ms: 250,
            durability: DurabilityMode::Apply,
            nodes: vec![
                test_support::primary("master", 6432),
                test_support::replica("r", "master", 6432),
            ],
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::Invalid(_)
        ));
    }

    #[test]
    fn test_empty_nodes_rejected() {
        let config = ClusterConfig {
            poll_interval_ms: 1000,
            poll_timeout_ms: 250,
            durability: DurabilityMode::None,
            nodes: vec![],
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_data_dir_derived_from_name() {
        let node = test_support::primary("master", 6432);
        assert_eq!(node.resolved_data_dir(), PathBuf::from("data/master"));
    }
}
