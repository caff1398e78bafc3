//! Configuration system for the finder node.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $FINDER_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/finder/config.toml
//!   3. ~/.config/finder/config.toml

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::message::NodeId;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FinderConfig {
    pub node: NodeConfig,
    pub neighbors: Vec<NeighborConfig>,
    pub protocol: ProtocolConfig,
    pub resources: ResourcesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Identifier announced to neighbors. Must be non-empty.
    pub id: String,
    /// Address the HTTP API binds to.
    pub api_bind: String,
    pub api_port: u16,
}

/// One configured neighbor: its node id and the base URI of its API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborConfig {
    pub id: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// TTL stamped on queries this node originates.
    pub initial_ttl: u8,
    pub forwarding_entry_expiry_secs: u64,
    pub forwarding_sweep_secs: u64,
    pub search_expiry_secs: u64,
    pub search_sweep_secs: u64,
    /// Per-neighbor outbound queue capacity. Must be >= 1.
    pub output_queue_capacity: usize,
    /// Artificial delay before processing an inbound message. 0 = none.
    pub processing_delay_ms: u64,
    /// Max inbound work items processed at once.
    pub max_in_flight: usize,
    /// How long shutdown waits for each neighbor worker.
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesConfig {
    /// Compute node endpoints polled for their enabled resources.
    pub endpoints: Vec<String>,
    pub refresh_period_secs: u64,
    /// Consecutive poll failures before an endpoint is evicted. Must be >= 1.
    pub failure_limit: u32,
    pub probe_timeout_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            api_bind: "0.0.0.0".to_string(),
            api_port: 9101,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            initial_ttl: 5,
            forwarding_entry_expiry_secs: 120,
            forwarding_sweep_secs: 600,
            search_expiry_secs: 60,
            search_sweep_secs: 600,
            output_queue_capacity: 20,
            processing_delay_ms: 0,
            max_in_flight: 256,
            shutdown_timeout_secs: 3,
        }
    }
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            refresh_period_secs: 600,
            failure_limit: 4,
            probe_timeout_secs: 60,
        }
    }
}

// ── Derived values ────────────────────────────────────────────────────────────

impl NodeConfig {
    pub fn node_id(&self) -> NodeId {
        NodeId::new(self.id.trim())
    }
}

impl ProtocolConfig {
    pub fn forwarding_entry_expiry(&self) -> Duration {
        Duration::from_secs(self.forwarding_entry_expiry_secs)
    }

    pub fn forwarding_sweep_period(&self) -> Duration {
        Duration::from_secs(self.forwarding_sweep_secs.max(1))
    }

    pub fn search_expiry(&self) -> Duration {
        Duration::from_secs(self.search_expiry_secs)
    }

    pub fn search_sweep_period(&self) -> Duration {
        Duration::from_secs(self.search_sweep_secs.max(1))
    }

    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl ResourcesConfig {
    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_period_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("finder")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl FinderConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            FinderConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a specific config file, without env overrides.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("FINDER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&FinderConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply FINDER_* env var overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FINDER_NODE__ID") {
            self.node.id = v;
        }
        if let Ok(v) = std::env::var("FINDER_NODE__API_PORT") {
            if let Ok(p) = v.parse() {
                self.node.api_port = p;
            }
        }
        if let Ok(v) = std::env::var("FINDER_PROTOCOL__INITIAL_TTL") {
            if let Ok(ttl) = v.parse() {
                self.protocol.initial_ttl = ttl;
            }
        }
        if let Ok(v) = std::env::var("FINDER_PROTOCOL__PROCESSING_DELAY_MS") {
            if let Ok(ms) = v.parse() {
                self.protocol.processing_delay_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("FINDER_PROTOCOL__OUTPUT_QUEUE_CAPACITY") {
            if let Ok(n) = v.parse() {
                self.protocol.output_queue_capacity = n;
            }
        }
        if let Ok(v) = std::env::var("FINDER_RESOURCES__FAILURE_LIMIT") {
            if let Ok(n) = v.parse() {
                self.resources.failure_limit = n;
            }
        }
    }

    /// Check the whole config and report every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let node_id = self.node.id.trim();

        if node_id.is_empty() {
            errors.push("node.id is empty".to_string());
        }

        let mut ids = HashSet::new();
        let mut endpoints = HashSet::new();
        for (i, n) in self.neighbors.iter().enumerate() {
            let id = n.id.trim();
            if id.is_empty() {
                errors.push(format!("neighbors[{i}]: id is empty"));
            } else if id == node_id {
                errors.push(format!("neighbors[{i}]: id {id:?} is this node's id"));
            } else if !ids.insert(id) {
                errors.push(format!("neighbors[{i}]: duplicated id {id:?}"));
            }
            if !is_http_uri(&n.endpoint) {
                errors.push(format!("neighbors[{i}]: invalid endpoint {:?}", n.endpoint));
            } else if !endpoints.insert(n.endpoint.trim_end_matches('/')) {
                errors.push(format!("neighbors[{i}]: duplicated endpoint {:?}", n.endpoint));
            }
        }

        let mut polled = HashSet::new();
        for (i, e) in self.resources.endpoints.iter().enumerate() {
            if !is_http_uri(e) {
                errors.push(format!("resources.endpoints[{i}]: invalid uri {e:?}"));
            } else if !polled.insert(e.as_str()) {
                errors.push(format!("resources.endpoints[{i}]: duplicated uri {e:?}"));
            }
        }

        if self.protocol.output_queue_capacity == 0 {
            errors.push("protocol.output_queue_capacity must be positive".to_string());
        }
        if self.protocol.max_in_flight == 0 {
            errors.push("protocol.max_in_flight must be positive".to_string());
        }
        if self.resources.failure_limit == 0 {
            errors.push("resources.failure_limit must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

fn is_http_uri(s: &str) -> bool {
    let rest = s
        .strip_prefix("http://")
        .or_else(|| s.strip_prefix("https://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.contains(char::is_whitespace))
}
