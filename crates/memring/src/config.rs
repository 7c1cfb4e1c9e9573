//! TOML configuration for the memring client.
//!
//! Every section is optional; with no file at all the client talks to
//! four memcached processes on localhost ports 11211 to 11214.

use std::path::Path;
use std::time::Duration;

use memring_directory::DirectoryConfig;
use memring_types::NodeAddr;
use serde::Deserialize;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Initial ring membership.
    pub cluster: ClusterSection,
    /// Ring layout.
    pub ring: RingSection,
    /// Which backend to talk to.
    pub backend: BackendSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[cluster]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClusterSection {
    /// Nodes joined at startup, in order (`"host:port"`).
    pub nodes: Vec<NodeAddr>,
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            nodes: (11211..=11214).map(|port| NodeAddr::new("localhost", port)).collect(),
        }
    }
}

/// `[ring]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RingSection {
    /// Virtual positions per physical node.
    pub vnodes_per_node: u16,
}

impl Default for RingSection {
    fn default() -> Self {
        Self {
            vnodes_per_node: DirectoryConfig::default().vnodes_per_node,
        }
    }
}

/// Backend flavour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// memcached servers over TCP.
    #[default]
    Memcached,
    /// In-process maps, for trying the client without servers.
    Memory,
}

/// `[backend]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    /// `"memcached"` (default) or `"memory"`.
    pub kind: BackendKind,
    /// Per-call timeout for backend I/O in milliseconds. `0` disables it.
    pub io_timeout_ms: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            kind: BackendKind::Memcached,
            io_timeout_ms: 2000,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                let config: CliConfig = toml::from_str(&content)?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Directory settings derived from the `[ring]` section.
    pub fn directory_config(&self) -> DirectoryConfig {
        DirectoryConfig {
            vnodes_per_node: self.ring.vnodes_per_node,
        }
    }

    /// Effective backend I/O timeout.
    pub fn io_timeout(&self) -> Option<Duration> {
        match self.backend.io_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
