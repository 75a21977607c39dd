//! Configuration Management
//!
//! Provides functionality for:
//! - Loading/saving the topology configuration
//! - Configuration validation
//! - Building candidate descriptors from the seed list
//! - Default configuration

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::TopologyError;
use crate::prober::ProbeMode;
use crate::source::StaticCandidates;
use crate::types::{ConnectionTarget, NodeDescriptor, NodeRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateConfig {
    /// Node host name or IP address
    pub host: String,
    /// Node port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Declared role
    pub role: NodeRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Command timeout in milliseconds, also the refresh deadline
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Logical database index
    #[serde(default)]
    pub database: u32,
    /// Client name announced to the nodes
    #[serde(default)]
    pub client_name: Option<String>,
    /// Connect with TLS
    #[serde(default)]
    pub tls: bool,
    /// Liveness check performed by the TCP prober
    #[serde(default)]
    pub probe_mode: ProbeMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for rotated log files
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
    /// Also write JSON logs to `directory`
    #[serde(default)]
    pub json_file: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub candidates: Vec<CandidateConfig>,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// Default implementations
impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            database: 0,
            client_name: None,
            tls: false,
            probe_mode: ProbeMode::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_directory(),
            json_file: false,
        }
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            candidates: vec![CandidateConfig {
                host: "127.0.0.1".to_string(),
                port: default_port(),
                role: NodeRole::Primary,
            }],
            connection: ConnectionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// Default value functions
fn default_port() -> u16 { ConnectionTarget::DEFAULT_PORT }
fn default_timeout_ms() -> u64 { 1000 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_directory() -> PathBuf { PathBuf::from("logs") }

impl ConnectionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Seed template every candidate target is derived from.
    pub fn template(&self) -> ConnectionTarget {
        let mut target = ConnectionTarget::default()
            .with_timeout(self.timeout())
            .with_database(self.database)
            .with_tls(self.tls);
        if let Some(name) = &self.client_name {
            target = target.with_client_name(name.clone());
        }
        target
    }
}

impl TopologyConfig {
    /// Load configuration from file, writing the default one if missing
    pub fn load(path: &Path) -> Result<Self, TopologyError> {
        if !path.exists() {
            debug!("Configuration file not found at {:?}, creating default", path);
            let config = TopologyConfig::default();
            config.save(path)?;
            return Ok(config);
        }

        Self::load_from_file(path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, TopologyError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| TopologyError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_yaml::from_str(&contents)
            .map_err(|e| TopologyError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate and persist the configuration.
    ///
    /// The YAML is written and synced to a sibling file, then renamed over
    /// `path`, so readers never observe a half-written configuration. An
    /// invalid configuration is rejected without touching the existing file.
    pub fn save(&self, path: &Path) -> Result<(), TopologyError> {
        self.validate()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| TopologyError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let staging = path.with_extension("yml.partial");
        let written = File::create(&staging)
            .map_err(TopologyError::from)
            .and_then(|mut file| {
                serde_yaml::to_writer(&mut file, self)?;
                file.sync_all()?;
                Ok(())
            })
            .and_then(|()| fs::rename(&staging, path).map_err(TopologyError::from));

        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&staging) {
                debug!("Could not remove {:?}: {}", staging, cleanup);
            }
            return Err(TopologyError::Config(format!("Failed to save config to {:?}: {}", path, e)));
        }
        debug!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get configuration file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nexa")
            .join("topology.yml")
    }

    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.connection.timeout_ms == 0 {
            return Err(TopologyError::config("connection.timeout_ms must be positive"));
        }
        for (i, candidate) in self.candidates.iter().enumerate() {
            if candidate.host.trim().is_empty() {
                return Err(TopologyError::config(format!("candidates[{}]: empty host", i)));
            }
            if candidate.port == 0 {
                return Err(TopologyError::config(format!("candidates[{}]: port must be non-zero", i)));
            }
        }
        Ok(())
    }

    /// Candidate descriptors, in configured order
    pub fn candidates(&self) -> Vec<NodeDescriptor> {
        let template = self.connection.template();
        self.candidates
            .iter()
            .map(|c| NodeDescriptor::from_template(&template, c.host.clone(), c.port, c.role))
            .collect()
    }

    pub fn candidate_source(&self) -> StaticCandidates {
        StaticCandidates::new(self.candidates())
    }
}
