//! CLI Handler for Nexa Topology
//!
//! Provides command-line interface functionality for:
//! - Refreshing the topology of a configured deployment
//! - Validating configuration files
//! - Writing a default configuration

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::TopologyConfig;
use crate::error::TopologyError;
use crate::prober::TcpProber;
use crate::refresh::{RefreshReport, TopologyRefresh};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe the configured candidates and print the reachable ones
    Refresh {
        /// Override the configured deadline, in milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
        /// Include per-node probe results
        #[arg(long)]
        report: bool,
    },
    /// Validate the configuration file
    Check,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

pub struct CliHandler {
    config_path: PathBuf,
}

impl CliHandler {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path: config_path.unwrap_or_else(TopologyConfig::default_path),
        }
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    pub fn load_config(&self) -> Result<TopologyConfig, TopologyError> {
        TopologyConfig::load(&self.config_path)
    }

    pub async fn refresh(&self, config: &TopologyConfig, deadline: Option<Duration>) -> Result<RefreshReport, TopologyError> {
        let engine = TopologyRefresh::new(TcpProber::new(config.connection.probe_mode));
        let deadline = deadline.unwrap_or_else(|| config.connection.timeout());
        info!("Refreshing {} candidates with deadline {:?}", config.candidates.len(), deadline);
        engine.refresh_with_report(&config.candidates(), deadline).await
    }

    pub fn render(report: &RefreshReport, format: OutputFormat, full: bool) -> Result<String, TopologyError> {
        let rendered = match (format, full) {
            (OutputFormat::Yaml, true) => serde_yaml::to_string(report)?,
            (OutputFormat::Yaml, false) => serde_yaml::to_string(&report.snapshot)?,
            (OutputFormat::Json, true) => serde_json::to_string_pretty(report)?,
            (OutputFormat::Json, false) => serde_json::to_string_pretty(&report.snapshot)?,
        };
        Ok(rendered)
    }

    pub fn check(&self) -> Result<TopologyConfig, TopologyError> {
        let config = TopologyConfig::load_from_file(&self.config_path)?;
        println!(
            "{}: {} candidates, deadline {:?}",
            self.config_path.display(),
            config.candidates.len(),
            config.connection.timeout()
        );
        Ok(config)
    }

    pub fn init(&self, force: bool) -> Result<(), TopologyError> {
        if self.config_path.exists() && !force {
            return Err(TopologyError::config(format!(
                "{} already exists, pass --force to overwrite",
                self.config_path.display()
            )));
        }
        TopologyConfig::default().save(&self.config_path)?;
        println!("Wrote {}", self.config_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_refresh_command() {
        let cli = Cli::try_parse_from([
            "nexa-topology",
            "--config",
            "/tmp/topology.yml",
            "refresh",
            "--deadline-ms",
            "50",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/topology.yml")));
        match cli.command {
            Commands::Refresh { deadline_ms, format, report } => {
                assert_eq!(deadline_ms, Some(50));
                assert_eq!(format, OutputFormat::Json);
                assert!(!report);
            }
            _ => panic!("expected refresh"),
        }
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let handler = CliHandler::new(Some(dir.path().join("topology.yml")));

        handler.init(false).unwrap();
        assert!(handler.init(false).is_err());
        assert!(handler.init(true).is_ok());
        assert!(handler.check().is_ok());
    }

    #[tokio::test]
    async fn test_refresh_unreachable_config_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("topology.yml");
        // Port 1 on loopback is closed on any sane test host
        std::fs::write(
            &path,
            "candidates:\n  - host: 127.0.0.1\n    port: 1\n    role: primary\n",
        )
        .unwrap();

        let handler = CliHandler::new(Some(path));
        let config = handler.load_config().unwrap();
        let report = handler
            .refresh(&config, Some(Duration::from_millis(200)))
            .await
            .unwrap();

        assert!(report.snapshot.is_empty());
        let rendered = CliHandler::render(&report, OutputFormat::Json, true).unwrap();
        assert!(rendered.contains("\"probes\""));
    }
}
