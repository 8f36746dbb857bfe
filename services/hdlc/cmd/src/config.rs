//! Configuration handling for the link tool.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! `HDLC_*` environment variables, then command-line flags.

use anyhow::{Context, Result};
use hdlc_session::{FaultConfig, LinkConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Tool configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Link parameters, at the top level of the file
    #[serde(flatten)]
    pub link: LinkConfig,
    /// Fault injection on outbound frames
    pub faults: FaultConfig,
}

/// Command-line values that take precedence over everything else
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub max_chunk_size: Option<usize>,
    pub ack_timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub loss_rate: Option<f64>,
    pub bit_error_rate: Option<f64>,
    pub seed: Option<u64>,
}

impl AppConfig {
    /// Load from an optional file, the process environment and the command line
    pub fn load(path: Option<&Path>, cli: &CliOverrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };

        config.apply_environment_overrides(|key| std::env::var(key).ok());
        config.apply_cli_overrides(cli);
        config.link.validate()?;
        config.faults.validate()?;

        info!(
            "link configuration: max_chunk_size={}, ack_timeout={:?}, max_retries={}",
            config.link.max_chunk_size, config.link.ack_timeout, config.link.max_retries
        );
        Ok(config)
    }

    /// Read a YAML file; a missing file falls back to the defaults
    pub fn load_from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = serde_yaml::from_str(&content)
                    .with_context(|| format!("failed to parse config file {:?}", path))?;
                info!("Loaded configuration from {:?}", path);
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Config file {:?} not found, using defaults", path);
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("failed to read config file {:?}", path)),
        }
    }

    /// Apply `HDLC_*` variables looked up through `var`
    fn apply_environment_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(size) = var("HDLC_MAX_CHUNK_SIZE").and_then(|v| v.parse::<usize>().ok()) {
            self.link.max_chunk_size = size;
            info!("Max chunk size overridden by environment: {}", size);
        }

        if let Some(ms) = var("HDLC_ACK_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
            self.link.ack_timeout = Duration::from_millis(ms);
            info!("ACK timeout overridden by environment: {}ms", ms);
        }

        if let Some(retries) = var("HDLC_MAX_RETRIES").and_then(|v| v.parse::<u32>().ok()) {
            self.link.max_retries = retries;
            info!("Max retries overridden by environment: {}", retries);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &CliOverrides) {
        if let Some(size) = cli.max_chunk_size {
            self.link.max_chunk_size = size;
        }
        if let Some(timeout) = cli.ack_timeout {
            self.link.ack_timeout = timeout;
        }
        if let Some(retries) = cli.max_retries {
            self.link.max_retries = retries;
        }
        if let Some(rate) = cli.loss_rate {
            self.faults.loss_rate = rate;
        }
        if let Some(rate) = cli.bit_error_rate {
            self.faults.bit_error_rate = rate;
        }
        if let Some(seed) = cli.seed {
            self.faults.seed = seed;
        }
    }
}
