//! Configuration file support for topomapd
//!
//! Loads and validates topomapd configuration from TOML files.
//! Default location: /etc/sonic/topomapd.conf
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - CM-6: Configuration Settings - Protocol toggles and log level
//! - SI-10: Information Input Validation - Settings validated at load

use crate::error::{Result, TopomapError};
use crate::types::ProtocolToggles;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/topomapd.conf";

/// Which L2 protocol families to fuse. All false means LLDP+CDP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolsConfig {
    #[serde(default)]
    pub lldp: bool,

    #[serde(default)]
    pub cdp: bool,

    #[serde(default)]
    pub fdb: bool,

    #[serde(default)]
    pub arp_nd: bool,

    #[serde(default)]
    pub bridge_domains: bool,
}

/// Result rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Pretty-print JSON output
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Complete topomapd configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopomapConfig {
    #[serde(default)]
    pub protocols: ProtocolsConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_pretty() -> bool {
    false
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pretty: default_pretty(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl TopomapConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(TopomapError::Io(e)),
        }
    }

    /// Load configuration from file; a missing file is an error
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            TopomapError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TopomapError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Toggles as configured, before the LLDP+CDP default is applied
    pub fn toggles(&self) -> ProtocolToggles {
        ProtocolToggles {
            lldp: self.protocols.lldp,
            cdp: self.protocols.cdp,
            fdb: self.protocols.fdb,
            arp_nd: self.protocols.arp_nd,
            bridge_domains: self.protocols.bridge_domains,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let level = self.logging.level.trim().to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(TopomapError::Config(format!(
                "logging.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }
        Ok(())
    }
}
