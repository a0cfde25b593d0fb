use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::SwitchConfig;
use crate::ofp_header::OfpVersion;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Controller settings. Every field has a default, so a config file only lists what it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Bind address of the TCP adaptor.
    pub listen_address: String,
    /// Supported wire versions (1 for OpenFlow 1.0, 4 for OpenFlow 1.3).
    pub openflow_versions: Vec<u8>,
    /// Optional cap on the highest wire version offered.
    pub max_version: Option<u8>,
    pub keepalive_interval_secs: u64,
    pub keepalive_timeout_secs: u64,
    /// 0 disables the handshake deadline.
    pub handshake_timeout_secs: u64,
    /// Flow statistics polling period. 0 disables polling.
    pub stats_interval_secs: u64,
    pub switch_config_flags: u16,
    pub miss_send_len: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            listen_address: "0.0.0.0:6653".to_string(),
            openflow_versions: vec![OfpVersion::V1_0.wire(), OfpVersion::V1_3.wire()],
            max_version: None,
            keepalive_interval_secs: 5,
            keepalive_timeout_secs: 15,
            handshake_timeout_secs: 30,
            stats_interval_secs: 60,
            switch_config_flags: crate::message::CONFIG_FRAG_NORMAL,
            miss_send_len: 0xffff,
        }
    }
}

impl ControllerConfig {
    /// Load and validate configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = ControllerConfig::from_yaml(&content)?;
        info!("Loaded controller config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: ControllerConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(v) = self
            .openflow_versions
            .iter()
            .find(|v| OfpVersion::from_wire(**v).is_none())
        {
            return Err(ConfigError::Invalid(format!(
                "unsupported OpenFlow wire version {}",
                v
            )));
        }
        if self.supported_versions().is_empty() {
            return Err(ConfigError::Invalid(
                "no OpenFlow version left to offer".to_string(),
            ));
        }
        if self.keepalive_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "keepalive_interval_secs must be positive".to_string(),
            ));
        }
        if self.keepalive_timeout_secs <= self.keepalive_interval_secs {
            return Err(ConfigError::Invalid(format!(
                "keepalive_timeout_secs ({}) must exceed keepalive_interval_secs ({})",
                self.keepalive_timeout_secs, self.keepalive_interval_secs
            )));
        }
        Ok(())
    }

    /// Supported versions in ascending order, capped by `max_version`.
    pub fn supported_versions(&self) -> Vec<OfpVersion> {
        let mut versions: Vec<OfpVersion> = self
            .openflow_versions
            .iter()
            .filter_map(|v| OfpVersion::from_wire(*v))
            .filter(|v| self.max_version.map_or(true, |max| v.wire() <= max))
            .collect();
        versions.sort();
        versions.dedup();
        versions
    }

    pub fn highest_version(&self) -> Option<OfpVersion> {
        self.supported_versions().last().copied()
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn keepalive_timeout(&self) -> Duration {
        Duration::from_secs(self.keepalive_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        Some(self.handshake_timeout_secs)
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn stats_interval(&self) -> Option<Duration> {
        Some(self.stats_interval_secs)
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn switch_config(&self) -> SwitchConfig {
        SwitchConfig {
            flags: self.switch_config_flags,
            miss_send_len: self.miss_send_len,
        }
    }
}
