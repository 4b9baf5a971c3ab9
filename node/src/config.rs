//! # Node Configuration
//!
//! One TOML file per domain. The `[domain]` table is the exchange settings
//! the processor runs with; the `[key]` table says where the domain's
//! signing key comes from.
//!
//! ```toml
//! [domain]
//! host = "ssp.example"
//! scheme = "http"
//! suppliers = ["dsp-a.example:8081", "dsp-b.example:8082"]
//! supplier_timeout_ms = 1500
//!
//! [[domain.adverts]]
//! advertiser_url = "adv-y.com"
//! media_url = "https://adv-y.com/banner.png"
//!
//! [key]
//! file = "ssp.example.key"
//! ```
//!
//! A relative key file path is resolved against the directory holding the
//! configuration file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use swan_protocol::crypto::{DomainKeypair, KeyError};
use swan_protocol::exchange::{DomainConfig, DomainConfigError};

/// Errors loading or validating a node configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid domain settings: {0}")]
    Domain(#[from] DomainConfigError),

    #[error("no signing key configured (set key.hex or key.file)")]
    MissingKey,

    #[error("key.hex and key.file are mutually exclusive")]
    AmbiguousKey,

    #[error("invalid signing key: {0}")]
    BadKey(#[from] KeyError),
}

/// Where the signing key comes from. Exactly one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySource {
    /// Hex-encoded 32-byte secret key, inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
    /// File holding the hex-encoded secret key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// Everything `swan-node run` needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub domain: DomainConfig,
    #[serde(default)]
    pub key: KeySource,
}

impl NodeConfig {
    /// Reads, parses and validates a configuration file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;

        if let (Some(file), Some(dir)) = (config.key.file.as_mut(), path.parent()) {
            if file.is_relative() {
                *file = dir.join(&*file);
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.domain.validate()?;
        match (&self.key.hex, &self.key.file) {
            (None, None) => Err(ConfigError::MissingKey),
            (Some(_), Some(_)) => Err(ConfigError::AmbiguousKey),
            _ => Ok(()),
        }
    }

    /// Loads the signing key named by `[key]`.
    pub fn load_keypair(&self) -> Result<DomainKeypair, ConfigError> {
        let hex = match (&self.key.hex, &self.key.file) {
            (Some(hex), None) => hex.clone(),
            (None, Some(file)) => std::fs::read_to_string(file).map_err(|source| ConfigError::Io {
                path: file.clone(),
                source,
            })?,
            (None, None) => return Err(ConfigError::MissingKey),
            (Some(_), Some(_)) => return Err(ConfigError::AmbiguousKey),
        };
        Ok(DomainKeypair::from_hex(hex.trim())?)
    }

    /// A starter configuration for `host` whose key lives in `key_file`.
    pub fn template(host: &str, key_file: PathBuf) -> Self {
        Self {
            domain: DomainConfig::new(host),
            key: KeySource {
                hex: None,
                file: Some(key_file),
            },
        }
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
