//! Configuration for trim runs
//!
//! Every field has a default; `PCAPTRIM_*` environment variables override the
//! defaults, and an optional TOML file overrides both.

use crate::capture::{parse_link_type, CaptureMetadata, DEFAULT_SNAPLEN};
use crate::error::ConfigError;
use pcaptrim_wasm::{RuntimeLimits, ToolchainConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Link type name or LINKTYPE_ number
    pub link_type: String,

    /// Snapshot length in bytes
    pub snaplen: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            link_type: std::env::var("PCAPTRIM_LINK_TYPE")
                .unwrap_or_else(|_| "ethernet".to_string()),
            snaplen: std::env::var("PCAPTRIM_SNAPLEN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SNAPLEN),
        }
    }
}

/// Full trimmer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    pub capture: CaptureConfig,
    pub toolchain: ToolchainConfig,
    pub limits: RuntimeLimits,
}

impl TrimConfig {
    /// Load a TOML config file; missing sections and keys keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Output capture metadata described by `[capture]`
    pub fn metadata(&self) -> Result<CaptureMetadata, ConfigError> {
        let link_type = parse_link_type(&self.capture.link_type)?;
        CaptureMetadata::new(link_type, self.capture.snaplen)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.metadata()?;

        if self.limits.fuel_per_call == 0 {
            return Err(ConfigError::ZeroFuel);
        }
        if self.limits.max_memory_pages == 0 {
            return Err(ConfigError::ZeroMemoryPages);
        }

        Ok(())
    }
}
