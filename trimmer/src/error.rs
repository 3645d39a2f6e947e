//! Error types for trim runs and configuration

use pcap_file::PcapError;
use pcaptrim_wasm::ResolutionError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a capture pipeline run
#[derive(Debug, Error)]
pub enum TrimError {
    #[error("invalid capture metadata")]
    InvalidMetadata(#[source] ConfigError),

    #[error("failed to open output capture {}", .path.display())]
    OutputOpenFailed {
        path: PathBuf,
        #[source]
        source: PcapError,
    },

    #[error("failed to open input capture {}", .path.display())]
    InputOpenFailed {
        path: PathBuf,
        #[source]
        source: PcapError,
    },

    #[error("failed to read record {index} of {}", .path.display())]
    InputReadFailed {
        path: PathBuf,
        index: u64,
        #[source]
        source: PcapError,
    },

    #[error(
        "failed to write {} to {}",
        .index.map_or_else(|| "capture trailer".to_string(), |i| format!("record {i}")),
        .path.display()
    )]
    OutputWriteFailed {
        path: PathBuf,
        /// `None` when finalizing the file failed
        index: Option<u64>,
        #[source]
        source: PcapError,
    },

    #[error("predicate failed on record {index}")]
    PredicateFailed {
        index: u64,
        #[source]
        source: anyhow::Error,
    },
}

/// Invalid configuration values
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("snapshot length must be greater than 0")]
    ZeroSnaplen,

    #[error("unknown link type `{0}`")]
    UnknownLinkType(String),

    #[error("filter fuel budget must be greater than 0")]
    ZeroFuel,

    #[error("filter memory limit must be at least one page")]
    ZeroMemoryPages,

    #[error("failed to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

/// Any failure of [`crate::trim`]
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to start the WASM runtime")]
    Runtime(#[source] anyhow::Error),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Trim(#[from] TrimError),
}
