//! Resolution errors

use crate::artifact::SourceLanguage;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn a filter artifact into a predicate instance
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("unsupported filter artifact {}: expected a .rs or .wat source, or a .wasm module", .path.display())]
    UnsupportedArtifactKind { path: PathBuf },

    #[error(
        "compiling {} failed with exit code {}",
        .path.display(),
        .exit_code.map_or_else(|| "none (terminated by signal)".to_string(), |c| c.to_string())
    )]
    CompilationFailed {
        path: PathBuf,
        exit_code: Option<i32>,
    },

    #[error("failed to launch the {language} compiler for {}", .path.display())]
    CompilerLaunch {
        language: SourceLanguage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to instantiate filter `{logical_name}`")]
    InstantiationFailed {
        logical_name: String,
        #[source]
        cause: InstantiationCause,
    },
}

impl ResolutionError {
    /// Exit code of a failed compilation, if that is what this error is
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ResolutionError::CompilationFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

/// Why a located artifact could not produce a conforming predicate
#[derive(Debug, Error)]
pub enum InstantiationCause {
    #[error("unit scope {} is not a directory", .path.display())]
    ScopeNotDirectory { path: PathBuf },

    #[error("unit name `{expected}` does not match `{found}`")]
    NameMismatch { expected: String, found: String },

    #[error("unit not found at {}", .path.display())]
    UnitNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a valid WebAssembly module")]
    InvalidModule(#[source] anyhow::Error),

    #[error("construction faulted")]
    ConstructionFault(#[source] anyhow::Error),

    #[error("unit speaks filter API version {found}, host supports {supported}")]
    UnsupportedApiVersion { found: u32, supported: u32 },

    #[error("unit does not provide the filter capability")]
    MissingCapability(#[source] anyhow::Error),
}
