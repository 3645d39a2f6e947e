//! Filter artifact classification

use crate::error::ResolutionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Suffix of compiled filter units
pub const BINARY_EXTENSION: &str = "wasm";

/// Language of a source artifact, chosen by suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    /// `.rs`, built with rustc as a wasm `cdylib`
    Rust,
    /// `.wat`, assembled with wat2wasm
    Wat,
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLanguage::Rust => write!(f, "Rust"),
            SourceLanguage::Wat => write!(f, "WebAssembly text"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Source(SourceLanguage),
    Binary,
}

/// Classify a filter location by its suffix (case-sensitive)
pub fn classify(location: &Path) -> Result<ArtifactKind, ResolutionError> {
    match location.extension().and_then(|e| e.to_str()) {
        Some("rs") => Ok(ArtifactKind::Source(SourceLanguage::Rust)),
        Some("wat") => Ok(ArtifactKind::Source(SourceLanguage::Wat)),
        Some(BINARY_EXTENSION) => Ok(ArtifactKind::Binary),
        _ => Err(ResolutionError::UnsupportedArtifactKind {
            path: location.to_path_buf(),
        }),
    }
}

/// Where the compiler is expected to leave the module built from `source`:
/// same directory, source suffix replaced by the binary suffix.
pub fn binary_path_for(source: &Path) -> PathBuf {
    source.with_extension(BINARY_EXTENSION)
}

/// Directory holding `artifact`; a bare file name lives in the current directory
pub fn containing_dir(artifact: &Path) -> PathBuf {
    match artifact.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Base filename without suffix
pub fn unit_stem(artifact: &Path) -> Option<&str> {
    artifact.file_stem().and_then(|s| s.to_str())
}
