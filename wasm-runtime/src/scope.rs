//! Single-directory unit scope
//!
//! A unit named `com.example.MyFilter` in a scope rooted at `/some/path` is
//! read from `/some/path/MyFilter.wasm`. The package prefix is dropped; the
//! scope never descends into `/some/path/com/example/`.

use crate::artifact::BINARY_EXTENSION;
use crate::error::InstantiationCause;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct UnitScope {
    root: PathBuf,
}

impl UnitScope {
    /// Create a scope that loads units from `root`, which must be a directory
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, InstantiationCause> {
        let root = root.into();
        if !root.is_dir() {
            return Err(InstantiationCause::ScopeNotDirectory { path: root });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Last dotted segment of a logical name
    pub fn simple_name(logical_name: &str) -> &str {
        match logical_name.rfind('.') {
            Some(dot) => &logical_name[dot + 1..],
            None => logical_name,
        }
    }

    /// File the unit named `logical_name` is read from
    pub fn unit_path(&self, logical_name: &str) -> PathBuf {
        self.root.join(format!(
            "{}.{}",
            Self::simple_name(logical_name),
            BINARY_EXTENSION
        ))
    }

    /// Read the unit's module bytes
    pub fn read_unit(&self, logical_name: &str) -> Result<Vec<u8>, InstantiationCause> {
        let path = self.unit_path(logical_name);
        debug!("Reading unit {} from {}", logical_name, path.display());
        std::fs::read(&path).map_err(|source| InstantiationCause::UnitNotFound { path, source })
    }
}
