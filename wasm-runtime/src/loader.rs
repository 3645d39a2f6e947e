//! Filter unit resolution
//!
//! Turns a `(location, logical name)` pair into a [`WasmPredicate`]:
//! classify the artifact, compile it if it is a source, bind a
//! [`UnitScope`] on the module's directory and instantiate the unit found
//! there under its simple name.

use crate::artifact::{self, ArtifactKind, SourceLanguage};
use crate::error::{InstantiationCause, ResolutionError};
use crate::runtime::{RuntimeLimits, WasmPredicate, WasmRuntime};
use crate::scope::UnitScope;
use crate::toolchain::{CommandToolchain, Toolchain, ToolchainConfig};
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A filter implementation identified by artifact location and logical name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterUnit {
    /// Path to a `.rs`/`.wat` source or a `.wasm` module
    pub location: PathBuf,

    /// Fully-qualified dotted name, e.g. `com.example.UdpOnly`
    pub logical_name: String,
}

impl FilterUnit {
    pub fn new(location: impl Into<PathBuf>, logical_name: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            logical_name: logical_name.into(),
        }
    }
}

/// Resolves filter units into predicates
pub struct Loader<T = CommandToolchain> {
    toolchain: T,
    runtime: WasmRuntime,
}

impl Loader<CommandToolchain> {
    /// Loader that compiles sources with the configured external toolchain
    pub fn new(toolchain: ToolchainConfig, limits: RuntimeLimits) -> Result<Self> {
        Ok(Self {
            toolchain: CommandToolchain::new(toolchain),
            runtime: WasmRuntime::new(limits)?,
        })
    }
}

impl<T: Toolchain> Loader<T> {
    pub fn with_toolchain(toolchain: T, runtime: WasmRuntime) -> Self {
        Self { toolchain, runtime }
    }

    pub fn resolve_unit(&self, unit: FilterUnit) -> Result<WasmPredicate, ResolutionError> {
        self.resolve(&unit.location, &unit.logical_name)
    }

    /// Resolve the unit `logical_name` from the artifact at `location`
    pub fn resolve(
        &self,
        location: &Path,
        logical_name: &str,
    ) -> Result<WasmPredicate, ResolutionError> {
        let binary = match artifact::classify(location)? {
            ArtifactKind::Binary => location.to_path_buf(),
            ArtifactKind::Source(language) => self.compile(language, location)?,
        };

        let fail = |cause: InstantiationCause| ResolutionError::InstantiationFailed {
            logical_name: logical_name.to_string(),
            cause,
        };

        let scope = UnitScope::new(artifact::containing_dir(&binary)).map_err(fail)?;

        let simple_name = UnitScope::simple_name(logical_name);
        let stem = artifact::unit_stem(&binary).unwrap_or_default();
        if simple_name != stem {
            return Err(fail(InstantiationCause::NameMismatch {
                expected: simple_name.to_string(),
                found: stem.to_string(),
            }));
        }

        let wasm_bytes = scope.read_unit(logical_name).map_err(fail)?;
        let predicate = self
            .runtime
            .instantiate(simple_name, &wasm_bytes)
            .map_err(fail)?;

        info!(
            "Loaded filter {} from {}",
            logical_name,
            scope.unit_path(logical_name).display()
        );
        Ok(predicate)
    }

    /// Run the toolchain on `source`, returning the derived module path
    fn compile(&self, language: SourceLanguage, source: &Path) -> Result<PathBuf, ResolutionError> {
        let output = artifact::binary_path_for(source);
        info!("Compiling {} filter {}", language, source.display());

        let exit_code = self
            .toolchain
            .compile(language, source, &output)
            .map_err(|source_err| ResolutionError::CompilerLaunch {
                language,
                path: source.to_path_buf(),
                source: source_err,
            })?;

        if exit_code != Some(0) {
            return Err(ResolutionError::CompilationFailed {
                path: source.to_path_buf(),
                exit_code,
            });
        }

        debug!("Compiled {} -> {}", source.display(), output.display());
        Ok(output)
    }
}
