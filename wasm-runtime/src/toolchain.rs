//! External compiler invocation
//!
//! Source artifacts are handed to an external toolchain as a black box; only
//! its exit code is inspected.

use crate::artifact::SourceLanguage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Compiles a filter source into a WebAssembly module
pub trait Toolchain {
    /// Compile `source` into a module at `output`.
    ///
    /// Returns the compiler's exit code, or `None` if it was terminated by a
    /// signal. `Err` means the compiler could not be launched.
    fn compile(
        &self,
        language: SourceLanguage,
        source: &Path,
        output: &Path,
    ) -> std::io::Result<Option<i32>>;
}

/// Toolchain programs and target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// rustc executable
    pub rustc: String,

    /// wat2wasm executable (from wabt)
    pub wat2wasm: String,

    /// rustc target triple for filter modules
    pub target: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            rustc: std::env::var("PCAPTRIM_RUSTC").unwrap_or_else(|_| "rustc".to_string()),
            wat2wasm: std::env::var("PCAPTRIM_WAT2WASM")
                .unwrap_or_else(|_| "wat2wasm".to_string()),
            target: std::env::var("PCAPTRIM_WASM_TARGET")
                .unwrap_or_else(|_| "wasm32-unknown-unknown".to_string()),
        }
    }
}

/// Runs the configured compiler as a subprocess, inheriting stdio
#[derive(Debug, Clone, Default)]
pub struct CommandToolchain {
    config: ToolchainConfig,
}

impl CommandToolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    /// Build the compiler command line for `source`
    pub fn command(&self, language: SourceLanguage, source: &Path, output: &Path) -> Command {
        match language {
            SourceLanguage::Rust => {
                let mut cmd = Command::new(&self.config.rustc);
                cmd.args(["--edition", "2021", "--crate-type", "cdylib", "-O"])
                    .arg("--target")
                    .arg(&self.config.target)
                    .arg("-o")
                    .arg(output)
                    .arg(source);
                cmd
            }
            SourceLanguage::Wat => {
                let mut cmd = Command::new(&self.config.wat2wasm);
                cmd.arg(source).arg("-o").arg(output);
                cmd
            }
        }
    }
}

impl Toolchain for CommandToolchain {
    fn compile(
        &self,
        language: SourceLanguage,
        source: &Path,
        output: &Path,
    ) -> std::io::Result<Option<i32>> {
        let mut cmd = self.command(language, source, output);
        debug!("Running {:?}", cmd);
        let status = cmd.status()?;
        Ok(status.code())
    }
}
