//! WASM filter units for pcaptrim
//!
//! Resolves a filter implementation supplied at invocation time (a `.rs` or
//! `.wat` source, or a pre-built `.wasm` module) into a [`WasmPredicate`]
//! bound into the running process. Units are looked up by their simple name
//! in a single directory; the dotted logical name never maps onto nested
//! subdirectories.

pub mod artifact;
pub mod error;
pub mod filter_api;
pub mod host;
pub mod loader;
pub mod runtime;
pub mod scope;
pub mod toolchain;

pub use artifact::{ArtifactKind, SourceLanguage};
pub use error::{InstantiationCause, ResolutionError};
pub use loader::{FilterUnit, Loader};
pub use runtime::{RuntimeLimits, WasmPredicate, WasmRuntime};
pub use scope::UnitScope;
pub use toolchain::{CommandToolchain, Toolchain, ToolchainConfig};
