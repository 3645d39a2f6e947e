//! pcaptrim library
//!
//! Copies the records of a pcap capture that pass a predicate into a new
//! capture. The predicate is usually a WASM filter unit resolved at runtime
//! (see [`pcaptrim_wasm::Loader`]); any [`Predicate`] works, closures included.

pub mod capture;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;

pub use capture::{parse_link_type, CaptureMetadata, CaptureReader, CaptureWriter};
pub use config::{CaptureConfig, TrimConfig};
pub use error::{ConfigError, Error, TrimError};
pub use pipeline::{run, PcapTrimmer, RunStats};
pub use pcaptrim_shared::{Predicate, Record};

use pcaptrim_wasm::{FilterUnit, Loader};
use std::path::Path;
use tracing::debug;

/// Resolve `unit` and trim `input` into `output` with it
pub fn trim(
    config: &TrimConfig,
    input: &Path,
    output: &Path,
    unit: &FilterUnit,
) -> Result<RunStats, Error> {
    config.validate()?;
    let metadata = config.metadata()?;

    let loader = Loader::new(config.toolchain.clone(), config.limits).map_err(Error::Runtime)?;
    let mut predicate = loader.resolve_unit(unit.clone())?;
    debug!("Resolved filter unit {}", predicate.name());

    let stats = PcapTrimmer::new(input, output)
        .with_metadata(metadata)
        .run(&mut predicate)?;
    Ok(stats)
}
