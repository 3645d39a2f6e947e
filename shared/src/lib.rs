//! Shared types for pcaptrim
//!
//! This crate contains the pieces both sides of the filter boundary agree on:
//! the [`Record`] handed to predicates, the [`Predicate`] contract itself, and
//! the flat [`wasm::RecordContext`] layout filter modules read from linear
//! memory.

pub mod wasm;

#[cfg(feature = "capture")]
pub mod predicate;
#[cfg(feature = "capture")]
pub mod types;

#[cfg(feature = "capture")]
pub use predicate::Predicate;
#[cfg(feature = "capture")]
pub use types::record::{Layers, Record, Transport};

// Re-exported so downstream crates agree on the codec version.
#[cfg(feature = "capture")]
pub use etherparse;
#[cfg(feature = "capture")]
pub use pcap_file;
