//! Run reports

pub mod json;

pub use json::{write_report, TrimReport};
