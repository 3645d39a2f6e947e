//! Predicate contract between the unit loader and the capture pipeline

use crate::types::record::Record;
use anyhow::Result;

/// Decides, per record, whether it is copied to the output capture.
///
/// Implementations may keep state across calls but must answer the same way
/// for the same record. An `Err` aborts the trim run.
pub trait Predicate {
    /// Evaluate a record, returning true to keep it, false to discard
    fn evaluate(&mut self, record: &Record<'_>) -> Result<bool>;
}

impl<F> Predicate for F
where
    F: FnMut(&Record<'_>) -> bool,
{
    fn evaluate(&mut self, record: &Record<'_>) -> Result<bool> {
        Ok(self(record))
    }
}
