//! Read → filter → write pipeline
//!
//! Given an input capture, an output capture and a [`Predicate`], writes the
//! records of the input that pass the predicate to the output, in input
//! order and byte-for-byte.

use crate::capture::{CaptureMetadata, CaptureReader, CaptureWriter};
use crate::error::TrimError;
use pcap_file::{DataLink, PcapError};
use pcaptrim_shared::Predicate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Record counts of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Records read from the input
    pub read: u64,

    /// Records that passed the predicate and were written
    pub written: u64,
}

impl RunStats {
    pub fn dropped(&self) -> u64 {
        self.read - self.written
    }
}

/// Trims one input capture into one output capture.
///
/// By default the output is an Ethernet capture with a 65536 byte snapshot
/// length; embedders can change either before calling [`PcapTrimmer::run`].
#[derive(Debug, Clone)]
pub struct PcapTrimmer {
    input: PathBuf,
    output: PathBuf,
    metadata: CaptureMetadata,
}

impl PcapTrimmer {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            metadata: CaptureMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: CaptureMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Link type written into the output header
    pub fn with_link_type(mut self, link_type: DataLink) -> Self {
        self.metadata.link_type = link_type;
        self
    }

    /// Snapshot length written into the output header
    pub fn with_snaplen(mut self, snaplen: u32) -> Self {
        self.metadata.snaplen = snaplen;
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn metadata(&self) -> CaptureMetadata {
        self.metadata
    }

    /// Read the input and write the records that pass `predicate` to the output.
    ///
    /// The output is finalized on every path once it has been opened, including
    /// when the predicate or a write fails mid-run. A partially written output
    /// is left on disk.
    pub fn run<P: Predicate + ?Sized>(&self, predicate: &mut P) -> Result<RunStats, TrimError> {
        self.metadata.validate().map_err(TrimError::InvalidMetadata)?;

        info!(
            "Trimming {} -> {} (link type {:?}, snaplen {})",
            self.input.display(),
            self.output.display(),
            self.metadata.link_type,
            self.metadata.snaplen
        );

        let out_file = File::create(&self.output).map_err(|e| TrimError::OutputOpenFailed {
            path: self.output.clone(),
            source: PcapError::IoError(e),
        })?;

        let mut reader =
            CaptureReader::open(&self.input).map_err(|source| TrimError::InputOpenFailed {
                path: self.input.clone(),
                source,
            })?;

        let header = self.metadata.header(reader.ts_resolution());
        let mut writer = CaptureWriter::new(&self.output, out_file, header).map_err(|source| {
            TrimError::OutputOpenFailed {
                path: self.output.clone(),
                source,
            }
        })?;

        let mut stats = RunStats::default();
        let outcome = self.pump(&mut reader, &mut writer, predicate, &mut stats);
        drop(reader);

        let finished = writer
            .finish()
            .map_err(|source| TrimError::OutputWriteFailed {
                path: self.output.clone(),
                index: None,
                source,
            });

        match (outcome, finished) {
            (Ok(()), Ok(())) => {
                info!(
                    "Wrote {} of {} records to {}",
                    stats.written,
                    stats.read,
                    self.output.display()
                );
                Ok(stats)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), Err(e)) => Err(e),
            (Err(e), Err(finalize)) => {
                warn!("Output finalize also failed after aborted run: {}", finalize);
                Err(e)
            }
        }
    }

    fn pump<P: Predicate + ?Sized>(
        &self,
        reader: &mut CaptureReader,
        writer: &mut CaptureWriter,
        predicate: &mut P,
        stats: &mut RunStats,
    ) -> Result<(), TrimError> {
        loop {
            let index = reader.next_index();
            let record = match reader.next_record() {
                None => return Ok(()),
                Some(Ok(record)) => record,
                Some(Err(source)) => {
                    return Err(TrimError::InputReadFailed {
                        path: self.input.clone(),
                        index,
                        source,
                    })
                }
            };
            stats.read += 1;

            let keep = predicate
                .evaluate(&record)
                .map_err(|source| TrimError::PredicateFailed { index, source })?;
            if !keep {
                continue;
            }

            writer
                .write(&record)
                .map_err(|source| TrimError::OutputWriteFailed {
                    path: self.output.clone(),
                    index: Some(index),
                    source,
                })?;
            stats.written += 1;
        }
    }
}

/// One-shot form of [`PcapTrimmer::run`]
pub fn run<P: Predicate + ?Sized>(
    input: &Path,
    output: &Path,
    predicate: &mut P,
    metadata: CaptureMetadata,
) -> Result<RunStats, TrimError> {
    PcapTrimmer::new(input, output)
        .with_metadata(metadata)
        .run(predicate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_metadata() {
        let trimmer = PcapTrimmer::new("in.pcap", "out.pcap")
            .with_link_type(DataLink::RAW)
            .with_snaplen(1500);
        assert_eq!(trimmer.metadata().link_type, DataLink::RAW);
        assert_eq!(trimmer.metadata().snaplen, 1500);
        assert_eq!(trimmer.input(), Path::new("in.pcap"));
    }

    #[test]
    fn test_defaults_to_ethernet_65536() {
        let trimmer = PcapTrimmer::new("in.pcap", "out.pcap");
        assert_eq!(trimmer.metadata(), CaptureMetadata::default());
    }

    #[test]
    fn test_invalid_metadata_fails_before_touching_files() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pcap");
        let err = PcapTrimmer::new(dir.path().join("in.pcap"), &output)
            .with_snaplen(0)
            .run(&mut |_: &pcaptrim_shared::Record<'_>| true)
            .unwrap_err();
        assert!(matches!(err, TrimError::InvalidMetadata(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_stats_dropped() {
        let stats = RunStats {
            read: 5,
            written: 3,
        };
        assert_eq!(stats.dropped(), 2);
    }
}
