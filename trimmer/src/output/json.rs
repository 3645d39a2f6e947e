//! JSON run report
//!
//! Summarizes a finished trim run for scripts that post-process captures

use crate::pipeline::RunStats;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

/// Outcome of one trim run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimReport {
    pub input: PathBuf,
    pub output: PathBuf,

    /// Logical name of the filter unit
    pub filter: String,

    /// Output link type as its LINKTYPE_ number
    pub link_type: u32,
    pub snaplen: u32,

    #[serde(flatten)]
    pub stats: RunStats,
}

/// Write `report` to `output_path` as pretty-printed JSON
pub fn write_report(report: &TrimReport, output_path: &Path) -> Result<()> {
    info!("Writing run report: {}", output_path.display());

    let file = File::create(output_path)
        .with_context(|| format!("Failed to create report file: {}", output_path.display()))?;

    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .context("Failed to serialize run report to JSON")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_report() {
        let report = TrimReport {
            input: PathBuf::from("in.pcap"),
            output: PathBuf::from("out.pcap"),
            filter: "com.example.UdpOnly".to_string(),
            link_type: 1,
            snaplen: 65536,
            stats: RunStats {
                read: 5,
                written: 3,
            },
        };

        let temp_dir = tempfile::tempdir().unwrap();
        let output_path = temp_dir.path().join("report.json");
        write_report(&report, &output_path).unwrap();

        let contents = std::fs::read_to_string(&output_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["read"], 5);
        assert_eq!(parsed["written"], 3);
        assert_eq!(parsed["filter"], "com.example.UdpOnly");

        let back: TrimReport = serde_json::from_str(&contents).unwrap();
        assert_eq!(back, report);
    }
}
