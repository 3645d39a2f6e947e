//! Capture file reading and writing
//!
//! Thin ownership wrappers over the `pcap-file` codec: a [`CaptureReader`]
//! yields [`Record`]s in file order, a [`CaptureWriter`] copies them out
//! unmodified under the header built from [`CaptureMetadata`].

use crate::error::ConfigError;
use pcap_file::pcap::{PcapHeader, PcapReader, PcapWriter};
use pcap_file::{DataLink, PcapError, TsResolution};
use pcaptrim_shared::Record;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default snapshot length; well above any standard Ethernet MTU
pub const DEFAULT_SNAPLEN: u32 = 65536;

/// Capture-level metadata written into the output file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureMetadata {
    pub link_type: DataLink,
    pub snaplen: u32,
}

impl Default for CaptureMetadata {
    fn default() -> Self {
        Self {
            link_type: DataLink::ETHERNET,
            snaplen: DEFAULT_SNAPLEN,
        }
    }
}

impl CaptureMetadata {
    pub fn new(link_type: DataLink, snaplen: u32) -> Result<Self, ConfigError> {
        let metadata = Self { link_type, snaplen };
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snaplen == 0 {
            return Err(ConfigError::ZeroSnaplen);
        }
        if let DataLink::Unknown(code) = self.link_type {
            return Err(ConfigError::UnknownLinkType(code.to_string()));
        }
        Ok(())
    }

    /// Output header; the timestamp resolution follows the input so record
    /// timestamps are written back at full precision
    pub fn header(&self, ts_resolution: TsResolution) -> PcapHeader {
        PcapHeader {
            snaplen: self.snaplen,
            datalink: self.link_type,
            ts_resolution,
            ..Default::default()
        }
    }
}

/// Parse a link type from its name (`ethernet`, `raw`, ...) or LINKTYPE_ number
pub fn parse_link_type(s: &str) -> Result<DataLink, ConfigError> {
    let s = s.trim();
    let link_type = match s.to_lowercase().as_str() {
        "ethernet" | "en10mb" => DataLink::ETHERNET,
        "raw" => DataLink::RAW,
        "ipv4" => DataLink::IPV4,
        "ipv6" => DataLink::IPV6,
        "null" | "loopback" => DataLink::NULL,
        "linux_sll" | "sll" => DataLink::LINUX_SLL,
        other => match other.parse::<u32>() {
            Ok(code) => DataLink::from(code),
            Err(_) => return Err(ConfigError::UnknownLinkType(s.to_string())),
        },
    };

    if let DataLink::Unknown(_) = link_type {
        return Err(ConfigError::UnknownLinkType(s.to_string()));
    }
    Ok(link_type)
}

/// Sequential reader over an input capture
pub struct CaptureReader {
    path: PathBuf,
    inner: PcapReader<BufReader<File>>,
    header: PcapHeader,
    next_index: u64,
}

impl CaptureReader {
    /// Open `path` and parse its global header
    pub fn open(path: &Path) -> Result<Self, PcapError> {
        let file = File::open(path).map_err(PcapError::IoError)?;
        let inner = PcapReader::new(BufReader::new(file))?;
        let header = inner.header();
        debug!(
            "Opened {} (link type {:?}, snaplen {})",
            path.display(),
            header.datalink,
            header.snaplen
        );
        Ok(Self {
            path: path.to_path_buf(),
            inner,
            header,
            next_index: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &PcapHeader {
        &self.header
    }

    /// Link type and snapshot length declared by the input
    pub fn metadata(&self) -> CaptureMetadata {
        CaptureMetadata {
            link_type: self.header.datalink,
            snaplen: self.header.snaplen,
        }
    }

    pub fn ts_resolution(&self) -> TsResolution {
        self.header.ts_resolution
    }

    /// Index the next record will carry
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Next record in file order, `None` at end of file
    pub fn next_record(&mut self) -> Option<Result<Record<'_>, PcapError>> {
        let index = self.next_index;
        let link_type = self.header.datalink;
        let packet = self.inner.next_packet()?;
        self.next_index += 1;
        Some(packet.map(|packet| Record::new(index, link_type, packet)))
    }
}

/// Writer for the output capture. Consumed by [`CaptureWriter::finish`].
pub struct CaptureWriter {
    path: PathBuf,
    inner: PcapWriter<BufWriter<File>>,
    snaplen: u32,
    written: u64,
}

impl CaptureWriter {
    /// Write `header` to an already created output file
    pub fn new(path: &Path, file: File, header: PcapHeader) -> Result<Self, PcapError> {
        let snaplen = header.snaplen;
        let inner = PcapWriter::with_header(BufWriter::new(file), header)?;
        Ok(Self {
            path: path.to_path_buf(),
            inner,
            snaplen,
            written: 0,
        })
    }

    /// Create `path` (truncating it) and write `header`
    pub fn create(path: &Path, header: PcapHeader) -> Result<Self, PcapError> {
        let file = File::create(path).map_err(PcapError::IoError)?;
        Self::new(path, file, header)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Copy `record` to the output: same bytes, timestamp and original length
    pub fn write(&mut self, record: &Record<'_>) -> Result<(), PcapError> {
        if record.captured_len() > self.snaplen {
            return Err(PcapError::InvalidField(
                "record exceeds the output snapshot length",
            ));
        }
        self.inner.write_packet(record.packet())?;
        self.written += 1;
        Ok(())
    }

    /// Flush buffered records and close the file
    pub fn finish(self) -> Result<(), PcapError> {
        let mut out = self.inner.into_writer();
        out.flush().map_err(PcapError::IoError)?;
        let file = out
            .into_inner()
            .map_err(|e| PcapError::IoError(e.into_error()))?;
        file.sync_all().map_err(PcapError::IoError)?;
        debug!("Closed {} after {} records", self.path.display(), self.written);
        Ok(())
    }
}
