//! Filter ABI shared between the host runtime and WASM filter modules.
//!
//! The host writes a [`RecordContext`] (little-endian, [`RecordContext::SIZE`]
//! bytes) followed by the record's captured bytes into the module's linear
//! memory, then calls `filter(ptr: i32, len: i32) -> i32`. A non-zero return
//! keeps the record.

/// Filter API version. Modules may export `api_version() -> i32`; the host
/// refuses a module reporting any other value.
pub const FILTER_API_VERSION: u32 = 1;

pub const TRANSPORT_NONE: u8 = 0;
pub const TRANSPORT_TCP: u8 = 1;
pub const TRANSPORT_UDP: u8 = 2;
pub const TRANSPORT_ICMPV4: u8 = 3;
pub const TRANSPORT_ICMPV6: u8 = 4;

/// `flags` bit set when an IP header was decoded
pub const FLAG_HAS_IP: u8 = 0x01;

/// Record context passed to WASM filters via linear memory.
/// Field order fixes the byte offsets filters read from.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordContext {
    /// Zero-based position in the input capture
    pub index: u64,
    /// Timestamp seconds since epoch
    pub ts_sec: u64,
    /// Timestamp sub-second nanoseconds
    pub ts_nsec: u32,
    /// Bytes captured
    pub captured_len: u32,
    /// Bytes on the wire
    pub original_len: u32,
    /// pcap LINKTYPE_* value of the input capture
    pub link_type: u32,
    /// 0 = no IP, 4 or 6
    pub ip_version: u8,
    /// IPv4 protocol / IPv6 next header
    pub ip_protocol: u8,
    /// One of the `TRANSPORT_*` codes
    pub transport: u8,
    pub flags: u8,
    pub src_port: u16,
    pub dst_port: u16,
    /// Offset of the captured bytes from the start of the context
    pub data_offset: u32,
    /// Length of the captured bytes (stored after this struct in memory)
    pub data_len: u32,
}

impl RecordContext {
    /// Size of the encoded struct in bytes
    pub const SIZE: usize = 48;

    /// Encode as little-endian bytes, matching the `#[repr(C)]` layout
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..8].copy_from_slice(&self.index.to_le_bytes());
        out[8..16].copy_from_slice(&self.ts_sec.to_le_bytes());
        out[16..20].copy_from_slice(&self.ts_nsec.to_le_bytes());
        out[20..24].copy_from_slice(&self.captured_len.to_le_bytes());
        out[24..28].copy_from_slice(&self.original_len.to_le_bytes());
        out[28..32].copy_from_slice(&self.link_type.to_le_bytes());
        out[32] = self.ip_version;
        out[33] = self.ip_protocol;
        out[34] = self.transport;
        out[35] = self.flags;
        out[36..38].copy_from_slice(&self.src_port.to_le_bytes());
        out[38..40].copy_from_slice(&self.dst_port.to_le_bytes());
        out[40..44].copy_from_slice(&self.data_offset.to_le_bytes());
        out[44..48].copy_from_slice(&self.data_len.to_le_bytes());
        out
    }

    /// Decode the context at the start of `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let b = bytes.get(..Self::SIZE)?;
        let u16_at = |i: usize| u16::from_le_bytes([b[i], b[i + 1]]);
        let u32_at = |i: usize| u32::from_le_bytes([b[i], b[i + 1], b[i + 2], b[i + 3]]);
        let u64_at = |i: usize| (u32_at(i) as u64) | ((u32_at(i + 4) as u64) << 32);

        Some(Self {
            index: u64_at(0),
            ts_sec: u64_at(8),
            ts_nsec: u32_at(16),
            captured_len: u32_at(20),
            original_len: u32_at(24),
            link_type: u32_at(28),
            ip_version: b[32],
            ip_protocol: b[33],
            transport: b[34],
            flags: b[35],
            src_port: u16_at(36),
            dst_port: u16_at(38),
            data_offset: u32_at(40),
            data_len: u32_at(44),
        })
    }

    pub fn has_ip(&self) -> bool {
        self.flags & FLAG_HAS_IP != 0
    }

    pub fn has_port(&self, port: u16) -> bool {
        self.transport != TRANSPORT_NONE && (self.src_port == port || self.dst_port == port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_matches_repr_c() {
        assert_eq!(RecordContext::SIZE, std::mem::size_of::<RecordContext>());
    }

    #[test]
    fn test_field_offsets() {
        let ctx = RecordContext {
            index: 7,
            transport: TRANSPORT_UDP,
            dst_port: 53,
            data_offset: RecordContext::SIZE as u32,
            data_len: 0x0102,
            ..Default::default()
        };
        let bytes = ctx.to_bytes();
        assert_eq!(bytes[0], 7);
        assert_eq!(bytes[34], TRANSPORT_UDP);
        assert_eq!(bytes[38..40], [53, 0]);
        assert_eq!(bytes[40..44], [48, 0, 0, 0]);
        assert_eq!(bytes[44..48], [0x02, 0x01, 0, 0]);

        assert_eq!(RecordContext::from_bytes(&bytes), Some(ctx));
        assert!(RecordContext::from_bytes(&bytes[..47]).is_none());
    }

    #[test]
    fn test_has_port_requires_transport() {
        let ctx = RecordContext {
            src_port: 0,
            ..Default::default()
        };
        assert!(!ctx.has_port(0));
    }
}
