//! Host side of the filter ABI: turns a [`Record`] into the bytes a filter
//! module reads from its linear memory.

use pcaptrim_shared::wasm::{RecordContext, FLAG_HAS_IP};
use pcaptrim_shared::Record;

/// Build the flat context for `record`
pub fn context_for(record: &Record<'_>) -> RecordContext {
    let layers = record.layers();
    let ts = record.timestamp();

    RecordContext {
        index: record.index(),
        ts_sec: ts.as_secs(),
        ts_nsec: ts.subsec_nanos(),
        captured_len: record.captured_len(),
        original_len: record.original_len(),
        link_type: u32::from(record.link_type()),
        ip_version: layers.ip_version.unwrap_or(0),
        ip_protocol: layers.ip_protocol.unwrap_or(0),
        transport: layers.transport.code(),
        flags: if layers.ip_version.is_some() {
            FLAG_HAS_IP
        } else {
            0
        },
        src_port: layers.src_port.unwrap_or(0),
        dst_port: layers.dst_port.unwrap_or(0),
        data_offset: RecordContext::SIZE as u32,
        data_len: record.captured_len(),
    }
}

/// Context followed by the captured bytes, ready to copy into WASM memory
pub fn encode_record(record: &Record<'_>) -> Vec<u8> {
    let data = record.data();
    let mut buf = Vec::with_capacity(RecordContext::SIZE + data.len());
    buf.extend_from_slice(&context_for(record).to_bytes());
    buf.extend_from_slice(data);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcaptrim_shared::etherparse::PacketBuilder;
    use pcaptrim_shared::pcap_file::pcap::PcapPacket;
    use pcaptrim_shared::pcap_file::DataLink;
    use pcaptrim_shared::wasm::TRANSPORT_UDP;
    use std::time::Duration;

    #[test]
    fn test_record_context_from_udp_record() {
        let builder = PacketBuilder::ethernet2([0; 6], [1; 6])
            .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .udp(40000, 53);
        let mut frame = Vec::new();
        builder.write(&mut frame, b"dns?").unwrap();

        let packet = PcapPacket::new(Duration::new(1_700_000_000, 42), 1500, &frame);
        let record = Record::new(9, DataLink::ETHERNET, packet);

        let ctx = context_for(&record);
        assert_eq!(ctx.index, 9);
        assert_eq!(ctx.ts_sec, 1_700_000_000);
        assert_eq!(ctx.ts_nsec, 42);
        assert_eq!(ctx.original_len, 1500);
        assert_eq!(ctx.link_type, 1);
        assert_eq!(ctx.ip_version, 4);
        assert_eq!(ctx.transport, TRANSPORT_UDP);
        assert_eq!(ctx.dst_port, 53);
        assert!(ctx.has_ip());

        let bytes = encode_record(&record);
        assert_eq!(bytes.len(), RecordContext::SIZE + frame.len());
        assert_eq!(&bytes[RecordContext::SIZE..], frame.as_slice());
    }
}
