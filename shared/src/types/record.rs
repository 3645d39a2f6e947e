//! Capture record definitions
//!
//! A [`Record`] is one packet as the capture codec produced it, plus the
//! decoded protocol view predicates evaluate against.

use etherparse::{NetHeaders, PacketHeaders, TransportHeader};
use pcap_file::pcap::PcapPacket;
use pcap_file::DataLink;
use std::time::Duration;

/// Transport layer found in a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    None,
    Tcp,
    Udp,
    Icmpv4,
    Icmpv6,
}

impl Transport {
    /// Wire code used in [`crate::wasm::RecordContext::transport`]
    pub fn code(self) -> u8 {
        match self {
            Transport::None => crate::wasm::TRANSPORT_NONE,
            Transport::Tcp => crate::wasm::TRANSPORT_TCP,
            Transport::Udp => crate::wasm::TRANSPORT_UDP,
            Transport::Icmpv4 => crate::wasm::TRANSPORT_ICMPV4,
            Transport::Icmpv6 => crate::wasm::TRANSPORT_ICMPV6,
        }
    }
}

/// Summary of the decoded network and transport layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Layers {
    /// 4 or 6 when an IP header was decoded
    pub ip_version: Option<u8>,

    /// IPv4 protocol / IPv6 next header
    pub ip_protocol: Option<u8>,

    pub transport: Transport,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
}

impl Layers {
    /// True if either port equals `port`
    pub fn has_port(&self, port: u16) -> bool {
        self.src_port == Some(port) || self.dst_port == Some(port)
    }
}

/// One captured packet read from the input capture
#[derive(Debug, Clone)]
pub struct Record<'a> {
    index: u64,
    link_type: DataLink,
    packet: PcapPacket<'a>,
}

impl<'a> Record<'a> {
    /// Wrap a codec packet. `index` is the zero-based position in the input.
    pub fn new(index: u64, link_type: DataLink, packet: PcapPacket<'a>) -> Self {
        Self {
            index,
            link_type,
            packet,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    /// Link type of the capture the record was read from
    pub fn link_type(&self) -> DataLink {
        self.link_type
    }

    /// Capture timestamp, relative to the Unix epoch
    pub fn timestamp(&self) -> Duration {
        self.packet.timestamp
    }

    /// Captured bytes
    pub fn data(&self) -> &[u8] {
        &self.packet.data
    }

    pub fn captured_len(&self) -> u32 {
        self.packet.data.len() as u32
    }

    /// Length of the packet on the wire (may exceed the captured length)
    pub fn original_len(&self) -> u32 {
        self.packet.orig_len
    }

    pub fn is_truncated(&self) -> bool {
        self.captured_len() < self.original_len()
    }

    /// The codec packet, as it will be handed to the writer
    pub fn packet(&self) -> &PcapPacket<'a> {
        &self.packet
    }

    pub fn into_packet(self) -> PcapPacket<'a> {
        self.packet
    }

    /// Full protocol decode of the captured bytes.
    ///
    /// Returns `None` for link types without an IP-level decoder or when the
    /// bytes do not parse (e.g. truncated by the snapshot length).
    pub fn headers(&self) -> Option<PacketHeaders<'_>> {
        let data = self.data();
        match self.link_type {
            DataLink::ETHERNET => PacketHeaders::from_ethernet_slice(data).ok(),
            DataLink::RAW | DataLink::IPV4 | DataLink::IPV6 => {
                PacketHeaders::from_ip_slice(data).ok()
            }
            _ => None,
        }
    }

    /// Network/transport summary of [`Record::headers`]
    pub fn layers(&self) -> Layers {
        let Some(headers) = self.headers() else {
            return Layers::default();
        };

        let mut layers = Layers::default();
        match &headers.net {
            Some(NetHeaders::Ipv4(ip, _)) => {
                layers.ip_version = Some(4);
                layers.ip_protocol = Some(ip.protocol.0);
            }
            Some(NetHeaders::Ipv6(ip, _)) => {
                layers.ip_version = Some(6);
                layers.ip_protocol = Some(ip.next_header.0);
            }
            _ => {}
        }

        match &headers.transport {
            Some(TransportHeader::Tcp(tcp)) => {
                layers.transport = Transport::Tcp;
                layers.src_port = Some(tcp.source_port);
                layers.dst_port = Some(tcp.destination_port);
            }
            Some(TransportHeader::Udp(udp)) => {
                layers.transport = Transport::Udp;
                layers.src_port = Some(udp.source_port);
                layers.dst_port = Some(udp.destination_port);
            }
            Some(TransportHeader::Icmpv4(_)) => layers.transport = Transport::Icmpv4,
            Some(TransportHeader::Icmpv6(_)) => layers.transport = Transport::Icmpv6,
            _ => {}
        }

        layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etherparse::PacketBuilder;

    fn udp_frame(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([192, 168, 1, 1], [192, 168, 1, 2], 20)
            .udp(src_port, dst_port);
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, payload).unwrap();
        frame
    }

    fn tcp_frame(src_port: u16, dst_port: u16) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv6([0xfe; 16], [0xfd; 16], 64)
            .tcp(src_port, dst_port, 1, 4096);
        let mut frame = Vec::with_capacity(builder.size(0));
        builder.write(&mut frame, &[]).unwrap();
        frame
    }

    #[test]
    fn test_udp_layers() {
        let frame = udp_frame(5353, 53, b"query");
        let packet = PcapPacket::new(Duration::new(10, 500), frame.len() as u32, &frame);
        let record = Record::new(3, DataLink::ETHERNET, packet);

        let layers = record.layers();
        assert_eq!(layers.ip_version, Some(4));
        assert_eq!(layers.ip_protocol, Some(17));
        assert_eq!(layers.transport, Transport::Udp);
        assert_eq!(layers.src_port, Some(5353));
        assert!(layers.has_port(53));
        assert_eq!(record.index(), 3);
        assert_eq!(record.timestamp(), Duration::new(10, 500));
    }

    #[test]
    fn test_tcp_over_ipv6_layers() {
        let frame = tcp_frame(443, 50000);
        let packet = PcapPacket::new(Duration::ZERO, frame.len() as u32, &frame);
        let record = Record::new(0, DataLink::ETHERNET, packet);

        let layers = record.layers();
        assert_eq!(layers.ip_version, Some(6));
        assert_eq!(layers.ip_protocol, Some(6));
        assert_eq!(layers.transport, Transport::Tcp);
        assert_eq!(layers.dst_port, Some(50000));
    }

    #[test]
    fn test_undecodable_record_has_empty_layers() {
        let garbage = [0xffu8; 7];
        let packet = PcapPacket::new(Duration::ZERO, 7, &garbage);
        let record = Record::new(0, DataLink::ETHERNET, packet);
        assert_eq!(record.layers(), Layers::default());

        let packet = PcapPacket::new(Duration::ZERO, 7, &garbage);
        let record = Record::new(0, DataLink::NULL, packet);
        assert!(record.headers().is_none());
    }

    #[test]
    fn test_truncated_record() {
        let frame = udp_frame(1, 2, &[0u8; 32]);
        let packet = PcapPacket::new(Duration::ZERO, frame.len() as u32 + 100, &frame);
        let record = Record::new(0, DataLink::ETHERNET, packet);
        assert!(record.is_truncated());
        assert_eq!(record.captured_len() as usize, frame.len());
    }
}
