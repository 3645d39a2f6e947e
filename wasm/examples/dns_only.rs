//! DNS-only filter
//!
//! Keeps DNS traffic: UDP or TCP with port 53 on either side.

use pcaptrim_filter::*;

const DNS_PORT: u16 = 53;

filter_fn!(|record: &FilterRecord| {
    (record.is_udp() || record.is_tcp()) && record.has_port(DNS_PORT)
});
