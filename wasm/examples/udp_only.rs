//! UDP-only filter
//!
//! Keeps every record carrying a UDP datagram.
//!
//! ```text
//! cargo build -p pcaptrim-filter --example udp_only --target wasm32-unknown-unknown --release
//! pcaptrim in.pcap out.pcap udp_only.wasm com.example.udp_only
//! ```

use pcaptrim_filter::*;

filter_fn!(|record: &FilterRecord| record.is_udp());
