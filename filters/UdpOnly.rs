//! Standalone UDP-only filter, compiled by pcaptrim on demand:
//!
//! ```text
//! pcaptrim in.pcap out.pcap filters/UdpOnly.rs com.example.UdpOnly
//! ```
//!
//! Single-file units are built with plain `rustc`, so this file depends on
//! nothing but `std`. Larger filters should use the `pcaptrim-filter` SDK.

use std::alloc::{alloc as raw_alloc, dealloc as raw_dealloc, Layout};

/// Byte offset of the transport code in the record context
const TRANSPORT_OFFSET: usize = 34;
const TRANSPORT_UDP: u8 = 2;

#[no_mangle]
pub extern "C" fn alloc(size: u32) -> *mut u8 {
    match Layout::from_size_align(size.max(1) as usize, 1) {
        Ok(layout) => unsafe { raw_alloc(layout) },
        Err(_) => std::ptr::null_mut(),
    }
}

#[no_mangle]
pub extern "C" fn dealloc(ptr: *mut u8, size: u32) {
    if let Ok(layout) = Layout::from_size_align(size.max(1) as usize, 1) {
        if !ptr.is_null() {
            unsafe { raw_dealloc(ptr, layout) }
        }
    }
}

#[no_mangle]
pub extern "C" fn filter(ptr: u32, len: u32) -> u32 {
    if (len as usize) <= TRANSPORT_OFFSET {
        return 0;
    }
    let transport = unsafe { *((ptr as usize + TRANSPORT_OFFSET) as *const u8) };
    (transport == TRANSPORT_UDP) as u32
}
