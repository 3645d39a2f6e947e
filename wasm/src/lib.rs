//! pcaptrim WASM Filter SDK
//!
//! This SDK provides the tools to write record filters for pcaptrim in Rust.
//! Build the filter as a `cdylib` for `wasm32-unknown-unknown` and name the
//! resulting `.wasm` after the filter's simple name.

pub use pcaptrim_shared::wasm::{
    RecordContext, FILTER_API_VERSION, FLAG_HAS_IP, TRANSPORT_ICMPV4, TRANSPORT_ICMPV6,
    TRANSPORT_NONE, TRANSPORT_TCP, TRANSPORT_UDP,
};

use std::alloc::{alloc as raw_alloc, dealloc as raw_dealloc, Layout};

/// A record as handed to `filter`: the decoded context plus the captured bytes
#[derive(Debug, Clone, Copy)]
pub struct FilterRecord<'a> {
    pub context: RecordContext,
    pub data: &'a [u8],
}

impl<'a> FilterRecord<'a> {
    /// Split the host-written buffer into context and captured bytes
    pub fn from_bytes(bytes: &'a [u8]) -> Option<Self> {
        let context = RecordContext::from_bytes(bytes)?;
        let start = context.data_offset as usize;
        let data = bytes.get(start..start.checked_add(context.data_len as usize)?)?;
        Some(Self { context, data })
    }

    pub fn index(&self) -> u64 {
        self.context.index
    }

    pub fn is_tcp(&self) -> bool {
        self.context.transport == TRANSPORT_TCP
    }

    pub fn is_udp(&self) -> bool {
        self.context.transport == TRANSPORT_UDP
    }

    pub fn is_icmp(&self) -> bool {
        matches!(self.context.transport, TRANSPORT_ICMPV4 | TRANSPORT_ICMPV6)
    }

    /// True when either transport port equals `port`
    pub fn has_port(&self, port: u16) -> bool {
        self.context.has_port(port)
    }

    /// Captured bytes shorter than the original record
    pub fn is_truncated(&self) -> bool {
        self.context.captured_len < self.context.original_len
    }
}

/// Allocate memory for WASM host
#[no_mangle]
pub extern "C" fn alloc(size: u32) -> *mut u8 {
    match Layout::from_size_align(size.max(1) as usize, 1) {
        Ok(layout) => unsafe { raw_alloc(layout) },
        Err(_) => std::ptr::null_mut(),
    }
}

/// Deallocate memory for WASM host
#[no_mangle]
pub extern "C" fn dealloc(ptr: *mut u8, size: u32) {
    if ptr.is_null() {
        return;
    }
    if let Ok(layout) = Layout::from_size_align(size.max(1) as usize, 1) {
        unsafe { raw_dealloc(ptr, layout) }
    }
}

/// Helper macro to define the exported `filter` function, along with the
/// `api_version` export the host checks at load time
///
/// # Example
/// ```
/// use pcaptrim_filter::*;
///
/// filter_fn!(|record: &FilterRecord| record.is_udp() && record.has_port(53));
/// ```
#[macro_export]
macro_rules! filter_fn {
    ($body:expr) => {
        #[no_mangle]
        pub extern "C" fn api_version() -> u32 {
            $crate::FILTER_API_VERSION
        }

        #[no_mangle]
        pub extern "C" fn filter(ptr: u32, len: u32) -> u32 {
            let bytes = unsafe { ::std::slice::from_raw_parts(ptr as usize as *const u8, len as usize) };

            // Malformed buffers drop the record
            match $crate::FilterRecord::from_bytes(bytes) {
                Some(record) => {
                    let keep: bool = ($body)(&record);
                    keep as u32
                }
                None => 0,
            }
        }
    };
}

/// Log a message from the filter (for debugging)
pub fn log(msg: &str) {
    #[cfg(target_arch = "wasm32")]
    {
        #[link(wasm_import_module = "env")]
        extern "C" {
            fn log(ptr: u32, len: u32);
        }

        unsafe {
            log(msg.as_ptr() as u32, msg.len() as u32);
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    let _ = msg;
}
