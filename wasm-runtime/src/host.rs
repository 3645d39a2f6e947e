//! Host functions available to WASM filters

use wasmtime::{AsContext, Caller, Linker, Memory};

/// Register host functions with the WASM linker.
///
/// `env_memory` is the memory offered as `env.memory`; `log` reads from it
/// when the calling module does not export its own.
pub fn register_host_functions<T: 'static>(
    linker: &mut Linker<T>,
    env_memory: Memory,
) -> anyhow::Result<()> {
    // Log function for debugging filters
    linker.func_wrap(
        "env",
        "log",
        move |mut caller: Caller<'_, T>, ptr: i32, len: i32| {
            let memory = caller
                .get_export("memory")
                .and_then(|e| e.into_memory())
                .unwrap_or(env_memory);
            match read_message(&caller, memory, ptr, len) {
                Some(msg) => tracing::debug!("[WASM Filter] {}", msg),
                None => tracing::debug!(
                    "[WASM Filter] ignored log call outside linear memory or not UTF-8 (ptr {}, len {})",
                    ptr as u32,
                    len as u32
                ),
            }
        },
    )?;

    Ok(())
}

/// UTF-8 string at `ptr..ptr + len` in `memory`, if the range is in bounds
pub fn read_message<S: AsContext>(store: &S, memory: Memory, ptr: i32, len: i32) -> Option<String> {
    let start = ptr as u32 as usize;
    let end = start.checked_add(len as u32 as usize)?;
    if end > memory.data_size(store) {
        return None;
    }
    let mut buf = vec![0u8; end - start];
    memory.read(store, start, &mut buf).ok()?;
    String::from_utf8(buf).ok()
}
