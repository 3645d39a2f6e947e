//! WASM runtime implementation for record filtering.
//!
//! Instantiates filter modules that export `filter(ptr: i32, len: i32) -> i32`.
//! For every record the runtime writes a `RecordContext` + captured bytes into
//! the module's linear memory, calls `filter()`, and interprets the return
//! value as keep (non-zero) or discard (0).

use crate::error::InstantiationCause;
use crate::filter_api;
use crate::host;
use anyhow::{bail, Context, Result};
use pcaptrim_shared::wasm::FILTER_API_VERSION;
use pcaptrim_shared::{Predicate, Record};
use serde::{Deserialize, Serialize};
use tracing::debug;
use wasmtime::*;

/// Base address where the record is written when the module has no `alloc`
const RECORD_BASE: i32 = 1024;

const WASM_PAGE_SIZE: usize = 64 * 1024;

/// Sandbox limits applied to every filter instance
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeLimits {
    /// Fuel budget per `filter` call (roughly one unit per instruction)
    pub fuel_per_call: u64,

    /// Maximum linear memory, in 64 KiB pages
    pub max_memory_pages: u32,
}

impl Default for RuntimeLimits {
    fn default() -> Self {
        Self {
            fuel_per_call: std::env::var("PCAPTRIM_FILTER_FUEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1_000_000),
            max_memory_pages: std::env::var("PCAPTRIM_FILTER_MAX_PAGES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
        }
    }
}

impl RuntimeLimits {
    /// Reject limits no filter could run under
    pub fn validate(&self) -> Result<()> {
        if self.fuel_per_call == 0 {
            bail!("Filter fuel budget must be greater than 0");
        }
        if self.max_memory_pages == 0 {
            bail!("Filter memory limit must be at least one page");
        }
        Ok(())
    }

    fn max_memory_bytes(&self) -> usize {
        self.max_memory_pages as usize * WASM_PAGE_SIZE
    }
}

/// WASM runtime for instantiating filter modules
pub struct WasmRuntime {
    engine: Engine,
    limits: RuntimeLimits,
}

impl WasmRuntime {
    /// Create a new WASM runtime with fuel metering enabled.
    pub fn new(limits: RuntimeLimits) -> Result<Self> {
        limits.validate()?;

        let mut config = Config::new();
        config.consume_fuel(true);
        config.wasm_bulk_memory(true);
        config.wasm_multi_value(true);
        config.wasm_threads(false);

        let engine = Engine::new(&config).context("Failed to create WASM engine")?;
        Ok(Self { engine, limits })
    }

    pub fn limits(&self) -> RuntimeLimits {
        self.limits
    }

    /// Compile and instantiate a filter module named `name`.
    ///
    /// The module must export `filter(ptr: i32, len: i32) -> i32` and either
    /// export `memory` or import `env.memory`. An exported `_initialize` is
    /// run once as the unit's constructor. A module exporting
    /// `api_version() -> i32` must report [`FILTER_API_VERSION`].
    pub fn instantiate(&self, name: &str, wasm_bytes: &[u8]) -> Result<WasmPredicate, InstantiationCause> {
        let module = Module::new(&self.engine, wasm_bytes).map_err(InstantiationCause::InvalidModule)?;

        if let Some(declared) = module.name() {
            if declared != name {
                return Err(InstantiationCause::NameMismatch {
                    expected: name.to_string(),
                    found: declared.to_string(),
                });
            }
        }

        let limits = StoreLimitsBuilder::new()
            .memory_size(self.limits.max_memory_bytes())
            .build();
        let mut store = Store::new(&self.engine, limits);
        store.limiter(|limits| limits);
        store
            .set_fuel(self.limits.fuel_per_call)
            .map_err(InstantiationCause::ConstructionFault)?;

        // Provide a default memory for modules that import rather than export one
        let memory_type = MemoryType::new(1, Some(self.limits.max_memory_pages));
        let default_memory =
            Memory::new(&mut store, memory_type).map_err(InstantiationCause::ConstructionFault)?;

        let mut linker: Linker<StoreLimits> = Linker::new(&self.engine);
        host::register_host_functions(&mut linker, default_memory)
            .map_err(InstantiationCause::ConstructionFault)?;
        linker
            .define(&store, "env", "memory", default_memory)
            .map_err(InstantiationCause::ConstructionFault)?;

        let instance = linker
            .instantiate(&mut store, &module)
            .context("Failed to instantiate WASM module")
            .map_err(InstantiationCause::ConstructionFault)?;

        if let Ok(api_version) = instance.get_typed_func::<(), i32>(&mut store, "api_version") {
            let found = api_version
                .call(&mut store, ())
                .context("`api_version` failed")
                .map_err(InstantiationCause::ConstructionFault)?;
            if found as u32 != FILTER_API_VERSION {
                return Err(InstantiationCause::UnsupportedApiVersion {
                    found: found as u32,
                    supported: FILTER_API_VERSION,
                });
            }
        }

        if let Some(init) = instance.get_func(&mut store, "_initialize") {
            init.typed::<(), ()>(&store)
                .and_then(|init| init.call(&mut store, ()))
                .context("Unit constructor `_initialize` failed")
                .map_err(InstantiationCause::ConstructionFault)?;
        }

        let imports_memory = module
            .imports()
            .any(|import| import.module() == "env" && import.name() == "memory");
        let memory = match instance.get_memory(&mut store, "memory") {
            Some(memory) => memory,
            None if imports_memory => default_memory,
            None => {
                return Err(InstantiationCause::MissingCapability(anyhow::anyhow!(
                    "WASM module must export `memory` or import `env.memory`"
                )))
            }
        };

        let filter_fn = instance
            .get_typed_func::<(i32, i32), i32>(&mut store, "filter")
            .context("WASM module must export `filter(ptr: i32, len: i32) -> i32`")
            .map_err(InstantiationCause::MissingCapability)?;

        let alloc_fn = instance.get_typed_func::<i32, i32>(&mut store, "alloc").ok();
        let dealloc_fn = instance
            .get_typed_func::<(i32, i32), ()>(&mut store, "dealloc")
            .ok();

        debug!(
            "Instantiated filter {} (alloc export: {})",
            name,
            alloc_fn.is_some()
        );

        Ok(WasmPredicate {
            name: name.to_string(),
            store,
            filter_fn,
            alloc_fn,
            dealloc_fn,
            memory,
            fuel_per_call: self.limits.fuel_per_call,
        })
    }
}

/// An instantiated filter module, usable as a [`Predicate`]
pub struct WasmPredicate {
    name: String,
    store: Store<StoreLimits>,
    filter_fn: TypedFunc<(i32, i32), i32>,
    alloc_fn: Option<TypedFunc<i32, i32>>,
    dealloc_fn: Option<TypedFunc<(i32, i32), ()>>,
    memory: Memory,
    fuel_per_call: u64,
}

impl std::fmt::Debug for WasmPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmPredicate")
            .field("name", &self.name)
            .field("fuel_per_call", &self.fuel_per_call)
            .finish_non_exhaustive()
    }
}

impl WasmPredicate {
    /// Simple name the unit was resolved under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Grow linear memory until `end` bytes are addressable
    fn ensure_capacity(&mut self, end: usize) -> Result<()> {
        let size = self.memory.data_size(&self.store);
        if end <= size {
            return Ok(());
        }
        let pages = (end - size).div_ceil(WASM_PAGE_SIZE) as u64;
        self.memory.grow(&mut self.store, pages).with_context(|| {
            format!(
                "Record ({} bytes at offset {}) exceeds WASM memory limit",
                end - RECORD_BASE as usize,
                RECORD_BASE
            )
        })?;
        Ok(())
    }

    /// Place `bytes` in linear memory, returning the pointer and whether the
    /// module's allocator owns it
    fn place(&mut self, bytes: &[u8]) -> Result<(i32, bool)> {
        let len = i32::try_from(bytes.len()).context("Record too large for WASM filter")?;
        let (ptr, owned) = match self.alloc_fn.as_ref() {
            Some(alloc) => (
                match alloc
                    .call(&mut self.store, len)
                    .context("WASM filter `alloc` failed")?
                {
                    0 => bail!("WASM filter `alloc` returned a null pointer for {} bytes", len),
                    ptr => ptr,
                },
                true,
            ),
            None => {
                self.ensure_capacity(RECORD_BASE as usize + bytes.len())?;
                (RECORD_BASE, false)
            }
        };
        self.memory
            .write(&mut self.store, ptr as u32 as usize, bytes)
            .context("Failed to write record into WASM memory")?;
        Ok((ptr, owned))
    }
}

impl Predicate for WasmPredicate {
    fn evaluate(&mut self, record: &Record<'_>) -> Result<bool> {
        // Reset fuel for this invocation
        self.store.set_fuel(self.fuel_per_call)?;

        let bytes = filter_api::encode_record(record);
        let (ptr, owned) = self.place(&bytes)?;
        let len = bytes.len() as i32;

        let verdict = self
            .filter_fn
            .call(&mut self.store, (ptr, len))
            .with_context(|| {
                format!(
                    "WASM filter `{}` failed on record {}",
                    self.name,
                    record.index()
                )
            })?;

        if owned {
            if let Some(dealloc) = self.dealloc_fn.as_ref() {
                dealloc
                    .call(&mut self.store, (ptr, len))
                    .context("WASM filter `dealloc` failed")?;
            }
        }

        Ok(verdict != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcaptrim_shared::pcap_file::pcap::PcapPacket;
    use pcaptrim_shared::pcap_file::DataLink;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn runtime() -> WasmRuntime {
        WasmRuntime::new(RuntimeLimits {
            fuel_per_call: 100_000,
            max_memory_pages: 4,
        })
        .unwrap()
    }

    fn evaluate(predicate: &mut WasmPredicate, data: &[u8]) -> Result<bool> {
        let packet = PcapPacket::new(Duration::ZERO, data.len() as u32, data);
        predicate.evaluate(&Record::new(0, DataLink::ETHERNET, packet))
    }

    // Keeps records whose captured length (offset 20) is even.
    const EVEN_LENGTH: &str = r#"
        (module
          (memory (export "memory") 1)
          (func (export "filter") (param $ptr i32) (param $len i32) (result i32)
            (i32.eqz (i32.and (i32.load offset=20 (local.get $ptr)) (i32.const 1)))))
    "#;

    #[test]
    fn test_runtime_creation() {
        let runtime = runtime();
        assert_eq!(runtime.limits().max_memory_pages, 4);
    }

    #[test]
    fn test_runtime_rejects_empty_limits() {
        let no_fuel = RuntimeLimits {
            fuel_per_call: 0,
            max_memory_pages: 4,
        };
        let no_memory = RuntimeLimits {
            fuel_per_call: 100_000,
            max_memory_pages: 0,
        };
        assert!(WasmRuntime::new(no_fuel).is_err());
        assert!(WasmRuntime::new(no_memory).is_err());
    }

    #[test]
    fn test_filter_verdicts() {
        let wasm = wat::parse_str(EVEN_LENGTH).unwrap();
        let mut predicate = runtime().instantiate("EvenLength", &wasm).unwrap();
        assert!(evaluate(&mut predicate, &[0u8; 60]).unwrap());
        assert!(!evaluate(&mut predicate, &[0u8; 61]).unwrap());
    }

    #[test]
    fn test_memory_grows_for_large_records() {
        let wasm = wat::parse_str(EVEN_LENGTH).unwrap();
        let mut predicate = runtime().instantiate("EvenLength", &wasm).unwrap();
        // Larger than the single initial page
        assert!(evaluate(&mut predicate, &vec![0u8; 100_000]).unwrap());
    }

    #[test]
    fn test_record_beyond_memory_limit_fails() {
        let wasm = wat::parse_str(EVEN_LENGTH).unwrap();
        let mut predicate = runtime().instantiate("EvenLength", &wasm).unwrap();
        assert!(evaluate(&mut predicate, &vec![0u8; 5 * WASM_PAGE_SIZE]).is_err());
    }

    #[test]
    fn test_imported_memory() {
        let wat = r#"
            (module
              (import "env" "memory" (memory 1))
              (func (export "filter") (param i32 i32) (result i32)
                (i32.load8_u offset=48 (local.get 0))))
        "#;
        let wasm = wat::parse_str(wat).unwrap();
        let mut predicate = runtime().instantiate("FirstByte", &wasm).unwrap();
        assert!(evaluate(&mut predicate, &[1, 0, 0]).unwrap());
        assert!(!evaluate(&mut predicate, &[0, 1, 1]).unwrap());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_log_from_module_with_imported_memory() {
        let wat = r#"
            (module
              (import "env" "memory" (memory 1))
              (import "env" "log" (func $log (param i32 i32)))
              (data (i32.const 0) "hello from filter")
              (func (export "filter") (param i32 i32) (result i32)
                (call $log (i32.const 0) (i32.const 17))
                (call $log (i32.const 0) (i32.const -1))
                (i32.const 1)))
        "#;
        let wasm = wat::parse_str(wat).unwrap();

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut predicate = runtime().instantiate("Chatty", &wasm).unwrap();
            assert!(evaluate(&mut predicate, &[0u8; 8]).unwrap());
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("[WASM Filter] hello from filter"));
        assert!(output.contains("ignored log call"));
    }

    #[test]
    fn test_null_alloc_is_an_error() {
        let wat = r#"
            (module
              (memory (export "memory") 1)
              (func (export "alloc") (param i32) (result i32) (i32.const 0))
              (func (export "filter") (param i32 i32) (result i32) (i32.const 1)))
        "#;
        let wasm = wat::parse_str(wat).unwrap();
        let mut predicate = runtime().instantiate("NullAlloc", &wasm).unwrap();
        assert!(evaluate(&mut predicate, &[0u8; 10]).is_err());
    }

    #[test]
    fn test_api_version_is_checked() {
        let module = |version: u32| {
            wat::parse_str(format!(
                r#"
                (module
                  (memory (export "memory") 1)
                  (func (export "api_version") (result i32) (i32.const {version}))
                  (func (export "filter") (param i32 i32) (result i32) (i32.const 1)))
                "#
            ))
            .unwrap()
        };

        assert!(runtime()
            .instantiate("Current", &module(FILTER_API_VERSION))
            .is_ok());
        let err = runtime()
            .instantiate("Future", &module(FILTER_API_VERSION + 1))
            .unwrap_err();
        assert!(matches!(
            err,
            InstantiationCause::UnsupportedApiVersion { found, .. } if found == FILTER_API_VERSION + 1
        ));
    }

    #[test]
    fn test_alloc_export_is_used() {
        // Bump allocator at 4096; the filter checks it received that pointer.
        let wat = r#"
            (module
              (memory (export "memory") 2)
              (global $freed (mut i32) (i32.const 0))
              (func (export "alloc") (param i32) (result i32) (i32.const 4096))
              (func (export "dealloc") (param i32 i32)
                (global.set $freed (i32.add (global.get $freed) (i32.const 1))))
              (func (export "filter") (param i32 i32) (result i32)
                (i32.eq (local.get 0) (i32.const 4096))))
        "#;
        let wasm = wat::parse_str(wat).unwrap();
        let mut predicate = runtime().instantiate("Bump", &wasm).unwrap();
        assert!(evaluate(&mut predicate, &[0u8; 10]).unwrap());
    }

    #[test]
    fn test_runaway_filter_runs_out_of_fuel() {
        let wat = r#"
            (module
              (memory (export "memory") 1)
              (func (export "filter") (param i32 i32) (result i32)
                (loop $spin (br $spin))
                (i32.const 1)))
        "#;
        let wasm = wat::parse_str(wat).unwrap();
        let mut predicate = runtime().instantiate("Spin", &wasm).unwrap();
        assert!(evaluate(&mut predicate, &[0u8; 4]).is_err());
    }

    #[test]
    fn test_missing_filter_export() {
        let wat = r#"(module (memory (export "memory") 1))"#;
        let wasm = wat::parse_str(wat).unwrap();
        let err = runtime().instantiate("Empty", &wasm).unwrap_err();
        assert!(matches!(err, InstantiationCause::MissingCapability(_)));
    }

    #[test]
    fn test_wrong_filter_signature() {
        let wat = r#"
            (module
              (memory (export "memory") 1)
              (func (export "filter") (param i32) (result i32) (i32.const 1)))
        "#;
        let wasm = wat::parse_str(wat).unwrap();
        let err = runtime().instantiate("OneArg", &wasm).unwrap_err();
        assert!(matches!(err, InstantiationCause::MissingCapability(_)));
    }

    #[test]
    fn test_memoryless_module() {
        let wat = r#"
            (module
              (func (export "filter") (param i32 i32) (result i32) (i32.const 1)))
        "#;
        let wasm = wat::parse_str(wat).unwrap();
        let err = runtime().instantiate("NoMemory", &wasm).unwrap_err();
        assert!(matches!(err, InstantiationCause::MissingCapability(_)));
    }

    #[test]
    fn test_constructor_fault() {
        let wat = r#"
            (module
              (memory (export "memory") 1)
              (func (export "_initialize") unreachable)
              (func (export "filter") (param i32 i32) (result i32) (i32.const 1)))
        "#;
        let wasm = wat::parse_str(wat).unwrap();
        let err = runtime().instantiate("Faulty", &wasm).unwrap_err();
        assert!(matches!(err, InstantiationCause::ConstructionFault(_)));
    }

    #[test]
    fn test_unknown_import_is_construction_fault() {
        let wat = r#"
            (module
              (import "wasi_snapshot_preview1" "fd_write" (func (param i32 i32 i32 i32) (result i32)))
              (memory (export "memory") 1)
              (func (export "filter") (param i32 i32) (result i32) (i32.const 1)))
        "#;
        let wasm = wat::parse_str(wat).unwrap();
        let err = runtime().instantiate("Wasi", &wasm).unwrap_err();
        assert!(matches!(err, InstantiationCause::ConstructionFault(_)));
    }

    #[test]
    fn test_declared_module_name_must_match() {
        let wat = r#"
            (module $Other
              (memory (export "memory") 1)
              (func (export "filter") (param i32 i32) (result i32) (i32.const 1)))
        "#;
        let wasm = wat::parse_str(wat).unwrap();
        let err = runtime().instantiate("UdpOnly", &wasm).unwrap_err();
        assert!(matches!(err, InstantiationCause::NameMismatch { .. }));
        assert!(runtime().instantiate("Other", &wasm).is_ok());
    }

    #[test]
    fn test_invalid_module_bytes() {
        let err = runtime().instantiate("Junk", b"not wasm").unwrap_err();
        assert!(matches!(err, InstantiationCause::InvalidModule(_)));
    }
}
