//! # Kernel export table
//!
//! The symbols the kernel makes available to loadable modules. Entries are
//! fixed at build time: either collected by the linker into the `.kexports`
//! section (see [`kexport!`](crate::kexport)), whose bounds the linker script
//! marks with `__kexports_start` and `__kexports_end`, or given as a plain
//! `static` slice.
//!
//! The table is never written at runtime and needs no lock. Lookups are a
//! linear, case-sensitive scan returning the first match; module loading is
//! rare enough for that to be fine.
//!
//! ```rust
//! use kernel_modules::exports::{ExportTable, KExport};
//! use kernel_errors::KernelError;
//!
//! fn kprint() {}
//! static EXPORTS: [KExport; 1] = [KExport::new("kprint", kprint as *const ())];
//!
//! let table = ExportTable::new(&EXPORTS);
//! assert_eq!(table.lookup("kprint").unwrap().as_u64(), kprint as usize as u64);
//! assert_eq!(table.lookup("kprintf"), Err(KernelError::NoSuch));
//! ```

use core::ffi::{CStr, c_char};
use kernel_errors::{KernelError, Result};
use kernel_memory_addresses::VirtualAddress;
use kernel_sync::InitCell;
use log::{debug, info, warn};

/// One exported kernel symbol.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct KExport {
    name: &'static str,
    addr: *const (),
}

// SAFETY: entries are immutable and only describe addresses.
unsafe impl Sync for KExport {}
unsafe impl Send for KExport {}

impl KExport {
    #[must_use]
    pub const fn new(name: &'static str, addr: *const ()) -> Self {
        Self { name, addr }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn addr(&self) -> VirtualAddress {
        VirtualAddress::from_ptr(self.addr)
    }
}

/// Places a [`KExport`] for a kernel function into the `.kexports` section.
///
/// ```rust,ignore
/// pub extern "C" fn kmalloc(size: usize) -> *mut u8 { /* ... */ }
/// kernel_modules::kexport!(kmalloc);
/// ```
#[macro_export]
macro_rules! kexport {
    ($sym:ident) => {
        const _: () = {
            #[used]
            #[unsafe(link_section = ".kexports")]
            static EXPORT: $crate::exports::KExport =
                $crate::exports::KExport::new(stringify!($sym), $sym as *const ());
        };
    };
}

/// Read-only view of the export entries.
#[derive(Debug, Copy, Clone)]
pub struct ExportTable<'t> {
    entries: &'t [KExport],
}

impl<'t> ExportTable<'t> {
    #[must_use]
    pub const fn new(entries: &'t [KExport]) -> Self {
        Self { entries }
    }

    /// Builds the table from its start and end sentinels.
    ///
    /// # Errors
    /// [`KernelError::BadArgs`] if `start` is null or misaligned, `end`
    /// precedes `start`, or the span is not a whole number of entries.
    ///
    /// # Safety
    /// `[start, end)` must be a contiguous, initialized and immutable array of
    /// [`KExport`] that lives for `'t`.
    pub unsafe fn from_bounds(start: *const KExport, end: *const KExport) -> Result<Self> {
        if start.is_null() || !start.is_aligned() || end < start {
            return Err(KernelError::BadArgs);
        }
        let bytes = end as usize - start as usize;
        if !bytes.is_multiple_of(size_of::<KExport>()) {
            warn!("exports: table span of {bytes} bytes is not a whole number of entries");
            return Err(KernelError::BadArgs);
        }
        let len = bytes / size_of::<KExport>();
        // SAFETY: upheld by the caller.
        Ok(Self::new(unsafe { core::slice::from_raw_parts(start, len) }))
    }

    /// Exact-match lookup.
    ///
    /// # Errors
    /// [`KernelError::NoSuch`] if no entry is named `name`, which includes
    /// the empty name.
    pub fn lookup(&self, name: &str) -> Result<VirtualAddress> {
        if name.is_empty() {
            return Err(KernelError::NoSuch);
        }
        let export = self
            .entries
            .iter()
            .find(|e| e.name == name)
            .ok_or(KernelError::NoSuch)?;
        debug!("exports: {name} -> {}", export.addr());
        Ok(export.addr())
    }

    /// Lookup by a name taken from a module image (e.g. an ELF string table).
    ///
    /// # Errors
    /// [`KernelError::BadArgs`] if `name` is not UTF-8, otherwise as
    /// [`lookup`](Self::lookup).
    pub fn lookup_bytes(&self, name: &[u8]) -> Result<VirtualAddress> {
        let name = core::str::from_utf8(name).map_err(|_| KernelError::BadArgs)?;
        self.lookup(name)
    }

    /// Lookup by a NUL-terminated C string.
    ///
    /// # Errors
    /// [`KernelError::BadArgs`] for a null pointer or a name that is not
    /// UTF-8, otherwise as [`lookup`](Self::lookup).
    ///
    /// # Safety
    /// A non-null `name` must point to a NUL-terminated string.
    pub unsafe fn lookup_cstr(&self, name: *const c_char) -> Result<VirtualAddress> {
        if name.is_null() {
            return Err(KernelError::BadArgs);
        }
        // SAFETY: non-null and NUL-terminated per contract.
        let name = unsafe { CStr::from_ptr(name) };
        self.lookup_bytes(name.to_bytes())
    }

    pub fn iter(&self) -> impl Iterator<Item = &'t KExport> + 't {
        self.entries.iter()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Logs every entry.
    pub fn dump_all(&self) {
        info!("exports: {} symbols", self.entries.len());
        for (i, e) in self.entries.iter().enumerate() {
            info!("exports: [{i:4}] {} {}", e.addr(), e.name);
        }
    }
}

impl ExportTable<'static> {
    /// The table the linker collected into `.kexports`.
    #[cfg(target_os = "none")]
    pub fn linked() -> Result<Self> {
        unsafe extern "C" {
            static __kexports_start: u8;
            static __kexports_end: u8;
        }
        // SAFETY: the linker script brackets `.kexports` with both symbols.
        unsafe {
            Self::from_bounds(
                (&raw const __kexports_start).cast(),
                (&raw const __kexports_end).cast(),
            )
        }
    }
}

static EXPORTS: InitCell<ExportTable<'static>> = InitCell::new();

/// Publishes the kernel's export table.
///
/// # Errors
/// [`KernelError::BadArgs`] if called twice.
pub fn init(table: ExportTable<'static>) -> Result<()> {
    let table = EXPORTS.init(table).map_err(|_| {
        warn!("exports: already initialized");
        KernelError::BadArgs
    })?;
    info!("exports: {} kernel symbols available to modules", table.len());
    Ok(())
}

/// The kernel's export table.
pub fn table() -> Result<&'static ExportTable<'static>> {
    EXPORTS.get().ok_or(KernelError::NotInit)
}

pub fn lookup(name: &str) -> Result<VirtualAddress> {
    table()?.lookup(name)
}
