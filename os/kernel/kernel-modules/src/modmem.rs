//! # Module memory windows
//!
//! Module code and data live in two fixed, disjoint 128 MiB windows of
//! kernel virtual address space. Each window is a bump allocator: a cursor
//! that only moves forward in page-sized steps.
//!
//! Nothing is ever given back. Unloading a module leaves its ranges
//! reserved, so the windows bound the total code and data of all modules
//! ever loaded during one boot. [`ModuleMemory::remaining`] reports how
//! much is left.
//!
//! The windows only hand out addresses; backing them with frames and page
//! table entries is the job of whoever consumes the range.

use kernel_errors::{KernelError, Result};
use kernel_info::memory::{
    MODULE_ALIGN, MODULE_DATA_BASE, MODULE_DATA_SIZE, MODULE_TEXT_BASE, MODULE_TEXT_SIZE,
};
use kernel_memory_addresses::{VirtualAddress, align_up};
use kernel_sync::{InitCell, SpinLock};
use log::{debug, info, warn};

/// A half-open range of virtual addresses.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct VaRange {
    pub start: VirtualAddress,
    pub len: u64,
}

impl VaRange {
    pub const EMPTY: Self = Self {
        start: VirtualAddress::zero(),
        len: 0,
    };

    #[must_use]
    pub const fn new(start: VirtualAddress, len: u64) -> Self {
        Self { start, len }
    }

    #[must_use]
    pub const fn end(&self) -> VirtualAddress {
        VirtualAddress::new(self.start.as_u64() + self.len)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn contains(&self, va: VirtualAddress) -> bool {
        va.as_u64() >= self.start.as_u64() && va.as_u64() - self.start.as_u64() < self.len
    }
}

/// One bump-allocated window.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ModuleWindow {
    base: VirtualAddress,
    size: u64,
    /// Bytes handed out so far.
    used: u64,
}

impl ModuleWindow {
    /// # Errors
    /// [`KernelError::BadArgs`] for an empty window or a base not aligned to
    /// [`MODULE_ALIGN`]; [`KernelError::Overflow`] if the window wraps.
    pub const fn new(base: u64, size: u64) -> Result<Self> {
        if size == 0 || !base.is_multiple_of(MODULE_ALIGN) || !size.is_multiple_of(MODULE_ALIGN) {
            return Err(KernelError::BadArgs);
        }
        if base.checked_add(size).is_none() {
            return Err(KernelError::Overflow);
        }
        Ok(Self {
            base: VirtualAddress::new(base),
            size,
            used: 0,
        })
    }

    /// Reserves `size` bytes rounded up to [`MODULE_ALIGN`] and returns the
    /// start of the reservation.
    ///
    /// # Errors
    /// - [`KernelError::BadArgs`] for `size == 0`.
    /// - [`KernelError::Overflow`] if rounding `size` overflows.
    /// - [`KernelError::TooMany`] if the window cannot fit the request. The
    ///   cursor is left untouched.
    pub fn allocate(&mut self, size: u64) -> Result<VirtualAddress> {
        if size == 0 {
            return Err(KernelError::BadArgs);
        }
        let aligned = align_up(size, MODULE_ALIGN).ok_or(KernelError::Overflow)?;
        if aligned > self.remaining() {
            warn!(
                "modmem: window at {} exhausted: {aligned:#x} bytes requested, {:#x} left",
                self.base,
                self.remaining()
            );
            return Err(KernelError::TooMany);
        }
        let start = self.cursor();
        self.used += aligned;
        Ok(start)
    }

    #[must_use]
    pub const fn base(&self) -> VirtualAddress {
        self.base
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Next address that will be handed out.
    #[must_use]
    pub const fn cursor(&self) -> VirtualAddress {
        VirtualAddress::new(self.base.as_u64() + self.used)
    }

    #[must_use]
    pub const fn used(&self) -> u64 {
        self.used
    }

    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.size - self.used
    }

    #[must_use]
    pub const fn range(&self) -> VaRange {
        VaRange::new(self.base, self.size)
    }

    const fn overlaps(&self, other: &Self) -> bool {
        self.base.as_u64() < other.base.as_u64() + other.size
            && other.base.as_u64() < self.base.as_u64() + self.size
    }
}

/// The text and data windows.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ModuleMemory {
    text: ModuleWindow,
    data: ModuleWindow,
}

/// Remaining capacity of both windows.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ModuleMemoryRemaining {
    pub text: u64,
    pub data: u64,
}

impl ModuleMemory {
    /// # Errors
    /// [`KernelError::BadArgs`] if the windows overlap.
    pub const fn new(text: ModuleWindow, data: ModuleWindow) -> Result<Self> {
        if text.overlaps(&data) {
            return Err(KernelError::BadArgs);
        }
        Ok(Self { text, data })
    }

    /// The fixed kernel layout: text at `0xffffffff90000000`, data at
    /// `0xffffffff98000000`, 128 MiB each.
    #[must_use]
    pub const fn kernel_default() -> Self {
        Self {
            text: ModuleWindow {
                base: VirtualAddress::new(MODULE_TEXT_BASE),
                size: MODULE_TEXT_SIZE,
                used: 0,
            },
            data: ModuleWindow {
                base: VirtualAddress::new(MODULE_DATA_BASE),
                size: MODULE_DATA_SIZE,
                used: 0,
            },
        }
    }

    pub fn allocate_text(&mut self, size: u64) -> Result<VirtualAddress> {
        let va = self.text.allocate(size)?;
        debug!("modmem: text {va} (+{size:#x})");
        Ok(va)
    }

    pub fn allocate_data(&mut self, size: u64) -> Result<VirtualAddress> {
        let va = self.data.allocate(size)?;
        debug!("modmem: data {va} (+{size:#x})");
        Ok(va)
    }

    #[must_use]
    pub const fn text_window(&self) -> &ModuleWindow {
        &self.text
    }

    #[must_use]
    pub const fn data_window(&self) -> &ModuleWindow {
        &self.data
    }

    #[must_use]
    pub const fn remaining(&self) -> ModuleMemoryRemaining {
        ModuleMemoryRemaining {
            text: self.text.remaining(),
            data: self.data.remaining(),
        }
    }
}

static MODMEM: InitCell<SpinLock<ModuleMemory>> = InitCell::new();

/// Sets up the kernel's module windows with their cursors at the bases.
///
/// # Errors
/// [`KernelError::BadArgs`] if called twice.
pub fn init() -> Result<()> {
    MODMEM
        .init(SpinLock::new(ModuleMemory::kernel_default()))
        .map_err(|_| {
            warn!("modmem: already initialized");
            KernelError::BadArgs
        })?;
    info!(
        "modmem: text window {} (+{MODULE_TEXT_SIZE:#x}), data window {} (+{MODULE_DATA_SIZE:#x})",
        VirtualAddress::new(MODULE_TEXT_BASE),
        VirtualAddress::new(MODULE_DATA_BASE)
    );
    Ok(())
}

#[must_use]
pub fn is_initialized() -> bool {
    MODMEM.is_initialized()
}

/// Runs `f` with the module windows locked.
pub fn with_module_memory<R>(f: impl FnOnce(&mut ModuleMemory) -> R) -> Result<R> {
    let mm = MODMEM.get().ok_or(KernelError::NotInit)?;
    Ok(mm.with_lock(f))
}

pub fn allocate_text(size: u64) -> Result<VirtualAddress> {
    with_module_memory(|mm| mm.allocate_text(size))?
}

pub fn allocate_data(size: u64) -> Result<VirtualAddress> {
    with_module_memory(|mm| mm.allocate_data(size))?
}

pub fn remaining() -> Result<ModuleMemoryRemaining> {
    with_module_memory(|mm| mm.remaining())
}
