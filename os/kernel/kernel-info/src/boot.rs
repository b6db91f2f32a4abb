//! # Kernel Boot Information

use kernel_memory_addresses::PhysicalAddress;

/// Classification of a physical memory range.
///
/// Fixed once the boot memory map has been parsed; only [`Usable`](Self::Usable)
/// frames ever take part in allocation.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RegionKind {
    Usable = 0,
    Reserved = 1,
    Kernel = 2,
    Bad = 3,
}

impl RegionKind {
    /// Classifies a UEFI `EFI_MEMORY_TYPE` as seen after `ExitBootServices`.
    #[must_use]
    pub const fn from_uefi_type(ty: u32) -> Self {
        match ty {
            // BootServicesCode, BootServicesData, ConventionalMemory
            3 | 4 | 7 => Self::Usable,
            // LoaderCode, LoaderData
            1 | 2 => Self::Kernel,
            // UnusableMemory
            8 => Self::Bad,
            _ => Self::Reserved,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Usable => "usable",
            Self::Reserved => "reserved",
            Self::Kernel => "kernel",
            Self::Bad => "bad",
        }
    }
}

/// One entry of the physical memory map.
#[repr(C)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryRegion {
    pub base: PhysicalAddress,
    /// Length in **bytes**.
    pub length: u64,
    pub kind: RegionKind,
}

impl MemoryRegion {
    #[must_use]
    pub const fn new(base: u64, length: u64, kind: RegionKind) -> Self {
        Self {
            base: PhysicalAddress::new(base),
            length,
            kind,
        }
    }

    #[must_use]
    pub const fn usable(base: u64, length: u64) -> Self {
        Self::new(base, length, RegionKind::Usable)
    }

    /// Exclusive end address, or `None` if it does not fit a `u64`.
    #[must_use]
    pub const fn end(&self) -> Option<u64> {
        self.base.as_u64().checked_add(self.length)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// A blob loaded by the boot stage next to the kernel (e.g. a driver module).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BootModule<'a> {
    pub path: &'a str,
    pub addr: PhysicalAddress,
    /// Size in **bytes**.
    pub size: u64,
}

impl<'a> BootModule<'a> {
    #[must_use]
    pub const fn new(path: &'a str, addr: PhysicalAddress, size: u64) -> Self {
        Self { path, addr, size }
    }

    /// The file name part of [`path`](Self::path).
    #[must_use]
    pub fn file_name(&self) -> &'a str {
        self.path.rsplit('/').next().unwrap_or(self.path)
    }
}
