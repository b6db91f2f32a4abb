//! The kernel-wide PMM instance.

use super::{Pmm, PmmStats};
use crate::PageSource;
use kernel_errors::{KernelError, Result};
use kernel_info::boot::MemoryRegion;
use kernel_memory_addresses::PhysicalAddress;
use kernel_sync::{InitCell, SpinLock};
use log::{info, warn};

static PMM: InitCell<SpinLock<Pmm<'static>>> = InitCell::new();

/// Initializes the kernel PMM. Must run before any other memory subsystem.
///
/// # Errors
/// Everything [`Pmm::new`] reports, or [`KernelError::BadArgs`] if the PMM
/// is already initialized.
pub fn init(regions: &[MemoryRegion], bitmap: &'static mut [u64]) -> Result<PmmStats> {
    if PMM.is_initialized() {
        warn!("PMM: already initialized");
        return Err(KernelError::BadArgs);
    }
    let pmm = Pmm::new(regions, bitmap)?;
    let stats = pmm.stats();
    PMM.init(SpinLock::new(pmm))
        .map_err(|_| KernelError::BadArgs)?;
    info!(
        "PMM: online, {} of {} pages free",
        stats.free_pages, stats.total_pages
    );
    Ok(stats)
}

#[must_use]
pub fn is_initialized() -> bool {
    PMM.is_initialized()
}

/// Runs `f` on the kernel PMM with its lock held and interrupts masked.
pub fn with_pmm<R>(f: impl FnOnce(&mut Pmm<'static>) -> R) -> Result<R> {
    let pmm = PMM.get().ok_or(KernelError::NotInit)?;
    Ok(pmm.with_lock(f))
}

pub fn alloc_page() -> Result<PhysicalAddress> {
    with_pmm(Pmm::alloc_page)?
}

pub fn free_page(pa: PhysicalAddress) -> Result<()> {
    with_pmm(|pmm| pmm.free_page(pa))?
}

pub fn reserve_range(base: PhysicalAddress, len: u64) -> Result<u64> {
    with_pmm(|pmm| pmm.reserve_range(base, len))?
}

pub fn stats() -> Result<PmmStats> {
    with_pmm(|pmm| pmm.stats())
}

/// [`PageSource`] handle for the kernel PMM.
#[derive(Debug, Default, Copy, Clone)]
pub struct GlobalPmm;

impl PageSource for GlobalPmm {
    fn alloc_page(&mut self) -> Result<PhysicalAddress> {
        alloc_page()
    }

    fn free_page(&mut self, pa: PhysicalAddress) -> Result<()> {
        free_page(pa)
    }
}
