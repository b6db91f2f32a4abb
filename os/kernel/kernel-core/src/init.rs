use crate::fatal::escalate;
use crate::stage::{self, InitStage};
use kernel_alloc::heap;
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_alloc::pmm::{self, Pmm, PmmStats};
use kernel_errors::{KernelError, Result};
use kernel_info::boot::{BootModule, MemoryRegion};
use kernel_modules::{ElfModuleLoader, ExportTable, dynload, exports, modmem};
use log::{info, warn};

static ELF_LOADER: ElfModuleLoader = ElfModuleLoader;

/// Brings up the PMM and the slab heap.
///
/// The PMM bitmap is carved out of the first usable frames that can hold
/// it without touching a boot module. The bitmap and every boot module are
/// reserved right after the PMM comes up, before the heap takes its first
/// page.
///
/// # Errors
/// [`KernelError::BadArgs`] when called a second time, otherwise whatever
/// sizing, placing or initializing the PMM and heap report.
///
/// # Safety
/// `regions` must describe physical memory that `mapper` maps for the rest
/// of the kernel's lifetime, and nothing but `modules` may be using the
/// usable regions.
pub unsafe fn init_memory(
    regions: &[MemoryRegion],
    modules: &[BootModule<'_>],
    mapper: &'static dyn PhysMapper,
) -> Result<PmmStats> {
    if pmm::is_initialized() {
        warn!("core: memory is already initialized");
        return Err(KernelError::BadArgs);
    }
    let words = Pmm::bitmap_words_for(regions)?;
    let bitmap_pa = Pmm::place_bitmap(regions, words, modules)?;
    let bitmap_va = mapper.phys_to_virt(bitmap_pa);
    // SAFETY: the frames are usable, unused and mapped per the contract;
    // the PMM reserves them below before anything else can allocate.
    let bitmap: &'static mut [u64] =
        unsafe { core::slice::from_raw_parts_mut(bitmap_va.as_ptr::<u64>(), words) };

    pmm::init(regions, bitmap)?;
    pmm::reserve_range(bitmap_pa, (words * size_of::<u64>()) as u64)?;
    for module in modules.iter().filter(|m| m.size != 0) {
        // Outside the tracked span; loading it will fail later.
        if pmm::reserve_range(module.addr, module.size).is_err() {
            warn!("core: boot module {} at {} is not in tracked memory", module.path, module.addr);
        }
    }
    escalate(heap::init(mapper))?;

    let stats = pmm::stats()?;
    stage::advance(InitStage::Memory);
    info!(
        "core: memory online, bitmap at {bitmap_pa} ({words} words), {} KiB free",
        stats.free_bytes() / 1024
    );
    Ok(stats)
}

/// Brings up module loading: the module windows, the export table and the
/// built-in ELF loader.
///
/// # Errors
/// [`KernelError::NotInit`] before [`init_memory`],
/// [`KernelError::BadArgs`] when called a second time.
pub fn init_modules(exports: ExportTable<'static>) -> Result<()> {
    if stage::stage() < InitStage::Memory {
        warn!("core: module loading needs memory to be initialized first");
        return Err(KernelError::NotInit);
    }
    modmem::init()?;
    exports::init(exports)?;
    dynload::register(&ELF_LOADER)?;
    stage::advance(InitStage::Modules);
    info!("core: module loading online");
    Ok(())
}
