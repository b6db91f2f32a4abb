//! Boot module loading and unloading.
//!
//! A loaded module's [`ModuleRecord`] lives in heap memory owned by this
//! file; the registry only links it. Unloading unlinks the record and frees
//! that memory. Module address space is never given back.

use crate::fatal::escalate;
use crate::stage::{self, InitStage};
use core::ptr::NonNull;
use kernel_alloc::heap;
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_alloc::pmm;
use kernel_errors::{KernelError, Result};
use kernel_info::boot::BootModule;
use kernel_modules::{ModuleImage, ModuleInfo, ModuleRecord, dynload, registry};
use log::{info, warn};

/// Outcome of [`load_boot_modules`].
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct BootLoadReport {
    pub loaded: usize,
    pub failed: usize,
}

fn require_modules() -> Result<()> {
    if stage::stage() < InitStage::Modules {
        return Err(KernelError::NotInit);
    }
    Ok(())
}

/// Moves `record` into heap memory and links it into the registry.
fn store(record: ModuleRecord) -> Result<&'static ModuleRecord> {
    let ptr = escalate(heap::allocate(size_of::<ModuleRecord>()))?.cast::<ModuleRecord>();
    // SAFETY: fresh, 16-byte aligned storage of the right size.
    unsafe { ptr.write(record) };
    // SAFETY: initialized above; only `release` ends its life.
    let stored: &'static ModuleRecord = unsafe { ptr.as_ref() };
    if let Err(e) = registry::add(stored) {
        // SAFETY: never linked, so nothing else refers to it.
        unsafe { release(ptr)? };
        return Err(e);
    }
    Ok(stored)
}

/// Drops a record and returns its storage to the heap.
///
/// # Safety
/// `ptr` must come from [`store`] and be unlinked.
unsafe fn release(ptr: NonNull<ModuleRecord>) -> Result<()> {
    // SAFETY: per contract.
    unsafe {
        ptr.drop_in_place();
        escalate(heap::free(ptr.cast()))
    }
}

/// Loads one boot module and registers it under its file name.
///
/// The frames holding the image are reserved in the PMM first so they are
/// never handed out while the module may still refer to them.
///
/// # Errors
/// [`KernelError::NotInit`] before [`init_modules`](crate::init_modules),
/// [`KernelError::BadArgs`] if a module of the same name is loaded, and
/// anything reserving, selecting, loading or storing reports.
///
/// # Safety
/// The module's frames must be mapped through `mapper` for the kernel's
/// lifetime and hold the image the boot stage placed there.
pub unsafe fn load_boot_module(module: &BootModule<'_>, mapper: &impl PhysMapper) -> Result<ModuleInfo> {
    require_modules()?;
    // SAFETY: forwarded from the caller.
    let image = unsafe { ModuleImage::from_boot_module(module, mapper)? };
    if registry::find(image.name).is_ok() {
        warn!("core: module {} is already loaded", image.name);
        return Err(KernelError::BadArgs);
    }
    pmm::reserve_range(module.addr, module.size)?;
    let record = escalate(dynload::load(&image))?;
    let stored = store(record)?;
    Ok(*stored.info())
}

/// Loads every module in `modules`, logging and skipping those that fail.
///
/// # Safety
/// As [`load_boot_module`], for every module.
pub unsafe fn load_boot_modules(modules: &[BootModule<'_>], mapper: &impl PhysMapper) -> BootLoadReport {
    let mut report = BootLoadReport::default();
    for module in modules {
        // SAFETY: forwarded from the caller.
        match unsafe { load_boot_module(module, mapper) } {
            Ok(info) => {
                info!("core: loaded {} via {}", info.name, info.loader);
                report.loaded += 1;
            }
            Err(e) => {
                warn!("core: skipping boot module {}: {e}", module.path);
                report.failed += 1;
            }
        }
    }
    info!(
        "core: boot modules: {} loaded, {} failed",
        report.loaded, report.failed
    );
    report
}

/// Unregisters the named module and frees its record.
///
/// # Errors
/// [`KernelError::NotInit`] before [`init_modules`](crate::init_modules),
/// [`KernelError::NoSuch`] if no such module is loaded.
pub fn unload_module(name: &str) -> Result<ModuleInfo> {
    require_modules()?;
    let record = registry::remove_by_name(name)?;
    let info = *record.info();
    // SAFETY: every registered record came from `store`, and it was just
    // unlinked.
    unsafe { release(NonNull::from(record))? };
    info!("core: unloaded {}", info.name);
    Ok(info)
}
