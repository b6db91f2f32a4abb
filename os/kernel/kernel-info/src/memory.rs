//! # Memory Layout

/// Size of a physical frame and of the smallest mapping granule.
pub const PAGE_SIZE: u64 = 4096;

/// `log2(PAGE_SIZE)`.
pub const PAGE_SHIFT: u32 = 12;

/// End of userspace VA range after which Kernel space begins.
pub const LAST_USERSPACE_ADDRESS: u64 = 0xffff_0000_0000_0000;

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything mapped at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

/// Where the kernel executes (VMA).
pub const KERNEL_BASE: u64 = 0xffff_ffff_8000_0000;

/// Base of the virtual window module code is placed in.
pub const MODULE_TEXT_BASE: u64 = 0xffff_ffff_9000_0000;

/// Size of the module code window (128 MiB).
pub const MODULE_TEXT_SIZE: u64 = 0x0800_0000;

/// Base of the virtual window module data is placed in.
pub const MODULE_DATA_BASE: u64 = 0xffff_ffff_9800_0000;

/// Size of the module data window (128 MiB).
pub const MODULE_DATA_SIZE: u64 = 0x0800_0000;

/// Granularity of module window allocations.
pub const MODULE_ALIGN: u64 = PAGE_SIZE;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(1 << PAGE_SHIFT == PAGE_SIZE);
    assert!(HHDM_BASE >= LAST_USERSPACE_ADDRESS);
    assert!(KERNEL_BASE > HHDM_BASE);
    assert!(MODULE_TEXT_BASE > KERNEL_BASE);
    assert!(MODULE_TEXT_BASE + MODULE_TEXT_SIZE <= MODULE_DATA_BASE);
    assert!(MODULE_DATA_BASE.checked_add(MODULE_DATA_SIZE).is_some());
    assert!(MODULE_TEXT_BASE.is_multiple_of(MODULE_ALIGN));
    assert!(MODULE_DATA_BASE.is_multiple_of(MODULE_ALIGN));
};
