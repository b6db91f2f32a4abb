//! # Capacity Limits
//!
//! Fixed-size tables used where no allocator is available yet.

/// Maximum number of entries in the boot memory map the PMM keeps.
pub const MAX_MEMORY_REGIONS: usize = 64;

/// Maximum number of registered dynamic loaders.
pub const MAX_LOADERS: usize = 8;

/// Maximum length in bytes of a module or loader name.
pub const MODULE_NAME_MAX: usize = 48;

const _: () = {
    assert!(MAX_MEMORY_REGIONS > 0);
    assert!(MAX_LOADERS > 0);
    assert!(MODULE_NAME_MAX > 0);
};
