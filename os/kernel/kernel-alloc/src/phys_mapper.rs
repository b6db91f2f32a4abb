//! # Physical-to-virtual translation
//!
//! The PMM deals in physical frame addresses, but code can only dereference
//! virtual ones. A [`PhysMapper`] converts between the two. Which strategy
//! applies depends on where the code runs:
//!
//! - [`HhdmPhysMapper`]: the kernel's higher-half direct map, where every
//!   physical address is visible at `HHDM_BASE + pa`.
//! - [`IdentityPhysMapper`]: identity-mapped memory (early boot, and hosted
//!   tests where "physical" frames are ordinary host buffers).
//!
//! ```rust
//! use kernel_alloc::phys_mapper::{HhdmPhysMapper, PhysMapper};
//! use kernel_info::memory::HHDM_BASE;
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! let mapper = HhdmPhysMapper::default();
//! let va = mapper.phys_to_virt(PhysicalAddress::new(0x1234_0000));
//! assert_eq!(va.as_u64(), HHDM_BASE + 0x1234_0000);
//! assert_eq!(mapper.virt_to_phys(va).as_u64(), 0x1234_0000);
//! ```

use kernel_info::memory::HHDM_BASE;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Translation between physical frames and the virtual addresses they are
/// reachable at.
///
/// Implementations must be bijective over the memory they cover: for every
/// covered `pa`, `virt_to_phys(phys_to_virt(pa)) == pa`.
pub trait PhysMapper: Send + Sync {
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress;
    fn virt_to_phys(&self, va: VirtualAddress) -> PhysicalAddress;
}

impl<T: PhysMapper + ?Sized> PhysMapper for &T {
    #[inline]
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
        (**self).phys_to_virt(pa)
    }

    #[inline]
    fn virt_to_phys(&self, va: VirtualAddress) -> PhysicalAddress {
        (**self).virt_to_phys(va)
    }
}

/// [`PhysMapper`] for kernels with a higher-half direct map (HHDM).
///
/// # Safety
/// The HHDM mapping must be present and cover the referenced physical range
/// before any translated address is dereferenced.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HhdmPhysMapper {
    offset: u64,
}

impl Default for HhdmPhysMapper {
    fn default() -> Self {
        Self::new(HHDM_BASE)
    }
}

impl HhdmPhysMapper {
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }
}

impl PhysMapper for HhdmPhysMapper {
    #[inline]
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
        VirtualAddress::new(self.offset.wrapping_add(pa.as_u64()))
    }

    #[inline]
    fn virt_to_phys(&self, va: VirtualAddress) -> PhysicalAddress {
        PhysicalAddress::new(va.as_u64().wrapping_sub(self.offset))
    }
}

/// [`PhysMapper`] for identity-mapped memory: `va == pa`.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct IdentityPhysMapper;

impl PhysMapper for IdentityPhysMapper {
    #[inline]
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
        VirtualAddress::new(pa.as_u64())
    }

    #[inline]
    fn virt_to_phys(&self, va: VirtualAddress) -> PhysicalAddress {
        PhysicalAddress::new(va.as_u64())
    }
}
