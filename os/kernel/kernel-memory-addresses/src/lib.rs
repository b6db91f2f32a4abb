//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw addresses handed around by the physical
//! page allocator, the slab heap and the module loader.
//!
//! | Wrapper | Meaning |
//! |----------|----------|
//! | [`PhysicalAddress`] | A physical frame address as reported by the boot memory map. |
//! | [`VirtualAddress`] | An address in the kernel's (translated) address space. |
//!
//! Both are `#[repr(transparent)]` over `u64` and never mix implicitly; going
//! from one to the other requires a physical mapper.
//!
//! ## Alignment helpers
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! assert_eq!(align_up(0x1001, 0x1000), Some(0x2000));
//! assert_eq!(align_down(0x1fff, 0x1000), 0x1000);
//! assert!(is_aligned(0x3000, 0x1000));
//! assert_eq!(align_up(u64::MAX, 0x1000), None);
//!
//! let pa = PhysicalAddress::new(0x0010_2042);
//! assert_eq!(pa.align_down(0x1000).as_u64(), 0x0010_2000);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod physical_address;
mod virtual_address;

pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;

/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two. Returns `None` if the result does not fit
/// into a `u64`.
#[inline]
#[must_use]
pub const fn align_up(value: u64, align: u64) -> Option<u64> {
    debug_assert!(align.is_power_of_two());
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// Rounds `value` down to a multiple of `align` (power of two).
#[inline]
#[must_use]
pub const fn align_down(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    value & !(align - 1)
}

/// Whether `value` is a multiple of `align` (power of two).
#[inline]
#[must_use]
pub const fn is_aligned(value: u64, align: u64) -> bool {
    value & (align - 1) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_next_boundary() {
        assert_eq!(align_up(0, 0x1000), Some(0));
        assert_eq!(align_up(1, 0x1000), Some(0x1000));
        assert_eq!(align_up(0x1000, 0x1000), Some(0x1000));
        assert_eq!(align_up(0x1001, 16), Some(0x1010));
    }

    #[test]
    fn align_up_detects_overflow() {
        assert_eq!(align_up(u64::MAX - 10, 0x1000), None);
        assert_eq!(align_up(u64::MAX, 1), Some(u64::MAX));
    }

    #[test]
    fn align_down_and_is_aligned() {
        assert_eq!(align_down(0x1fff, 0x1000), 0x1000);
        assert_eq!(align_down(0x2000, 0x1000), 0x2000);
        assert!(is_aligned(0, 0x1000));
        assert!(!is_aligned(0x10, 0x1000));
    }

    #[test]
    fn address_wrappers_format_as_hex() {
        let pa = PhysicalAddress::new(0x1234_5000);
        let va = VirtualAddress::new(0xffff_ffff_9000_0000);
        assert_eq!(format!("{pa}"), "0x0000000012345000");
        assert_eq!(format!("{pa:?}"), "PA(0x0000000012345000)");
        assert_eq!(format!("{va:?}"), "VA(0xFFFFFFFF90000000)");
    }

    #[test]
    fn pointer_round_trip_keeps_address() {
        let value = 7_u32;
        let va = VirtualAddress::from_ptr(&raw const value);
        assert_eq!(va.as_ptr::<u32>().cast_const(), &raw const value);
        assert!(!va.is_null());
        assert!(VirtualAddress::zero().is_null());
    }
}
