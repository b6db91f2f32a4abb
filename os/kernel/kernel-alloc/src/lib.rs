//! # Kernel Memory Allocation
//!
//! Physical page allocation and the small-object kernel heap built on top
//! of it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Kernel Heap (KHeap)                 │
//! │    • 8 size classes, 16 B .. 2 KiB                  │
//! │    • first class whose ceiling fits the request     │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │                  Slab Caches                        │
//! │    • one page per slab, header + fixed-size cells   │
//! │    • magic-checked headers and free cells           │
//! └─────────────────┬───────────────────────────────────┘
//!                   │  PhysMapper (phys → virt)
//! ┌─────────────────▼───────────────────────────────────┐
//! │           Physical Page Allocator (PMM)             │
//! │    • bitmap, one bit per 4 KiB frame                │
//! │    • region classification fixed at boot            │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`pmm`]: the bitmap frame allocator and the kernel-wide instance.
//! - [`phys_mapper`]: translating frames to addressable memory.
//! - [`slab`]: slab layout, carving and per-class caches.
//! - [`heap`]: size-class selection, the kernel-wide heap and its
//!   `GlobalAlloc` adapter.
//!
//! ## Initialization order
//!
//! [`pmm::init`] must complete before [`heap::init`]; the heap refuses to
//! come up otherwise. Both are one-shot.
//!
//! ## Locking
//!
//! The kernel-wide PMM and heap are each guarded by a
//! [`SpinLock`](kernel_sync::SpinLock) taken with interrupts masked.
//! When both are needed the heap lock is taken first.
//!
//! ## Errors
//!
//! All operations report [`KernelError`](kernel_errors::KernelError)s.
//! Exhaustion ([`TooMany`](kernel_errors::KernelError::TooMany)) is an
//! ordinary, recoverable result. [`Corrupted`](kernel_errors::KernelError::Corrupted)
//! is not: it means allocator metadata has been overwritten.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod heap;
pub mod phys_mapper;
pub mod pmm;
pub mod slab;

use kernel_errors::Result;
use kernel_memory_addresses::PhysicalAddress;

/// Something that hands out and takes back single physical frames.
pub trait PageSource {
    fn alloc_page(&mut self) -> Result<PhysicalAddress>;
    fn free_page(&mut self, pa: PhysicalAddress) -> Result<()>;
}

impl<P: PageSource + ?Sized> PageSource for &mut P {
    fn alloc_page(&mut self) -> Result<PhysicalAddress> {
        (**self).alloc_page()
    }

    fn free_page(&mut self, pa: PhysicalAddress) -> Result<()> {
        (**self).free_page(pa)
    }
}
