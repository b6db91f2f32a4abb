//! # Kernel heap (KHeap)
//!
//! Size-classed front end over the slab caches. A request is served by the
//! first class whose ceiling is at least the requested size; classes are
//! scanned in ascending order, which for eight classes beats anything
//! cleverer.
//!
//! Pages come from a [`PageSource`] (the kernel PMM for the global heap).
//! Empty slabs are kept around for reuse; only [`KernelHeap::shrink`] gives
//! them back.

use crate::PageSource;
use crate::phys_mapper::PhysMapper;
use crate::pmm::{self, GlobalPmm};
use crate::slab::{CacheStats, SLAB_OBJECT_ALIGN, Slab, SlabCache};
use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{NonNull, null_mut};
use kernel_errors::{KernelError, Result};
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::VirtualAddress;
use kernel_sync::{InitCell, SpinLock};
use log::{error, info, warn};

/// Object size ceilings of the slab caches, ascending.
pub const SIZE_CLASSES: [usize; 8] = [16, 32, 64, 128, 256, 512, 1024, 2048];

/// Largest request the heap serves.
pub const MAX_SLAB_OBJECT: usize = SIZE_CLASSES[SIZE_CLASSES.len() - 1];

const CLASSES: usize = SIZE_CLASSES.len();

const fn size_class_caches() -> [SlabCache; CLASSES] {
    let mut caches = [const { SlabCache::new(0) }; CLASSES];
    let mut i = 0;
    while i < CLASSES {
        caches[i] = SlabCache::new(SIZE_CLASSES[i]);
        i += 1;
    }
    caches
}

/// Per-class usage of a [`KernelHeap`].
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct HeapStats {
    pub caches: [CacheStats; CLASSES],
}

impl HeapStats {
    #[must_use]
    pub fn objects_in_use(&self) -> usize {
        self.caches.iter().map(|c| c.objects_in_use).sum()
    }

    #[must_use]
    pub fn slabs(&self) -> usize {
        self.caches.iter().map(|c| c.slabs).sum()
    }

    /// Bytes handed out, counted at class granularity.
    #[must_use]
    pub fn bytes_in_use(&self) -> usize {
        self.caches
            .iter()
            .map(|c| c.objects_in_use * c.object_size)
            .sum()
    }
}

pub struct KernelHeap<M> {
    mapper: M,
    caches: [SlabCache; CLASSES],
}

impl<M: PhysMapper> KernelHeap<M> {
    pub const fn new(mapper: M) -> Self {
        Self {
            mapper,
            caches: size_class_caches(),
        }
    }

    /// Index of the size class serving `size`.
    ///
    /// # Errors
    /// [`KernelError::BadArgs`] for zero, [`KernelError::NoSuch`] above
    /// [`MAX_SLAB_OBJECT`].
    pub fn cache_index(size: usize) -> Result<usize> {
        if size == 0 {
            return Err(KernelError::BadArgs);
        }
        SIZE_CLASSES
            .iter()
            .position(|&ceiling| ceiling >= size)
            .ok_or(KernelError::NoSuch)
    }

    /// The cache serving `size`.
    pub fn get_slab_cache(&self, size: usize) -> Result<&SlabCache> {
        Ok(&self.caches[Self::cache_index(size)?])
    }

    #[must_use]
    pub fn caches(&self) -> &[SlabCache] {
        &self.caches
    }

    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Allocates an object of at least `size` bytes, 16-byte aligned.
    pub fn allocate<P: PageSource + ?Sized>(
        &mut self,
        size: usize,
        pages: &mut P,
    ) -> Result<NonNull<u8>> {
        let idx = Self::cache_index(size)?;
        self.caches[idx].allocate(pages, &self.mapper)
    }

    /// Returns `ptr` to its size class.
    ///
    /// # Safety
    /// `ptr` must have been returned by [`allocate`](Self::allocate) on this
    /// heap. The owning slab is located from the page `ptr` lives in.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>) -> Result<()> {
        let slab = Slab::containing(ptr);
        let header = unsafe { slab.as_ref() };
        header.verify()?;
        let idx = Self::cache_index(header.object_size())
            .ok()
            .filter(|&i| SIZE_CLASSES[i] == header.object_size())
            .ok_or_else(|| {
                warn!("heap: {ptr:p} is not a heap object");
                KernelError::BadArgs
            })?;
        unsafe { self.caches[idx].free(ptr) }
    }

    /// Releases every slab without live objects back to `pages`.
    pub fn shrink<P: PageSource + ?Sized>(&mut self, pages: &mut P) -> Result<usize> {
        let mut released = 0;
        for cache in &mut self.caches {
            released += cache.shrink(pages, &self.mapper)?;
        }
        if released > 0 {
            info!("heap: released {released} empty slabs");
        }
        Ok(released)
    }

    /// # Errors
    /// [`KernelError::Corrupted`] if any slab header is broken.
    pub fn stats(&self) -> Result<HeapStats> {
        let mut stats = HeapStats::default();
        for (out, cache) in stats.caches.iter_mut().zip(&self.caches) {
            *out = cache.stats()?;
        }
        Ok(stats)
    }
}

type KernelHeapState = KernelHeap<&'static dyn PhysMapper>;

static HEAP: InitCell<SpinLock<KernelHeapState>> = InitCell::new();

/// Brings the kernel heap online. The PMM must already be initialized.
pub fn init(mapper: &'static dyn PhysMapper) -> Result<()> {
    if !pmm::is_initialized() {
        warn!("heap: PMM must be initialized first");
        return Err(KernelError::NotInit);
    }
    HEAP.init(SpinLock::new(KernelHeap::new(mapper)))
        .map_err(|_| {
            warn!("heap: already initialized");
            KernelError::BadArgs
        })?;
    info!("heap: online with size classes {SIZE_CLASSES:?}");
    Ok(())
}

#[must_use]
pub fn is_initialized() -> bool {
    HEAP.is_initialized()
}

/// Runs `f` on the kernel heap with its lock held.
///
/// Lock order is heap first, then PMM; never call into the heap while
/// holding the PMM lock.
pub fn with_heap<R>(f: impl FnOnce(&mut KernelHeapState) -> R) -> Result<R> {
    let heap = HEAP.get().ok_or(KernelError::NotInit)?;
    Ok(heap.with_lock(f))
}

pub fn allocate(size: usize) -> Result<NonNull<u8>> {
    with_heap(|heap| heap.allocate(size, &mut GlobalPmm))?
}

/// # Safety
/// `ptr` must come from [`allocate`] and must not be used afterwards.
pub unsafe fn free(ptr: NonNull<u8>) -> Result<()> {
    with_heap(|heap| unsafe { heap.free(ptr) })?
}

pub fn shrink() -> Result<usize> {
    with_heap(|heap| heap.shrink(&mut GlobalPmm))?
}

pub fn stats() -> Result<HeapStats> {
    with_heap(|heap| heap.stats())?
}

/// `GlobalAlloc` adapter over the kernel heap.
///
/// Layouts up to [`MAX_SLAB_OBJECT`] bytes with at most 16-byte alignment are
/// served by the slab caches; anything up to a page by a whole PMM frame.
/// Larger requests fail. Heap corruption detected on free halts the kernel.
#[derive(Debug, Default, Copy, Clone)]
pub struct KernelAllocator;

impl KernelAllocator {
    const fn fits_slab(layout: Layout) -> bool {
        layout.size() <= MAX_SLAB_OBJECT && layout.align() <= SLAB_OBJECT_ALIGN
    }

    const fn fits_page(layout: Layout) -> bool {
        layout.size() <= PAGE_SIZE as usize && layout.align() <= PAGE_SIZE as usize
    }

    fn alloc_page() -> Result<NonNull<u8>> {
        let pa = pmm::alloc_page()?;
        let va = with_heap(|heap| heap.mapper().phys_to_virt(pa))?;
        NonNull::new(va.as_ptr()).ok_or(KernelError::BadAlloc)
    }

    fn free_page(ptr: NonNull<u8>) -> Result<()> {
        let va = VirtualAddress::from_nonnull(ptr);
        let pa = with_heap(|heap| heap.mapper().virt_to_phys(va))?;
        pmm::free_page(pa)
    }
}

unsafe impl GlobalAlloc for KernelAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let result = if Self::fits_slab(layout) {
            allocate(layout.size().max(1))
        } else if Self::fits_page(layout) {
            Self::alloc_page()
        } else {
            Err(KernelError::NoSuch)
        };
        result.map_or(null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let Some(ptr) = NonNull::new(ptr) else {
            return;
        };
        let result = if Self::fits_slab(layout) {
            unsafe { free(ptr) }
        } else {
            Self::free_page(ptr)
        };
        match result {
            Ok(()) => {}
            Err(KernelError::Corrupted) => {
                error!("heap: corruption detected while freeing {ptr:p}");
                panic!("kernel heap corrupted");
            }
            Err(e) => error!("heap: failed to free {ptr:p} ({layout:?}): {e}"),
        }
    }
}
