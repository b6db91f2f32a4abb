//! # Slab allocator
//!
//! A slab is a single physical page reinterpreted as a [`Slab`] header
//! followed by `capacity` cells of one fixed object size:
//!
//! ```text
//! page base                                                   page end
//! ┌────────────┬────────┬────────┬─────┬────────────┬─────────┐
//! │ Slab (48B) │ cell 0 │ cell 1 │ ... │ cell n - 1 │ (slack) │
//! └────────────┴────────┴────────┴─────┴────────────┴─────────┘
//! ```
//!
//! Free cells hold a [`FreeObject`] overlay linking them into the slab's
//! free list. The list is built in reverse address order, so the last cell
//! carved becomes the head and successive allocations return descending
//! addresses.
//!
//! Both the header and every free cell carry a magic value. Any mismatch
//! means something wrote over allocator metadata and is reported as
//! [`KernelError::Corrupted`]; callers must not continue using the heap.
//!
//! Cells start at a 16-byte aligned offset, which is the strongest
//! alignment a slab object guarantees.

use crate::PageSource;
use crate::phys_mapper::PhysMapper;
use core::ptr::NonNull;
use kernel_errors::{KernelError, Result};
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::VirtualAddress;
use log::{debug, error, warn};

/// Marks a live slab header.
pub const SLAB_MAGIC: u64 = 0x5AB5_1AB5_CAFE_F00D;

/// Marks a cell that is currently on a free list.
pub const FREE_OBJECT_MAGIC: u64 = 0xF4EE_0B1E_C7F4_EE00;

/// Bytes taken by the slab header at the start of every slab page.
pub const SLAB_HEADER_SIZE: usize = size_of::<Slab>();

/// Alignment guaranteed for every object handed out by a slab.
pub const SLAB_OBJECT_ALIGN: usize = 16;

/// Smallest object size a slab can be carved into.
pub const MIN_OBJECT_SIZE: usize = size_of::<FreeObject>();

const PAGE: usize = PAGE_SIZE as usize;

/// Largest object size a slab can be carved into.
pub const MAX_OBJECT_SIZE: usize = PAGE - SLAB_HEADER_SIZE;

#[cfg(feature = "slab-poison")]
const POISON_FREE: u8 = 0x6b;
#[cfg(feature = "slab-poison")]
const POISON_ALLOC: u8 = 0xa5;

/// Slab header, placed at the start of the slab's page.
#[repr(C)]
#[derive(Debug)]
pub struct Slab {
    /// Next slab of the same cache.
    next: Option<NonNull<Slab>>,
    free_list: Option<NonNull<FreeObject>>,
    object_size: usize,
    capacity: usize,
    free_count: usize,
    magic: u64,
}

/// Overlay of a free cell.
#[repr(C)]
#[derive(Debug)]
pub struct FreeObject {
    next: Option<NonNull<FreeObject>>,
    magic: u64,
}

const _: () = {
    assert!(SLAB_HEADER_SIZE == 48);
    assert!(SLAB_HEADER_SIZE.is_multiple_of(SLAB_OBJECT_ALIGN));
    assert!(MIN_OBJECT_SIZE == 16);
    assert!(align_of::<Slab>() <= SLAB_OBJECT_ALIGN);
};

/// Number of cells a slab of `object_size` objects holds.
#[must_use]
pub const fn slab_capacity(object_size: usize) -> usize {
    (PAGE - SLAB_HEADER_SIZE) / object_size
}

impl Slab {
    #[must_use]
    pub const fn object_size(&self) -> usize {
        self.object_size
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn free_count(&self) -> usize {
        self.free_count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.free_count == self.capacity
    }

    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.free_count == 0
    }

    #[must_use]
    pub const fn next(&self) -> Option<NonNull<Self>> {
        self.next
    }

    pub(crate) const fn set_next(&mut self, next: Option<NonNull<Self>>) {
        self.next = next;
    }

    /// Validates the header magic.
    pub fn verify(&self) -> Result<()> {
        if self.magic == SLAB_MAGIC {
            Ok(())
        } else {
            error!(
                "slab: header at {:p} has bad magic {:#018x}",
                self, self.magic
            );
            Err(KernelError::Corrupted)
        }
    }

    /// Address of the page the slab lives in.
    #[must_use]
    pub fn base(slab: NonNull<Self>) -> usize {
        slab.as_ptr() as usize
    }

    /// Slab header of the page containing `ptr`.
    #[must_use]
    pub fn containing(ptr: NonNull<u8>) -> NonNull<Self> {
        let offset = ptr.as_ptr() as usize % PAGE;
        // SAFETY: stays within the allocation `ptr` belongs to.
        unsafe { ptr.byte_sub(offset).cast() }
    }

    /// Takes one cell off the free list.
    ///
    /// # Safety
    /// `slab` must point to a slab page created by [`allocate_slab`] that
    /// has not been released, and no other reference to it may be live.
    pub unsafe fn pop(mut slab: NonNull<Self>) -> Result<Option<NonNull<u8>>> {
        let header = unsafe { slab.as_mut() };
        header.verify()?;
        let Some(mut obj) = header.free_list else {
            return Ok(None);
        };

        let cell = unsafe { obj.as_mut() };
        if cell.magic != FREE_OBJECT_MAGIC {
            error!(
                "slab: free cell {:p} has bad magic {:#018x}",
                obj, cell.magic
            );
            return Err(KernelError::Corrupted);
        }
        header.free_list = cell.next;
        header.free_count -= 1;
        cell.magic = 0;
        cell.next = None;

        #[cfg(feature = "slab-poison")]
        unsafe {
            obj.cast::<u8>()
                .write_bytes(POISON_ALLOC, header.object_size);
        }
        Ok(Some(obj.cast()))
    }

    /// Returns `ptr` to the slab's free list.
    ///
    /// # Errors
    /// - [`KernelError::BadArgs`] if `ptr` is not the start of a cell.
    /// - [`KernelError::Dangling`] if the cell is already free.
    /// - [`KernelError::Corrupted`] if the header magic is broken.
    ///
    /// # Safety
    /// Same as [`pop`](Self::pop); additionally `ptr` must lie in `slab`'s page.
    pub unsafe fn push(mut slab: NonNull<Self>, ptr: NonNull<u8>) -> Result<()> {
        let base = Self::base(slab);
        let header = unsafe { slab.as_mut() };
        header.verify()?;

        let offset = (ptr.as_ptr() as usize).wrapping_sub(base);
        let cells_end = SLAB_HEADER_SIZE + header.capacity * header.object_size;
        if offset < SLAB_HEADER_SIZE
            || offset >= cells_end
            || !(offset - SLAB_HEADER_SIZE).is_multiple_of(header.object_size)
        {
            warn!("slab: {ptr:p} is not a cell of the slab at {base:#x}");
            return Err(KernelError::BadArgs);
        }

        let obj = ptr.cast::<FreeObject>();
        // Only trust the magic as a hint; confirm by walking the list.
        let looks_free = unsafe { obj.as_ref().magic } == FREE_OBJECT_MAGIC;
        if (looks_free && header.free_list_contains(obj)) || header.free_count == header.capacity {
            warn!("slab: double free of {ptr:p}");
            return Err(KernelError::Dangling);
        }

        #[cfg(feature = "slab-poison")]
        unsafe {
            ptr.add(MIN_OBJECT_SIZE)
                .write_bytes(POISON_FREE, header.object_size - MIN_OBJECT_SIZE);
        }

        unsafe {
            obj.write(FreeObject {
                next: header.free_list,
                magic: FREE_OBJECT_MAGIC,
            });
        }
        header.free_list = Some(obj);
        header.free_count += 1;
        Ok(())
    }

    fn free_list_contains(&self, needle: NonNull<FreeObject>) -> bool {
        let mut cursor = self.free_list;
        while let Some(obj) = cursor {
            if obj == needle {
                return true;
            }
            cursor = unsafe { obj.as_ref().next };
        }
        false
    }
}

/// Carves a fresh page from `pages` into a slab of `object_size` cells.
///
/// # Errors
/// - [`KernelError::BadArgs`] if `object_size` is not a multiple of 16 in
///   `MIN_OBJECT_SIZE..=MAX_OBJECT_SIZE`.
/// - Whatever `pages` reports when out of frames ([`KernelError::TooMany`]).
/// - [`KernelError::BadAlloc`] if the frame maps to a null or unaligned
///   address; the frame is handed back first.
pub fn allocate_slab<P, M>(object_size: usize, pages: &mut P, mapper: &M) -> Result<NonNull<Slab>>
where
    P: PageSource + ?Sized,
    M: PhysMapper + ?Sized,
{
    if !(MIN_OBJECT_SIZE..=MAX_OBJECT_SIZE).contains(&object_size)
        || !object_size.is_multiple_of(SLAB_OBJECT_ALIGN)
    {
        return Err(KernelError::BadArgs);
    }

    let pa = pages.alloc_page()?;
    let va = mapper.phys_to_virt(pa);
    let Some(page) = NonNull::new(va.as_ptr::<u8>()).filter(|_| va.is_aligned(PAGE_SIZE)) else {
        warn!("slab: frame {pa} maps to unusable address {va}");
        pages.free_page(pa)?;
        return Err(KernelError::BadAlloc);
    };

    let capacity = slab_capacity(object_size);
    let mut head = None;
    for i in 0..capacity {
        // SAFETY: every cell lies within the page.
        let cell = unsafe { page.add(SLAB_HEADER_SIZE + i * object_size) }.cast::<FreeObject>();
        unsafe {
            cell.write(FreeObject {
                next: head,
                magic: FREE_OBJECT_MAGIC,
            });
        }
        head = Some(cell);
    }

    let slab = page.cast::<Slab>();
    unsafe {
        slab.write(Slab {
            next: None,
            free_list: head,
            object_size,
            capacity,
            free_count: capacity,
            magic: SLAB_MAGIC,
        });
    }
    debug!("slab: carved {capacity} x {object_size} B at {va} (frame {pa})");
    Ok(slab)
}

/// Releases a slab's page back to `pages`. Outstanding objects become invalid.
///
/// # Errors
/// [`KernelError::Corrupted`] if the header magic is broken (the page is
/// not released), or whatever `pages` reports.
///
/// # Safety
/// `slab` must come from [`allocate_slab`] with a `mapper` translating the
/// same way, must be unlinked from any cache, and must not be used again.
pub unsafe fn free_slab<P, M>(mut slab: NonNull<Slab>, pages: &mut P, mapper: &M) -> Result<()>
where
    P: PageSource + ?Sized,
    M: PhysMapper + ?Sized,
{
    let header = unsafe { slab.as_mut() };
    header.verify()?;
    header.magic = 0;
    let pa = mapper.virt_to_phys(VirtualAddress::from_nonnull(slab));
    debug!("slab: releasing {} B slab at {slab:p}", header.object_size);
    pages.free_page(pa)
}

/// Usage numbers of one [`SlabCache`].
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct CacheStats {
    pub object_size: usize,
    pub slabs: usize,
    pub objects_in_use: usize,
    pub objects_free: usize,
}

/// All slabs of one size class.
#[derive(Debug)]
pub struct SlabCache {
    object_size: usize,
    slabs: Option<NonNull<Slab>>,
    slab_count: usize,
    in_use: usize,
}

// SAFETY: the cache exclusively owns its slab pages.
unsafe impl Send for SlabCache {}

impl SlabCache {
    #[must_use]
    pub const fn new(object_size: usize) -> Self {
        Self {
            object_size,
            slabs: None,
            slab_count: 0,
            in_use: 0,
        }
    }

    #[must_use]
    pub const fn object_size(&self) -> usize {
        self.object_size
    }

    #[must_use]
    pub const fn slab_count(&self) -> usize {
        self.slab_count
    }

    #[must_use]
    pub const fn in_use(&self) -> usize {
        self.in_use
    }

    /// Iterates the cache's slab headers, most recently added first.
    ///
    /// Every header is verified before its link is followed; a broken one
    /// yields [`KernelError::Corrupted`] and ends the walk.
    pub fn slabs(&self) -> impl Iterator<Item = Result<NonNull<Slab>>> + '_ {
        let mut cursor = self.slabs;
        core::iter::from_fn(move || {
            let slab = cursor.take()?;
            // SAFETY: linked slabs are live and owned by this cache.
            let header = unsafe { slab.as_ref() };
            if let Err(e) = header.verify() {
                return Some(Err(e));
            }
            cursor = header.next();
            Some(Ok(slab))
        })
    }

    /// Whether `slab` is one of this cache's slabs.
    ///
    /// # Errors
    /// [`KernelError::Corrupted`] if a header on the way is broken.
    pub fn owns(&self, slab: NonNull<Slab>) -> Result<bool> {
        for candidate in self.slabs() {
            if candidate? == slab {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Hands out one object, carving a new slab if every slab is full.
    pub fn allocate<P, M>(&mut self, pages: &mut P, mapper: &M) -> Result<NonNull<u8>>
    where
        P: PageSource + ?Sized,
        M: PhysMapper + ?Sized,
    {
        let mut cursor = self.slabs;
        while let Some(slab) = cursor {
            // SAFETY: linked slabs are live and owned by this cache.
            if let Some(obj) = unsafe { Slab::pop(slab)? } {
                self.in_use += 1;
                return Ok(obj);
            }
            cursor = unsafe { slab.as_ref().next() };
        }

        let mut slab = allocate_slab(self.object_size, pages, mapper)?;
        unsafe { slab.as_mut().set_next(self.slabs) };
        self.slabs = Some(slab);
        self.slab_count += 1;

        // A fresh slab always has at least one cell.
        let obj = unsafe { Slab::pop(slab)? }.ok_or(KernelError::BadAlloc)?;
        self.in_use += 1;
        Ok(obj)
    }

    /// Returns an object to the slab it was carved from.
    ///
    /// # Safety
    /// `ptr` must have been returned by [`allocate`](Self::allocate) on some
    /// cache whose slab pages are still mapped.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>) -> Result<()> {
        let slab = Slab::containing(ptr);
        if !self.owns(slab)? {
            warn!(
                "slab: {ptr:p} does not belong to the {} B cache",
                self.object_size
            );
            return Err(KernelError::BadArgs);
        }
        unsafe { Slab::push(slab, ptr)? };
        self.in_use -= 1;
        Ok(())
    }

    /// Releases every slab with no live objects. Returns the number freed.
    pub fn shrink<P, M>(&mut self, pages: &mut P, mapper: &M) -> Result<usize>
    where
        P: PageSource + ?Sized,
        M: PhysMapper + ?Sized,
    {
        let mut released = 0;
        let mut prev: Option<NonNull<Slab>> = None;
        let mut cursor = self.slabs;
        while let Some(slab) = cursor {
            let header = unsafe { slab.as_ref() };
            header.verify()?;
            let next = header.next();
            if header.is_empty() {
                match prev {
                    None => self.slabs = next,
                    Some(mut p) => unsafe { p.as_mut().set_next(next) },
                }
                self.slab_count -= 1;
                // SAFETY: unlinked above and owned by this cache.
                unsafe { free_slab(slab, pages, mapper)? };
                released += 1;
            } else {
                prev = Some(slab);
            }
            cursor = next;
        }
        Ok(released)
    }

    /// # Errors
    /// [`KernelError::Corrupted`] if any slab header is broken.
    pub fn stats(&self) -> Result<CacheStats> {
        let mut objects_free = 0;
        for slab in self.slabs() {
            objects_free += unsafe { slab?.as_ref() }.free_count();
        }
        Ok(CacheStats {
            object_size: self.object_size,
            slabs: self.slab_count,
            objects_in_use: self.in_use,
            objects_free,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::phys_mapper::IdentityPhysMapper;
    use crate::pmm::Pmm;
    use kernel_info::boot::MemoryRegion;

    #[repr(C, align(4096))]
    pub struct Frame(pub [u8; PAGE]);

    /// Host memory posing as physical RAM, identity-mapped.
    pub struct HostRam {
        _frames: Vec<Frame>,
        pub region: MemoryRegion,
    }

    impl HostRam {
        pub fn new(frames: usize) -> Self {
            let mut v: Vec<Frame> = Vec::with_capacity(frames);
            v.resize_with(frames, || Frame([0; PAGE]));
            let base = v.as_ptr() as u64;
            Self {
                region: MemoryRegion::usable(base, (frames * PAGE) as u64),
                _frames: v,
            }
        }

        pub fn pmm<'b>(&self, bitmap: &'b mut [u64]) -> Pmm<'b> {
            Pmm::new(&[self.region], bitmap).unwrap()
        }
    }

    /// Maps every frame to a fixed bogus address.
    struct BrokenMapper(u64);

    impl PhysMapper for BrokenMapper {
        fn phys_to_virt(&self, _pa: kernel_memory_addresses::PhysicalAddress) -> VirtualAddress {
            VirtualAddress::new(self.0)
        }

        fn virt_to_phys(&self, _va: VirtualAddress) -> kernel_memory_addresses::PhysicalAddress {
            kernel_memory_addresses::PhysicalAddress::zero()
        }
    }

    #[test]
    fn fresh_slab_free_count_matches_formula() {
        let ram = HostRam::new(4);
        let mut bitmap = [0u64; 1];
        let mut pmm = ram.pmm(&mut bitmap);
        for size in [16, 32, 64, 128, 256, 512, 1024, 2048] {
            let slab = allocate_slab(size, &mut pmm, &IdentityPhysMapper).unwrap();
            let header = unsafe { slab.as_ref() };
            assert_eq!(header.free_count(), (PAGE - SLAB_HEADER_SIZE) / size);
            assert_eq!(header.capacity(), slab_capacity(size));
            assert!(header.is_empty());
            unsafe { free_slab(slab, &mut pmm, &IdentityPhysMapper).unwrap() };
        }
        assert_eq!(pmm.stats().used_pages, 0);
    }

    #[test]
    fn pops_return_descending_addresses_until_empty() {
        let ram = HostRam::new(1);
        let mut bitmap = [0u64; 1];
        let mut pmm = ram.pmm(&mut bitmap);
        let slab = allocate_slab(64, &mut pmm, &IdentityPhysMapper).unwrap();
        let capacity = slab_capacity(64);

        let mut last = usize::MAX;
        for _ in 0..capacity {
            let obj = unsafe { Slab::pop(slab) }.unwrap().unwrap();
            let addr = obj.as_ptr() as usize;
            assert!(addr < last, "addresses must descend");
            assert!((addr - Slab::base(slab) - SLAB_HEADER_SIZE).is_multiple_of(64));
            last = addr;
        }
        assert_eq!(last, Slab::base(slab) + SLAB_HEADER_SIZE);
        assert!(unsafe { slab.as_ref() }.is_full());
        assert_eq!(unsafe { Slab::pop(slab) }, Ok(None));
    }

    #[test]
    fn push_validates_cell_and_detects_double_free() {
        let ram = HostRam::new(1);
        let mut bitmap = [0u64; 1];
        let mut pmm = ram.pmm(&mut bitmap);
        let slab = allocate_slab(32, &mut pmm, &IdentityPhysMapper).unwrap();
        let a = unsafe { Slab::pop(slab) }.unwrap().unwrap();
        let b = unsafe { Slab::pop(slab) }.unwrap().unwrap();

        let inside = unsafe { a.add(8) };
        assert_eq!(unsafe { Slab::push(slab, inside) }, Err(KernelError::BadArgs));
        assert_eq!(
            unsafe { Slab::push(slab, slab.cast::<u8>()) },
            Err(KernelError::BadArgs),
            "header is not a cell"
        );

        unsafe { Slab::push(slab, a) }.unwrap();
        assert_eq!(unsafe { Slab::push(slab, a) }, Err(KernelError::Dangling));

        // A stale magic left in user data must not count as free.
        unsafe { b.cast::<u64>().add(1).write(FREE_OBJECT_MAGIC) };
        unsafe { Slab::push(slab, b) }.unwrap();
        assert!(unsafe { slab.as_ref() }.is_empty());
    }

    #[test]
    fn corrupted_magic_is_reported_distinctly() {
        let ram = HostRam::new(1);
        let mut bitmap = [0u64; 1];
        let mut pmm = ram.pmm(&mut bitmap);
        let slab = allocate_slab(128, &mut pmm, &IdentityPhysMapper).unwrap();

        // Smash the head free cell's magic.
        let head = unsafe { slab.as_ref().free_list }.unwrap();
        unsafe { (*head.as_ptr()).magic = 0xdead };
        assert_eq!(unsafe { Slab::pop(slab) }, Err(KernelError::Corrupted));

        unsafe { (*slab.as_ptr()).magic = 0 };
        assert_eq!(unsafe { Slab::pop(slab) }, Err(KernelError::Corrupted));
        assert_eq!(
            unsafe { free_slab(slab, &mut pmm, &IdentityPhysMapper) },
            Err(KernelError::Corrupted)
        );
    }

    #[test]
    fn allocate_slab_rejects_bad_sizes_and_mappings() {
        let ram = HostRam::new(1);
        let mut bitmap = [0u64; 1];
        let mut pmm = ram.pmm(&mut bitmap);
        for size in [0, 8, 24, MAX_OBJECT_SIZE + 16] {
            assert_eq!(
                allocate_slab(size, &mut pmm, &IdentityPhysMapper).err(),
                Some(KernelError::BadArgs),
                "size {size}"
            );
        }
        for bogus in [0, 0x1234] {
            assert_eq!(
                allocate_slab(64, &mut pmm, &BrokenMapper(bogus)).err(),
                Some(KernelError::BadAlloc)
            );
        }
        assert_eq!(pmm.stats().used_pages, 0, "frame handed back");
    }

    #[test]
    fn cache_grows_and_shrinks() {
        let ram = HostRam::new(3);
        let mut bitmap = [0u64; 1];
        let mut pmm = ram.pmm(&mut bitmap);
        let mut cache = SlabCache::new(1024);
        let per_slab = slab_capacity(1024);

        let objs: Vec<_> = (0..per_slab + 1)
            .map(|_| cache.allocate(&mut pmm, &IdentityPhysMapper).unwrap())
            .collect();
        assert_eq!(cache.slab_count(), 2);
        assert_eq!(cache.stats().unwrap().objects_in_use, per_slab + 1);

        // Empty slabs are kept until an explicit shrink.
        for obj in &objs {
            unsafe { cache.free(*obj).unwrap() };
        }
        assert_eq!(cache.slab_count(), 2);
        assert_eq!(pmm.stats().used_pages, 2);

        assert_eq!(cache.shrink(&mut pmm, &IdentityPhysMapper), Ok(2));
        assert_eq!(cache.slab_count(), 0);
        assert_eq!(pmm.stats().used_pages, 0);
    }

    #[test]
    fn cache_rejects_foreign_objects_and_reports_oom() {
        let ram = HostRam::new(2);
        let mut bitmap = [0u64; 1];
        let mut pmm = ram.pmm(&mut bitmap);
        let mut small = SlabCache::new(16);
        let mut large = SlabCache::new(2048);

        let obj = small.allocate(&mut pmm, &IdentityPhysMapper).unwrap();
        assert_eq!(unsafe { large.free(obj) }, Err(KernelError::BadArgs));

        large.allocate(&mut pmm, &IdentityPhysMapper).unwrap();
        assert_eq!(
            large.allocate(&mut pmm, &IdentityPhysMapper),
            Err(KernelError::TooMany)
        );
        assert_eq!(large.stats().unwrap().slabs, 1);
    }

    #[test]
    fn cache_walks_report_broken_headers() {
        let ram = HostRam::new(3);
        let mut bitmap = [0u64; 1];
        let mut pmm = ram.pmm(&mut bitmap);
        let mut cache = SlabCache::new(1024);
        let per_slab = slab_capacity(1024);
        let objs: Vec<_> = (0..=per_slab)
            .map(|_| cache.allocate(&mut pmm, &IdentityPhysMapper).unwrap())
            .collect();
        assert_eq!(cache.slab_count(), 2);
        assert_eq!(cache.stats().unwrap().objects_free, per_slab - 1);

        // The older slab sits behind the newer one on the list.
        let older = Slab::containing(objs[0]);
        unsafe { (*older.as_ptr()).magic = 0x0bad };
        assert_eq!(cache.stats(), Err(KernelError::Corrupted));
        let walked: Vec<_> = cache.slabs().collect();
        assert_eq!(walked.len(), 2);
        assert!(walked[0].is_ok());
        assert_eq!(walked[1], Err(KernelError::Corrupted));
        assert_eq!(cache.owns(older), Err(KernelError::Corrupted));
        assert_eq!(unsafe { cache.free(objs[0]) }, Err(KernelError::Corrupted));

        unsafe { (*older.as_ptr()).magic = SLAB_MAGIC };
        assert_eq!(cache.owns(older), Ok(true));
        assert_eq!(cache.stats().unwrap().objects_in_use, per_slab + 1);
    }

    #[cfg(feature = "slab-poison")]
    #[test]
    fn poison_marks_fresh_and_freed_cells() {
        let ram = HostRam::new(1);
        let mut bitmap = [0u64; 1];
        let mut pmm = ram.pmm(&mut bitmap);
        let size = 64;
        let slab = allocate_slab(size, &mut pmm, &IdentityPhysMapper).unwrap();

        let obj = unsafe { Slab::pop(slab) }.unwrap().unwrap();
        let bytes = unsafe { core::slice::from_raw_parts(obj.as_ptr(), size) };
        assert!(bytes.iter().all(|&b| b == POISON_ALLOC));

        unsafe { obj.as_ptr().write_bytes(0, size) };
        unsafe { Slab::push(slab, obj) }.unwrap();
        let bytes = unsafe { core::slice::from_raw_parts(obj.as_ptr(), size) };
        assert!(bytes[MIN_OBJECT_SIZE..].iter().all(|&b| b == POISON_FREE));
        // The free-cell overlay stays intact under the poison.
        let cell = unsafe { obj.cast::<FreeObject>().as_ref() };
        assert_eq!(cell.magic, FREE_OBJECT_MAGIC);

        let again = unsafe { Slab::pop(slab) }.unwrap().unwrap();
        assert_eq!(again, obj);
        let bytes = unsafe { core::slice::from_raw_parts(again.as_ptr(), size) };
        assert!(bytes.iter().all(|&b| b == POISON_ALLOC));
    }
}
