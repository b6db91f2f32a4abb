//! # Physical Page Allocator
//!
//! Tracks every physical frame of the boot memory map in a bitmap (one bit
//! per 4 KiB frame, set = unavailable) and hands out single frames.
//!
//! ## Bitmap contents
//!
//! A bit is set iff its frame is
//! - allocated,
//! - part of a `Reserved`, `Kernel` or `Bad` region,
//! - not covered by any region at all (a hole in the memory map), or
//! - frame zero, so that a valid allocation is never the null address.
//!
//! Consequently every clear bit lies inside a `Usable` region, and
//! allocation is a plain first-clear-bit search starting from a hint below
//! which all frames are known to be taken.
//!
//! ## Counters
//!
//! `total_pages` counts the frames of all regions, `used_pages` the set bits
//! among them and `free_pages` the clear ones, so `used + free == total` after
//! every operation.
//!
//! ```rust
//! use kernel_alloc::pmm::Pmm;
//! use kernel_info::boot::{MemoryRegion, RegionKind};
//!
//! let regions = [
//!     MemoryRegion::new(0x0, 0x1000, RegionKind::Reserved),
//!     MemoryRegion::usable(0x1000, 0x4000),
//! ];
//! let mut bitmap = [0u64; 1];
//! let mut pmm = Pmm::new(&regions, &mut bitmap).unwrap();
//! assert_eq!(pmm.stats().free_pages, 4);
//!
//! let page = pmm.alloc_page().unwrap();
//! assert_eq!(page.as_u64(), 0x1000);
//! pmm.free_page(page).unwrap();
//! ```

mod global;
mod region;
mod stats;

pub use global::{GlobalPmm, alloc_page, free_page, init, is_initialized, reserve_range, stats, with_pmm};
pub use region::{PmmRegion, RegionSummary};
pub use stats::PmmStats;

use crate::PageSource;
use kernel_errors::{KernelError, Result};
use kernel_info::boot::{BootModule, MemoryRegion};
use kernel_info::limits::MAX_MEMORY_REGIONS;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{PhysicalAddress, align_down, align_up};
use log::{debug, info, warn};

const BITS: usize = u64::BITS as usize;

pub struct Pmm<'b> {
    bitmap: &'b mut [u64],
    /// Frame number of bit 0.
    base_frame: u64,
    /// Number of frames (bits) tracked.
    frames: usize,
    regions: [PmmRegion; MAX_MEMORY_REGIONS],
    region_count: usize,
    total_pages: u64,
    used_pages: u64,
    free_pages: u64,
    failed_allocs: u64,
    /// Every frame below this index is set.
    search_hint: usize,
}

impl<'b> Pmm<'b> {
    /// Number of `u64` bitmap words needed to track `regions`.
    pub fn bitmap_words_for(regions: &[MemoryRegion]) -> Result<usize> {
        let (first, end) = region::frame_span(regions)?;
        let frames = usize::try_from(end - first).map_err(|_| KernelError::Overflow)?;
        Ok(frames.div_ceil(BITS))
    }

    /// Picks the first usable frames large enough to hold a bitmap of
    /// `words` words. Frame zero and every frame touched by one of
    /// `modules` are never chosen.
    pub fn place_bitmap(
        regions: &[MemoryRegion],
        words: usize,
        modules: &[BootModule<'_>],
    ) -> Result<PhysicalAddress> {
        let bytes = (words as u64) * 8;
        let pages = bytes.div_ceil(PAGE_SIZE).max(1);
        for region in regions.iter().filter(|r| !r.is_empty()) {
            let r = PmmRegion::new(*region)?;
            if !r.is_usable() {
                continue;
            }
            let mut first = r.first_frame.max(1);
            while r.frame_end.saturating_sub(first) >= pages {
                let end = first + pages;
                match modules
                    .iter()
                    .filter_map(module_frames)
                    .filter(|&(lo, hi)| lo < end && first < hi)
                    .map(|(_, hi)| hi)
                    .max()
                {
                    Some(past_module) => first = past_module,
                    None => return Ok(PhysicalAddress::new(first * PAGE_SIZE)),
                }
            }
        }
        warn!("PMM: no usable region can hold a {bytes} byte bitmap");
        Err(KernelError::TooMany)
    }

    /// Builds the allocator state for `regions` on top of `bitmap`.
    ///
    /// `bitmap` must hold at least [`bitmap_words_for`](Self::bitmap_words_for)
    /// words; its previous contents are discarded.
    pub fn new(regions: &[MemoryRegion], bitmap: &'b mut [u64]) -> Result<Self> {
        let count = regions.iter().filter(|r| !r.is_empty()).count();
        if count > MAX_MEMORY_REGIONS {
            warn!("PMM: {count} memory regions exceed the limit of {MAX_MEMORY_REGIONS}");
            return Err(KernelError::Limits);
        }
        region::check_disjoint(regions)?;
        let (first, end) = region::frame_span(regions)?;
        let frames = usize::try_from(end - first).map_err(|_| KernelError::Overflow)?;
        let words = frames.div_ceil(BITS);
        if bitmap.len() < words {
            warn!(
                "PMM: bitmap of {} words cannot track {frames} frames",
                bitmap.len()
            );
            return Err(KernelError::Overflow);
        }

        let (bitmap, _) = bitmap.split_at_mut(words);
        bitmap.fill(u64::MAX);

        let mut pmm = Self {
            bitmap,
            base_frame: first,
            frames,
            regions: [PmmRegion::EMPTY; MAX_MEMORY_REGIONS],
            region_count: 0,
            total_pages: 0,
            used_pages: 0,
            free_pages: 0,
            failed_allocs: 0,
            search_hint: 0,
        };

        for region in regions.iter().filter(|r| !r.is_empty()) {
            pmm.regions[pmm.region_count] = PmmRegion::new(*region)?;
            pmm.region_count += 1;
        }

        // Union of all region frames, then take the non-usable ones back out.
        let mut total = 0;
        let mut used = 0;
        for i in 0..pmm.region_count {
            let r = pmm.regions[i];
            total += pmm.clear_frames(r.first_frame, r.frame_end);
        }
        for i in 0..pmm.region_count {
            let r = pmm.regions[i];
            if !r.is_usable() {
                used += pmm.set_frames(r.first_frame, r.frame_end);
            }
        }
        if first == 0 && pmm.set_bit(0) {
            used += 1;
        }

        pmm.total_pages = total;
        pmm.used_pages = used;
        pmm.free_pages = total - used;

        info!(
            "PMM: tracking {} frames from {} in {} regions, {} free ({} KiB)",
            pmm.frames,
            PhysicalAddress::new(first * PAGE_SIZE),
            pmm.region_count,
            pmm.free_pages,
            pmm.free_pages * PAGE_SIZE / 1024
        );
        Ok(pmm)
    }

    /// Allocates one frame: the lowest free one.
    pub fn alloc_page(&mut self) -> Result<PhysicalAddress> {
        let Some(idx) = self.find_free() else {
            self.failed_allocs += 1;
            warn!(
                "PMM: out of physical memory ({} of {} pages in use)",
                self.used_pages, self.total_pages
            );
            return Err(KernelError::TooMany);
        };

        self.set_bit(idx);
        self.used_pages += 1;
        self.free_pages -= 1;
        self.search_hint = idx + 1;
        Ok(self.frame_address(idx))
    }

    /// Returns the frame at `pa` to the free pool.
    ///
    /// # Errors
    /// - [`KernelError::BadArgs`] for a null or misaligned address, or one
    ///   that does not lie in a usable region.
    /// - [`KernelError::Dangling`] if the frame is already free.
    pub fn free_page(&mut self, pa: PhysicalAddress) -> Result<()> {
        if pa.is_null() || !pa.is_aligned(PAGE_SIZE) {
            warn!("PMM: refusing to free invalid address {pa}");
            return Err(KernelError::BadArgs);
        }

        let frame = pa.as_u64() / PAGE_SIZE;
        let usable = self
            .regions()
            .iter()
            .find(|r| r.contains_frame(frame))
            .is_some_and(PmmRegion::is_usable);
        let idx = self.index_of(frame).filter(|_| usable).ok_or_else(|| {
            warn!("PMM: {pa} is not inside a usable region");
            KernelError::BadArgs
        })?;

        if !self.clear_bit(idx) {
            warn!("PMM: double free of {pa}");
            return Err(KernelError::Dangling);
        }
        self.used_pages -= 1;
        self.free_pages += 1;
        self.search_hint = self.search_hint.min(idx);
        Ok(())
    }

    /// Marks every still-free frame overlapping `[base, base + len)` as used.
    ///
    /// Used for memory the kernel already occupies without having allocated
    /// it, such as the bitmap itself or boot module images. Returns the
    /// number of frames newly reserved.
    pub fn reserve_range(&mut self, base: PhysicalAddress, len: u64) -> Result<u64> {
        if len == 0 {
            return Err(KernelError::BadArgs);
        }
        let end = base.checked_add(len).ok_or(KernelError::Overflow)?;
        let first = align_down(base.as_u64(), PAGE_SIZE) / PAGE_SIZE;
        let last = align_up(end.as_u64(), PAGE_SIZE).ok_or(KernelError::Overflow)? / PAGE_SIZE;

        let span_end = self.base_frame + self.frames as u64;
        if last <= self.base_frame || first >= span_end {
            return Err(KernelError::BadArgs);
        }

        let mut reserved = 0;
        for frame in first.max(self.base_frame)..last.min(span_end) {
            // Only usable frames are ever clear.
            if let Some(idx) = self.index_of(frame)
                && self.set_bit(idx)
            {
                reserved += 1;
            }
        }
        self.used_pages += reserved;
        self.free_pages -= reserved;
        debug!("PMM: reserved {reserved} frames at {base} (+{len:#x})");
        Ok(reserved)
    }

    /// Whether the frame containing `pa` is unavailable.
    pub fn is_allocated(&self, pa: PhysicalAddress) -> Result<bool> {
        let idx = self
            .index_of(pa.as_u64() / PAGE_SIZE)
            .ok_or(KernelError::BadArgs)?;
        Ok(self.test_bit(idx))
    }

    #[must_use]
    pub const fn stats(&self) -> PmmStats {
        PmmStats {
            total_pages: self.total_pages,
            used_pages: self.used_pages,
            free_pages: self.free_pages,
            failed_allocs: self.failed_allocs,
            regions: self.region_count,
        }
    }

    #[must_use]
    pub fn regions(&self) -> &[PmmRegion] {
        &self.regions[..self.region_count]
    }

    pub fn region_summaries(&self) -> impl Iterator<Item = RegionSummary> + '_ {
        self.regions().iter().map(|r| RegionSummary {
            region: r.region,
            frames: r.frames(),
            allocated: (r.first_frame..r.frame_end)
                .filter_map(|f| self.index_of(f))
                .filter(|&i| self.test_bit(i))
                .count() as u64,
        })
    }

    /// Logs every region and the global counters.
    pub fn dump(&self) {
        for s in self.region_summaries() {
            info!(
                "PMM: {} +{:#x} {:<8} {} frames, {} allocated",
                s.region.base,
                s.region.length,
                s.region.kind.as_str(),
                s.frames,
                s.allocated
            );
        }
        let st = self.stats();
        info!(
            "PMM: {} total, {} used, {} free pages ({}% used, {} failed allocations)",
            st.total_pages,
            st.used_pages,
            st.free_pages,
            st.usage_percent(),
            st.failed_allocs
        );
    }

    fn find_free(&self) -> Option<usize> {
        let start = self.search_hint / BITS;
        let (w, word) = self
            .bitmap
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, word)| **word != u64::MAX)?;
        let idx = w * BITS + word.trailing_ones() as usize;
        (idx < self.frames).then_some(idx)
    }

    fn frame_address(&self, idx: usize) -> PhysicalAddress {
        PhysicalAddress::new((self.base_frame + idx as u64) * PAGE_SIZE)
    }

    fn index_of(&self, frame: u64) -> Option<usize> {
        frame
            .checked_sub(self.base_frame)
            .and_then(|i| usize::try_from(i).ok())
            .filter(|&i| i < self.frames)
    }

    fn test_bit(&self, idx: usize) -> bool {
        self.bitmap[idx / BITS] & (1 << (idx % BITS)) != 0
    }

    /// Sets a bit; returns whether it was clear before.
    fn set_bit(&mut self, idx: usize) -> bool {
        let mask = 1 << (idx % BITS);
        let word = &mut self.bitmap[idx / BITS];
        let was_clear = *word & mask == 0;
        *word |= mask;
        was_clear
    }

    /// Clears a bit; returns whether it was set before.
    fn clear_bit(&mut self, idx: usize) -> bool {
        let mask = 1 << (idx % BITS);
        let word = &mut self.bitmap[idx / BITS];
        let was_set = *word & mask != 0;
        *word &= !mask;
        was_set
    }

    fn clear_frames(&mut self, first: u64, end: u64) -> u64 {
        let mut n = 0;
        for frame in first..end {
            if let Some(idx) = self.index_of(frame)
                && self.clear_bit(idx)
            {
                n += 1;
            }
        }
        n
    }

    fn set_frames(&mut self, first: u64, end: u64) -> u64 {
        let mut n = 0;
        for frame in first..end {
            if let Some(idx) = self.index_of(frame)
                && self.set_bit(idx)
            {
                n += 1;
            }
        }
        n
    }
}

/// Frames `[first, end)` touched by a boot module; `None` when empty.
fn module_frames(module: &BootModule<'_>) -> Option<(u64, u64)> {
    if module.size == 0 {
        return None;
    }
    let end = module.addr.checked_add(module.size)?;
    Some((
        align_down(module.addr.as_u64(), PAGE_SIZE) / PAGE_SIZE,
        align_up(end.as_u64(), PAGE_SIZE)? / PAGE_SIZE,
    ))
}

impl PageSource for Pmm<'_> {
    fn alloc_page(&mut self) -> Result<PhysicalAddress> {
        Pmm::alloc_page(self)
    }

    fn free_page(&mut self, pa: PhysicalAddress) -> Result<()> {
        Pmm::free_page(self, pa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::boot::RegionKind;

    fn assert_balanced(pmm: &Pmm<'_>) {
        let s = pmm.stats();
        assert_eq!(s.used_pages + s.free_pages, s.total_pages, "{s:?}");
    }

    fn mixed_map() -> [MemoryRegion; 5] {
        [
            MemoryRegion::new(0x0, 0x1000, RegionKind::Reserved),
            MemoryRegion::usable(0x1000, 0x3000),
            MemoryRegion::new(0x4000, 0x2000, RegionKind::Kernel),
            MemoryRegion::new(0x6000, 0x1000, RegionKind::Bad),
            MemoryRegion::usable(0x8000, 0x2000),
        ]
    }

    #[test]
    fn counters_reflect_region_kinds() {
        let regions = mixed_map();
        let mut bitmap = [0u64; 1];
        let pmm = Pmm::new(&regions, &mut bitmap).unwrap();
        let s = pmm.stats();
        assert_eq!(s.total_pages, 9);
        assert_eq!(s.used_pages, 4);
        assert_eq!(s.free_pages, 5);
        assert_eq!(s.regions, 5);
    }

    #[test]
    fn never_allocates_outside_usable_regions() {
        let regions = mixed_map();
        let mut bitmap = [0u64; 1];
        let mut pmm = Pmm::new(&regions, &mut bitmap).unwrap();

        let mut got = Vec::new();
        while let Ok(pa) = pmm.alloc_page() {
            assert_balanced(&pmm);
            got.push(pa.as_u64());
        }
        assert_eq!(got, [0x1000, 0x2000, 0x3000, 0x8000, 0x9000]);
        assert_eq!(pmm.alloc_page(), Err(KernelError::TooMany));
        assert_eq!(pmm.stats().failed_allocs, 2);
        assert_eq!(pmm.stats().free_pages, 0);
    }

    #[test]
    fn frame_zero_is_never_handed_out() {
        let regions = [MemoryRegion::usable(0, 0x3000)];
        let mut bitmap = [0u64; 1];
        let mut pmm = Pmm::new(&regions, &mut bitmap).unwrap();
        assert_eq!(pmm.stats().free_pages, 2);
        assert_eq!(pmm.alloc_page().unwrap().as_u64(), 0x1000);
        assert_eq!(pmm.free_page(PhysicalAddress::zero()), Err(KernelError::BadArgs));
    }

    #[test]
    fn free_page_validates_address() {
        let regions = mixed_map();
        let mut bitmap = [0u64; 1];
        let mut pmm = Pmm::new(&regions, &mut bitmap).unwrap();
        let pa = pmm.alloc_page().unwrap();

        assert_eq!(pmm.free_page(pa + 1), Err(KernelError::BadArgs));
        assert_eq!(
            pmm.free_page(PhysicalAddress::new(0x4000)),
            Err(KernelError::BadArgs),
            "kernel region"
        );
        assert_eq!(
            pmm.free_page(PhysicalAddress::new(0x7000)),
            Err(KernelError::BadArgs),
            "hole"
        );
        assert_eq!(
            pmm.free_page(PhysicalAddress::new(0x10_0000)),
            Err(KernelError::BadArgs),
            "beyond map"
        );
        assert_balanced(&pmm);
    }

    #[test]
    fn double_free_is_dangling() {
        let regions = [MemoryRegion::usable(0x1000, 0x2000)];
        let mut bitmap = [0u64; 1];
        let mut pmm = Pmm::new(&regions, &mut bitmap).unwrap();
        let pa = pmm.alloc_page().unwrap();
        pmm.free_page(pa).unwrap();
        assert_eq!(pmm.free_page(pa), Err(KernelError::Dangling));
        assert_eq!(
            pmm.free_page(PhysicalAddress::new(0x2000)),
            Err(KernelError::Dangling),
            "never allocated"
        );
        assert_balanced(&pmm);
    }

    #[test]
    fn freed_frames_are_reused_lowest_first() {
        let regions = [MemoryRegion::usable(0x1000, 0x8000)];
        let mut bitmap = [0u64; 1];
        let mut pmm = Pmm::new(&regions, &mut bitmap).unwrap();
        let pages: Vec<_> = (0..5).map(|_| pmm.alloc_page().unwrap()).collect();
        pmm.free_page(pages[3]).unwrap();
        pmm.free_page(pages[1]).unwrap();
        assert_eq!(pmm.alloc_page().unwrap(), pages[1]);
        assert_eq!(pmm.alloc_page().unwrap(), pages[3]);
        assert_eq!(pmm.alloc_page().unwrap().as_u64(), 0x6000);
    }

    #[test]
    fn random_sequences_keep_counters_balanced() {
        let regions = [
            MemoryRegion::usable(0x1000, 0x40_000),
            MemoryRegion::new(0x41_000, 0x3000, RegionKind::Reserved),
            MemoryRegion::usable(0x50_000, 0x10_000),
        ];
        let words = Pmm::bitmap_words_for(&regions).unwrap();
        let mut bitmap = vec![0u64; words];
        let mut pmm = Pmm::new(&regions, &mut bitmap).unwrap();

        // xorshift keeps the sequence deterministic
        let mut state = 0x2545_f491_4f6c_dd1d_u64;
        let mut held = Vec::new();
        for _ in 0..2_000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            if state % 3 == 0 && !held.is_empty() {
                let i = usize::try_from(state % held.len() as u64).unwrap();
                pmm.free_page(held.swap_remove(i)).unwrap();
            } else if let Ok(pa) = pmm.alloc_page() {
                assert!(regions[1].base.as_u64() > pa.as_u64() || pa.as_u64() >= 0x44_000);
                held.push(pa);
            }
            assert_balanced(&pmm);
        }
    }

    #[test]
    fn partial_usable_frames_are_excluded() {
        let regions = [
            MemoryRegion::usable(0x1800, 0x2000),
            MemoryRegion::new(0x3800, 0x800, RegionKind::Reserved),
        ];
        let mut bitmap = [0u64; 1];
        let mut pmm = Pmm::new(&regions, &mut bitmap).unwrap();
        assert_eq!(pmm.stats().free_pages, 1);
        assert_eq!(pmm.alloc_page().unwrap().as_u64(), 0x2000);
        assert_eq!(pmm.alloc_page(), Err(KernelError::TooMany));
        assert_balanced(&pmm);
    }

    #[test]
    fn construction_errors() {
        let mut bitmap = [0u64; 1];
        assert_eq!(Pmm::new(&[], &mut bitmap).err(), Some(KernelError::BadArgs));
        assert_eq!(
            Pmm::new(&[MemoryRegion::usable(0x1000, 0)], &mut bitmap).err(),
            Some(KernelError::BadArgs)
        );
        assert_eq!(
            Pmm::new(
                &[
                    MemoryRegion::usable(0x1000, 0x2000),
                    MemoryRegion::usable(0x2000, 0x2000)
                ],
                &mut bitmap
            )
            .err(),
            Some(KernelError::BadArgs)
        );
        assert_eq!(
            Pmm::new(&[MemoryRegion::usable(0, 0x100 * 0x1000)], &mut bitmap).err(),
            Some(KernelError::Overflow),
            "bitmap too small"
        );

        let many: Vec<_> = (0..=MAX_MEMORY_REGIONS as u64)
            .map(|i| MemoryRegion::usable(i * 0x1000, 0x1000))
            .collect();
        let mut big = [0u64; 4];
        assert_eq!(Pmm::new(&many, &mut big).err(), Some(KernelError::Limits));
    }

    #[test]
    fn reserve_range_takes_free_frames_only() {
        let regions = mixed_map();
        let mut bitmap = [0u64; 1];
        let mut pmm = Pmm::new(&regions, &mut bitmap).unwrap();
        let first = pmm.alloc_page().unwrap();
        assert_eq!(first.as_u64(), 0x1000);

        // 0x1000 already allocated, 0x2000..0x4000 free, 0x4000 kernel
        let n = pmm
            .reserve_range(PhysicalAddress::new(0x1800), 0x3000)
            .unwrap();
        assert_eq!(n, 2);
        assert!(pmm.is_allocated(PhysicalAddress::new(0x3fff)).unwrap());
        assert_eq!(pmm.alloc_page().unwrap().as_u64(), 0x8000);
        assert_balanced(&pmm);

        assert_eq!(
            pmm.reserve_range(PhysicalAddress::new(0x1000), 0),
            Err(KernelError::BadArgs)
        );
        assert_eq!(
            pmm.reserve_range(PhysicalAddress::new(0x100_0000), 0x1000),
            Err(KernelError::BadArgs)
        );
    }

    #[test]
    fn region_summaries_count_allocations() {
        let regions = mixed_map();
        let mut bitmap = [0u64; 1];
        let mut pmm = Pmm::new(&regions, &mut bitmap).unwrap();
        pmm.alloc_page().unwrap();
        let summaries: Vec<_> = pmm.region_summaries().collect();
        assert_eq!(summaries.len(), 5);
        assert_eq!((summaries[1].frames, summaries[1].allocated), (3, 1));
        assert_eq!((summaries[2].frames, summaries[2].allocated), (2, 2));
        assert_eq!((summaries[4].frames, summaries[4].allocated), (2, 0));
        pmm.dump();
    }

    #[test]
    fn bitmap_placement_skips_small_and_reserved_regions() {
        let regions = [
            MemoryRegion::usable(0x0, 0x2000),
            MemoryRegion::new(0x2000, 0x10_000, RegionKind::Reserved),
            MemoryRegion::usable(0x20_000, 0x10_000),
        ];
        // two pages worth of bitmap words
        let pa = Pmm::place_bitmap(&regions, 1024, &[]).unwrap();
        assert_eq!(pa.as_u64(), 0x20_000);
        // one page fits right after frame zero
        assert_eq!(Pmm::place_bitmap(&regions, 8, &[]).unwrap().as_u64(), 0x1000);
        assert_eq!(
            Pmm::place_bitmap(&regions, 1 << 20, &[]),
            Err(KernelError::TooMany)
        );
    }

    #[test]
    fn bitmap_placement_steps_over_boot_modules() {
        let regions = [
            MemoryRegion::usable(0x1000, 0x8000),
            MemoryRegion::usable(0x20_000, 0x4000),
        ];
        // 0x1000..0x3000 and 0x4800..0x5100 (frames 4 and 5)
        let modules = [
            BootModule::new("/boot/a.ko", PhysicalAddress::new(0x1000), 0x2000),
            BootModule::new("/boot/b.ko", PhysicalAddress::new(0x4800), 0x900),
        ];
        // one page: frame 3 is the first gap
        assert_eq!(
            Pmm::place_bitmap(&regions, 8, &modules).unwrap().as_u64(),
            0x3000
        );
        // two pages: frames 6 and 7
        assert_eq!(
            Pmm::place_bitmap(&regions, 1024, &modules).unwrap().as_u64(),
            0x6000
        );
        // four pages only fit in the second region
        assert_eq!(
            Pmm::place_bitmap(&regions, 2048, &modules).unwrap().as_u64(),
            0x20_000
        );
        let everything = [BootModule::new("/boot/big.ko", PhysicalAddress::new(0x1000), 0x30_000)];
        assert_eq!(
            Pmm::place_bitmap(&regions, 8, &everything),
            Err(KernelError::TooMany)
        );
        let empty = [BootModule::new("/boot/empty.ko", PhysicalAddress::new(0x1000), 0)];
        assert_eq!(
            Pmm::place_bitmap(&regions, 8, &empty).unwrap().as_u64(),
            0x1000
        );
    }

    #[test]
    fn bitmap_words_cover_span() {
        let regions = [
            MemoryRegion::usable(0x1000, 0x1000),
            MemoryRegion::usable(0x80_0000, 0x1000),
        ];
        // frames 1..0x801 => 0x800 frames => 32 words
        assert_eq!(Pmm::bitmap_words_for(&regions), Ok(32));
    }
}
