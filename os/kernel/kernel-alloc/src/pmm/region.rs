use kernel_errors::{KernelError, Result};
use kernel_info::boot::{MemoryRegion, RegionKind};
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{align_down, align_up};

/// A boot memory-map entry together with the frames it covers.
///
/// Usable regions are shrunk inward to whole frames (a partial frame at
/// either end is never handed out); every other kind is widened outward so
/// that a frame touched by reserved memory is never considered free.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PmmRegion {
    pub region: MemoryRegion,
    pub first_frame: u64,
    pub frame_end: u64,
}

impl PmmRegion {
    pub(super) const EMPTY: Self = Self {
        region: MemoryRegion::new(0, 0, RegionKind::Reserved),
        first_frame: 0,
        frame_end: 0,
    };

    /// Normalizes `region` to frame numbers (physical address / page size).
    pub(super) fn new(region: MemoryRegion) -> Result<Self> {
        let start = region.base.as_u64();
        let end = region.end().ok_or(KernelError::Overflow)?;
        let (first, last) = if region.kind == RegionKind::Usable {
            let first = align_up(start, PAGE_SIZE).ok_or(KernelError::Overflow)?;
            (first, align_down(end, PAGE_SIZE).max(first))
        } else {
            let last = align_up(end, PAGE_SIZE).ok_or(KernelError::Overflow)?;
            (align_down(start, PAGE_SIZE), last)
        };
        Ok(Self {
            region,
            first_frame: first / PAGE_SIZE,
            frame_end: last / PAGE_SIZE,
        })
    }

    #[inline]
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frame_end - self.first_frame
    }

    #[inline]
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self.region.kind, RegionKind::Usable)
    }

    #[inline]
    #[must_use]
    pub const fn contains_frame(&self, frame: u64) -> bool {
        frame >= self.first_frame && frame < self.frame_end
    }
}

/// Per-region view returned by [`Pmm::region_summaries`](super::Pmm::region_summaries).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RegionSummary {
    pub region: MemoryRegion,
    /// Whole frames tracked for this region.
    pub frames: u64,
    /// Frames currently marked as allocated. Equals `frames` for every
    /// non-usable region.
    pub allocated: u64,
}

/// Rejects overlapping entries; zero-length entries never overlap.
pub(super) fn check_disjoint(regions: &[MemoryRegion]) -> Result<()> {
    for (i, a) in regions.iter().enumerate() {
        if a.is_empty() {
            continue;
        }
        let a_end = a.end().ok_or(KernelError::Overflow)?;
        for b in regions.iter().skip(i + 1).filter(|b| !b.is_empty()) {
            let b_end = b.end().ok_or(KernelError::Overflow)?;
            if a.base.as_u64() < b_end && b.base.as_u64() < a_end {
                log::warn!(
                    "PMM: memory map entries overlap: [{}, +{:#x}) and [{}, +{:#x})",
                    a.base,
                    a.length,
                    b.base,
                    b.length
                );
                return Err(KernelError::BadArgs);
            }
        }
    }
    Ok(())
}

/// Frame range `[first, end)` spanned by all non-empty regions.
pub(super) fn frame_span(regions: &[MemoryRegion]) -> Result<(u64, u64)> {
    let mut span: Option<(u64, u64)> = None;
    for region in regions.iter().filter(|r| !r.is_empty()) {
        let end = region.end().ok_or(KernelError::Overflow)?;
        let first = align_down(region.base.as_u64(), PAGE_SIZE) / PAGE_SIZE;
        let end = align_up(end, PAGE_SIZE).ok_or(KernelError::Overflow)? / PAGE_SIZE;
        span = Some(match span {
            None => (first, end),
            Some((lo, hi)) => (lo.min(first), hi.max(end)),
        });
    }
    span.ok_or(KernelError::BadArgs)
}
