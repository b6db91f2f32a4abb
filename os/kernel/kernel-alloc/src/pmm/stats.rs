use kernel_info::memory::PAGE_SIZE;

/// Snapshot of the PMM counters.
///
/// `used_pages + free_pages == total_pages` always holds; pages of reserved,
/// kernel and bad regions count as used.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct PmmStats {
    pub total_pages: u64,
    pub used_pages: u64,
    pub free_pages: u64,
    /// Allocation requests that failed for lack of a free frame.
    pub failed_allocs: u64,
    pub regions: usize,
}

impl PmmStats {
    #[must_use]
    pub const fn total_bytes(&self) -> u64 {
        self.total_pages * PAGE_SIZE
    }

    #[must_use]
    pub const fn used_bytes(&self) -> u64 {
        self.used_pages * PAGE_SIZE
    }

    #[must_use]
    pub const fn free_bytes(&self) -> u64 {
        self.free_pages * PAGE_SIZE
    }

    /// Used share of all tracked pages, in whole percent.
    #[must_use]
    pub const fn usage_percent(&self) -> u64 {
        if self.total_pages == 0 {
            0
        } else {
            self.used_pages * 100 / self.total_pages
        }
    }
}
