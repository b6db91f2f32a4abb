use core::{
    cell::UnsafeCell,
    hint::spin_loop,
    mem::MaybeUninit,
    sync::atomic::{AtomicU8, Ordering},
};

/// 0 = UNINIT, 1 = INITING, 2 = READY
const UNINIT: u8 = 0;
const INITING: u8 = 1;
const READY: u8 = 2;

/// A slot that is written exactly once and read-only afterwards.
///
/// Subsystem singletons live in an `InitCell` so that "not initialized yet"
/// is observable ([`get`](Self::get) returns `None`) and a second
/// initialization is rejected instead of silently replacing live state.
///
/// ```rust
/// use kernel_sync::InitCell;
///
/// static CELL: InitCell<u32> = InitCell::new();
/// assert!(CELL.get().is_none());
/// assert_eq!(CELL.init(7), Ok(&7));
/// assert_eq!(CELL.init(8), Err(8));
/// assert_eq!(CELL.get(), Some(&7));
/// ```
pub struct InitCell<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Default for InitCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InitCell<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(UNINIT),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Returns `Some(&T)` if already initialized.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) == READY {
            // SAFETY: READY guarantees the write is done
            Some(unsafe { (*self.value.get()).assume_init_ref() })
        } else {
            None
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    /// Stores `value` if the cell is empty.
    ///
    /// Returns the stored reference, or gives `value` back if another caller
    /// initialized (or is initializing) the cell first.
    pub fn init(&self, value: T) -> Result<&T, T> {
        if self
            .state
            .compare_exchange(UNINIT, INITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(value);
        }

        unsafe {
            (*self.value.get()).write(value);
        }
        // Publish value before marking READY
        self.state.store(READY, Ordering::Release);
        // SAFETY: just wrote it
        Ok(unsafe { (*self.value.get()).assume_init_ref() })
    }

    /// Initialize at most once and return `&T`.
    ///
    /// Concurrent callers spin until the winning initializer has published.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        if let Some(v) = self.get() {
            return v;
        }

        if self
            .state
            .compare_exchange(UNINIT, INITING, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            unsafe {
                (*self.value.get()).write(init());
            }
            self.state.store(READY, Ordering::Release);
            return unsafe { (*self.value.get()).assume_init_ref() };
        }

        while self.state.load(Ordering::Acquire) != READY {
            spin_loop();
        }
        // SAFETY: READY
        unsafe { (*self.value.get()).assume_init_ref() }
    }
}

impl<T> Drop for InitCell<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == READY {
            // SAFETY: READY and we have exclusive access.
            unsafe { self.value.get_mut().assume_init_drop() }
        }
    }
}

// Safety: shared after READY; initialization is single-writer.
unsafe impl<T: Sync + Send> Sync for InitCell<T> {}
unsafe impl<T: Send> Send for InitCell<T> {}
