//! # Kernel error taxonomy
//!
//! Every fallible operation of the memory and module-loading core returns a
//! [`Result`] whose error side is a [`KernelError`]. The enum doubles as the
//! integer status code surfaced across the kernel ABI boundary, where `0`
//! means success and every failure is negative:
//!
//! | Variant | Code | Class |
//! |---------|------|-------|
//! | [`BadArgs`](KernelError::BadArgs)     | -1 | invalid input |
//! | [`BadAlloc`](KernelError::BadAlloc)   | -2 | invalid state |
//! | [`TooMany`](KernelError::TooMany)     | -3 | resource exhaustion |
//! | [`NoSuch`](KernelError::NoSuch)       | -4 | missing entity |
//! | [`NotInit`](KernelError::NotInit)     | -5 | invalid state |
//! | [`Overflow`](KernelError::Overflow)   | -6 | resource exhaustion |
//! | [`Limits`](KernelError::Limits)       | -7 | resource exhaustion |
//! | [`Dangling`](KernelError::Dangling)   | -8 | invalid state |
//! | [`Corrupted`](KernelError::Corrupted) | -9 | corruption |
//!
//! ```rust
//! use kernel_errors::{ErrorClass, KernelError, status_code};
//!
//! let err = KernelError::TooMany;
//! assert_eq!(err.code(), -3);
//! assert_eq!(err.class(), ErrorClass::ResourceExhaustion);
//! assert!(err.is_recoverable());
//! assert_eq!(KernelError::from_code(-3), Some(err));
//! assert_eq!(status_code(&Ok::<(), _>(())), 0);
//! assert!(!KernelError::Corrupted.is_recoverable());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

/// Status code reported for a successful operation.
pub const OKAY: i32 = 0;

/// Result alias used throughout the kernel core.
pub type Result<T, E = KernelError> = core::result::Result<T, E>;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, thiserror::Error)]
pub enum KernelError {
    /// Invalid argument: null, misaligned, out of range, duplicate or full.
    #[error("invalid argument")]
    BadArgs,
    /// A backing resource could not be turned into a usable allocation.
    #[error("bad allocation")]
    BadAlloc,
    /// Out of frames, window space or table slots.
    #[error("out of resources")]
    TooMany,
    /// The named or addressed entity does not exist.
    #[error("no such entity")]
    NoSuch,
    /// The subsystem has not been initialized yet.
    #[error("subsystem not initialized")]
    NotInit,
    /// An address or size computation would overflow.
    #[error("arithmetic overflow")]
    Overflow,
    /// A fixed capacity limit was exceeded.
    #[error("fixed limit exceeded")]
    Limits,
    /// Use of memory that is already free (double free).
    #[error("dangling reference")]
    Dangling,
    /// A magic value did not match: the heap can no longer be trusted.
    #[error("heap corruption detected")]
    Corrupted,
}

/// Broad category of a [`KernelError`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ErrorClass {
    ResourceExhaustion,
    InvalidInput,
    Missing,
    InvalidState,
    Corruption,
}

impl KernelError {
    pub const ALL: [Self; 9] = [
        Self::BadArgs,
        Self::BadAlloc,
        Self::TooMany,
        Self::NoSuch,
        Self::NotInit,
        Self::Overflow,
        Self::Limits,
        Self::Dangling,
        Self::Corrupted,
    ];

    /// ABI status code; always negative.
    #[inline]
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::BadArgs => -1,
            Self::BadAlloc => -2,
            Self::TooMany => -3,
            Self::NoSuch => -4,
            Self::NotInit => -5,
            Self::Overflow => -6,
            Self::Limits => -7,
            Self::Dangling => -8,
            Self::Corrupted => -9,
        }
    }

    /// Maps an ABI status code back to its error; `None` for [`OKAY`] and
    /// unknown codes.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::BadArgs),
            -2 => Some(Self::BadAlloc),
            -3 => Some(Self::TooMany),
            -4 => Some(Self::NoSuch),
            -5 => Some(Self::NotInit),
            -6 => Some(Self::Overflow),
            -7 => Some(Self::Limits),
            -8 => Some(Self::Dangling),
            -9 => Some(Self::Corrupted),
            _ => None,
        }
    }

    #[must_use]
    pub const fn class(self) -> ErrorClass {
        match self {
            Self::TooMany | Self::Overflow | Self::Limits => ErrorClass::ResourceExhaustion,
            Self::BadArgs => ErrorClass::InvalidInput,
            Self::NoSuch => ErrorClass::Missing,
            Self::BadAlloc | Self::NotInit | Self::Dangling => ErrorClass::InvalidState,
            Self::Corrupted => ErrorClass::Corruption,
        }
    }

    /// Whether the caller may reasonably continue after this error.
    ///
    /// Corruption is the only condition the kernel must not run past.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        !matches!(self, Self::Corrupted)
    }
}

impl From<KernelError> for i32 {
    fn from(value: KernelError) -> Self {
        value.code()
    }
}

/// Collapses a result into its ABI status code.
#[inline]
pub const fn status_code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => OKAY,
        Err(e) => e.code(),
    }
}
