//! # Kernel synchronization primitives
//!
//! * [`SpinLock`]: test-and-test-and-set lock for short critical sections.
//!   [`SpinLock::lock_irq`] additionally masks interrupts for the lifetime of
//!   the guard so an interrupt handler can never spin on a lock held by the
//!   context it preempted.
//! * [`IrqGuard`]: RAII interrupt masking (`cli`/`sti`, restoring the prior
//!   `IF` state).
//! * [`InitCell`]: a once-initialized slot for process-wide subsystem state.
//!
//! On hosted targets (unit tests) interrupt masking compiles to nothing.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod init_cell;
pub mod irq;
mod spin_lock;

pub use init_cell::InitCell;
pub use irq::IrqGuard;
pub use spin_lock::{IrqSpinLockGuard, SpinLock, SpinLockGuard};
