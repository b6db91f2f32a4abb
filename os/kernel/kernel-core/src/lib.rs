//! # Kernel Core Bring-up
//!
//! Wires the memory and module subsystems together in the only order that
//! works:
//!
//! 1. [`init_memory`]: physical page allocator, then the slab heap.
//! 2. [`init_modules`]: module windows, the kernel export table and the
//!    built-in ELF loader.
//! 3. [`load_boot_modules`]: every module the boot stage handed over is
//!    reserved, dispatched to a loader and registered.
//!
//! [`stage`] reports how far bring-up has come.
//!
//! Errors are returned as they are, with one exception:
//! [`KernelError::Corrupted`](kernel_errors::KernelError::Corrupted) means
//! heap metadata has been overwritten and the core halts on it.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod fatal;
mod init;
mod modules;
mod stage;

pub use init::{init_memory, init_modules};
pub use modules::{BootLoadReport, load_boot_module, load_boot_modules, unload_module};
pub use stage::{InitStage, stage};
