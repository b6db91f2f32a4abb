//! # Loadable Kernel Modules
//!
//! Everything needed to take a module image handed over by the boot stage
//! and account for it in the running kernel:
//!
//! - [`modmem`]: the two bump-allocated virtual address windows for module
//!   code and data.
//! - [`exports`]: the kernel symbols modules may import, and [`kexport!`].
//! - [`dynload`]: the table of format handlers and probe-based dispatch.
//! - [`elf`]: the built-in handler for x86-64 ELF relocatable objects.
//! - [`registry`]: the list of loaded modules.
//!
//! ```text
//!  boot module bytes
//!        │
//!        ▼
//!  ┌───────────┐ probe, in registration order  ┌──────────────┐
//!  │  dynload  ├──────────────────────────────►│ ModuleLoader │
//!  └───────────┘                               └──────┬───────┘
//!                                 reserve text / data │ resolve imports
//!                                ┌────────────────────┼───────────────┐
//!                                ▼                                    ▼
//!                          ┌──────────┐                        ┌───────────┐
//!                          │  modmem  │                        │  exports  │
//!                          └──────────┘                        └───────────┘
//!        ModuleRecord
//!        ────────────► registry
//! ```
//!
//! Each piece has a kernel-wide instance next to its plain type. The plain
//! types are what the tests drive; the instances add one-shot
//! initialization and a [`SpinLock`](kernel_sync::SpinLock).

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod dynload;
pub mod elf;
pub mod exports;
pub mod modmem;
pub mod registry;

pub use dynload::{LoadEnv, LoadedModule, LoaderCaps, ModuleImage, ModuleLoader};
pub use elf::ElfModuleLoader;
pub use exports::{ExportTable, KExport};
pub use modmem::{ModuleMemory, VaRange};
pub use registry::{ModuleInfo, ModuleRecord};
