//! # Kernel Layout Constants and Boot Handoff Types
//!
//! This crate is the single source of truth for the fixed numbers the memory
//! and module-loading core relies on, and for the shapes of the data the boot
//! stage hands over.
//!
//! ## Modules
//!
//! ### Memory Layout ([`memory`])
//! Page size, the higher-half direct map and the two module windows:
//!
//! ```text
//! HHDM_BASE             ┌─────────────────────────────────┐ 0xffff_8880_0000_0000
//!                       │   Higher Half Direct Mapping    │
//! KERNEL_BASE           ├─────────────────────────────────┤ 0xffff_ffff_8000_0000
//!                       │       Kernel Text & Data        │
//! MODULE_TEXT_BASE      ├─────────────────────────────────┤ 0xffff_ffff_9000_0000
//!                       │   Module code (128 MiB, bump)   │
//! MODULE_DATA_BASE      ├─────────────────────────────────┤ 0xffff_ffff_9800_0000
//!                       │   Module data (128 MiB, bump)   │
//!                       ├─────────────────────────────────┤ 0xffff_ffff_a000_0000
//!                       │           (unused)              │
//! 0xFFFF_FFFF_FFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! The module window bases and sizes are part of the kernel ABI and must not
//! change.
//!
//! ### Capacity Limits ([`limits`])
//! Fixed table sizes: memory regions, loader slots, module name length.
//!
//! ### Boot Information ([`boot`])
//! The physical memory map ([`MemoryRegion`](boot::MemoryRegion)) and the
//! boot-loaded module blobs ([`BootModule`](boot::BootModule)).
//!
//! ## Usage
//!
//! ```rust
//! use kernel_info::memory::{MODULE_TEXT_BASE, MODULE_TEXT_SIZE, MODULE_DATA_BASE};
//!
//! assert_eq!(MODULE_TEXT_BASE + MODULE_TEXT_SIZE, MODULE_DATA_BASE);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod limits;
pub mod memory;
