//! # Console Configuration
//!
//! Memory map constants of the Xbox console and the three console layouts
//! the physical memory manager can be booted with.
//!
//! ## Guest Address Space
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │         User Space              │
//! 0x7FFE_FFFF ├─────────────────────────────────┤ HIGHEST_USER_ADDRESS
//!             │         (reserved)              │
//! 0x8000_0000 ├─────────────────────────────────┤ CONTIGUOUS_MEMORY_BASE
//!             │  Contiguous alias of all RAM    │
//!             │  (PFN database at its top)      │
//!             ├─────────────────────────────────┤
//!             │  Kernel / system space          │
//! 0xC000_0000 ├─────────────────────────────────┤ PAGE_TABLES_BASE
//!             │  Self-mapped page tables        │
//!             │  (directory at 0xC030_0000)     │
//! 0xC040_0000 ├─────────────────────────────────┤
//!             │  System space                   │
//! 0xF000_0000 ├─────────────────────────────────┤ XBOX_WRITE_COMBINED_BASE
//!             │  Write-combined alias (4M PDEs) │
//! 0xF800_0000 ├─────────────────────────────────┤ XBOX_UNCACHED_BASE
//!             │  Uncached alias (4M PDEs)       │
//! 0xFFC0_0000 ├─────────────────────────────────┤
//!             │  (not mapped by the directory)  │
//! 0xFFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! ## Layouts
//!
//! | Mode | RAM | PFN database | Debugger pool |
//! |------|-----|--------------|---------------|
//! | [`MemoryLayout::Retail`] | 64 MiB | 16 pages at `0x3FF0` | none |
//! | [`MemoryLayout::Debug`] | 128 MiB | 32 pages at `0x3FF0` | pages `0x4000..` |
//! | [`MemoryLayout::Chihiro`] | 128 MiB | 32 pages at `0x7FE0` | none |

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod layout;
pub mod memory;

pub use crate::layout::{LayoutParameters, MemoryLayout};
