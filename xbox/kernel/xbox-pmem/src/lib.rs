//! # Xbox Physical Memory Manager
//!
//! Owns the guest's physical pages: which are free, what every busy page is
//! used for, and the page tables that map them.
//!
//! ## Parts
//!
//! - [`FreeList`]: coalesced runs of free pages, allocated from the top.
//! - The PFN database: one [`XboxPfn`](xbox_vmem::XboxPfn) record per page,
//!   living in guest RAM at a fixed virtual address and maintained by
//!   [`PhysicalMemory::write_pfn`] and [`PhysicalMemory::zero_pfn`].
//! - Page tables: [`PhysicalMemory::allocate_pt`],
//!   [`PhysicalMemory::deallocate_pt`] and the PTE writers
//!   [`PhysicalMemory::write_pte`] / [`PhysicalMemory::zero_pte`].
//!
//! Guest memory is reached only through a [`MemoryBackend`]; see
//! [`backend`] for the two provided implementations.
//!
//! ## Boot
//!
//! ```rust
//! use xbox_info::MemoryLayout;
//! use xbox_pmem::{DirectMemory, PhysicalMemory};
//!
//! let layout = MemoryLayout::Retail;
//! let backend = DirectMemory::new(layout.parameters().ram_size());
//! let mut pmem = PhysicalMemory::new(backend, layout);
//! pmem.boot();
//! assert!(pmem.check_consistency().is_ok());
//! ```
//!
//! ## Errors
//!
//! Running out of pages is reported through [`PhysicalMemoryError`] or
//! `None`. Corruption of the manager's own structures, and page faults on
//! the page table and PFN database accesses it performs, are fatal: they
//! are logged at error level and abort with a panic.
//!
//! The manager is not thread-safe; callers serialize access.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

/// Log at error level, then panic with the same message.
macro_rules! fatal {
    ($($arg:tt)*) => {{
        let message = ::alloc::format!($($arg)*);
        ::log::error!("{message}");
        ::core::panic!("{message}")
    }};
}

pub(crate) use fatal;

pub mod backend;
mod error;
mod free_list;
mod physical_memory;

pub use crate::backend::{CachedMemory, DirectMemory, GuestRam, MemoryBackend, PageFault};
pub use crate::error::PhysicalMemoryError;
pub use crate::free_list::{FreeBlock, FreeList, Iter as FreeListIter};
pub use crate::physical_memory::PhysicalMemory;
pub use xbox_vmem::{
    ProtectionError, XboxProtection, protection_of, pte_permissions, system_pte_permissions,
};
