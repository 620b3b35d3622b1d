//! # Guest Memory Address Types
//!
//! Strongly typed wrappers for the 32-bit addresses and page frame numbers
//! exchanged between the emulated Xbox kernel and its memory manager.
//!
//! ## Overview
//!
//! The guest sees a flat, non-segmented 4 GiB address space. Every address
//! exchanged with the memory manager is therefore a `u32`, but mixing the
//! three kinds of value below is the classic source of paging bugs, so each
//! gets its own zero-cost newtype:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] | Translated by the guest page tables. |
//! | [`PhysicalAddress`] | Guest bus address (RAM offset or one of its aliases). |
//! | [`Pfn`] | Index of a 4 KiB physical page frame. |
//!
//! Page arithmetic is expressed through [`MemoryPage<S>`] and
//! [`MemoryAddressOffset<S>`], parameterized by a [`PageSize`] marker:
//!
//! - [`Size4K`]: 4 KiB pages mapped by a PTE
//! - [`Size4M`]: 4 MiB large pages mapped by a PDE (`PS=1`)
//!
//! ## Typical Usage
//!
//! ```rust
//! # use xbox_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x03FF_0123);
//! let pfn = Pfn::containing(pa);
//! assert_eq!(pfn.as_u32(), 0x3FF0);
//! assert_eq!(pfn.base().as_u32(), 0x03FF_0000);
//!
//! let va = VirtualAddress::new(0xC030_0C00);
//! assert_eq!(va.page::<Size4M>().number(), 0x300);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod memory_address;
mod memory_page;
mod page_size;
mod pfn;
mod physical_address;
mod virtual_address;

pub use crate::memory_address::MemoryAddress;
pub use crate::memory_page::{MemoryAddressOffset, MemoryPage};
pub use crate::page_size::{PageSize, Size4K, Size4M};
pub use crate::pfn::{Pfn, PfnCount};
pub use crate::physical_address::PhysicalAddress;
pub use crate::virtual_address::VirtualAddress;
