//! # Xbox Paging Structures
//!
//! Bit-exact encodings and pure helpers for the guest's 32-bit, non-PAE
//! paging with 4 MiB large pages (PSE).
//!
//! ## Modules
//!
//! - [`page_table`]: self-map address arithmetic (which PTE/PDE maps an
//!   address, which address a PTE maps, how many pages a range spans).
//! - [`MmPte`]: a page table or page directory entry.
//! - [`XboxPfn`] and [`PageType`]: one record of the PFN database.
//! - [`XboxProtection`] and the translators [`pte_permissions`],
//!   [`system_pte_permissions`] and [`protection_of`].
//!
//! ## Entry Encoding
//!
//! ```text
//!  31                          12 11 10  9  8  7  6  5  4  3  2  1  0
//! ┌──────────────────────────────┬──┬──┬──┬──┬──┬──┬──┬──┬──┬──┬──┬──┐
//! │             PFN              │  │PE│GD│G │PS│D │A │CD│WT│O │W │V │
//! └──────────────────────────────┴──┴──┴──┴──┴──┴──┴──┴──┴──┴──┴──┴──┘
//! ```
//!
//! Nothing in this crate touches guest memory; reading and writing entries
//! is up to the physical memory manager and its memory backend.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

pub mod page_table;
mod pfn_record;
mod protection;
mod pte;

pub use crate::pfn_record::{PageType, XboxPfn};
pub use crate::protection::{
    ProtectionError, XboxProtection, protection_of, pte_permissions, system_pte_permissions,
};
pub use crate::pte::*;
