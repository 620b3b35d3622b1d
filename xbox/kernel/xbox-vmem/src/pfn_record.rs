//! # PFN Database Records
//!
//! One 32-bit record per physical page frame, stored in guest memory at the
//! top of RAM. A record is either all-zero (the page is free or untracked) or
//! has `busy` set together with the [`PageType`] the page is used for.
//!
//! The record has two overlapping views of bits `17..=27`:
//!
//! - page-table pages keep `ptes_used`, the number of valid entries in the
//!   table (bits `17..=27`);
//! - every other page keeps `pte_index`, the index of its mapping PTE within
//!   the owning page table (bits `18..=27`).

use bitfield_struct::bitfield;
use core::fmt;

/// What a busy physical page is used for.
///
/// The discriminant is the 4-bit value stored in [`XboxPfn::busy_type`] and
/// the index of the per-type usage counter.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PageType {
    Unknown = 0,
    Stack,
    VirtualPageTable,
    SystemPageTable,
    Pool,
    VirtualMemory,
    SystemMemory,
    Image,
    Cache,
    Contiguous,
    Debugger,
}

impl PageType {
    /// Number of page types.
    pub const COUNT: usize = 11;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Unknown,
        Self::Stack,
        Self::VirtualPageTable,
        Self::SystemPageTable,
        Self::Pool,
        Self::VirtualMemory,
        Self::SystemMemory,
        Self::Image,
        Self::Cache,
        Self::Contiguous,
        Self::Debugger,
    ];

    #[inline]
    #[must_use]
    pub const fn from_raw(v: u8) -> Option<Self> {
        if (v as usize) < Self::COUNT {
            Some(Self::ALL[v as usize])
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// `true` for pages holding a page table.
    #[inline]
    #[must_use]
    pub const fn is_page_table(self) -> bool {
        matches!(self, Self::VirtualPageTable | Self::SystemPageTable)
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A PFN database record.
///
/// ```rust
/// # use xbox_vmem::{PageType, XboxPfn};
/// let pt = XboxPfn::busy_as(PageType::SystemPageTable).with_ptes_used(16);
/// assert_eq!(pt.into_bits(), 0x3021_0000);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq, Hash)]
pub struct XboxPfn {
    pub lock_count: u16,
    pub busy: bool,
    /// Bits `17..=27`: `PtesUsed`, or `PteIndex << 1` for non page-table pages.
    #[bits(11)]
    frame_info: u16,
    #[bits(4)]
    busy_type_bits: u8,
}

impl XboxPfn {
    /// A busy record of type `ty` with every other field zero.
    #[inline]
    #[must_use]
    pub const fn busy_as(ty: PageType) -> Self {
        Self::new().with_busy(true).with_busy_type(ty)
    }

    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.into_bits() == 0
    }

    /// The stored page type; values outside [`PageType`] read as `Unknown`.
    #[inline]
    #[must_use]
    pub const fn busy_type(self) -> PageType {
        match PageType::from_raw(self.busy_type_bits()) {
            Some(ty) => ty,
            None => PageType::Unknown,
        }
    }

    #[inline]
    pub const fn set_busy_type(&mut self, ty: PageType) {
        self.set_busy_type_bits(ty.as_u8());
    }

    #[inline]
    #[must_use]
    pub const fn with_busy_type(self, ty: PageType) -> Self {
        self.with_busy_type_bits(ty.as_u8())
    }

    /// Valid entries of the page table held by this page.
    #[inline]
    #[must_use]
    pub const fn ptes_used(self) -> u16 {
        self.frame_info()
    }

    #[inline]
    pub const fn set_ptes_used(&mut self, count: u16) {
        self.set_frame_info(count);
    }

    #[inline]
    #[must_use]
    pub const fn with_ptes_used(self, count: u16) -> Self {
        self.with_frame_info(count)
    }

    /// Index of the PTE mapping this page within its page table.
    #[inline]
    #[must_use]
    pub const fn pte_index(self) -> u16 {
        self.frame_info() >> 1
    }

    #[inline]
    #[must_use]
    pub const fn with_pte_index(self, index: u16) -> Self {
        debug_assert!(index < 1024);
        self.with_frame_info((self.frame_info() & 1) | ((index & 0x3FF) << 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_type_discriminants() {
        assert_eq!(PageType::Unknown.as_u8(), 0);
        assert_eq!(PageType::VirtualPageTable.as_u8(), 2);
        assert_eq!(PageType::SystemPageTable.as_u8(), 3);
        assert_eq!(PageType::Debugger.as_u8(), 10);
        for ty in PageType::ALL {
            assert_eq!(PageType::from_raw(ty.as_u8()), Some(ty));
        }
        assert_eq!(PageType::from_raw(11), None);
    }

    #[test]
    fn page_table_view() {
        let mut pfn = XboxPfn::busy_as(PageType::VirtualPageTable);
        pfn.set_ptes_used(1024);
        assert!(pfn.busy());
        assert_eq!(pfn.ptes_used(), 1024);
        assert_eq!(pfn.busy_type(), PageType::VirtualPageTable);
        assert_eq!(pfn.into_bits(), 0x2801_0000);
    }

    #[test]
    fn generic_view() {
        let pfn = XboxPfn::busy_as(PageType::Contiguous).with_pte_index(0x3F5);
        assert_eq!(pfn.pte_index(), 0x3F5);
        assert_eq!(pfn.into_bits(), 0x9000_0000 | (0x3F5 << 18) | (1 << 16));
        assert_eq!(pfn.lock_count(), 0);
    }

    #[test]
    fn unknown_type_values() {
        let raw = XboxPfn::from_bits(0xF001_0000);
        assert!(raw.busy());
        assert_eq!(raw.busy_type(), PageType::Unknown);
        assert_eq!(raw.with_busy_type(PageType::Pool).into_bits(), 0x4001_0000);
        assert!(XboxPfn::new().is_zero());
    }
}
