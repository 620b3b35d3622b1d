//! # Self-Map Address Arithmetic
//!
//! The page directory maps itself at index `0x300`, so the page tables of the
//! whole 4 GiB address space appear as one linear array of PTEs starting at
//! [`PAGE_TABLES_BASE`], and the directory itself appears at
//! [`PAGE_DIRECTORY_BASE`]:
//!
//! ```text
//! PTE(va) = 0xC000_0000 + (va >> 12) * 4
//! PDE(va) = 0xC030_0000 + (va >> 22) * 4
//! ```
//!
//! Because the directory is one of the "page tables" of that window, applying
//! [`pte_address`] to the address of a PTE yields the PDE that maps the page
//! table containing it.
//!
//! All helpers here are pure; none of them touch guest memory.

use xbox_info::memory::{
    LARGE_PAGE_SHIFT, LARGE_PAGE_SIZE, PAGE_DIRECTORY_BASE, PAGE_SHIFT, PAGE_SIZE,
    PAGE_TABLES_BASE, PTE_SIZE, PTES_PER_PAGE,
};
use xbox_memory_addresses::{PfnCount, Size4K, Size4M, VirtualAddress};

/// Virtual address of the PDE that maps `va`.
///
/// ```rust
/// # use xbox_memory_addresses::VirtualAddress;
/// # use xbox_vmem::page_table::pde_address;
/// assert_eq!(pde_address(VirtualAddress::new(0x8000_0000)).as_u32(), 0xC030_0800);
/// ```
#[inline]
#[must_use]
pub const fn pde_address(va: VirtualAddress) -> VirtualAddress {
    VirtualAddress::new(PAGE_DIRECTORY_BASE + ((va.as_u32() >> LARGE_PAGE_SHIFT) << 2))
}

/// Virtual address of the PTE that maps `va`.
#[inline]
#[must_use]
pub const fn pte_address(va: VirtualAddress) -> VirtualAddress {
    VirtualAddress::new(PAGE_TABLES_BASE + ((va.as_u32() >> PAGE_SHIFT) << 2))
}

/// First virtual address of the page mapped by the PTE at `pte`.
#[inline]
#[must_use]
pub const fn vaddr_mapped_by_pte(pte: VirtualAddress) -> VirtualAddress {
    VirtualAddress::new(pte.as_u32().wrapping_sub(PAGE_TABLES_BASE) << 10)
}

/// Index of `va`'s PTE within its page table (`0..1024`).
#[inline]
#[must_use]
pub const fn pte_offset(va: VirtualAddress) -> u32 {
    (va.as_u32() >> PAGE_SHIFT) & (PTES_PER_PAGE - 1)
}

/// Index of `va`'s PDE within the page directory (`0..1024`).
#[inline]
#[must_use]
pub const fn pde_offset(va: VirtualAddress) -> u32 {
    va.as_u32() >> LARGE_PAGE_SHIFT
}

/// `true` if the PTE at `pte` is the first entry of its page table.
#[inline]
#[must_use]
pub const fn is_pte_on_pde_boundary(pte: VirtualAddress) -> bool {
    pte.is_aligned::<Size4K>()
}

/// Number of 4 KiB pages touched by `[va, va + size)`.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn pages_spanned(va: VirtualAddress, size: u32) -> PfnCount {
    let offset = (va.as_u32() & (PAGE_SIZE - 1)) as u64;
    ((offset + size as u64 + (PAGE_SIZE as u64 - 1)) >> PAGE_SHIFT) as PfnCount
}

/// Number of 4 MiB directory spans touched by `[va, va + size)`.
///
/// ```rust
/// # use xbox_memory_addresses::VirtualAddress;
/// # use xbox_vmem::page_table::pages_spanned_large;
/// // the Debug PFN database crosses the 0x8400_0000 boundary
/// assert_eq!(pages_spanned_large(VirtualAddress::new(0x83FF_0000), 0x2_0000), 2);
/// assert_eq!(pages_spanned_large(VirtualAddress::new(0x87FE_0000), 0x2_0000), 1);
/// ```
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn pages_spanned_large(va: VirtualAddress, size: u32) -> u32 {
    let offset = (va.as_u32() & (LARGE_PAGE_SIZE - 1)) as u64;
    ((offset + size as u64 + (LARGE_PAGE_SIZE as u64 - 1)) >> LARGE_PAGE_SHIFT) as u32
}

#[inline]
#[must_use]
pub const fn round_up_4k(va: VirtualAddress) -> VirtualAddress {
    VirtualAddress::new(va.as_u32().wrapping_add(PAGE_SIZE - 1) & !(PAGE_SIZE - 1))
}

#[inline]
#[must_use]
pub const fn round_down_4k(va: VirtualAddress) -> VirtualAddress {
    va.align_down::<Size4K>()
}

#[inline]
#[must_use]
pub const fn round_down_4m(va: VirtualAddress) -> VirtualAddress {
    va.align_down::<Size4M>()
}

/// Address of the entry following the PTE/PDE at `entry`.
#[inline]
#[must_use]
pub const fn next_entry(entry: VirtualAddress) -> VirtualAddress {
    VirtualAddress::new(entry.as_u32().wrapping_add(PTE_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn va(v: u32) -> VirtualAddress {
        VirtualAddress::new(v)
    }

    #[test]
    fn self_map_of_the_directory() {
        // the PDE of the self-map window is the directory's own entry 0x300
        assert_eq!(pde_address(va(PAGE_TABLES_BASE)), va(0xC030_0C00));
        // the PTE of the directory page is that same entry
        assert_eq!(pte_address(va(PAGE_DIRECTORY_BASE)), va(0xC030_0C00));
    }

    #[test]
    fn pte_of_pte_is_pde() {
        for addr in [0x0001_0000, 0x8001_2345, 0x83FF_0000, 0xD000_0000, 0xFFBF_F000] {
            assert_eq!(pte_address(pte_address(va(addr))), pde_address(va(addr)));
        }
    }

    #[test]
    fn pte_round_trip() {
        let addr = va(0x83FF_5000);
        let pte = pte_address(addr);
        assert_eq!(pte, va(0xC020_FFD4));
        assert_eq!(vaddr_mapped_by_pte(pte), addr);
        assert_eq!(pte_offset(addr), 0x3F5);
        assert_eq!(pde_offset(addr), 0x20F);
    }

    #[test]
    fn pde_boundaries() {
        assert!(is_pte_on_pde_boundary(pte_address(va(0x8040_0000))));
        assert!(!is_pte_on_pde_boundary(pte_address(va(0x8040_1000))));
        assert_eq!(next_entry(va(0xC000_0FFC)), va(0xC000_1000));
    }

    #[test]
    fn spans() {
        assert_eq!(pages_spanned(va(0x1000), 0x1000), 1);
        assert_eq!(pages_spanned(va(0x1FFF), 2), 2);
        assert_eq!(pages_spanned(va(0x1000), 0), 0);
        assert_eq!(pages_spanned_large(va(0x0040_0000), 1), 1);
        assert_eq!(pages_spanned_large(va(0x003F_F000), 0x2000), 2);
        assert_eq!(pages_spanned_large(va(0x8000_0000), 0x4000_0000), 256);
        assert_eq!(pages_spanned_large(va(0xFFC0_0000), 0x40_0000), 1);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_up_4k(va(0x1001)), va(0x2000));
        assert_eq!(round_up_4k(va(0x1000)), va(0x1000));
        assert_eq!(round_down_4k(va(0x1FFF)), va(0x1000));
        assert_eq!(round_down_4m(va(0x83FF_0000)), va(0x83C0_0000));
    }
}
