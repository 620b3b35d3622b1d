//! # Memory Layout Modes
//!
//! The console variant decides how much RAM exists, where the PFN database
//! lives and whether the upper half of RAM belongs to the debugger. The mode is
//! chosen once when the memory manager is built and never changes afterwards.

use crate::memory::{
    CHIHIRO_CONTIGUOUS_MEMORY_LIMIT, CHIHIRO_HIGHEST_PHYSICAL_PAGE, CHIHIRO_MEMORY_SIZE,
    CHIHIRO_PFN_DATABASE_PHYSICAL_PAGE, CONTIGUOUS_MEMORY_BASE, DEBUGKIT_FIRST_UPPER_HALF_PAGE,
    PAGE_SHIFT, PFN_RECORD_SIZE, XBOX_CONTIGUOUS_MEMORY_LIMIT, XBOX_HIGHEST_PHYSICAL_PAGE,
    XBOX_MEMORY_SIZE, XBOX_PFN_DATABASE_PHYSICAL_PAGE,
};
use core::fmt;
use utils_accessors_derive::Setters;
use xbox_memory_addresses::{Pfn, PfnCount, VirtualAddress};

/// Physical memory layout of the emulated console.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum MemoryLayout {
    /// 64 MiB retail console.
    #[default]
    Retail,
    /// 128 MiB development kit; the upper 64 MiB form the debugger pool.
    Debug,
    /// 128 MiB Chihiro arcade board, all of it general purpose.
    Chihiro,
}

impl MemoryLayout {
    /// Derived parameters of this layout.
    ///
    /// On a development kit the 32-page PFN database straddles the 64 MiB
    /// boundary: 16 pages below it, 16 above, each half mapped by its own
    /// page table.
    #[must_use]
    pub const fn parameters(self) -> LayoutParameters {
        match self {
            Self::Retail => LayoutParameters::new()
                .with_ram_size(XBOX_MEMORY_SIZE)
                .with_highest_page(Pfn::new(XBOX_HIGHEST_PHYSICAL_PAGE))
                .with_pfn_database_page(Pfn::new(XBOX_PFN_DATABASE_PHYSICAL_PAGE))
                .with_pfn_database_pages(16)
                .with_pfn_database_pdes(1)
                .with_ptes_used_per_database_pt(16)
                .with_max_contiguous_pfn(Pfn::new(XBOX_CONTIGUOUS_MEMORY_LIMIT))
                .with_debugger_boundary(None),
            Self::Debug => LayoutParameters::new()
                .with_ram_size(CHIHIRO_MEMORY_SIZE)
                .with_highest_page(Pfn::new(CHIHIRO_HIGHEST_PHYSICAL_PAGE))
                .with_pfn_database_page(Pfn::new(XBOX_PFN_DATABASE_PHYSICAL_PAGE))
                .with_pfn_database_pages(32)
                .with_pfn_database_pdes(2)
                .with_ptes_used_per_database_pt(16)
                .with_max_contiguous_pfn(Pfn::new(XBOX_CONTIGUOUS_MEMORY_LIMIT))
                .with_debugger_boundary(Some(Pfn::new(DEBUGKIT_FIRST_UPPER_HALF_PAGE))),
            Self::Chihiro => LayoutParameters::new()
                .with_ram_size(CHIHIRO_MEMORY_SIZE)
                .with_highest_page(Pfn::new(CHIHIRO_HIGHEST_PHYSICAL_PAGE))
                .with_pfn_database_page(Pfn::new(CHIHIRO_PFN_DATABASE_PHYSICAL_PAGE))
                .with_pfn_database_pages(32)
                .with_pfn_database_pdes(1)
                .with_ptes_used_per_database_pt(32)
                .with_max_contiguous_pfn(Pfn::new(CHIHIRO_CONTIGUOUS_MEMORY_LIMIT))
                .with_debugger_boundary(None),
        }
    }
}

impl fmt::Display for MemoryLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Retail => "retail",
            Self::Debug => "debug",
            Self::Chihiro => "chihiro",
        })
    }
}

/// Numbers the physical memory manager needs from a [`MemoryLayout`].
///
/// Obtained from [`MemoryLayout::parameters`]; tests override single values
/// with the generated `with_*` builders.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Setters)]
#[setters(get)]
pub struct LayoutParameters {
    /// Bytes of guest RAM.
    ram_size: u32,
    /// Highest valid page frame number.
    highest_page: Pfn,
    /// First physical page of the PFN database.
    pfn_database_page: Pfn,
    /// Pages occupied by the PFN database.
    pfn_database_pages: PfnCount,
    /// Page tables needed to map the PFN database.
    pfn_database_pdes: u32,
    /// `PtesUsed` recorded for each of those page tables.
    ptes_used_per_database_pt: u32,
    /// Highest page handed out for page tables.
    max_contiguous_pfn: Pfn,
    /// First page of the debugger-only pool, if the layout has one.
    debugger_boundary: Option<Pfn>,
}

impl LayoutParameters {
    const fn new() -> Self {
        Self {
            ram_size: 0,
            highest_page: Pfn::new(0),
            pfn_database_page: Pfn::new(0),
            pfn_database_pages: 0,
            pfn_database_pdes: 0,
            ptes_used_per_database_pt: 0,
            max_contiguous_pfn: Pfn::new(0),
            debugger_boundary: None,
        }
    }

    /// Total number of page frames (`highest_page + 1`).
    #[inline]
    #[must_use]
    pub const fn page_count(&self) -> PfnCount {
        self.highest_page.as_u32() + 1
    }

    /// Last physical page of the PFN database.
    #[inline]
    #[must_use]
    pub const fn pfn_database_end(&self) -> Pfn {
        Pfn::new(self.pfn_database_page.as_u32() + self.pfn_database_pages - 1)
    }

    /// Virtual address of the PFN database, inside the contiguous alias.
    #[inline]
    #[must_use]
    pub const fn pfn_database_address(&self) -> VirtualAddress {
        let offset = self.pfn_database_page.as_u32() << PAGE_SHIFT;
        VirtualAddress::new(CONTIGUOUS_MEMORY_BASE + offset)
    }

    /// Virtual address of the PFN database record describing `pfn`.
    #[inline]
    #[must_use]
    pub const fn pfn_element_address(&self, pfn: Pfn) -> VirtualAddress {
        VirtualAddress::new(self.pfn_database_address().as_u32() + pfn.as_u32() * PFN_RECORD_SIZE)
    }
}
