//! # Console Memory Map
//!
//! Fixed addresses of the guest's 32-bit address space and of the physical
//! pages the kernel reserves on each console variant.

/// Size of a small page.
pub const PAGE_SIZE: u32 = 0x1000;

/// log2 of [`PAGE_SIZE`].
pub const PAGE_SHIFT: u32 = 12;

/// Size of a large page mapped directly by a PDE (`PS=1`).
pub const LARGE_PAGE_SIZE: u32 = 0x40_0000;

/// log2 of [`LARGE_PAGE_SIZE`].
pub const LARGE_PAGE_SHIFT: u32 = 22;

/// Entries in one page table or in the page directory.
pub const PTES_PER_PAGE: u32 = 1024;

/// Size of one PTE/PDE in bytes.
pub const PTE_SIZE: u32 = 4;

/// Size of one PFN database record in bytes.
pub const PFN_RECORD_SIZE: u32 = 4;

/// Virtual base of the self-mapped page tables.
///
/// The page directory maps itself at directory index `0x300`, so every page
/// table of the address space shows up as a 4 KiB page in the 4 MiB window
/// starting here.
pub const PAGE_TABLES_BASE: u32 = 0xC000_0000;

/// Virtual address of the page directory itself, through the self-map.
pub const PAGE_DIRECTORY_BASE: u32 = 0xC030_0000;

/// Physical address of the page directory page (CR3).
pub const PAGE_DIRECTORY_PHYSICAL_ADDRESS: u32 = 0xF000;

/// Byte offset of the self-map PDE inside the page directory.
pub const SELF_MAP_PDE_OFFSET: u32 = 0xC00;

/// Highest address usable by guest user-mode code.
pub const HIGHEST_USER_ADDRESS: u32 = 0x7FFE_FFFF;

/// Virtual alias through which the kernel reaches all of physical RAM.
pub const CONTIGUOUS_MEMORY_BASE: u32 = 0x8000_0000;

/// Write-combined (tiled) physical alias of RAM, mapped with large pages.
pub const XBOX_WRITE_COMBINED_BASE: u32 = 0xF000_0000;
/// Size of the write-combined alias.
pub const XBOX_WRITE_COMBINED_SIZE: u32 = 0x0800_0000;

/// Uncached physical alias of RAM, mapped with large pages.
pub const XBOX_UNCACHED_BASE: u32 = 0xF800_0000;
/// Size of the uncached alias (stops short of the top 4 MiB).
pub const XBOX_UNCACHED_SIZE: u32 = 0x07C0_0000;

/// RAM of a retail console.
pub const XBOX_MEMORY_SIZE: u32 = 64 * 1024 * 1024;
/// RAM of a development kit or a Chihiro arcade board.
pub const CHIHIRO_MEMORY_SIZE: u32 = 128 * 1024 * 1024;

pub const XBOX_HIGHEST_PHYSICAL_PAGE: u32 = 0x3FFF;
pub const CHIHIRO_HIGHEST_PHYSICAL_PAGE: u32 = 0x7FFF;

/// First physical page of the PFN database (Retail and Debug).
pub const XBOX_PFN_DATABASE_PHYSICAL_PAGE: u32 = 0x3FF0;
/// First physical page of the PFN database (Chihiro).
pub const CHIHIRO_PFN_DATABASE_PHYSICAL_PAGE: u32 = 0x7FE0;

/// First page of the GPU instance memory.
pub const XBOX_INSTANCE_PHYSICAL_PAGE: u32 = 0x3FE0;
pub const CHIHIRO_INSTANCE_PHYSICAL_PAGE: u32 = 0x7FD0;

/// Highest page handed out for page tables and contiguous allocations.
///
/// Keeps early allocations away from the GPU instance memory and the PFN
/// database at the top of RAM.
pub const XBOX_CONTIGUOUS_MEMORY_LIMIT: u32 = 0x3FDF;
pub const CHIHIRO_CONTIGUOUS_MEMORY_LIMIT: u32 = 0x7FCF;

/// First page of the upper 64 MiB of a development kit, reserved for the
/// debugger.
pub const DEBUGKIT_FIRST_UPPER_HALF_PAGE: u32 = 0x4000;

/// Virtual address of the Retail/Debug PFN database (`0x83FF_0000`).
pub const XBOX_PFN_ADDRESS: u32 =
    CONTIGUOUS_MEMORY_BASE + (XBOX_PFN_DATABASE_PHYSICAL_PAGE << PAGE_SHIFT);

/// Virtual address of the Chihiro PFN database (`0x87FE_0000`).
pub const CHIHIRO_PFN_ADDRESS: u32 =
    CONTIGUOUS_MEMORY_BASE + (CHIHIRO_PFN_DATABASE_PHYSICAL_PAGE << PAGE_SHIFT);

const _: () = {
    assert!(PAGE_SIZE == 1 << PAGE_SHIFT);
    assert!(LARGE_PAGE_SIZE == 1 << LARGE_PAGE_SHIFT);
    assert!(PAGE_DIRECTORY_BASE == PAGE_TABLES_BASE + (PAGE_TABLES_BASE >> 10));
    assert!(PAGE_TABLES_BASE >> LARGE_PAGE_SHIFT == SELF_MAP_PDE_OFFSET / PTE_SIZE);
    assert!(XBOX_PFN_ADDRESS == 0x83FF_0000);
    assert!(CHIHIRO_PFN_ADDRESS == 0x87FE_0000);
    assert!(XBOX_HIGHEST_PHYSICAL_PAGE + 1 == XBOX_MEMORY_SIZE >> PAGE_SHIFT);
    assert!(CHIHIRO_HIGHEST_PHYSICAL_PAGE + 1 == CHIHIRO_MEMORY_SIZE >> PAGE_SHIFT);
    assert!(XBOX_CONTIGUOUS_MEMORY_LIMIT < XBOX_INSTANCE_PHYSICAL_PAGE);
    assert!(CHIHIRO_CONTIGUOUS_MEMORY_LIMIT < CHIHIRO_INSTANCE_PHYSICAL_PAGE);
    assert!(XBOX_UNCACHED_BASE == XBOX_WRITE_COMBINED_BASE + XBOX_WRITE_COMBINED_SIZE);
};
