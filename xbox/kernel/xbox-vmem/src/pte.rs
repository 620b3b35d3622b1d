use bitfield_struct::bitfield;
use xbox_memory_addresses::Pfn;

pub const PTE_VALID_MASK: u32 = 1 << 0;
pub const PTE_WRITE_MASK: u32 = 1 << 1;
pub const PTE_OWNER_MASK: u32 = 1 << 2;
pub const PTE_WRITE_THROUGH_MASK: u32 = 1 << 3;
pub const PTE_CACHE_DISABLE_MASK: u32 = 1 << 4;
pub const PTE_ACCESS_MASK: u32 = 1 << 5;
pub const PTE_DIRTY_MASK: u32 = 1 << 6;
pub const PTE_LARGE_PAGE_MASK: u32 = 1 << 7;
pub const PTE_GLOBAL_MASK: u32 = 1 << 8;
pub const PTE_GUARD_END_OF_ALLOCATION_MASK: u32 = 1 << 9;
pub const PTE_PERSIST_MASK: u32 = 1 << 10;

/// Bits a present kernel PTE carries: valid, writable, dirty, accessed.
pub const VALID_KERNEL_PTE_BITS: u32 =
    PTE_VALID_MASK | PTE_WRITE_MASK | PTE_DIRTY_MASK | PTE_ACCESS_MASK;
/// Bits a present PDE carries: the kernel PTE bits plus owner.
pub const VALID_KERNEL_PDE_BITS: u32 = VALID_KERNEL_PTE_BITS | PTE_OWNER_MASK;

pub const PTE_READONLY: u32 = 0;
pub const PTE_READWRITE: u32 = PTE_WRITE_MASK;
pub const PTE_GUARD: u32 = PTE_GUARD_END_OF_ALLOCATION_MASK;

/// Every bit a protection translation may produce.
pub const PTE_VALID_PROTECTION_MASK: u32 = PTE_VALID_MASK
    | PTE_WRITE_MASK
    | PTE_WRITE_THROUGH_MASK
    | PTE_CACHE_DISABLE_MASK
    | PTE_GUARD_END_OF_ALLOCATION_MASK;

/// A 32-bit x86 (non-PAE) page table or page directory entry, as stored in
/// guest memory.
///
/// The layout is the hardware one with the kernel's software bits on top:
///
/// | Bits   | Name | Meaning |
/// |--------|------|---------|
/// | 0      | `valid` | Present |
/// | 1      | `write` | Writable |
/// | 2      | `owner` | User accessible (set on PDEs) |
/// | 3      | `write_through` | `PWT`; alone it marks a write-combined mapping |
/// | 4      | `cache_disable` | `PCD`; together with `PWT` marks an uncached mapping |
/// | 5      | `accessed` | Accessed |
/// | 6      | `dirty` | Dirty |
/// | 7      | `large_page` | `PS`, 4 MiB mapping (PDEs only) |
/// | 8      | `global` | Global |
/// | 9      | `guard_or_end_of_allocation` | Guard page when not valid |
/// | 10     | `persist` | Survives a quick reboot |
/// | 11     | | unused |
/// | 12..31 | `pfn` | Page frame number |
///
/// An all-zero entry means "nothing mapped here"; the PTE writer only fills
/// zero entries and only clears non-zero ones.
///
/// ```rust
/// # use xbox_vmem::MmPte;
/// # use xbox_memory_addresses::Pfn;
/// let pde = MmPte::kernel_pde(Pfn::new(0xF));
/// assert_eq!(pde.into_bits(), 0xF067);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq, Hash)]
pub struct MmPte {
    pub valid: bool,
    pub write: bool,
    pub owner: bool,
    pub write_through: bool,
    pub cache_disable: bool,
    pub accessed: bool,
    pub dirty: bool,
    pub large_page: bool,
    pub global: bool,
    pub guard_or_end_of_allocation: bool,
    pub persist: bool,
    #[bits(1)]
    __: u8,
    #[bits(20)]
    pfn_bits: u32,
}

impl MmPte {
    /// The empty entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new()
    }

    /// A present kernel PTE for `pfn` (`0x63` plus the frame).
    #[inline]
    #[must_use]
    pub const fn kernel_pte(pfn: Pfn) -> Self {
        Self::from_bits(VALID_KERNEL_PTE_BITS).with_pfn(pfn)
    }

    /// A present PDE pointing at the page table in `pfn` (`0x67` plus the frame).
    #[inline]
    #[must_use]
    pub const fn kernel_pde(pfn: Pfn) -> Self {
        Self::from_bits(VALID_KERNEL_PDE_BITS).with_pfn(pfn)
    }

    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.into_bits() == 0
    }

    #[inline]
    #[must_use]
    pub const fn pfn(self) -> Pfn {
        Pfn::new(self.pfn_bits())
    }

    #[inline]
    pub const fn set_pfn(&mut self, pfn: Pfn) {
        self.set_pfn_bits(pfn.as_u32());
    }

    #[inline]
    #[must_use]
    pub const fn with_pfn(self, pfn: Pfn) -> Self {
        self.with_pfn_bits(pfn.as_u32())
    }

    /// Mark the mapping write-combined (`PWT` set, `PCD` clear).
    #[inline]
    #[must_use]
    pub const fn with_write_combine(self) -> Self {
        self.with_cache_disable(false).with_write_through(true)
    }

    /// Mark the mapping uncached (`PWT` and `PCD` set).
    #[inline]
    #[must_use]
    pub const fn with_caching_disabled(self) -> Self {
        self.with_cache_disable(true).with_write_through(true)
    }

    #[inline]
    #[must_use]
    pub const fn is_write_combined(self) -> bool {
        self.write_through() && !self.cache_disable()
    }

    #[inline]
    #[must_use]
    pub const fn is_uncached(self) -> bool {
        self.write_through() && self.cache_disable()
    }

    /// The protection-relevant bits (see [`PTE_VALID_PROTECTION_MASK`]).
    #[inline]
    #[must_use]
    pub const fn protection(self) -> u32 {
        self.into_bits() & PTE_VALID_PROTECTION_MASK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_positions() {
        let e = MmPte::new()
            .with_valid(true)
            .with_large_page(true)
            .with_guard_or_end_of_allocation(true)
            .with_persist(true);
        assert_eq!(e.into_bits(), 0x681);
        assert_eq!(MmPte::new().with_pfn(Pfn::new(0xFFFFF)).into_bits(), 0xFFFF_F000);
    }

    #[test]
    fn masks_match_hardware_values() {
        assert_eq!(VALID_KERNEL_PTE_BITS, 0x63);
        assert_eq!(VALID_KERNEL_PDE_BITS, 0x67);
        assert_eq!(PTE_VALID_PROTECTION_MASK, 0x21B);
        assert_eq!(PTE_PERSIST_MASK, 0x400);
    }

    #[test]
    fn kernel_entries() {
        let pte = MmPte::kernel_pte(Pfn::new(0x3FF0));
        assert!(pte.valid() && pte.write() && pte.dirty() && pte.accessed());
        assert!(!pte.owner());
        assert_eq!(pte.pfn(), Pfn::new(0x3FF0));
        assert_eq!(pte.into_bits(), 0x03FF_0063);
        assert!(MmPte::kernel_pde(Pfn::new(1)).owner());
    }

    #[test]
    fn cache_modes() {
        let wc = MmPte::kernel_pte(Pfn::new(1)).with_write_combine();
        assert!(wc.is_write_combined());
        assert!(!wc.is_uncached());
        let uc = wc.with_caching_disabled();
        assert!(uc.is_uncached());
        assert!(!uc.is_write_combined());
        assert_eq!(uc.into_bits() & 0x18, 0x18);
    }

    #[test]
    fn zero_entry() {
        assert!(MmPte::zero().is_zero());
        assert!(!MmPte::from_bits(PTE_GUARD).is_zero());
        assert_eq!(MmPte::from_bits(0x0123_4E7F).protection(), 0x21B);
    }
}
