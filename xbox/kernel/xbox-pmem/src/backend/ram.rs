use super::PageFault;
use alloc::vec;
use alloc::vec::Vec;
use xbox_info::memory::{
    CONTIGUOUS_MEMORY_BASE, PAGE_DIRECTORY_PHYSICAL_ADDRESS, PAGE_SIZE, PTE_SIZE,
    XBOX_UNCACHED_BASE, XBOX_WRITE_COMBINED_BASE,
};
use xbox_memory_addresses::{PageSize, PhysicalAddress, Size4K, Size4M, VirtualAddress};
use xbox_vmem::MmPte;
use xbox_vmem::page_table::{pde_offset, pte_offset};

/// Host buffer holding guest RAM, plus the guest page walk.
pub struct GuestRam {
    bytes: Vec<u8>,
}

impl GuestRam {
    /// Zero-filled RAM of `size` bytes (a whole number of pages).
    #[must_use]
    pub fn new(size: u32) -> Self {
        assert!(
            size != 0 && size.is_multiple_of(PAGE_SIZE),
            "guest RAM size {size:#X} is not a whole number of pages"
        );
        Self {
            bytes: vec![0; size as usize],
        }
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn range(&self, pa: PhysicalAddress, len: usize) -> core::ops::Range<usize> {
        let start = pa.as_usize();
        match start.checked_add(len) {
            Some(end) if end <= self.bytes.len() => start..end,
            _ => crate::fatal!(
                "Physical access of {len:#X} bytes at {pa} is outside guest RAM ({:#X} bytes)",
                self.bytes.len()
            ),
        }
    }

    pub fn read(&self, pa: PhysicalAddress, buf: &mut [u8]) {
        let range = self.range(pa, buf.len());
        buf.copy_from_slice(&self.bytes[range]);
    }

    pub fn write(&mut self, pa: PhysicalAddress, data: &[u8]) {
        let range = self.range(pa, data.len());
        self.bytes[range].copy_from_slice(data);
    }

    pub fn zero(&mut self, pa: PhysicalAddress, len: u32) {
        let range = self.range(pa, len as usize);
        self.bytes[range].fill(0);
    }

    fn read_u32(&self, pa: PhysicalAddress) -> u32 {
        let mut bytes = [0; 4];
        self.read(pa, &mut bytes);
        u32::from_le_bytes(bytes)
    }

    /// RAM offset behind a guest physical address.
    ///
    /// RAM is decoded at its real location and again behind the
    /// contiguous, write-combined and uncached aliases.
    #[must_use]
    pub fn resolve(&self, pa: PhysicalAddress) -> Option<PhysicalAddress> {
        let raw = pa.as_u32();
        let offset = if raw >= XBOX_UNCACHED_BASE {
            raw - XBOX_UNCACHED_BASE
        } else if raw >= XBOX_WRITE_COMBINED_BASE {
            raw - XBOX_WRITE_COMBINED_BASE
        } else if raw >= CONTIGUOUS_MEMORY_BASE {
            raw - CONTIGUOUS_MEMORY_BASE
        } else {
            raw
        };
        (offset < self.size()).then_some(PhysicalAddress::new(offset))
    }

    /// Walk the page tables for `va` and return the RAM offset of the byte
    /// it maps.
    ///
    /// # Errors
    /// [`PageFault::NotPresent`] if the PDE or PTE is not valid,
    /// [`PageFault::OutsideRam`] if the walk leaves guest RAM.
    pub fn translate(&self, va: VirtualAddress) -> Result<PhysicalAddress, PageFault> {
        let directory = PhysicalAddress::new(PAGE_DIRECTORY_PHYSICAL_ADDRESS);
        let pde = MmPte::from_bits(self.read_u32(directory + pde_offset(va) * PTE_SIZE));
        if !pde.valid() {
            return Err(PageFault::NotPresent(va));
        }

        let phys = if pde.large_page() {
            let frame = pde.pfn().base().as_u32() & !Size4M::OFFSET_MASK;
            PhysicalAddress::new(frame | va.offset::<Size4M>().as_u32())
        } else {
            let table = pde.pfn().base();
            let Some(table) = self.resolve(table) else {
                return Err(PageFault::OutsideRam { virt: va, phys: table });
            };
            let pte = MmPte::from_bits(self.read_u32(table + pte_offset(va) * PTE_SIZE));
            if !pte.valid() {
                return Err(PageFault::NotPresent(va));
            }
            pte.pfn().base() + va.offset::<Size4K>().as_u32()
        };

        self.resolve(phys)
            .ok_or(PageFault::OutsideRam { virt: va, phys })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xbox_memory_addresses::Pfn;
    use xbox_vmem::page_table::pte_address;

    const PD: u32 = PAGE_DIRECTORY_PHYSICAL_ADDRESS;

    fn ram_with_self_map() -> GuestRam {
        let mut ram = GuestRam::new(0x40_0000);
        ram.write(
            PhysicalAddress::new(PD + 0xC00),
            &MmPte::kernel_pte(Pfn::new(0xF)).into_bits().to_le_bytes(),
        );
        ram
    }

    #[test]
    fn resolves_aliases() {
        let ram = GuestRam::new(0x40_0000);
        assert_eq!(ram.resolve(PhysicalAddress::new(0x1234)), Some(PhysicalAddress::new(0x1234)));
        assert_eq!(
            ram.resolve(PhysicalAddress::new(0xF000_1234)),
            Some(PhysicalAddress::new(0x1234))
        );
        assert_eq!(
            ram.resolve(PhysicalAddress::new(0xF800_1234)),
            Some(PhysicalAddress::new(0x1234))
        );
        assert_eq!(
            ram.resolve(PhysicalAddress::new(0x8000_1234)),
            Some(PhysicalAddress::new(0x1234))
        );
        assert_eq!(ram.resolve(PhysicalAddress::new(0x40_0000)), None);
    }

    #[test]
    fn walks_the_self_map() {
        let ram = ram_with_self_map();
        // the directory, seen through itself
        assert_eq!(
            ram.translate(VirtualAddress::new(0xC030_0C00)),
            Ok(PhysicalAddress::new(PD + 0xC00))
        );
        // nothing else is mapped yet
        assert_eq!(
            ram.translate(VirtualAddress::new(0x8000_0000)),
            Err(PageFault::NotPresent(VirtualAddress::new(0x8000_0000)))
        );
    }

    #[test]
    fn walks_small_and_large_pages() {
        let mut ram = ram_with_self_map();
        let va = VirtualAddress::new(0x8001_2345);
        // page table in page 0x20 mapping va to page 0x30
        let pde = PhysicalAddress::new(PD + pde_offset(va) * 4);
        ram.write(pde, &MmPte::kernel_pde(Pfn::new(0x20)).into_bits().to_le_bytes());
        let pte = PhysicalAddress::new(0x2_0000 + pte_offset(va) * 4);
        ram.write(pte, &MmPte::kernel_pte(Pfn::new(0x30)).into_bits().to_le_bytes());
        assert_eq!(ram.translate(va), Ok(PhysicalAddress::new(0x30_345)));
        // and the PTE itself is reachable through the self-map
        assert_eq!(ram.translate(pte_address(va)), Ok(pte));

        let large = MmPte::kernel_pte(Pfn::new(0xF0000)).with_large_page(true);
        ram.write(PhysicalAddress::new(PD + 0xF00), &large.into_bits().to_le_bytes());
        assert_eq!(
            ram.translate(VirtualAddress::new(0xF012_3456)),
            Ok(PhysicalAddress::new(0x12_3456))
        );
        // the second large page lies past the end of this 4 MiB RAM
        let beyond = MmPte::kernel_pte(Pfn::new(0xF0400)).with_large_page(true);
        ram.write(PhysicalAddress::new(PD + 0xF04), &beyond.into_bits().to_le_bytes());
        assert_eq!(
            ram.translate(VirtualAddress::new(0xF040_0000)),
            Err(PageFault::OutsideRam {
                virt: VirtualAddress::new(0xF040_0000),
                phys: PhysicalAddress::new(0xF040_0000),
            })
        );
    }
}
