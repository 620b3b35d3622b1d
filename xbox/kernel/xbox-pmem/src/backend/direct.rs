use super::{GuestRam, MemoryBackend, PageFault, for_each_page_chunk};
use xbox_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Backend that walks the guest page tables on every virtual access.
///
/// There is nothing to invalidate, so [`tlb_flush`](MemoryBackend::tlb_flush)
/// only counts the requests.
pub struct DirectMemory {
    ram: GuestRam,
    flushes: u64,
}

impl DirectMemory {
    #[must_use]
    pub fn new(ram_size: u32) -> Self {
        Self {
            ram: GuestRam::new(ram_size),
            flushes: 0,
        }
    }

    #[must_use]
    pub const fn ram(&self) -> &GuestRam {
        &self.ram
    }

    /// Number of TLB flushes requested so far.
    #[must_use]
    pub const fn tlb_flush_count(&self) -> u64 {
        self.flushes
    }
}

impl MemoryBackend for DirectMemory {
    fn ram_size(&self) -> u32 {
        self.ram.size()
    }

    fn ram_read(&self, pa: PhysicalAddress, buf: &mut [u8]) {
        self.ram.read(pa, buf);
    }

    fn ram_write(&mut self, pa: PhysicalAddress, data: &[u8]) {
        self.ram.write(pa, data);
    }

    fn ram_zero(&mut self, pa: PhysicalAddress, len: u32) {
        self.ram.zero(pa, len);
    }

    fn mem_read(&mut self, va: VirtualAddress, buf: &mut [u8]) -> Result<(), PageFault> {
        let ram = &self.ram;
        for_each_page_chunk(va, buf.len(), |chunk, off, n| {
            let pa = ram.translate(chunk)?;
            ram.read(pa, &mut buf[off..off + n]);
            Ok(())
        })
    }

    fn mem_write(&mut self, va: VirtualAddress, data: &[u8]) -> Result<(), PageFault> {
        let ram = &mut self.ram;
        for_each_page_chunk(va, data.len(), |chunk, off, n| {
            let pa = ram.translate(chunk)?;
            ram.write(pa, &data[off..off + n]);
            Ok(())
        })
    }

    fn tlb_flush(&mut self, _start: VirtualAddress, _end: VirtualAddress) {
        self.flushes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xbox_info::memory::PAGE_DIRECTORY_PHYSICAL_ADDRESS;
    use xbox_memory_addresses::Pfn;
    use xbox_vmem::MmPte;

    #[test]
    fn virtual_access_goes_through_the_self_map() {
        let mut mem = DirectMemory::new(0x40_0000);
        mem.ram_write_u32(
            PhysicalAddress::new(PAGE_DIRECTORY_PHYSICAL_ADDRESS + 0xC00),
            MmPte::kernel_pte(Pfn::new(0xF)).into_bits(),
        );

        // PDE of 0x8000_0000, written through the directory's own mapping
        let pde = VirtualAddress::new(0xC030_0800);
        mem.mem_write_u32(pde, MmPte::kernel_pde(Pfn::new(0x10)).into_bits())
            .unwrap();
        assert_eq!(
            mem.ram_read_u32(PhysicalAddress::new(PAGE_DIRECTORY_PHYSICAL_ADDRESS + 0x800)),
            0x1_0067
        );

        // the new page table shows up in the self-map window
        let pte = VirtualAddress::new(0xC020_0000);
        mem.mem_write_u32(pte, MmPte::kernel_pte(Pfn::new(0x20)).into_bits())
            .unwrap();
        mem.mem_write(VirtualAddress::new(0x8000_0FFE), b"ok").unwrap();
        assert_eq!(&mem.ram().as_bytes()[0x2_0FFE..0x2_1000], b"ok");

        let mut buf = [0; 4];
        assert_eq!(
            mem.mem_read(VirtualAddress::new(0x8000_0FFE), &mut buf),
            Err(PageFault::NotPresent(VirtualAddress::new(0x8000_1000)))
        );
    }

    #[test]
    fn flushes_are_counted() {
        let mut mem = DirectMemory::new(0x1000);
        mem.tlb_flush(VirtualAddress::new(0), VirtualAddress::new(0xFFF));
        mem.tlb_flush(VirtualAddress::new(0), VirtualAddress::new(0xFFF));
        assert_eq!(mem.tlb_flush_count(), 2);
    }
}
