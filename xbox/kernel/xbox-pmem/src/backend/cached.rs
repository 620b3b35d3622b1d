use super::{GuestRam, MemoryBackend, PageFault, for_each_page_chunk};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use xbox_memory_addresses::{PhysicalAddress, Size4K, VirtualAddress};

/// Backend with a software TLB.
///
/// Successful translations are remembered per 4 KiB virtual page and reused
/// until [`tlb_flush`](MemoryBackend::tlb_flush) drops them, just like the
/// real TLB. A page table edit that is not followed by a flush stays
/// invisible to virtual accesses.
pub struct CachedMemory {
    ram: GuestRam,
    /// Virtual page number to the RAM offset of the page it maps.
    tlb: BTreeMap<u32, PhysicalAddress>,
}

impl CachedMemory {
    #[must_use]
    pub fn new(ram_size: u32) -> Self {
        Self {
            ram: GuestRam::new(ram_size),
            tlb: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn ram(&self) -> &GuestRam {
        &self.ram
    }

    /// Number of cached translations.
    #[must_use]
    pub fn tlb_len(&self) -> usize {
        self.tlb.len()
    }

    fn lookup(
        ram: &GuestRam,
        tlb: &mut BTreeMap<u32, PhysicalAddress>,
        va: VirtualAddress,
    ) -> Result<PhysicalAddress, PageFault> {
        let (page, offset) = va.split::<Size4K>();
        if let Some(&base) = tlb.get(&page.number()) {
            return Ok(base + offset.as_u32());
        }

        let pa = ram.translate(va)?;
        tlb.insert(page.number(), PhysicalAddress::from(pa.page::<Size4K>()));
        Ok(pa)
    }
}

impl MemoryBackend for CachedMemory {
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
        let Self { ram, tlb } = self;
        for_each_page_chunk(va, buf.len(), |chunk, off, n| {
            let pa = Self::lookup(ram, tlb, chunk)?;
            ram.read(pa, &mut buf[off..off + n]);
            Ok(())
        })
    }

    fn mem_write(&mut self, va: VirtualAddress, data: &[u8]) -> Result<(), PageFault> {
        let Self { ram, tlb } = self;
        for_each_page_chunk(va, data.len(), |chunk, off, n| {
            let pa = Self::lookup(ram, tlb, chunk)?;
            ram.write(pa, &data[off..off + n]);
            Ok(())
        })
    }

    fn tlb_flush(&mut self, start: VirtualAddress, end: VirtualAddress) {
        let first = start.page::<Size4K>().number();
        let last = end.page::<Size4K>().number();
        if first > last {
            return;
        }
        let stale: Vec<u32> = self.tlb.range(first..=last).map(|(&vpn, _)| vpn).collect();
        for vpn in stale {
            self.tlb.remove(&vpn);
        }
    }
}
