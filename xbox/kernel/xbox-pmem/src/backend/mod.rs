//! # Guest Memory Backends
//!
//! The memory manager never owns guest RAM. It reaches it through a
//! [`MemoryBackend`], the capability the CPU emulation engine exposes:
//!
//! - raw physical access (`ram_*`), bounds-checked against RAM size, which
//!   can never fault;
//! - virtual access (`mem_*`) translated by the guest's own page tables,
//!   which faults on a missing translation;
//! - TLB invalidation for a virtual range.
//!
//! Two interchangeable implementations are provided:
//!
//! | Backend | Translation |
//! |---------|-------------|
//! | [`DirectMemory`] | Walks the page tables on every access. |
//! | [`CachedMemory`] | Caches translations per 4 KiB page until [`tlb_flush`](MemoryBackend::tlb_flush). |
//!
//! Both share [`GuestRam`], which holds the bytes and implements the x86-32
//! (non-PAE, PSE) walk rooted at the page directory page.

mod cached;
mod direct;
mod ram;

pub use cached::CachedMemory;
pub use direct::DirectMemory;
pub use ram::GuestRam;

use xbox_memory_addresses::{PhysicalAddress, VirtualAddress};

/// A virtual access the guest page tables could not translate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PageFault {
    #[error("no valid translation for {0}")]
    NotPresent(VirtualAddress),
    #[error("{virt} translates to {phys}, outside of guest RAM")]
    OutsideRam {
        virt: VirtualAddress,
        phys: PhysicalAddress,
    },
}

impl PageFault {
    /// The virtual address that faulted.
    #[must_use]
    pub const fn address(&self) -> VirtualAddress {
        match self {
            Self::NotPresent(va) | Self::OutsideRam { virt: va, .. } => *va,
        }
    }
}

/// Guest memory as seen by the memory manager.
///
/// Physical addresses passed to the `ram_*` methods are plain RAM offsets;
/// an access past the end of RAM is a bug in the caller and aborts.
pub trait MemoryBackend {
    /// Bytes of guest RAM.
    fn ram_size(&self) -> u32;

    /// Copy `buf.len()` bytes of RAM starting at `pa` into `buf`.
    fn ram_read(&self, pa: PhysicalAddress, buf: &mut [u8]);

    /// Copy `data` into RAM starting at `pa`.
    fn ram_write(&mut self, pa: PhysicalAddress, data: &[u8]);

    /// Zero `len` bytes of RAM starting at `pa`.
    fn ram_zero(&mut self, pa: PhysicalAddress, len: u32);

    /// Read through the guest page tables.
    ///
    /// # Errors
    /// Fails with the first page of the range that has no translation.
    fn mem_read(&mut self, va: VirtualAddress, buf: &mut [u8]) -> Result<(), PageFault>;

    /// Write through the guest page tables.
    ///
    /// # Errors
    /// Fails with the first page of the range that has no translation. Pages
    /// before it have already been written.
    fn mem_write(&mut self, va: VirtualAddress, data: &[u8]) -> Result<(), PageFault>;

    /// Invalidate cached translations for the pages of `[start, end]`.
    fn tlb_flush(&mut self, start: VirtualAddress, end: VirtualAddress);

    fn ram_read_u32(&self, pa: PhysicalAddress) -> u32 {
        let mut bytes = [0; 4];
        self.ram_read(pa, &mut bytes);
        u32::from_le_bytes(bytes)
    }

    fn ram_write_u32(&mut self, pa: PhysicalAddress, value: u32) {
        self.ram_write(pa, &value.to_le_bytes());
    }

    /// # Errors
    /// See [`mem_read`](Self::mem_read).
    fn mem_read_u32(&mut self, va: VirtualAddress) -> Result<u32, PageFault> {
        let mut bytes = [0; 4];
        self.mem_read(va, &mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// # Errors
    /// See [`mem_write`](Self::mem_write).
    fn mem_write_u32(&mut self, va: VirtualAddress, value: u32) -> Result<(), PageFault> {
        self.mem_write(va, &value.to_le_bytes())
    }
}

/// Split `[va, va + len)` at 4 KiB page boundaries and call `f` with the
/// address of each piece, its offset into the caller's buffer and its length.
pub(crate) fn for_each_page_chunk(
    va: VirtualAddress,
    len: usize,
    mut f: impl FnMut(VirtualAddress, usize, usize) -> Result<(), PageFault>,
) -> Result<(), PageFault> {
    let mut done = 0;
    let mut cursor = va;
    while done < len {
        let in_page = 0x1000 - cursor.as_u32() as usize % 0x1000;
        let n = in_page.min(len - done);
        f(cursor, done, n)?;
        done += n;
        #[allow(clippy::cast_possible_truncation)]
        {
            cursor += n as u32;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_split_at_page_boundaries() {
        let mut seen = Vec::new();
        for_each_page_chunk(VirtualAddress::new(0x1FFE), 0x1004, |va, off, n| {
            seen.push((va.as_u32(), off, n));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![(0x1FFE, 0, 2), (0x2000, 2, 0x1000), (0x3000, 0x1002, 2)]);
    }

    #[test]
    fn chunks_stop_at_first_fault() {
        let mut calls = 0;
        let result = for_each_page_chunk(VirtualAddress::new(0x1000), 0x3000, |va, _, _| {
            calls += 1;
            if va.as_u32() == 0x2000 {
                Err(PageFault::NotPresent(va))
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err(PageFault::NotPresent(VirtualAddress::new(0x2000))));
        assert_eq!(calls, 2);
    }
}
