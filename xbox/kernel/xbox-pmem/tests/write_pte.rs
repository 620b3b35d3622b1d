mod common;

use common::{cached, direct};
use xbox_info::MemoryLayout;
use xbox_memory_addresses::{Pfn, VirtualAddress};
use xbox_pmem::{MemoryBackend, PageFault, PhysicalMemory, PhysicalMemoryError};
use xbox_vmem::page_table::{pde_address, pte_address};
use xbox_vmem::{MmPte, PageType};

/// Four pages straddling the 0xD040_0000 directory boundary.
const VA: u32 = 0xD03F_E000;
const PAGES: u32 = 4;

fn va(offset: u32) -> VirtualAddress {
    VirtualAddress::new(VA + offset)
}

fn pte_range() -> (VirtualAddress, VirtualAddress) {
    (pte_address(va(0)), pte_address(va((PAGES - 1) * 0x1000)))
}

fn entry<B: MemoryBackend>(pmem: &mut PhysicalMemory<B>, at: VirtualAddress) -> MmPte {
    MmPte::from_bits(pmem.backend_mut().mem_read_u32(at).unwrap())
}

/// Commit the page tables and back the range with fresh pages.
fn map<B: MemoryBackend>(pmem: &mut PhysicalMemory<B>) -> Pfn {
    pmem.allocate_pt(va(0), PAGES * 0x1000).unwrap();
    let max = pmem.parameters().max_contiguous_pfn();
    let pages = pmem.remove_free(PAGES, 0, Pfn::new(0), max).unwrap();
    let (start, end) = pte_range();
    pmem.write_pfn(pages, pages + (PAGES - 1), start, PageType::SystemMemory);
    pmem.write_pte(start, end, MmPte::kernel_pte(pages), pages);
    pages
}

fn ptes_used<B: MemoryBackend>(pmem: &mut PhysicalMemory<B>, at: u32) -> u16 {
    let table = pmem.pfn_of_pt(pte_address(VirtualAddress::new(at)));
    pmem.read_pfn(table).ptes_used()
}

#[test]
fn fills_across_a_page_table_boundary() {
    let mut pmem = direct(MemoryLayout::Retail);
    let pages = map(&mut pmem);

    for i in 0..PAGES {
        let pte = entry(&mut pmem, pte_address(va(i * 0x1000)));
        assert_eq!(pte, MmPte::kernel_pte(pages + i));
    }
    assert_eq!(ptes_used(&mut pmem, VA), 2);
    assert_eq!(ptes_used(&mut pmem, 0xD040_0000), 2);

    // each page records where it is mapped
    assert_eq!(pmem.read_pfn(pages).pte_index(), 0x3FE);
    assert_eq!(pmem.read_pfn(pages + 2).pte_index(), 0);

    // a write across the boundary lands in the two middle pages
    pmem.backend_mut().mem_write(va(0x1FFE), b"spam").unwrap();
    let mut bytes = [0; 4];
    pmem.backend()
        .ram_read((pages + 1).base() + 0xFFE, &mut bytes[..2]);
    pmem.backend().ram_read((pages + 2).base(), &mut bytes[2..]);
    assert_eq!(&bytes, b"spam");

    assert_eq!(pmem.check_consistency(), Ok(()));
}

#[test]
fn never_overwrites_a_populated_entry() {
    let mut pmem = direct(MemoryLayout::Retail);
    let pages = map(&mut pmem);
    let (start, end) = pte_range();

    // punch a hole, then refill the whole range from another frame base
    let hole = pte_address(va(0x1000));
    pmem.zero_pte(hole, hole);
    assert_eq!(ptes_used(&mut pmem, VA), 1);

    let other = Pfn::new(0x100);
    pmem.write_pte(start, end, MmPte::kernel_pte(other), other);
    assert_eq!(entry(&mut pmem, start), MmPte::kernel_pte(pages));
    // the hole takes the frame number of its position in the range
    assert_eq!(entry(&mut pmem, hole), MmPte::kernel_pte(other + 1));
    assert_eq!(entry(&mut pmem, end), MmPte::kernel_pte(pages + 3));
    assert_eq!(ptes_used(&mut pmem, VA), 2);
    assert_eq!(ptes_used(&mut pmem, 0xD040_0000), 2);
}

#[test]
fn zeroing_releases_everything() {
    let mut pmem = direct(MemoryLayout::Chihiro);
    let free = pmem.physical_pages_available();
    let pages = map(&mut pmem);
    let (start, end) = pte_range();

    pmem.zero_pte(start, end);
    assert_eq!(ptes_used(&mut pmem, VA), 0);
    assert_eq!(ptes_used(&mut pmem, 0xD040_0000), 0);
    // zeroing again finds nothing to clear
    pmem.zero_pte(start, end);
    assert_eq!(ptes_used(&mut pmem, VA), 0);

    pmem.zero_pfn(pages, pages + (PAGES - 1));
    pmem.insert_free(pages, pages + (PAGES - 1));
    pmem.deallocate_pt(va(0), PAGES * 0x1000);
    assert_eq!(pmem.physical_pages_available(), free);
    assert_eq!(pmem.pages_by_usage(PageType::SystemMemory), 0);
    assert!(entry(&mut pmem, pde_address(va(0))).is_zero());
    assert!(entry(&mut pmem, pde_address(va(0x3000))).is_zero());
    assert_eq!(pmem.check_consistency(), Ok(()));
}

#[test]
fn cached_translations_follow_pte_edits() {
    let mut pmem = cached(MemoryLayout::Retail);
    let pages = map(&mut pmem);
    let target = va(0x10);

    pmem.backend_mut().mem_write_u32(target, 0x1111_1111).unwrap();
    assert_eq!(pmem.backend().ram_read_u32(pages.base() + 0x10), 0x1111_1111);

    let pte = pte_address(va(0));
    pmem.zero_pte(pte, pte);
    assert_eq!(
        pmem.backend_mut().mem_read_u32(target),
        Err(PageFault::NotPresent(target))
    );

    // remap the first page onto the last frame of the run
    let last = pages + (PAGES - 1);
    pmem.write_pte(pte, pte, MmPte::kernel_pte(last), last);
    pmem.backend_mut().mem_write_u32(target, 0x2222_2222).unwrap();
    assert_eq!(pmem.backend().ram_read_u32(last.base() + 0x10), 0x2222_2222);
    assert_eq!(pmem.backend().ram_read_u32(pages.base() + 0x10), 0x1111_1111);
}

#[test]
fn data_mapping_of_a_page_table_is_inconsistent() {
    let mut pmem = direct(MemoryLayout::Retail);
    let at = VirtualAddress::new(0xD000_0000);
    pmem.allocate_pt(at, 0x1000).unwrap();
    assert_eq!(pmem.check_consistency(), Ok(()));

    // the page directory is busy, but as a page table
    let directory = Pfn::new(0xF);
    let pte = pte_address(at);
    pmem.write_pte(pte, pte, MmPte::kernel_pte(directory), directory);
    assert_eq!(
        pmem.check_consistency(),
        Err(PhysicalMemoryError::Inconsistent {
            pfn: directory,
            reason: "valid PTE maps a page table page",
        })
    );
}

#[test]
#[should_panic(expected = "is not committed")]
fn writing_without_a_page_table_is_fatal() {
    let mut pmem = direct(MemoryLayout::Retail);
    let pte = pte_address(VirtualAddress::new(0xE000_0000));
    pmem.write_pte(pte, pte, MmPte::kernel_pte(Pfn::new(0x100)), Pfn::new(0x100));
}
