mod common;

use common::{cached, direct, drain_below};
use xbox_info::MemoryLayout;
use xbox_memory_addresses::{Pfn, VirtualAddress};
use xbox_pmem::{MemoryBackend, PageFault, PhysicalMemory, PhysicalMemoryError};
use xbox_vmem::page_table::{pde_address, pte_address};
use xbox_vmem::{MmPte, PageType};

fn pde<B: MemoryBackend>(pmem: &mut PhysicalMemory<B>, va: u32) -> MmPte {
    let entry = pde_address(VirtualAddress::new(va));
    MmPte::from_bits(pmem.backend_mut().mem_read_u32(entry).unwrap())
}

#[test]
fn allocate_is_idempotent() {
    let mut pmem = direct(MemoryLayout::Retail);
    let va = VirtualAddress::new(0x0001_0000);
    let before = pmem.physical_pages_available();

    pmem.allocate_pt(va, 0x1000).unwrap();
    assert_eq!(pmem.physical_pages_available(), before - 1);
    assert_eq!(pmem.pages_by_usage(PageType::VirtualPageTable), 1);
    let entry = pde(&mut pmem, 0x0001_0000);
    assert!(entry.valid());
    assert_eq!(entry.into_bits() & 0xFFF, 0x67);

    pmem.allocate_pt(va, 0x1000).unwrap();
    assert_eq!(pmem.physical_pages_available(), before - 1);
    assert_eq!(pmem.pages_by_usage(PageType::VirtualPageTable), 1);
    assert_eq!(pde(&mut pmem, 0x0001_0000), entry);
    assert_eq!(pmem.check_consistency(), Ok(()));
}

#[test]
fn empty_range_commits_nothing() {
    let mut pmem = direct(MemoryLayout::Retail);
    let before = pmem.physical_pages_available();
    let va = VirtualAddress::new(0x0001_0800);

    pmem.allocate_pt(va, 0).unwrap();
    assert_eq!(pmem.physical_pages_available(), before);
    assert_eq!(pmem.pages_by_usage(PageType::VirtualPageTable), 0);
    assert!(!pde(&mut pmem, 0x0001_0800).valid());

    pmem.allocate_pt(va, 1).unwrap();
    pmem.deallocate_pt(va, 0);
    assert!(pde(&mut pmem, 0x0001_0800).valid());
    assert_eq!(pmem.check_consistency(), Ok(()));
}

#[test]
fn page_tables_come_from_below_the_contiguous_limit() {
    let mut pmem = direct(MemoryLayout::Chihiro);
    // 0x003F_F000 + 0x40_2000 touches three 4 MiB spans
    pmem.allocate_pt(VirtualAddress::new(0x003F_F000), 0x40_2000)
        .unwrap();
    for va in [0x0000_0000, 0x0040_0000, 0x0080_0000] {
        let table = pde(&mut pmem, va).pfn();
        assert!(table <= Pfn::new(0x7FCF), "{table}");
        let record = pmem.read_pfn(table);
        assert_eq!(record.busy_type(), PageType::VirtualPageTable);
        assert_eq!(record.ptes_used(), 0);
    }
    assert!(!pde(&mut pmem, 0x00C0_0000).valid());
    assert_eq!(pmem.check_consistency(), Ok(()));
}

#[test]
fn kernel_addresses_get_system_page_tables() {
    let mut pmem = cached(MemoryLayout::Debug);
    let system = pmem.pages_by_usage(PageType::SystemPageTable);
    pmem.allocate_pt(VirtualAddress::new(0xD000_0000), 0x80_0000)
        .unwrap();
    assert_eq!(pmem.pages_by_usage(PageType::SystemPageTable), system + 2);
    assert_eq!(pmem.pages_by_usage(PageType::VirtualPageTable), 0);
    // the debugger pool is never used for page tables
    assert_eq!(pmem.debugger_pages_available(), 0x4000 - 16);
    assert_eq!(pmem.check_consistency(), Ok(()));
}

#[test]
fn deallocate_leaves_used_page_tables_alone() {
    let mut pmem = direct(MemoryLayout::Retail);
    let va = VirtualAddress::new(0xD000_0000);
    let free = pmem.physical_pages_available();
    pmem.allocate_pt(va, 0x1000).unwrap();

    let page = pmem.remove_free(1, 0, Pfn::new(0), Pfn::new(0x3FFF)).unwrap();
    pmem.write_pfn(page, page, pte_address(va), PageType::SystemMemory);
    pmem.write_pte(pte_address(va), pte_address(va), MmPte::kernel_pte(page), page);
    let table = pde(&mut pmem, 0xD000_0000);

    pmem.deallocate_pt(va, 0x1000);
    assert_eq!(pde(&mut pmem, 0xD000_0000), table);
    assert_eq!(pmem.read_pfn(table.pfn()).ptes_used(), 1);
    assert_eq!(pmem.check_consistency(), Ok(()));

    pmem.zero_pte(pte_address(va), pte_address(va));
    pmem.zero_pfn(page, page);
    pmem.insert_free(page, page);
    pmem.deallocate_pt(va, 0x1000);
    assert!(pde(&mut pmem, 0xD000_0000).is_zero());
    assert!(pmem.read_pfn(table.pfn()).is_zero());
    assert_eq!(pmem.physical_pages_available(), free);
    assert_eq!(pmem.pages_by_usage(PageType::SystemPageTable), 2);
    assert_eq!(pmem.check_consistency(), Ok(()));
}

#[test]
fn deallocate_skips_large_pages_and_the_self_map() {
    let mut pmem = direct(MemoryLayout::Retail);
    pmem.deallocate_pt(VirtualAddress::new(0xC000_0000), 0x40_0000);
    pmem.deallocate_pt(VirtualAddress::new(0xF000_0000), 0x0FC0_0000);
    assert!(pde(&mut pmem, 0xC000_0000).valid());
    assert!(pde(&mut pmem, 0xF000_0000).large_page());
    assert_eq!(pmem.check_consistency(), Ok(()));
}

#[test]
fn released_page_table_leaves_the_self_map() {
    let mut pmem = cached(MemoryLayout::Retail);
    let va = VirtualAddress::new(0x1000_0000);
    pmem.allocate_pt(va, 0x1000).unwrap();

    // warm the cached translation of the page table's self-map page
    let pte = pte_address(va);
    assert_eq!(pmem.backend_mut().mem_read_u32(pte), Ok(0));

    pmem.deallocate_pt(va, 0x1000);
    assert_eq!(
        pmem.backend_mut().mem_read_u32(pte),
        Err(PageFault::NotPresent(pte))
    );
    assert_eq!(pmem.check_consistency(), Ok(()));
}

#[test]
fn out_of_memory_is_reported_up_front() {
    let mut pmem = direct(MemoryLayout::Retail);
    drain_below(&mut pmem, Pfn::new(0x3FFF));
    assert_eq!(pmem.physical_pages_available(), 0);

    assert_eq!(
        pmem.allocate_pt(VirtualAddress::new(0xD000_0000), 0x1000),
        Err(PhysicalMemoryError::OutOfMemory {
            requested: 1,
            available: 0,
        })
    );
    assert!(!pde(&mut pmem, 0xD000_0000).valid());
    assert!(!pmem.is_mappable(1, true, false));
}

#[test]
fn partial_allocation_is_rolled_back() {
    let mut pmem = direct(MemoryLayout::Retail);
    let limit = pmem.parameters().max_contiguous_pfn();
    let mut taken = drain_below(&mut pmem, limit);

    // one page below the limit, the rest only above it
    let spare = taken.pop().unwrap();
    pmem.insert_free(spare, spare);
    let available = pmem.physical_pages_available();
    assert!(available >= 2);
    let tables = pmem.pages_by_usage(PageType::SystemPageTable);

    assert_eq!(
        pmem.allocate_pt(VirtualAddress::new(0xD000_0000), 0x80_0000),
        Err(PhysicalMemoryError::NoFreeBlock)
    );
    assert!(!pde(&mut pmem, 0xD000_0000).valid());
    assert!(!pde(&mut pmem, 0xD040_0000).valid());
    assert_eq!(pmem.physical_pages_available(), available);
    assert_eq!(pmem.pages_by_usage(PageType::SystemPageTable), tables);
    assert_eq!(pmem.remove_free(1, 0, Pfn::new(0), limit), Some(spare));
}
