//! # Physical Memory Manager
//!
//! [`PhysicalMemory`] ties the free list to the two structures that live in
//! guest RAM: the page directory with its page tables, and the PFN database.
//!
//! ## Boot sequence
//!
//! ```text
//!  1. reserve the page directory page (0xF)
//!  2. page directory: self-map at 0x300, WC and UC large pages at the top
//!  3. PFN database:
//!       page table pages  <- free list (below the contiguous limit)
//!       database pages    <- free list (fixed location)
//!       PTEs, PFN records <- written by hand, the database is not there yet
//!  4. record the page directory page itself
//! ```
//!
//! After boot every page is either in the free list or busy in the PFN
//! database, and every valid PDE points at a busy page table whose
//! `PtesUsed` matches its non-zero entries. [`PhysicalMemory::check_consistency`]
//! verifies exactly that.
//!
//! ## Access paths
//!
//! Page tables and PFN records are read and written through the guest page
//! tables (`mem_*`), as the guest kernel would. A fault there means the
//! tables are corrupt and is fatal. Only the page directory setup, page zeroing
//! and the consistency check use raw physical access.

use crate::backend::MemoryBackend;
use crate::error::PhysicalMemoryError;
use crate::free_list::FreeList;
use alloc::vec::Vec;
use log::{debug, trace, warn};
use xbox_info::memory::{
    HIGHEST_USER_ADDRESS, LARGE_PAGE_SHIFT, LARGE_PAGE_SIZE, PAGE_DIRECTORY_BASE,
    PAGE_DIRECTORY_PHYSICAL_ADDRESS, PAGE_SIZE, PAGE_TABLES_BASE, PFN_RECORD_SIZE, PTE_SIZE,
    PTES_PER_PAGE, SELF_MAP_PDE_OFFSET, XBOX_UNCACHED_BASE, XBOX_UNCACHED_SIZE,
    XBOX_WRITE_COMBINED_BASE, XBOX_WRITE_COMBINED_SIZE,
};
use xbox_info::{LayoutParameters, MemoryLayout};
use xbox_memory_addresses::{PhysicalAddress, Pfn, PfnCount, VirtualAddress};
use xbox_vmem::page_table::{
    is_pte_on_pde_boundary, next_entry, pages_spanned_large, pde_address, pde_offset,
    pte_address, pte_offset, vaddr_mapped_by_pte,
};
use xbox_vmem::{MmPte, PageType, XboxPfn};

/// The physical memory manager of one emulated console.
///
/// Created once per emulation session with its [`MemoryLayout`] fixed. Call
/// [`boot`](Self::boot) before anything else touches guest memory.
pub struct PhysicalMemory<B: MemoryBackend> {
    backend: B,
    layout: MemoryLayout,
    params: LayoutParameters,
    free_list: FreeList,
    pages_by_usage: [PfnCount; PageType::COUNT],
}

impl<B: MemoryBackend> PhysicalMemory<B> {
    /// A manager for `layout` with every page of RAM free.
    #[must_use]
    pub fn new(backend: B, layout: MemoryLayout) -> Self {
        Self::with_parameters(backend, layout, layout.parameters())
    }

    /// Like [`new`](Self::new), with adjusted layout parameters.
    ///
    /// # Panics
    /// If the backend holds less RAM than `params` describes.
    #[must_use]
    pub fn with_parameters(backend: B, layout: MemoryLayout, params: LayoutParameters) -> Self {
        assert!(
            backend.ram_size() >= params.ram_size(),
            "backend holds {:#X} bytes of RAM, layout {layout} needs {:#X}",
            backend.ram_size(),
            params.ram_size()
        );
        Self {
            backend,
            layout,
            params,
            free_list: FreeList::with_all_pages(params.highest_page(), params.debugger_boundary()),
            pages_by_usage: [0; PageType::COUNT],
        }
    }

    #[inline]
    #[must_use]
    pub const fn layout(&self) -> MemoryLayout {
        self.layout
    }

    #[inline]
    #[must_use]
    pub const fn parameters(&self) -> &LayoutParameters {
        &self.params
    }

    #[inline]
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub const fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[must_use]
    pub fn into_backend(self) -> B {
        self.backend
    }

    #[inline]
    #[must_use]
    pub const fn free_list(&self) -> &FreeList {
        &self.free_list
    }

    #[inline]
    #[must_use]
    pub const fn physical_pages_available(&self) -> PfnCount {
        self.free_list.physical_pages_available()
    }

    #[inline]
    #[must_use]
    pub const fn debugger_pages_available(&self) -> PfnCount {
        self.free_list.debugger_pages_available()
    }

    /// Busy pages of type `ty`, as counted by the PFN record writers.
    #[inline]
    #[must_use]
    pub const fn pages_by_usage(&self, ty: PageType) -> PfnCount {
        self.pages_by_usage[ty.index()]
    }

    /// Bring up the page directory and the PFN database.
    pub fn boot(&mut self) {
        debug!("Booting physical memory manager ({} layout)", self.layout);
        let directory = Pfn::containing(PhysicalAddress::new(PAGE_DIRECTORY_PHYSICAL_ADDRESS));
        if self.free_list.remove(1, 0, directory, directory) != Some(directory) {
            fatal!("Page directory page {directory} is not free at boot");
        }

        self.initialize_page_directory();
        self.initialize_pfn_database();
        self.write_pfn(
            directory,
            directory,
            pte_address(VirtualAddress::new(PAGE_DIRECTORY_BASE)),
            PageType::SystemPageTable,
        );
        debug!(
            "Physical memory ready: {} general and {} debugger pages free",
            self.physical_pages_available(),
            self.debugger_pages_available()
        );
    }

    /// Clear the page directory and install its fixed entries: the self-map
    /// and the write-combined and uncached large-page aliases of RAM.
    pub fn initialize_page_directory(&mut self) {
        let directory = PhysicalAddress::new(PAGE_DIRECTORY_PHYSICAL_ADDRESS);
        self.backend.ram_zero(directory, PAGE_SIZE);

        let self_map = MmPte::kernel_pte(Pfn::containing(directory));
        self.backend
            .ram_write_u32(directory + SELF_MAP_PDE_OFFSET, self_map.into_bits());

        let write_combined = MmPte::kernel_pte(Pfn::new(0))
            .with_large_page(true)
            .with_write_combine();
        self.map_large_pages(XBOX_WRITE_COMBINED_BASE, XBOX_WRITE_COMBINED_SIZE, write_combined);

        let uncached = MmPte::kernel_pte(Pfn::new(0))
            .with_large_page(true)
            .with_caching_disabled();
        self.map_large_pages(XBOX_UNCACHED_BASE, XBOX_UNCACHED_SIZE, uncached);
        trace!("Page directory initialized at {directory}");
    }

    fn map_large_pages(&mut self, base: u32, size: u32, template: MmPte) {
        let directory = PhysicalAddress::new(PAGE_DIRECTORY_PHYSICAL_ADDRESS);
        let first = pde_offset(VirtualAddress::new(base));
        let mut pfn = Pfn::containing(PhysicalAddress::new(base));
        for index in first..first + (size >> LARGE_PAGE_SHIFT) {
            self.backend
                .ram_write_u32(directory + index * PTE_SIZE, template.with_pfn(pfn).into_bits());
            pfn += PTES_PER_PAGE;
        }
    }

    /// Carve the PFN database out of RAM and describe it in itself.
    ///
    /// The generic writers need the database to already exist, so its page
    /// tables, PTEs and first records are written directly here.
    pub fn initialize_pfn_database(&mut self) {
        let params = self.params;
        let base = params.pfn_database_address();
        let bytes = params.pfn_database_pages() * PAGE_SIZE;
        let spans = pages_spanned_large(base, bytes);
        debug_assert_eq!(spans, params.pfn_database_pdes());

        // page tables mapping the database
        let mut pde = pde_address(base);
        for _ in 0..spans {
            let Some(table) = self
                .free_list
                .remove(1, 0, Pfn::new(0), params.max_contiguous_pfn())
            else {
                fatal!("No page left for the PFN database page tables");
            };
            self.write_entry(pde, MmPte::kernel_pde(table));
            self.backend.ram_zero(table.base(), PAGE_SIZE);
            pde = next_entry(pde);
        }

        let first = params.pfn_database_page();
        let last = params.pfn_database_end();
        if self.free_list.remove(params.pfn_database_pages(), 0, first, last) != Some(first) {
            fatal!("PFN database pages {first}..={last} are not free");
        }

        let template = MmPte::kernel_pte(first).with_persist(true);
        let mut pte = pte_address(base);
        for pfn in first.as_u32()..=last.as_u32() {
            self.write_entry(pte, template.with_pfn(Pfn::new(pfn)));
            pte = next_entry(pte);
        }
        self.backend.tlb_flush(base, base + (bytes - 1));

        if let Some(boundary) = params.debugger_boundary()
            && last >= boundary
        {
            self.free_list
                .move_debugger_pages_to_physical(last - boundary + 1);
        }

        self.backend.ram_zero(first.base(), bytes);

        #[allow(clippy::cast_possible_truncation)]
        let ptes_used = params.ptes_used_per_database_pt() as u16;
        let mut pde = pde_address(base);
        for _ in 0..spans {
            let table = self.read_entry(pde).pfn();
            self.write_record(
                table,
                XboxPfn::busy_as(PageType::SystemPageTable).with_ptes_used(ptes_used),
            );
            self.pages_by_usage[PageType::SystemPageTable.index()] += 1;
            pde = next_entry(pde);
        }

        self.write_pfn(first, last, pte_address(base), PageType::Unknown);
        debug!(
            "PFN database at {base}: pages {first}..={last} mapped by {spans} page table(s)"
        );
    }

    /// Take `count` free pages, see [`FreeList::remove`].
    pub fn remove_free(
        &mut self,
        count: PfnCount,
        alignment: PfnCount,
        range_start: Pfn,
        range_end: Pfn,
    ) -> Option<Pfn> {
        self.free_list.remove(count, alignment, range_start, range_end)
    }

    /// Return pages to the free list, see [`FreeList::insert`].
    pub fn insert_free(&mut self, start: Pfn, end: Pfn) {
        self.free_list.insert(start, end);
    }

    /// `true` if `pages` more pages can be had from one of the requested
    /// pools.
    #[must_use]
    pub fn is_mappable(&self, pages: PfnCount, general: bool, debugger: bool) -> bool {
        let mappable = (general && self.physical_pages_available() >= pages)
            || (debugger && self.debugger_pages_available() >= pages);
        if !mappable {
            warn!("Out of physical memory!");
        }
        mappable
    }

    /// Virtual address of the PFN record describing `pfn`.
    #[inline]
    #[must_use]
    pub const fn pfn_element_address(&self, pfn: Pfn) -> VirtualAddress {
        self.params.pfn_element_address(pfn)
    }

    /// Read the PFN record of `pfn`.
    pub fn read_pfn(&mut self, pfn: Pfn) -> XboxPfn {
        self.read_record(pfn)
    }

    /// Mark `[pfn_start, pfn_end]` busy as `busy_type`.
    ///
    /// `pte` is the PTE mapping `pfn_start`; following pages are assumed to
    /// be mapped by the following PTEs. Page table pages start out with
    /// `PtesUsed = 0`, every other page records the index of its PTE.
    pub fn write_pfn(
        &mut self,
        pfn_start: Pfn,
        pfn_end: Pfn,
        pte: VirtualAddress,
        busy_type: PageType,
    ) {
        let mut pte = pte;
        for pfn in pfn_start.as_u32()..=pfn_end.as_u32() {
            let record = if busy_type.is_page_table() {
                XboxPfn::busy_as(busy_type).with_ptes_used(0)
            } else {
                #[allow(clippy::cast_possible_truncation)]
                let index = pte_offset(vaddr_mapped_by_pte(pte)) as u16;
                XboxPfn::busy_as(busy_type).with_pte_index(index)
            };
            self.write_record(Pfn::new(pfn), record);
            self.pages_by_usage[busy_type.index()] += 1;
            pte = next_entry(pte);
        }
    }

    /// Clear the records of `[pfn_start, pfn_end]`.
    ///
    /// Each page is taken off the usage counter of the type its record had.
    pub fn zero_pfn(&mut self, pfn_start: Pfn, pfn_end: Pfn) {
        for raw in pfn_start.as_u32()..=pfn_end.as_u32() {
            let pfn = Pfn::new(raw);
            let record = self.read_record(pfn);
            if !record.busy() {
                fatal!("Clearing the PFN record of page {pfn}, which is not busy");
            }
            let ty = record.busy_type();
            let Some(count) = self.pages_by_usage[ty.index()].checked_sub(1) else {
                fatal!("Usage counter of {ty} pages underflows at page {pfn}");
            };
            self.pages_by_usage[ty.index()] = count;
            self.write_record(pfn, XboxPfn::new());
        }
    }

    /// Page frame of the page table holding the PTE at `pte`.
    ///
    /// # Panics
    /// If that page table is not committed: the PDE is not valid, or its
    /// page is not a busy page table in the PFN database.
    pub fn pfn_of_pt(&mut self, pte: VirtualAddress) -> Pfn {
        // the "PTE" of a PTE is the PDE of its page table
        let pde = self.read_entry(pte_address(pte));
        if !pde.valid() {
            fatal!("Page table holding PTE {pte} is not committed");
        }
        let table = pde.pfn();
        let record = self.read_record(table);
        if !record.busy() || !record.busy_type().is_page_table() {
            fatal!("Page {table} holding PTE {pte} is not a page table ({record:?})");
        }
        table
    }

    /// Fill the zero PTEs in `[start, end]` with `template`.
    ///
    /// The PTE at `start` maps `pfn`, each following PTE the next page.
    /// Entries that are already in use are skipped, but still consume a page
    /// frame number.
    pub fn write_pte(
        &mut self,
        start: VirtualAddress,
        end: VirtualAddress,
        template: MmPte,
        pfn: Pfn,
    ) {
        let mut pfn = pfn;
        let mut table = Pfn::new(0);
        let mut pte = start;
        while pte <= end {
            if pte == start || is_pte_on_pde_boundary(pte) {
                table = self.pfn_of_pt(pte);
            }

            if self.read_entry(pte).is_zero() {
                self.write_entry(pte, template.with_pfn(pfn));
                self.flush_page_mapped_by(pte);
                let mut record = self.read_record(table);
                let used = record.ptes_used();
                if u32::from(used) >= PTES_PER_PAGE {
                    fatal!("Page table {table} already has {used} PTEs in use");
                }
                record.set_ptes_used(used + 1);
                self.write_record(table, record);
            }

            pte = next_entry(pte);
            pfn += 1;
        }
    }

    /// Clear the non-zero PTEs in `[start, end]`.
    pub fn zero_pte(&mut self, start: VirtualAddress, end: VirtualAddress) {
        let mut table = Pfn::new(0);
        let mut pte = start;
        while pte <= end {
            if pte == start || is_pte_on_pde_boundary(pte) {
                table = self.pfn_of_pt(pte);
            }

            if !self.read_entry(pte).is_zero() {
                self.write_entry(pte, MmPte::zero());
                self.flush_page_mapped_by(pte);
                let mut record = self.read_record(table);
                let Some(used) = record.ptes_used().checked_sub(1) else {
                    fatal!("PtesUsed of page table {table} underflows at {pte}");
                };
                record.set_ptes_used(used);
                self.write_record(table, record);
            }

            pte = next_entry(pte);
        }
    }

    /// Commit the page tables needed to map `[va, va + size)`.
    ///
    /// Directory entries that are already valid are left alone, so calling
    /// this again for the same range commits nothing. New page tables are
    /// taken one page at a time below the contiguous limit. An empty range
    /// commits nothing.
    ///
    /// # Errors
    /// - [`PhysicalMemoryError::OutOfMemory`] if the general pool has fewer
    ///   free pages than page tables are missing.
    /// - [`PhysicalMemoryError::NoFreeBlock`] if no free page remains below
    ///   the contiguous limit. Page tables committed by this call are
    ///   released again first.
    pub fn allocate_pt(
        &mut self,
        va: VirtualAddress,
        size: u32,
    ) -> Result<(), PhysicalMemoryError> {
        if size == 0 {
            return Ok(());
        }
        let spans = pages_spanned_large(va, size);
        let first = pde_address(va);

        let mut missing = 0;
        let mut pde = first;
        for _ in 0..spans {
            if !self.read_entry(pde).valid() {
                missing += 1;
            }
            pde = next_entry(pde);
        }
        if missing == 0 {
            return Ok(());
        }

        let available = self.physical_pages_available();
        if available < missing {
            warn!("Cannot commit {missing} page tables for {va}: {available} pages available");
            return Err(PhysicalMemoryError::OutOfMemory {
                requested: missing,
                available,
            });
        }

        let busy_type = if va.as_u32() <= HIGHEST_USER_ADDRESS {
            PageType::VirtualPageTable
        } else {
            PageType::SystemPageTable
        };

        let mut committed = Vec::with_capacity(missing as usize);
        let mut pde = first;
        for _ in 0..spans {
            if !self.read_entry(pde).valid() {
                let Some(table) =
                    self.free_list
                        .remove(1, 0, Pfn::new(0), self.params.max_contiguous_pfn())
                else {
                    warn!("No page for a page table below {}", self.params.max_contiguous_pfn());
                    for (pde, table) in committed.into_iter().rev() {
                        self.release_pt(pde, table);
                    }
                    return Err(PhysicalMemoryError::NoFreeBlock);
                };

                self.write_entry(pde, MmPte::kernel_pde(table));
                self.backend.ram_zero(table.base(), PAGE_SIZE);
                self.write_pfn(table, table, pde, busy_type);
                committed.push((pde, table));
                debug!(
                    "Committed {busy_type} {table} for {}",
                    vaddr_mapped_by_pte(vaddr_mapped_by_pte(pde))
                );
            }
            pde = next_entry(pde);
        }

        Ok(())
    }

    /// Release the page tables of `[va, va + size)` that map nothing.
    ///
    /// Page tables with `PtesUsed > 0`, large pages and the self-map entry
    /// are left untouched.
    pub fn deallocate_pt(&mut self, va: VirtualAddress, size: u32) {
        if size == 0 {
            return;
        }
        let self_map = pde_address(VirtualAddress::new(PAGE_TABLES_BASE));
        let mut pde = pde_address(va);
        for _ in 0..pages_spanned_large(va, size) {
            let entry = self.read_entry(pde);
            if pde != self_map && entry.valid() && !entry.large_page() {
                let table = entry.pfn();
                let record = self.read_record(table);
                if !record.busy() || !record.busy_type().is_page_table() {
                    fatal!("PDE {pde} points at page {table}, which is not a page table");
                }
                if record.ptes_used() == 0 {
                    self.release_pt(pde, table);
                }
            }
            pde = next_entry(pde);
        }
    }

    fn release_pt(&mut self, pde: VirtualAddress, table: Pfn) {
        self.free_list.insert(table, table);
        self.zero_pfn(table, table);
        self.write_entry(pde, MmPte::zero());

        let window = vaddr_mapped_by_pte(pde);
        self.backend.tlb_flush(window, window + (PAGE_SIZE - 1));
        let span = vaddr_mapped_by_pte(window);
        self.backend.tlb_flush(span, span + (LARGE_PAGE_SIZE - 1));
        debug!("Released page table {table} of {span}");
    }

    /// Verify the invariants linking the free list, the PFN database and the
    /// page tables.
    ///
    /// Reads guest RAM directly, so it sees what is really there regardless
    /// of any cached translation.
    ///
    /// # Errors
    /// [`PhysicalMemoryError::Inconsistent`] naming the first offending page.
    pub fn check_consistency(&self) -> Result<(), PhysicalMemoryError> {
        let inconsistent =
            |pfn: Pfn, reason| Err(PhysicalMemoryError::Inconsistent { pfn, reason });
        let highest = self.params.highest_page();

        let mut previous: Option<Pfn> = None;
        for block in &self.free_list {
            if block.size == 0 {
                return inconsistent(block.start, "empty free block");
            }
            if block.end() > highest {
                return inconsistent(block.end(), "free block past the end of RAM");
            }
            if let Some(end) = previous
                && block.start <= end + 1
            {
                return inconsistent(
                    block.start,
                    "free blocks out of order, overlapping or touching",
                );
            }
            previous = Some(block.end());
        }
        if self.physical_pages_available() + self.debugger_pages_available()
            != self.free_list.free_pages()
        {
            return inconsistent(Pfn::new(0), "pool counters do not add up to the free pages");
        }

        let mut usage = [0; PageType::COUNT];
        let mut blocks = self.free_list.iter().peekable();
        for raw in 0..=highest.as_u32() {
            let pfn = Pfn::new(raw);
            while blocks.next_if(|b| b.end() < pfn).is_some() {}
            let free = blocks.peek().is_some_and(|b| b.start <= pfn);
            let record = self.record_in_ram(pfn);
            match (free, record.busy()) {
                (true, true) => return inconsistent(pfn, "free page has a busy PFN record"),
                (false, false) => return inconsistent(pfn, "page is neither free nor busy"),
                (false, true) => usage[record.busy_type().index()] += 1,
                (true, false) => {}
            }
        }
        if usage != self.pages_by_usage {
            return inconsistent(Pfn::new(0), "usage counters do not match the PFN database");
        }

        let directory = PhysicalAddress::new(PAGE_DIRECTORY_PHYSICAL_ADDRESS);
        for index in 0..PTES_PER_PAGE {
            if index * PTE_SIZE == SELF_MAP_PDE_OFFSET {
                continue;
            }
            let pde = MmPte::from_bits(self.backend.ram_read_u32(directory + index * PTE_SIZE));
            if !pde.valid() || pde.large_page() {
                continue;
            }

            let table = pde.pfn();
            if table > highest {
                return inconsistent(table, "PDE points past the end of RAM");
            }
            let record = self.record_in_ram(table);
            if !record.busy() || !record.busy_type().is_page_table() {
                return inconsistent(table, "valid PDE points at a page that is not a page table");
            }

            let mut used = 0;
            for slot in 0..PTES_PER_PAGE {
                let entry = table.base() + slot * PTE_SIZE;
                let pte = MmPte::from_bits(self.backend.ram_read_u32(entry));
                if pte.is_zero() {
                    continue;
                }
                used += 1;
                if !pte.valid() || pte.pfn() > highest {
                    continue;
                }
                let target = self.record_in_ram(pte.pfn());
                if !target.busy() {
                    return inconsistent(pte.pfn(), "valid PTE maps a page that is not busy");
                }
                if target.busy_type().is_page_table() {
                    return inconsistent(pte.pfn(), "valid PTE maps a page table page");
                }
            }
            if used != u32::from(record.ptes_used()) {
                return inconsistent(table, "PtesUsed does not match the page table");
            }
        }

        Ok(())
    }

    fn record_in_ram(&self, pfn: Pfn) -> XboxPfn {
        let database = self.params.pfn_database_page().base();
        XboxPfn::from_bits(self.backend.ram_read_u32(database + pfn.as_u32() * PFN_RECORD_SIZE))
    }

    fn read_record(&mut self, pfn: Pfn) -> XboxPfn {
        XboxPfn::from_bits(self.read_u32(self.params.pfn_element_address(pfn)))
    }

    fn write_record(&mut self, pfn: Pfn, record: XboxPfn) {
        trace!("PFN {pfn} <- {record:?}");
        self.write_u32(self.params.pfn_element_address(pfn), record.into_bits());
    }

    fn read_entry(&mut self, entry: VirtualAddress) -> MmPte {
        MmPte::from_bits(self.read_u32(entry))
    }

    fn write_entry(&mut self, entry: VirtualAddress, value: MmPte) {
        trace!("{entry} <- {:#010X}", value.into_bits());
        self.write_u32(entry, value.into_bits());
    }

    fn flush_page_mapped_by(&mut self, pte: VirtualAddress) {
        let page = vaddr_mapped_by_pte(pte);
        trace!("TLB flush of {page}");
        self.backend.tlb_flush(page, page + (PAGE_SIZE - 1));
    }

    fn read_u32(&mut self, va: VirtualAddress) -> u32 {
        match self.backend.mem_read_u32(va) {
            Ok(value) => value,
            Err(fault) => fatal!("Page fault reading 4 bytes at {va}: {fault}"),
        }
    }

    fn write_u32(&mut self, va: VirtualAddress, value: u32) {
        if let Err(fault) = self.backend.mem_write_u32(va, value) {
            fatal!("Page fault writing 4 bytes at {va}: {fault}");
        }
    }
}
