#![allow(dead_code)]

use log::LevelFilter;
use xbox_info::MemoryLayout;
use xbox_logger::HostLogger;
use xbox_memory_addresses::Pfn;
use xbox_pmem::{CachedMemory, DirectMemory, MemoryBackend, PhysicalMemory};

pub const LAYOUTS: [MemoryLayout; 3] =
    [MemoryLayout::Retail, MemoryLayout::Debug, MemoryLayout::Chihiro];

pub fn init_logging() {
    HostLogger::new(HostLogger::level_from_env(LevelFilter::Warn))
        .init()
        .expect("no other logger installed");
}

pub fn boot<B: MemoryBackend>(backend: B, layout: MemoryLayout) -> PhysicalMemory<B> {
    init_logging();
    let mut pmem = PhysicalMemory::new(backend, layout);
    pmem.boot();
    pmem
}

pub fn direct(layout: MemoryLayout) -> PhysicalMemory<DirectMemory> {
    boot(DirectMemory::new(layout.parameters().ram_size()), layout)
}

pub fn cached(layout: MemoryLayout) -> PhysicalMemory<CachedMemory> {
    boot(CachedMemory::new(layout.parameters().ram_size()), layout)
}

/// Take pages one at a time from `[0, limit]` until none is left.
pub fn drain_below<B: MemoryBackend>(pmem: &mut PhysicalMemory<B>, limit: Pfn) -> Vec<Pfn> {
    let mut taken = Vec::new();
    while let Some(pfn) = pmem.remove_free(1, 0, Pfn::new(0), limit) {
        taken.push(pfn);
    }
    taken
}
