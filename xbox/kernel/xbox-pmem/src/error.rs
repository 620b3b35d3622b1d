use xbox_memory_addresses::{Pfn, PfnCount};

/// Recoverable failures of the physical memory manager.
///
/// Anything else that goes wrong (an overlapping free, a fault on a page
/// table access) means the manager's view of guest memory is corrupt and
/// aborts instead.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PhysicalMemoryError {
    #[error("{requested} page tables needed but only {available} pages are available")]
    OutOfMemory {
        requested: PfnCount,
        available: PfnCount,
    },
    #[error("no free block satisfies the request")]
    NoFreeBlock,
    #[error("inconsistent state at page {pfn}: {reason}")]
    Inconsistent { pfn: Pfn, reason: &'static str },
}
