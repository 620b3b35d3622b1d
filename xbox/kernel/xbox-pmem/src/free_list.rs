//! Coalescing list of free physical page runs.
//!
//! Blocks are kept in ascending address order from head to tail. Searches
//! start at the tail, so allocations are carved from the highest free pages
//! first and low memory stays free for as long as possible.

use alloc::vec::Vec;
use xbox_memory_addresses::{Pfn, PfnCount};

/// A maximal run of free pages.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FreeBlock {
    pub start: Pfn,
    pub size: PfnCount,
}

impl FreeBlock {
    #[inline]
    #[must_use]
    pub const fn new(start: Pfn, size: PfnCount) -> Self {
        Self { start, size }
    }

    /// Last page of the run.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> Pfn {
        Pfn::new(self.start.as_u32() + self.size - 1)
    }
}

#[derive(Debug, Clone)]
struct Node {
    block: FreeBlock,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Free page runs plus the two pool counters.
///
/// On a development kit the pages at and above the debugger boundary form a
/// separate pool; a run is charged to that pool when it starts inside it.
///
/// # Invariants
/// - Blocks never overlap and no two blocks touch; an insert that borders a
///   neighbor merges with it.
/// - `physical + debugger` equals the total number of free pages, except
///   transiently during PFN database setup on a development kit.
#[derive(Debug, Clone)]
pub struct FreeList {
    /// Node storage; indices of unlinked nodes are kept in `vacant`.
    nodes: Vec<Node>,
    vacant: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    page_count: PfnCount,
    debugger_boundary: Option<Pfn>,
    physical: PfnCount,
    debugger: PfnCount,
}

impl FreeList {
    /// An empty list for RAM ending at `highest_page`.
    #[must_use]
    pub const fn new(highest_page: Pfn, debugger_boundary: Option<Pfn>) -> Self {
        Self {
            nodes: Vec::new(),
            vacant: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            page_count: highest_page.as_u32() + 1,
            debugger_boundary,
            physical: 0,
            debugger: 0,
        }
    }

    /// A list holding every page of `[0, highest_page]` as one block.
    #[must_use]
    pub fn with_all_pages(highest_page: Pfn, debugger_boundary: Option<Pfn>) -> Self {
        let mut list = Self::new(highest_page, debugger_boundary);
        let pages = list.page_count;
        let index = list.alloc_node(FreeBlock::new(Pfn::new(0), pages));
        list.head = Some(index);
        list.tail = Some(index);
        list.len = 1;
        match debugger_boundary {
            Some(boundary) if boundary.as_u32() < pages => {
                list.physical = boundary.as_u32();
                list.debugger = pages - boundary.as_u32();
            }
            _ => list.physical = pages,
        }
        list
    }

    /// Free pages in the general pool.
    #[inline]
    #[must_use]
    pub const fn physical_pages_available(&self) -> PfnCount {
        self.physical
    }

    /// Free pages in the debugger-only pool.
    #[inline]
    #[must_use]
    pub const fn debugger_pages_available(&self) -> PfnCount {
        self.debugger
    }

    /// Number of blocks.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sum of all block sizes.
    #[must_use]
    pub fn free_pages(&self) -> PfnCount {
        self.iter().map(|b| b.size).sum()
    }

    /// Blocks in ascending address order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            front: self.head,
            back: self.tail,
            remaining: self.len,
        }
    }

    /// Move `pages` from the debugger pool counter to the general one.
    ///
    /// Used once during boot on a development kit, whose PFN database is
    /// taken in one piece from both sides of the boundary but is charged to
    /// the general pool only.
    pub fn move_debugger_pages_to_physical(&mut self, pages: PfnCount) {
        let Some(debugger) = self.debugger.checked_sub(pages) else {
            crate::fatal!(
                "Moving {pages} pages out of a debugger pool of {} pages",
                self.debugger
            );
        };
        self.debugger = debugger;
        self.physical += pages;
    }

    /// Take `count` pages from the highest free run inside
    /// `[range_start, range_end]`.
    ///
    /// `alignment` is `0` for none or a power of two in pages; the first
    /// page of the taken run is then a multiple of it. Returns the first
    /// page of the run, or `None` if `count` is zero or no block fits.
    pub fn remove(
        &mut self,
        count: PfnCount,
        alignment: PfnCount,
        range_start: Pfn,
        range_end: Pfn,
    ) -> Option<Pfn> {
        if count == 0 {
            return None;
        }
        debug_assert!(alignment == 0 || alignment.is_power_of_two());

        // Pulling the end down to `((end + 1) & mask) - slack` leaves
        // `end + 1 - count` on an aligned page.
        let (mask, slack) = if alignment > 1 {
            let mask = !(alignment - 1);
            let rounded = count.checked_add(alignment - 1)? & mask;
            (mask, rounded - count + 1)
        } else {
            (!0, 1)
        };

        let mut cursor = self.tail;
        while let Some(index) = cursor {
            let node = &self.nodes[index];
            cursor = node.prev;
            let block = node.block;
            if block.size < count {
                continue;
            }

            let start = block.start.as_u32().max(range_start.as_u32());
            let end = block.end().as_u32().min(range_end.as_u32());
            if start > end || end - start + 1 < count {
                continue;
            }

            let Some(end) = (end.wrapping_add(1) & mask).checked_sub(slack) else {
                continue;
            };
            if end < start || end - start + 1 < count {
                continue;
            }

            let taken = Pfn::new(end + 1 - count);
            let before = taken - block.start;
            let after = block.end() - Pfn::new(end);
            if before > 0 {
                self.nodes[index].block.size = before;
                if after > 0 {
                    self.link_after(index, FreeBlock::new(Pfn::new(end + 1), after));
                }
            } else if after > 0 {
                self.nodes[index].block = FreeBlock::new(Pfn::new(end + 1), after);
            } else {
                self.unlink(index);
            }

            if self.is_debugger(taken) {
                self.debugger -= count;
            } else {
                self.physical -= count;
            }
            log::trace!("Took {count} pages at {taken} from the free list");
            return Some(taken);
        }

        None
    }

    /// Return the pages `[start, end]` to the list, merging with touching
    /// neighbors.
    ///
    /// # Panics
    /// If the range overlaps a free block, i.e. on a double free.
    pub fn insert(&mut self, start: Pfn, end: Pfn) {
        assert!(start <= end, "inverted free range {start}..={end}");
        let size = end - start + 1;

        // last block starting below `start`
        let mut prev = self.tail;
        while let Some(index) = prev {
            if self.nodes[index].block.start < start {
                break;
            }
            prev = self.nodes[index].prev;
        }
        let next = prev.map_or(self.head, |index| self.nodes[index].next);

        if let Some(index) = prev {
            let block = self.nodes[index].block;
            if block.end() >= start {
                crate::fatal!("Freeing {start}..={end} overlaps free block {block:?}");
            }
        }
        if let Some(index) = next {
            let block = self.nodes[index].block;
            if block.start <= end {
                crate::fatal!("Freeing {start}..={end} overlaps free block {block:?}");
            }
        }

        let joins_next = next.filter(|&index| self.nodes[index].block.start == end + 1);
        let joins_prev = prev.filter(|&index| self.nodes[index].block.end() + 1 == start);
        match (joins_prev, joins_next) {
            (Some(p), Some(n)) => {
                let merged = self.nodes[p].block.size + size + self.nodes[n].block.size;
                self.nodes[p].block.size = merged;
                self.unlink(n);
            }
            (Some(p), None) => self.nodes[p].block.size += size,
            (None, Some(n)) => {
                let block = &mut self.nodes[n].block;
                block.start = start;
                block.size += size;
            }
            (None, None) => match prev {
                Some(p) => self.link_after(p, FreeBlock::new(start, size)),
                None => self.link_front(FreeBlock::new(start, size)),
            },
        }

        if self.is_debugger(start) {
            self.debugger += size;
        } else {
            self.physical += size;
        }
        assert!(
            self.physical <= self.page_count,
            "general pool counter overflow ({} pages)",
            self.physical
        );
        if let Some(boundary) = self.debugger_boundary {
            assert!(
                self.debugger <= self.page_count.saturating_sub(boundary.as_u32()),
                "debugger pool counter overflow ({} pages)",
                self.debugger
            );
        }
        log::trace!("Returned {size} pages at {start} to the free list");
    }

    fn is_debugger(&self, pfn: Pfn) -> bool {
        self.debugger_boundary.is_some_and(|boundary| pfn >= boundary)
    }

    fn alloc_node(&mut self, block: FreeBlock) -> usize {
        let node = Node {
            block,
            prev: None,
            next: None,
        };
        if let Some(index) = self.vacant.pop() {
            self.nodes[index] = node;
            index
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn link_front(&mut self, block: FreeBlock) {
        let index = self.alloc_node(block);
        self.nodes[index].next = self.head;
        match self.head {
            Some(head) => self.nodes[head].prev = Some(index),
            None => self.tail = Some(index),
        }
        self.head = Some(index);
        self.len += 1;
    }

    fn link_after(&mut self, after: usize, block: FreeBlock) {
        let index = self.alloc_node(block);
        let next = self.nodes[after].next;
        self.nodes[index].prev = Some(after);
        self.nodes[index].next = next;
        self.nodes[after].next = Some(index);
        match next {
            Some(next) => self.nodes[next].prev = Some(index),
            None => self.tail = Some(index),
        }
        self.len += 1;
    }

    fn unlink(&mut self, index: usize) {
        let Node { prev, next, .. } = self.nodes[index];
        match prev {
            Some(prev) => self.nodes[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next].prev = prev,
            None => self.tail = prev,
        }
        self.vacant.push(index);
        self.len -= 1;
    }
}

/// Iterator over the blocks of a [`FreeList`].
pub struct Iter<'a> {
    list: &'a FreeList,
    front: Option<usize>,
    back: Option<usize>,
    remaining: usize,
}

impl Iterator for Iter<'_> {
    type Item = FreeBlock;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = &self.list.nodes[self.front?];
        self.front = node.next;
        self.remaining -= 1;
        Some(node.block)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = &self.list.nodes[self.back?];
        self.back = node.prev;
        self.remaining -= 1;
        Some(node.block)
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a FreeList {
    type Item = FreeBlock;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
