//! The physical frame table: `NFRAMES` slots, each either free or owned by
//! one `(pid, page index)` pair.

use crate::mmu::Protection;
use pager_addr::{FrameIndex, Pid};

/// State tracked per physical frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameEntry {
    /// The page currently occupying this frame, or `None` if free.
    owner: Option<(Pid, usize)>,
    /// The aging bit used by the clock algorithm.
    pub reference: bool,
    /// The protection the MMU currently enforces for this frame's mapping.
    /// Meaningless while the frame is free.
    pub protection: Protection,
}

impl FrameEntry {
    const fn free() -> Self {
        Self {
            owner: None,
            reference: false,
            protection: Protection::None,
        }
    }

    #[must_use]
    pub fn is_free(&self) -> bool {
        self.owner.is_none()
    }

    #[must_use]
    pub fn owner(&self) -> Option<(Pid, usize)> {
        self.owner
    }
}

/// The fixed-size array of frame descriptors, indexed `0..NFRAMES`.
///
/// Allocation is a linear scan for the first free slot, exactly as spec
/// §4.2 prescribes: with bounds in the hundreds and allocation only
/// happening on fault/extend, a scan is simpler than a free list and never
/// shows up on a profile.
pub struct FrameTable {
    entries: Vec<FrameEntry>,
}

impl FrameTable {
    #[must_use]
    pub fn new(nframes: usize) -> Self {
        Self {
            entries: vec![FrameEntry::free(); nframes],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, frame: FrameIndex) -> &FrameEntry {
        &self.entries[frame.0]
    }

    #[must_use]
    pub fn get_mut(&mut self, frame: FrameIndex) -> &mut FrameEntry {
        &mut self.entries[frame.0]
    }

    /// Returns the first free frame, without marking it as used.
    #[must_use]
    pub fn find_free(&self) -> Option<FrameIndex> {
        self.entries
            .iter()
            .position(FrameEntry::is_free)
            .map(FrameIndex::new)
    }

    /// Marks `frame` as occupied by `(pid, page_index)`, with reference bit
    /// set and protection recorded. The caller is responsible for having
    /// issued the matching `Mmu::resident` call first.
    pub fn occupy(&mut self, frame: FrameIndex, pid: Pid, page_index: usize, protection: Protection) {
        let entry = self.get_mut(frame);
        entry.owner = Some((pid, page_index));
        entry.reference = true;
        entry.protection = protection;
    }

    /// Clears `frame` back to free. Invariant 4 (spec §3): a free frame has
    /// no back-reference.
    pub fn vacate(&mut self, frame: FrameIndex) {
        *self.get_mut(frame) = FrameEntry::free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_free_scans_in_order() {
        let mut table = FrameTable::new(4);
        assert_eq!(table.find_free(), Some(FrameIndex::new(0)));

        table.occupy(FrameIndex::new(0), Pid(1), 0, Protection::Read);
        assert_eq!(table.find_free(), Some(FrameIndex::new(1)));
    }

    #[test]
    fn vacate_clears_back_reference() {
        let mut table = FrameTable::new(2);
        table.occupy(FrameIndex::new(0), Pid(1), 3, Protection::ReadWrite);
        table.vacate(FrameIndex::new(0));
        assert!(table.get(FrameIndex::new(0)).is_free());
        assert_eq!(table.get(FrameIndex::new(0)).owner(), None);
    }

    #[test]
    fn exhausted_pool_returns_none() {
        let mut table = FrameTable::new(1);
        table.occupy(FrameIndex::new(0), Pid(1), 0, Protection::Read);
        assert_eq!(table.find_free(), None);
    }
}
