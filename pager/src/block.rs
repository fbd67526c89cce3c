//! The simulated disk's block table: `NBLOCKS` slots, reserved for the
//! lifetime of the page that claimed them at `extend` time.

use pager_addr::{BlockIndex, Pid};

#[derive(Debug, Clone, Copy)]
struct BlockEntry {
    owner: Option<(Pid, usize)>,
}

/// The fixed-size array of disk block descriptors, indexed `0..NBLOCKS`.
///
/// Like [`crate::frame::FrameTable`], allocation is a linear scan; blocks
/// are reserved once per page (at `extend`) and freed once (at `destroy`),
/// so this path is colder still than frame allocation.
pub struct BlockTable {
    entries: Vec<BlockEntry>,
}

impl BlockTable {
    #[must_use]
    pub fn new(nblocks: usize) -> Self {
        Self {
            entries: vec![BlockEntry { owner: None }; nblocks],
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

    /// Reserves the first free block for `(pid, page_index)`, or returns
    /// `None` if the disk is full.
    pub fn alloc(&mut self, pid: Pid, page_index: usize) -> Option<BlockIndex> {
        let index = self.entries.iter().position(|e| e.owner.is_none())?;
        self.entries[index].owner = Some((pid, page_index));
        Some(BlockIndex::new(index))
    }

    /// Releases `block` back to the free pool. Invariant 4 (spec §3): a
    /// free block has no back-reference.
    pub fn free(&mut self, block: BlockIndex) {
        self.entries[block.0].owner = None;
    }
}
