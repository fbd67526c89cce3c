//! Second-chance (clock) frame replacement.
//!
//! A single cursor circles the frame table. A frame is picked as soon as
//! the cursor lands on a free frame or one with a clear reference bit;
//! frames with the bit set are given a second chance — the bit is cleared
//! and the frame's mapping is downgraded to no access, so the next touch
//! re-faults and the pager gets to observe it was referenced again.

use crate::frame::FrameTable;
use crate::mmu::{Mmu, Protection};
use crate::process::ProcessTable;
use pager_addr::VirtAddr;

/// The clock's circular cursor over the frame table.
pub struct Clock {
    cursor: usize,
}

impl Clock {
    #[must_use]
    pub fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Selects a victim frame, aging referenced frames out of the way as it
    /// goes. Never fails: with `nframes >= 1` a `ref=0` (or free) frame is
    /// found within at most two full laps, because every lap clears every
    /// set reference bit it passes over.
    ///
    /// `processes`/`mmu`/`page_size` are needed to issue the protection
    /// downgrade for frames that are skipped — the aging step is a real MMU
    /// effect, not just local bookkeeping.
    pub fn select_victim(
        &mut self,
        frames: &mut FrameTable,
        processes: &mut ProcessTable,
        mmu: &mut impl Mmu,
        page_size: usize,
    ) -> pager_addr::FrameIndex {
        debug_assert!(!frames.is_empty(), "clock has no frames to scan");

        let max_iterations = frames.len() * 2 + 1;
        for _ in 0..max_iterations {
            let frame = pager_addr::FrameIndex::new(self.cursor);
            self.cursor = (self.cursor + 1) % frames.len();

            if frames.get(frame).is_free() {
                return frame;
            }
            if !frames.get(frame).reference {
                return frame;
            }

            // Second chance: age this frame out and keep scanning.
            let (pid, page_index) = frames
                .get(frame)
                .owner()
                .expect("non-free frame must have an owner");
            frames.get_mut(frame).reference = false;
            frames.get_mut(frame).protection = Protection::None;

            if let Some(process) = processes.get_mut(pid) {
                let vaddr = VirtAddr::of_page(page_index, page_size);
                mmu.chprot(pid, vaddr, Protection::None);
                let _ = process; // page descriptor itself is untouched by aging
            }
        }

        // Unreachable under a well-behaved host: every lap clears every
        // reference bit it passes, so a ref=0 frame must turn up within two
        // laps. If it doesn't, something outside the documented contract
        // (e.g. a reference bit flipping back on its own) has happened;
        // fall back to forcing out whatever the cursor currently points at
        // rather than looping forever.
        log::error!("clock scan exceeded {max_iterations} iterations, forcing eviction");
        let frame = pager_addr::FrameIndex::new(self.cursor);
        self.cursor = (self.cursor + 1) % frames.len();
        frame
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;
    use pager_addr::{FrameIndex, Pid};

    struct NullMmu {
        page_size: usize,
        pmem: Vec<u8>,
    }

    impl Mmu for NullMmu {
        fn page_size(&self) -> usize {
            self.page_size
        }
        fn zero_fill(&mut self, _frame: FrameIndex) {}
        fn disk_read(&mut self, _block: pager_addr::BlockIndex, _frame: FrameIndex) {}
        fn disk_write(&mut self, _frame: FrameIndex, _block: pager_addr::BlockIndex) {}
        fn resident(&mut self, _pid: Pid, _vaddr: VirtAddr, _frame: FrameIndex, _prot: Protection) {}
        fn nonresident(&mut self, _pid: Pid, _vaddr: VirtAddr) {}
        fn chprot(&mut self, _pid: Pid, _vaddr: VirtAddr, _prot: Protection) {}
        fn pmem(&self) -> &[u8] {
            &self.pmem
        }
    }

    fn null_mmu() -> NullMmu {
        NullMmu {
            page_size: 4096,
            pmem: vec![0; 4096 * 4],
        }
    }

    #[test]
    fn prefers_free_frame() {
        let mut frames = FrameTable::new(4);
        let mut processes = ProcessTable::new();
        let mut mmu = null_mmu();
        let mut clock = Clock::new();

        frames.occupy(FrameIndex::new(0), Pid(1), 0, Protection::Read);
        let victim = clock.select_victim(&mut frames, &mut processes, &mut mmu, 4096);
        assert_eq!(victim, FrameIndex::new(1));
    }

    #[test]
    fn ages_referenced_frames_before_picking_victim() {
        let mut frames = FrameTable::new(2);
        let mut processes = ProcessTable::new();
        processes.create(Pid(1));
        if let Some(p) = processes.get_mut(Pid(1)) {
            let _: &mut Process = p;
        }
        let mut mmu = null_mmu();
        let mut clock = Clock::new();

        frames.occupy(FrameIndex::new(0), Pid(1), 0, Protection::Read);
        frames.occupy(FrameIndex::new(1), Pid(1), 1, Protection::Read);

        let victim = clock.select_victim(&mut frames, &mut processes, &mut mmu, 4096);
        // Both frames were referenced: frame 0 gets aged (ref cleared,
        // protection downgraded) and the scan picks it back up on the
        // second pass once its bit is clear.
        assert_eq!(victim, FrameIndex::new(0));
        assert_eq!(frames.get(FrameIndex::new(1)).protection, Protection::None);
    }
}
