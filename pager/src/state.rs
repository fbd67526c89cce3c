//! The pager's core state machine: resource pools, process registry, the
//! fault/clock/syslog logic tying them together.
//!
//! Everything here runs under a single lock (see [`crate::Pager`]); nothing
//! in this module takes a lock itself; it is the synchronous body the
//! public handle wraps.

use crate::block::BlockTable;
use crate::clock::Clock;
use crate::error::{ExtendError, SyslogError};
use crate::frame::FrameTable;
use crate::mmu::{Mmu, Protection};
use crate::process::{self, ProcessTable};
use pager_addr::{FrameIndex, Pid, VirtAddr, UVM_BASEADDR};
use std::io::Write;

/// A human-readable classification of a page's place in the fault state
/// machine (spec §4.4). Not stored anywhere — derived on demand from
/// `(resident, dirty, frame.protection)` purely for tracing and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    NonResident,
    Clean,
    Dirty,
    Aged,
}

impl std::fmt::Display for PageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NonResident => "NONRESIDENT",
            Self::Clean => "R_CLEAN",
            Self::Dirty => "R_DIRTY",
            Self::Aged => "AGED",
        };
        f.write_str(s)
    }
}

/// The pager's full mutable state, generic over the [`Mmu`] it drives.
pub struct PagerState<M: Mmu> {
    pub(crate) mmu: M,
    page_size: usize,
    frames: FrameTable,
    blocks: BlockTable,
    processes: ProcessTable,
    clock: Clock,
    /// Faults that land on a page already at read+write protection. Spec
    /// §9 flags the correct handling as an open question and recommends
    /// treating it as a no-op surfaced as a debug counter; this is that
    /// counter.
    pub spurious_faults: usize,
}

impl<M: Mmu> PagerState<M> {
    pub fn new(mmu: M, nframes: usize, nblocks: usize) -> Self {
        let page_size = mmu.page_size();
        Self {
            mmu,
            page_size,
            frames: FrameTable::new(nframes),
            blocks: BlockTable::new(nblocks),
            processes: ProcessTable::new(),
            clock: Clock::new(),
            spurious_faults: 0,
        }
    }

    pub fn create(&mut self, pid: Pid) {
        self.processes.create(pid);
    }

    pub fn extend(&mut self, pid: Pid) -> Result<VirtAddr, ExtendError> {
        let npages = self
            .processes
            .get(pid)
            .ok_or(ExtendError::UnknownProcess)?
            .npages();

        if npages >= process::MAX_PAGES {
            return Err(ExtendError::OutOfMemory);
        }

        let block = self
            .blocks
            .alloc(pid, npages)
            .ok_or(ExtendError::OutOfSpace)?;

        let index = self
            .processes
            .extend(pid, block)
            .expect("page cap and process existence were just checked");
        debug_assert_eq!(index, npages);

        let vaddr = VirtAddr::of_page(index, self.page_size);
        log::debug!("{pid}: extend -> page {index} at {vaddr}");
        Ok(vaddr)
    }

    pub fn fault(&mut self, pid: Pid, addr: VirtAddr) {
        let Some(npages) = self.processes.get(pid).map(process::Process::npages) else {
            log::trace!("fault for unknown process {pid}, ignored (MMU contract)");
            return;
        };

        let page_index = addr.page_index(self.page_size);
        if page_index >= npages {
            log::trace!("fault at {addr} outside {pid}'s allocated range, ignored");
            return;
        }

        let resident = self
            .processes
            .get(pid)
            .and_then(|p| p.page(page_index))
            .map(|p| p.resident)
            .unwrap_or(false);

        let page_vaddr = VirtAddr::of_page(page_index, self.page_size);

        if !resident {
            self.ensure_resident(pid, page_index);
            log::debug!("{pid}:{page_index} {} -> {}", PageState::NonResident, PageState::Clean);
            return;
        }

        let frame = self
            .processes
            .get(pid)
            .and_then(|p| p.page(page_index))
            .and_then(|p| p.frame)
            .expect("resident page must have a frame");

        match self.frames.get(frame).protection {
            Protection::None => {
                // AGED: second-chance reinstate.
                let dirty = self
                    .processes
                    .get(pid)
                    .and_then(|p| p.page(page_index))
                    .map(|p| p.dirty)
                    .unwrap_or(false);
                let new_prot = Protection::for_dirty(dirty);
                self.mmu.chprot(pid, page_vaddr, new_prot);
                self.frames.get_mut(frame).protection = new_prot;
                self.frames.get_mut(frame).reference = true;
                log::debug!(
                    "{pid}:{page_index} {} -> {}",
                    PageState::Aged,
                    if dirty { PageState::Dirty } else { PageState::Clean }
                );
            }
            Protection::Read => {
                // R_CLEAN: this fault is a write attempt.
                self.mmu.chprot(pid, page_vaddr, Protection::ReadWrite);
                self.frames.get_mut(frame).protection = Protection::ReadWrite;
                self.frames.get_mut(frame).reference = true;
                if let Some(page) = self.processes.get_mut(pid).and_then(|p| p.page_mut(page_index)) {
                    page.dirty = true;
                }
                log::debug!("{pid}:{page_index} {} -> {}", PageState::Clean, PageState::Dirty);
            }
            Protection::ReadWrite => {
                // Spurious: should not occur per the MMU contract. Treat as
                // a no-op rather than trust an MMU call we can't explain.
                self.frames.get_mut(frame).reference = true;
                self.spurious_faults += 1;
                log::warn!(
                    "{pid}:{page_index} spurious fault while already R_DIRTY (count={})",
                    self.spurious_faults
                );
            }
        }
    }

    pub fn syslog(&mut self, pid: Pid, addr: usize, len: usize) -> Result<(), SyslogError> {
        let npages = self
            .processes
            .get(pid)
            .ok_or(SyslogError::UnknownProcess)?
            .npages();

        if len == 0 {
            // "no validation beyond pid": a zero-length syslog neither
            // checks the address nor prints anything (spec §6).
            return Ok(());
        }

        let vaddr = VirtAddr::try_new(addr).ok_or(SyslogError::InvalidRange)?;
        let start = vaddr.as_usize();
        let end = start.checked_add(len).ok_or(SyslogError::InvalidRange)?;
        let region_end = UVM_BASEADDR + npages * self.page_size;
        if end > region_end {
            return Err(SyslogError::InvalidRange);
        }

        let mut buffer = vec![0u8; len];
        let mut written = 0;
        let mut cursor = start;
        while written < len {
            let page_index = (cursor - UVM_BASEADDR) / self.page_size;
            let page_offset = (cursor - UVM_BASEADDR) % self.page_size;
            let chunk = (len - written).min(self.page_size - page_offset);

            let frame = self.ensure_resident(pid, page_index);
            let src = frame.0 * self.page_size + page_offset;
            buffer[written..written + chunk].copy_from_slice(&self.mmu.pmem()[src..src + chunk]);

            written += chunk;
            cursor += chunk;
        }

        emit_hex_dump(&buffer);
        Ok(())
    }

    pub fn destroy(&mut self, pid: Pid) {
        let Some(process) = self.processes.remove(pid) else {
            return;
        };

        let mut reclaimed_pages = 0;
        for (_, page) in process.pages() {
            if page.resident {
                // The host's process-side teardown should already have
                // unmapped these pages (spec §4.1: "no MMU calls are
                // issued during destroy"). Reclaiming regardless keeps the
                // pools consistent even if that contract was violated, but
                // it's worth knowing about.
                log::warn!("destroy({pid}) found a still-resident page; host may not have torn down the mapping");
            }
            if let Some(frame) = page.frame {
                self.frames.vacate(frame);
            }
            self.blocks.free(page.block);
            reclaimed_pages += 1;
        }
        log::debug!("destroyed {pid}, reclaimed {reclaimed_pages} pages");
    }

    /// Brings page `page_index` of `pid` resident, evicting via the clock
    /// algorithm if no frame is free. Shared by `fault`'s NONRESIDENT path
    /// and `syslog`'s read-through (spec §4.5); returns the frame the page
    /// now occupies.
    ///
    /// The caller must have already validated that `pid`/`page_index` refer
    /// to an allocated page.
    fn ensure_resident(&mut self, pid: Pid, page_index: usize) -> FrameIndex {
        let existing = self
            .processes
            .get(pid)
            .and_then(|p| p.page(page_index))
            .and_then(|p| p.resident.then_some(p.frame).flatten());

        let vaddr = VirtAddr::of_page(page_index, self.page_size);

        if let Some(frame) = existing {
            if self.frames.get(frame).protection == Protection::None {
                let dirty = self
                    .processes
                    .get(pid)
                    .and_then(|p| p.page(page_index))
                    .map(|p| p.dirty)
                    .unwrap_or(false);
                let new_prot = Protection::for_dirty(dirty);
                self.mmu.chprot(pid, vaddr, new_prot);
                self.frames.get_mut(frame).protection = new_prot;
            }
            self.frames.get_mut(frame).reference = true;
            return frame;
        }

        let frame = match self.frames.find_free() {
            Some(frame) => frame,
            None => {
                let victim =
                    self.clock
                        .select_victim(&mut self.frames, &mut self.processes, &mut self.mmu, self.page_size);
                self.evict(victim);
                victim
            }
        };

        let in_disk = self
            .processes
            .get(pid)
            .and_then(|p| p.page(page_index))
            .map(|p| p.in_disk)
            .unwrap_or(false);
        let block = self
            .processes
            .get(pid)
            .and_then(|p| p.page(page_index))
            .map(|p| p.block)
            .expect("page must be allocated");

        if in_disk {
            self.mmu.disk_read(block, frame);
        } else {
            self.mmu.zero_fill(frame);
        }

        self.mmu.resident(pid, vaddr, frame, Protection::Read);
        self.frames.occupy(frame, pid, page_index, Protection::Read);

        if let Some(page) = self.processes.get_mut(pid).and_then(|p| p.page_mut(page_index)) {
            page.resident = true;
            page.frame = Some(frame);
            page.dirty = false;
        }

        frame
    }

    /// Evicts whatever page currently occupies `frame` (spec §4.6): tears
    /// down the mapping first, syncs to disk only if dirty, then frees the
    /// frame.
    fn evict(&mut self, frame: FrameIndex) {
        let Some((pid, page_index)) = self.frames.get(frame).owner() else {
            return;
        };
        let vaddr = VirtAddr::of_page(page_index, self.page_size);

        // Ordering contract: nonresident must be observed before the
        // disk_write that follows, because disk_write addresses the frame
        // by physical index, not by the (now possibly stale) mapping.
        self.mmu.nonresident(pid, vaddr);

        match self.processes.get_mut(pid).and_then(|p| p.page_mut(page_index)) {
            Some(page) => {
                if page.dirty {
                    self.mmu.disk_write(frame, page.block);
                    page.in_disk = true;
                    page.dirty = false;
                }
                page.resident = false;
                page.frame = None;
            }
            None => {
                log::warn!("evicting {frame}, owner {pid} no longer registered");
            }
        }

        self.frames.vacate(frame);
    }
}

fn emit_hex_dump(bytes: &[u8]) {
    let mut stdout = std::io::stdout().lock();
    for byte in bytes {
        let _ = write!(stdout, "{byte:02x}");
    }
    let _ = writeln!(stdout);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtendError, SyslogError};
    use crate::mmu::Mmu;
    use pager_addr::BlockIndex;

    /// A tiny in-memory MMU stand-in used only to unit-test `PagerState` in
    /// isolation from the `mmu-sim` crate; it tracks just enough to assert
    /// on in these tests (current protection per (pid, page) and a disk
    /// backing store).
    struct TestMmu {
        page_size: usize,
        pmem: Vec<u8>,
        disk: Vec<Vec<u8>>,
        protections: std::collections::HashMap<(Pid, usize), Protection>,
    }

    impl TestMmu {
        fn new(nframes: usize, nblocks: usize, page_size: usize) -> Self {
            Self {
                page_size,
                pmem: vec![0; nframes * page_size],
                disk: vec![vec![0; page_size]; nblocks],
                protections: std::collections::HashMap::new(),
            }
        }

        fn protection_of(&self, pid: Pid, page_index: usize) -> Option<Protection> {
            self.protections.get(&(pid, page_index)).copied()
        }
    }

    impl Mmu for TestMmu {
        fn page_size(&self) -> usize {
            self.page_size
        }

        fn zero_fill(&mut self, frame: FrameIndex) {
            let start = frame.0 * self.page_size;
            self.pmem[start..start + self.page_size].fill(0);
        }

        fn disk_read(&mut self, block: BlockIndex, frame: FrameIndex) {
            let start = frame.0 * self.page_size;
            self.pmem[start..start + self.page_size].copy_from_slice(&self.disk[block.0]);
        }

        fn disk_write(&mut self, frame: FrameIndex, block: BlockIndex) {
            let start = frame.0 * self.page_size;
            self.disk[block.0].copy_from_slice(&self.pmem[start..start + self.page_size]);
        }

        fn resident(&mut self, pid: Pid, vaddr: VirtAddr, _frame: FrameIndex, prot: Protection) {
            let page_index = vaddr.page_index(self.page_size);
            self.protections.insert((pid, page_index), prot);
        }

        fn nonresident(&mut self, pid: Pid, vaddr: VirtAddr) {
            let page_index = vaddr.page_index(self.page_size);
            self.protections.remove(&(pid, page_index));
        }

        fn chprot(&mut self, pid: Pid, vaddr: VirtAddr, prot: Protection) {
            let page_index = vaddr.page_index(self.page_size);
            self.protections.insert((pid, page_index), prot);
        }

        fn pmem(&self) -> &[u8] {
            &self.pmem
        }
    }

    const PAGE_SIZE: usize = 4096;

    fn pager(nframes: usize, nblocks: usize) -> PagerState<TestMmu> {
        PagerState::new(TestMmu::new(nframes, nblocks, PAGE_SIZE), nframes, nblocks)
    }

    fn write_byte(state: &mut PagerState<TestMmu>, pid: Pid, frame: FrameIndex, offset: usize, value: u8) {
        let start = frame.0 * PAGE_SIZE + offset;
        state.mmu.pmem[start] = value;
    }

    #[test]
    fn extend_before_touch_then_write_is_all_zero_then_dirty() {
        let mut state = pager(4, 8);
        state.create(Pid(1));
        let vaddr = state.extend(Pid(1)).unwrap();

        state.fault(Pid(1), vaddr);
        let page = state.processes.get(Pid(1)).unwrap().page(0).unwrap();
        assert!(page.resident);
        assert!(!page.dirty);
        let frame = page.frame.unwrap();
        assert_eq!(state.mmu.pmem[frame.0 * PAGE_SIZE], 0);
        assert_eq!(state.mmu.protection_of(Pid(1), 0), Some(Protection::Read));

        write_byte(&mut state, Pid(1), frame, 0, b'A');
        state.fault(Pid(1), vaddr);
        let page = state.processes.get(Pid(1)).unwrap().page(0).unwrap();
        assert!(page.dirty);
        assert_eq!(state.mmu.protection_of(Pid(1), 0), Some(Protection::ReadWrite));
    }

    #[test]
    fn write_then_evict_then_read_round_trips_through_disk() {
        let mut state = pager(1, 2);
        state.create(Pid(1));
        let v0 = state.extend(Pid(1)).unwrap();
        let v1 = state.extend(Pid(1)).unwrap();

        state.fault(Pid(1), v0); // NONRESIDENT -> R_CLEAN
        let frame0 = state.processes.get(Pid(1)).unwrap().page(0).unwrap().frame.unwrap();
        write_byte(&mut state, Pid(1), frame0, 0, b'Z');
        state.fault(Pid(1), v0); // R_CLEAN -> R_DIRTY

        // Only one frame: touching page 1 evicts page 0, which must sync
        // to disk because it is dirty.
        state.fault(Pid(1), v1);
        let page0 = state.processes.get(Pid(1)).unwrap().page(0).unwrap();
        assert!(!page0.resident);
        assert!(page0.in_disk);
        assert!(!page0.dirty);

        // Reading page 0 again evicts page 1 and must restore 'Z'.
        state.fault(Pid(1), v0);
        let frame = state.processes.get(Pid(1)).unwrap().page(0).unwrap().frame.unwrap();
        assert_eq!(state.mmu.pmem[frame.0 * PAGE_SIZE], b'Z');
    }

    #[test]
    fn thrashing_six_pages_through_four_frames() {
        let mut state = pager(4, 8);
        state.create(Pid(1));
        let vaddrs: Vec<_> = (0..6).map(|_| state.extend(Pid(1)).unwrap()).collect();

        for (i, &v) in vaddrs.iter().enumerate() {
            state.fault(Pid(1), v); // load
            let frame = state.processes.get(Pid(1)).unwrap().page(i).unwrap().frame.unwrap();
            write_byte(&mut state, Pid(1), frame, 0, b'A' + i as u8);
            state.fault(Pid(1), v); // dirty it
        }

        for _ in 0..5 {
            for (i, &v) in vaddrs.iter().enumerate() {
                state.fault(Pid(1), v);
                let frame = state.processes.get(Pid(1)).unwrap().page(i).unwrap().frame.unwrap();
                assert_eq!(state.mmu.pmem[frame.0 * PAGE_SIZE], b'A' + i as u8);
            }
        }
    }

    #[test]
    fn disk_exhaustion_caps_extend_but_leaves_existing_pages_usable() {
        let mut state = pager(4, 8);
        state.create(Pid(1));

        for _ in 0..8 {
            assert!(state.extend(Pid(1)).is_ok());
        }
        assert_eq!(state.extend(Pid(1)), Err(ExtendError::OutOfSpace));
        assert_eq!(state.extend(Pid(1)), Err(ExtendError::OutOfSpace));

        assert_eq!(state.syslog(Pid(1), pager_addr::UVM_BASEADDR, 1), Ok(()));
    }

    #[test]
    fn syslog_bounds_checking() {
        let mut state = pager(4, 8);
        state.create(Pid(1));
        let page0 = state.extend(Pid(1)).unwrap();

        assert_eq!(state.syslog(Pid(1), 0, 10), Err(SyslogError::InvalidRange));
        assert_eq!(
            state.syslog(Pid(1), page0.as_usize() + PAGE_SIZE, 10),
            Err(SyslogError::InvalidRange)
        );
        assert_eq!(
            state.syslog(Pid(1), page0.as_usize() + PAGE_SIZE - 5, 5),
            Ok(())
        );
        assert_eq!(state.syslog(Pid(1), page0.as_usize(), 0), Ok(()));
    }

    #[test]
    fn syslog_does_not_dirty_untouched_pages() {
        let mut state = pager(4, 8);
        state.create(Pid(1));
        let page0 = state.extend(Pid(1)).unwrap();

        state.syslog(Pid(1), page0.as_usize(), PAGE_SIZE).unwrap();
        let page = state.processes.get(Pid(1)).unwrap().page(0).unwrap();
        assert!(page.resident);
        assert!(!page.dirty);
    }

    #[test]
    fn multi_process_isolation() {
        let mut state = pager(2, 4);
        state.create(Pid(1));
        state.create(Pid(2));
        let v1 = state.extend(Pid(1)).unwrap();
        let v2 = state.extend(Pid(2)).unwrap();

        state.fault(Pid(1), v1);
        let f1 = state.processes.get(Pid(1)).unwrap().page(0).unwrap().frame.unwrap();
        write_byte(&mut state, Pid(1), f1, 0, 1);
        state.fault(Pid(1), v1);

        state.fault(Pid(2), v2);
        let f2 = state.processes.get(Pid(2)).unwrap().page(0).unwrap().frame.unwrap();
        write_byte(&mut state, Pid(2), f2, 0, 2);
        state.fault(Pid(2), v2);

        assert_eq!(state.mmu.pmem[f1.0 * PAGE_SIZE], 1);
        assert_eq!(state.mmu.pmem[f2.0 * PAGE_SIZE], 2);
    }

    #[test]
    fn destroy_reclaims_frames_and_blocks() {
        let mut state = pager(4, 8);
        state.create(Pid(1));
        let v0 = state.extend(Pid(1)).unwrap();
        state.fault(Pid(1), v0);

        state.destroy(Pid(1));
        assert!(state.frames.find_free().is_some());
        assert!(state.processes.get(Pid(1)).is_none());

        // The block pool should be fully reclaimed: a fresh process can
        // fill it back up to the same NBLOCKS capacity.
        state.create(Pid(2));
        for _ in 0..8 {
            assert!(state.extend(Pid(2)).is_ok());
        }
    }

    #[test]
    fn create_is_idempotent() {
        let mut state = pager(4, 8);
        state.create(Pid(1));
        state.create(Pid(1));
        assert_eq!(state.processes.get(Pid(1)).unwrap().npages(), 0);
    }

    #[test]
    fn fault_on_unknown_process_is_ignored() {
        let mut state = pager(4, 8);
        state.fault(Pid(42), VirtAddr::of_page(0, PAGE_SIZE));
        // no panic, nothing to assert beyond "did not crash"
    }

    #[test]
    fn extend_past_per_process_page_cap_is_out_of_memory() {
        // Needs more blocks than MAX_PAGES so the cap itself is what's hit,
        // not disk exhaustion.
        let mut state = pager(4, crate::process::MAX_PAGES + 4);
        state.create(Pid(1));
        for _ in 0..crate::process::MAX_PAGES {
            assert!(state.extend(Pid(1)).is_ok());
        }
        assert_eq!(state.extend(Pid(1)), Err(ExtendError::OutOfMemory));
    }

    #[test]
    fn extend_on_unknown_process_is_unknown_process_error() {
        let mut state = pager(4, 8);
        assert_eq!(state.extend(Pid(99)), Err(ExtendError::UnknownProcess));
    }

    #[test]
    fn syslog_on_unknown_process_is_unknown_process_error() {
        let mut state = pager(4, 8);
        assert_eq!(
            state.syslog(Pid(99), pager_addr::UVM_BASEADDR, 1),
            Err(SyslogError::UnknownProcess)
        );
    }
}
