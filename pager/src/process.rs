//! Per-process page tables and the process registry.

use pager_addr::{BlockIndex, FrameIndex, Pid};
use std::collections::HashMap;

/// Maximum number of pages a single process may allocate.
///
/// The two reference pager implementations this crate is built from
/// disagree on whether the per-process page table is fixed or grown
/// geometrically; spec §9 calls fixed-capacity the simpler and preferred
/// choice, since the virtual region and `NBLOCKS` are themselves fixed.
pub const MAX_PAGES: usize = 256;

/// Maximum number of processes the registry can track at once.
pub const MAX_PROCESSES: usize = 256;

/// Per-page state, aggregating everything the fault machine and clock
/// engine need to know about one virtual page.
///
/// See spec §3 for the invariants that must hold on this struct between
/// public calls (e.g. `dirty ⇒ resident`, `in_disk=false` ⇒ never evicted).
#[derive(Debug, Clone, Copy)]
pub struct Page {
    /// `true` once `extend` has reserved this slot.
    pub allocated: bool,
    /// `true` iff this page currently occupies a frame.
    pub resident: bool,
    /// The frame this page occupies, if resident.
    pub frame: Option<FrameIndex>,
    /// The disk block reserved for this page at `extend` time. Stable for
    /// the lifetime of the page (spec §3 invariant 3).
    pub block: BlockIndex,
    /// `true` iff a valid copy of this page exists on `block` — i.e. at
    /// least one eviction has written it out. While `false`, a fault must
    /// zero-fill rather than read from disk (spec §3 invariant 5).
    pub in_disk: bool,
    /// `true` iff the in-RAM copy has been written since the last sync to
    /// disk. The only place a dirty bit lives is in RAM (spec §3 invariant
    /// 2): eviction clears it the moment it syncs or skips the write.
    pub dirty: bool,
}

impl Page {
    fn new(block: BlockIndex) -> Self {
        Self {
            allocated: true,
            resident: false,
            frame: None,
            block,
            in_disk: false,
            dirty: false,
        }
    }
}

/// One registered process: its identifier and its page table.
pub struct Process {
    pub pid: Pid,
    pages: Vec<Page>,
}

impl Process {
    fn new(pid: Pid) -> Self {
        Self {
            pid,
            pages: Vec::new(),
        }
    }

    /// Number of pages currently allocated for this process.
    #[must_use]
    pub fn npages(&self) -> usize {
        self.pages.len()
    }

    /// Appends a new page reserving `block`, if the per-process cap is not
    /// already reached.
    fn push(&mut self, block: BlockIndex) -> Option<usize> {
        if self.pages.len() >= MAX_PAGES {
            return None;
        }
        self.pages.push(Page::new(block));
        Some(self.pages.len() - 1)
    }

    /// Looks up a page by index.
    #[must_use]
    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    /// Looks up a page by index, mutably.
    #[must_use]
    pub fn page_mut(&mut self, index: usize) -> Option<&mut Page> {
        self.pages.get_mut(index)
    }

    /// Iterates over all allocated pages with their index.
    pub fn pages(&self) -> impl Iterator<Item = (usize, &Page)> {
        self.pages.iter().enumerate()
    }
}

/// The bounded table of registered processes.
///
/// A linear `HashMap` keyed by pid is enough here: registration and
/// teardown are rare (only on process appear/disappear), so there is no
/// need for the kind of packed array the frame/block pools use for their
/// much hotter allocate/free paths.
#[derive(Default)]
pub struct ProcessTable {
    processes: HashMap<Pid, Process>,
}

impl ProcessTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `pid` with zero pages. Idempotent: a repeat `create` for
    /// an already-known pid is a no-op. Silently does nothing if the
    /// registry is already at [`MAX_PROCESSES`].
    pub fn create(&mut self, pid: Pid) {
        if self.processes.contains_key(&pid) {
            return;
        }
        if self.processes.len() >= MAX_PROCESSES {
            log::warn!("process registry full, ignoring create({pid})");
            return;
        }
        self.processes.insert(pid, Process::new(pid));
    }

    #[must_use]
    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.processes.get(&pid)
    }

    #[must_use]
    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        self.processes.get_mut(&pid)
    }

    /// Appends a new page for `pid`, reserving `block`. Returns the new
    /// page's index, or `None` if `pid` is unknown or the process is at
    /// its page cap.
    pub fn extend(&mut self, pid: Pid, block: BlockIndex) -> Option<usize> {
        self.processes.get_mut(&pid)?.push(block)
    }

    /// Removes `pid` from the registry, returning its pages for the caller
    /// to reclaim frames/blocks from.
    pub fn remove(&mut self, pid: Pid) -> Option<Process> {
        self.processes.remove(&pid)
    }
}
