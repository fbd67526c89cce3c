//! A simulated MMU: the stand-in for the real host process whose memory
//! management unit and disk the pager crate is deliberately decoupled from.
//!
//! This is not a toy: it is the one piece of "hardware" this workspace can
//! actually drive end to end without a real process's page tables, so the
//! demo binary and the pager's own scenario tests both run against it.

use pager::{BlockIndex, FrameIndex, Mmu, Pid, Protection, VirtAddr};
use std::collections::HashMap;

/// One process's simulated mapping: which frame backs a page, and at what
/// protection. Mirrors exactly the information a real MMU's page table
/// entry carries for a resident page.
#[derive(Debug, Clone, Copy)]
struct Mapping {
    frame: FrameIndex,
    protection: Protection,
}

/// A simulated physical memory + disk + per-process page table, implementing
/// [`pager::Mmu`] over plain `Vec<u8>` buffers.
///
/// `pmem` is `nframes * page_size` bytes, addressed by `frame.0 *
/// page_size`. `disk` is `nblocks * page_size` bytes, addressed the same
/// way by block index. Both are zero-initialized at construction, matching
/// the "freshly formatted disk" assumption spec §4.3 makes.
pub struct SimMmu {
    page_size: usize,
    pmem: Vec<u8>,
    disk: Vec<u8>,
    mappings: HashMap<(Pid, VirtAddr), Mapping>,
}

impl SimMmu {
    #[must_use]
    pub fn new(page_size: usize, nframes: usize, nblocks: usize) -> Self {
        Self {
            page_size,
            pmem: vec![0; nframes * page_size],
            disk: vec![0; nblocks * page_size],
            mappings: HashMap::new(),
        }
    }

    /// Writes `data` into the physical frame currently backing `(pid,
    /// vaddr)`, as if the client process had executed a store. Panics if
    /// the page isn't mapped, isn't mapped read+write, or `data` doesn't
    /// fit inside one page — all three are caller bugs in a simulated
    /// client, not something this crate needs to recover from. The
    /// protection check is what actually enforces the write-detection
    /// §4.4 relies on: a real MMU would fault instead of writing through a
    /// read-only or aged mapping, so a simulated client must go through
    /// `Pager::fault` first to upgrade the mapping before writing.
    pub fn write(&mut self, pid: Pid, vaddr: VirtAddr, data: &[u8]) {
        let mapping = *self
            .mappings
            .get(&(pid, vaddr))
            .expect("write to unmapped virtual address");
        assert_eq!(
            mapping.protection,
            Protection::ReadWrite,
            "write to {vaddr} in {pid} without read+write protection (call Pager::fault first)"
        );
        assert!(
            data.len() <= self.page_size,
            "write spans more than one page"
        );
        let start = mapping.frame.0 * self.page_size;
        self.pmem[start..start + data.len()].copy_from_slice(data);
    }

    /// Reads one byte of the frame currently backing `(pid, vaddr)`, for
    /// tests and the demo binary to assert on. Panics if unmapped.
    #[must_use]
    pub fn read_byte(&self, pid: Pid, vaddr: VirtAddr, offset: usize) -> u8 {
        let mapping = self.mappings[&(pid, vaddr)];
        self.pmem[mapping.frame.0 * self.page_size + offset]
    }

    /// The current protection of `(pid, vaddr)`, or `None` if unmapped.
    #[must_use]
    pub fn protection_of(&self, pid: Pid, vaddr: VirtAddr) -> Option<Protection> {
        self.mappings.get(&(pid, vaddr)).map(|m| m.protection)
    }
}

impl Mmu for SimMmu {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn zero_fill(&mut self, frame: FrameIndex) {
        let start = frame.0 * self.page_size;
        self.pmem[start..start + self.page_size].fill(0);
        log::trace!("{frame}: zero-filled");
    }

    fn disk_read(&mut self, block: BlockIndex, frame: FrameIndex) {
        let disk_start = block.0 * self.page_size;
        let mem_start = frame.0 * self.page_size;
        self.pmem
            .copy_within(disk_start..disk_start + self.page_size, mem_start);
        log::trace!("{block} -> {frame}");
    }

    fn disk_write(&mut self, frame: FrameIndex, block: BlockIndex) {
        let mem_start = frame.0 * self.page_size;
        let disk_start = block.0 * self.page_size;
        self.disk[disk_start..disk_start + self.page_size]
            .copy_from_slice(&self.pmem[mem_start..mem_start + self.page_size]);
        log::trace!("{frame} -> {block}");
    }

    fn resident(&mut self, pid: Pid, vaddr: VirtAddr, frame: FrameIndex, prot: Protection) {
        self.mappings.insert(pid_key(pid, vaddr), Mapping { frame, protection: prot });
        log::trace!("{pid} {vaddr} -> {frame} ({prot:?})");
    }

    fn nonresident(&mut self, pid: Pid, vaddr: VirtAddr) {
        self.mappings.remove(&pid_key(pid, vaddr));
        log::trace!("{pid} {vaddr} unmapped");
    }

    fn chprot(&mut self, pid: Pid, vaddr: VirtAddr, prot: Protection) {
        if let Some(mapping) = self.mappings.get_mut(&pid_key(pid, vaddr)) {
            mapping.protection = prot;
        }
        log::trace!("{pid} {vaddr} -> {prot:?}");
    }

    fn pmem(&self) -> &[u8] {
        &self.pmem
    }
}

fn pid_key(pid: Pid, vaddr: VirtAddr) -> (Pid, VirtAddr) {
    (pid, vaddr)
}
