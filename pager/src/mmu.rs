//! The MMU contract the pager consumes.
//!
//! The pager never touches hardware or a real page table directly: it is
//! handed an implementation of [`Mmu`] at [`crate::Pager::init`] and issues
//! every hardware-visible effect through it. This keeps the pager's
//! fault/clock/syslog logic testable against a simulator and swappable for
//! a real host, the way `kernel/src/mm/frame/allocator` keeps the frame
//! table's consumers generic over an [`Allocator`]-style trait rather than
//! a concrete allocator.

use pager_addr::{FrameIndex, Pid, VirtAddr};

/// The protection the MMU currently enforces for a mapping.
///
/// Only three protections are ever needed by the pager: no access at all
/// (used by clock aging), read-only (the state every freshly loaded page
/// starts in, so the first write re-faults and sets dirty), and
/// read+write (a page known to be dirty).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protection {
    None,
    Read,
    ReadWrite,
}

impl Protection {
    /// Returns the protection a resident page should carry given its dirty
    /// bit: dirty pages are mapped read+write, clean pages read-only.
    #[must_use]
    pub const fn for_dirty(dirty: bool) -> Self {
        if dirty {
            Self::ReadWrite
        } else {
            Self::Read
        }
    }
}

/// Operations the pager issues against the simulated (or real) MMU.
///
/// Every method here corresponds 1:1 to a row of spec §6's MMU contract
/// table. Implementations are expected to be synchronous and non-reentrant
/// with respect to the pager: none of these calls re-enter the pager.
pub trait Mmu {
    /// The size in bytes of one page/frame, as reported by the host.
    fn page_size(&self) -> usize;

    /// Fills the page_size() bytes of physical `frame` with zero.
    fn zero_fill(&mut self, frame: FrameIndex);

    /// Copies disk `block` into physical `frame`.
    fn disk_read(&mut self, block: pager_addr::BlockIndex, frame: FrameIndex);

    /// Copies physical `frame` into disk `block`.
    fn disk_write(&mut self, frame: FrameIndex, block: pager_addr::BlockIndex);

    /// Installs a mapping for `vaddr` in `pid` at protection `prot`,
    /// pointing at physical `frame`.
    fn resident(&mut self, pid: Pid, vaddr: VirtAddr, frame: FrameIndex, prot: Protection);

    /// Removes the mapping for `vaddr` in `pid`.
    fn nonresident(&mut self, pid: Pid, vaddr: VirtAddr);

    /// Changes the protection of an existing mapping for `vaddr` in `pid`.
    fn chprot(&mut self, pid: Pid, vaddr: VirtAddr, prot: Protection);

    /// A byte-addressable view of physical memory, `NFRAMES * page_size()`
    /// bytes long. Used by syslog's read-through copy; never written to
    /// directly by the pager (loads/stores go through `zero_fill`,
    /// `disk_read` and `disk_write`).
    fn pmem(&self) -> &[u8];
}
