//! A user-space demand-paging manager.
//!
//! [`Pager`] is the public handle: it owns a single [`std::sync::Mutex`]
//! guarding all resident/nonresident bookkeeping, the exact serialization
//! model spec §5 calls for (one mutex, no finer-grained locking). Host
//! processes talk to the pager through [`Pager::create`], [`Pager::extend`],
//! [`Pager::fault`], [`Pager::syslog`] and [`Pager::destroy`]; every
//! hardware-visible effect flows out through the [`Mmu`] implementation
//! supplied at [`Pager::init`].

pub mod block;
pub mod clock;
pub mod error;
pub mod frame;
pub mod mmu;
pub mod process;
mod state;

pub use error::{ExtendError, SyslogError};
pub use mmu::{Mmu, Protection};
pub use pager_addr::{BlockIndex, FrameIndex, Pid, VirtAddr, UVM_BASEADDR};
pub use state::PageState;

use state::PagerState;
use std::sync::Mutex;

/// The pager's public handle.
///
/// Cloning is cheap and shares the same underlying state (it's an
/// `Arc`-style handle internally); hand a clone to each thread that needs
/// to drive faults rather than wrapping `Pager` itself in an `Arc`.
pub struct Pager<M: Mmu> {
    inner: std::sync::Arc<Mutex<PagerState<M>>>,
}

impl<M: Mmu> Clone for Pager<M> {
    fn clone(&self) -> Self {
        Self {
            inner: std::sync::Arc::clone(&self.inner),
        }
    }
}

impl<M: Mmu> Pager<M> {
    /// Initializes a pager over `nframes` physical frames and `nblocks`
    /// simulated disk blocks, driving hardware effects through `mmu`.
    pub fn init(mmu: M, nframes: usize, nblocks: usize) -> Self {
        log::info!("pager init: nframes={nframes} nblocks={nblocks}");
        Self {
            inner: std::sync::Arc::new(Mutex::new(PagerState::new(mmu, nframes, nblocks))),
        }
    }

    /// Registers a new process with an empty virtual address region.
    /// Idempotent for an already-known pid.
    pub fn create(&self, pid: Pid) {
        self.lock().create(pid);
    }

    /// Appends one page to `pid`'s region, returning its base address.
    ///
    /// Fails with [`ExtendError::OutOfSpace`] if no disk block remains to
    /// back the new page, or [`ExtendError::OutOfMemory`] if `pid` has
    /// already reached [`process::MAX_PAGES`].
    pub fn extend(&self, pid: Pid) -> Result<VirtAddr, ExtendError> {
        self.lock().extend(pid)
    }

    /// Handles a page fault at `addr` in `pid`'s region.
    ///
    /// A fault on an address outside `pid`'s allocated pages, or for an
    /// unregistered `pid`, is logged and otherwise ignored: the pager
    /// trusts the host not to deliver faults it didn't cause (spec §7).
    pub fn fault(&self, pid: Pid, addr: VirtAddr) {
        self.lock().fault(pid, addr);
    }

    /// Copies `len` bytes starting at `addr` out of `pid`'s region, paging
    /// in whatever isn't resident, and writes them to stdout as a hex
    /// dump. `addr` is a raw value (not a [`VirtAddr`]) because the null
    /// address and out-of-range starts are reported as errors rather than
    /// rejected at construction.
    ///
    /// `len == 0` is a successful no-op: it validates only that `pid` is
    /// registered, and does not check `addr` at all.
    pub fn syslog(&self, pid: Pid, addr: usize, len: usize) -> Result<(), SyslogError> {
        self.lock().syslog(pid, addr, len)
    }

    /// Tears down `pid`, reclaiming its frames and disk blocks.
    ///
    /// Issues no MMU calls: the host is expected to have already unmapped
    /// `pid`'s region before calling this (spec §4.1). A still-resident
    /// page at this point is logged as a likely contract violation, but
    /// reclaimed regardless so the pools stay consistent.
    pub fn destroy(&self, pid: Pid) {
        self.lock().destroy(pid);
    }

    /// The number of faults that landed on an already read+write page.
    /// Exposed for tests and diagnostics; spec §9 leaves the correct
    /// handling of this case as an open question and this crate treats it
    /// as a harmless no-op, so the count should stay at zero in practice.
    #[must_use]
    pub fn spurious_fault_count(&self) -> usize {
        self.lock().spurious_faults
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PagerState<M>> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
