//! Typed addresses for the pager.
//!
//! The pager never hands a bare `usize` across a module boundary. A
//! [`VirtAddr`] is a raw address as seen by the client process (it carries
//! [`UVM_BASEADDR`]); a [`FrameIndex`] identifies a slot in the physical
//! frame table; a [`BlockIndex`] identifies a slot in the simulated disk.
//! Keeping these as distinct types makes "frame 3" and "block 3" impossible
//! to confuse at the type level, the way `helium-addr` keeps physical and
//! virtual addresses apart.

use std::fmt;

/// The fixed virtual base address of every pager-managed region.
///
/// Virtual page `k` of a process occupies
/// `[UVM_BASEADDR + k*PAGE_SIZE, UVM_BASEADDR + (k+1)*PAGE_SIZE)`.
pub const UVM_BASEADDR: usize = 0x4000_0000;

/// A raw virtual address inside a pager-managed region.
///
/// This is the address value a client process actually dereferences; it is
/// always `>= UVM_BASEADDR`. Use [`VirtAddr::try_new`] at the boundary
/// (syscall arguments) and [`VirtAddr::as_usize`] when handing the value
/// back out, rather than threading a bare `usize` through the pager core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct VirtAddr(usize);

impl VirtAddr {
    /// Creates a virtual address from a raw value.
    ///
    /// Returns `None` if `addr` is below [`UVM_BASEADDR`]; the pager treats
    /// such addresses as never belonging to any managed region.
    #[must_use]
    pub const fn try_new(addr: usize) -> Option<Self> {
        if addr < UVM_BASEADDR {
            None
        } else {
            Some(Self(addr))
        }
    }

    /// Returns the raw address value.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Returns the page index this address falls in, given `page_size`.
    #[must_use]
    pub fn page_index(self, page_size: usize) -> usize {
        (self.0 - UVM_BASEADDR) / page_size
    }

    /// Returns the offset of this address within its containing page.
    #[must_use]
    pub fn page_offset(self, page_size: usize) -> usize {
        (self.0 - UVM_BASEADDR) % page_size
    }

    /// Returns the virtual address of the first byte of page `index`.
    #[must_use]
    pub fn of_page(index: usize, page_size: usize) -> Self {
        Self(UVM_BASEADDR + index * page_size)
    }

    /// Returns `true` if adding `len` to this address does not overflow the
    /// host's address space.
    #[must_use]
    pub fn checked_add(self, len: usize) -> Option<Self> {
        self.0.checked_add(len).map(Self)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Identifies one slot of the physical frame table.
///
/// A simple wrapper around a `usize` that guarantees nothing about whether
/// the frame actually exists (bounds are checked by whoever constructs one
/// from an `NFRAMES`-sized table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FrameIndex(pub usize);

impl FrameIndex {
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

impl From<usize> for FrameIndex {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

/// Identifies one slot of the simulated disk's block table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct BlockIndex(pub usize);

impl BlockIndex {
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block#{}", self.0)
    }
}

impl From<usize> for BlockIndex {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

/// Identifies a process by its host-assigned identifier.
///
/// Kept distinct from a bare `usize`/`pid_t` so process ids can't be
/// accidentally passed where a page or frame index is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

impl From<u32> for Pid {
    fn from(pid: u32) -> Self {
        Self(pid)
    }
}
