//! Error types for the pager's public boundary.
//!
//! One enum per fallible operation, the way `kernel/src/syscall/mmu.rs`
//! gives each syscall its own `MmapError`/`UnmapError` rather than a single
//! catch-all. Since this is a `std` library rather than a raw syscall ABI
//! there is no `isize`/`errno` encoding step: callers match on the enum.

use thiserror::Error;

/// Failure modes for [`crate::Pager::extend`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ExtendError {
    /// No free disk block is available to reserve for the new page.
    #[error("out of space: no free disk block to reserve")]
    OutOfSpace,

    /// The process has reached its per-process page table capacity.
    #[error("out of memory: process page table is full")]
    OutOfMemory,

    /// `pid` has not been registered with [`crate::Pager::create`]. Not one
    /// of spec.md's two named failure modes, but `extend` has to return
    /// something type-safe if a caller violates that contract, so this
    /// mirrors the "unknown process" handling `syslog` already does.
    #[error("invalid argument: unknown process")]
    UnknownProcess,
}

/// Failure modes for [`crate::Pager::syslog`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SyslogError {
    /// The process id is not registered with the pager.
    #[error("invalid argument: unknown process")]
    UnknownProcess,

    /// The requested range starts below the process's region, or extends
    /// past `BASE + npages*P`.
    #[error("invalid argument: range outside allocated region")]
    InvalidRange,
}
