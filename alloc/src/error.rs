use thiserror::Error;

/// Failure modes for growing the heap via an [`Extender`](crate::extend::Extender).
#[derive(Debug, Error)]
pub enum ExtendError {
    /// The extender's backing store (an `mmap` reservation, a fixed array,
    /// ...) has no more room to grow into.
    #[error("heap extender exhausted: requested {requested} more bytes, {available} available")]
    Exhausted { requested: usize, available: usize },

    /// The underlying OS call used to reserve or grow memory failed.
    #[error("extender backing store call failed: {0}")]
    Os(#[from] std::io::Error),
}

/// Failure modes for [`Heap::init`](crate::Heap::init).
#[derive(Debug, Error)]
pub enum HeapError {
    /// The extender could not supply the initial chunk of memory.
    #[error("failed to extend heap during initialization: {0}")]
    InitialExtend(#[source] ExtendError),
}

/// A violation of one of the heap's structural invariants, as found by
/// [`Heap::check`](crate::Heap::check). Not produced on any allocation hot
/// path; this is a diagnostic, used by tests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckError {
    #[error("prologue block at {addr:#x} is missing or not fully allocated")]
    BadPrologue { addr: usize },

    #[error("epilogue header at {addr:#x} is not size 0 and allocated")]
    BadEpilogue { addr: usize },

    #[error("block at {addr:#x} has header {header:#x} != footer {footer:#x}")]
    HeaderFooterMismatch {
        addr: usize,
        header: usize,
        footer: usize,
    },

    #[error("block at {addr:#x} has size {size}, smaller than the 32-byte minimum")]
    BlockTooSmall { addr: usize, size: usize },

    #[error("block at {addr:#x} is not 8-byte aligned")]
    Misaligned { addr: usize },

    #[error("block at {addr:#x} lies outside the heap bounds [{lo:#x}, {hi:#x})")]
    OutOfBounds { addr: usize, lo: usize, hi: usize },

    #[error("adjacent free blocks at {left:#x} and {right:#x} were not coalesced")]
    UncoalescedNeighbors { left: usize, right: usize },

    #[error("class list {class} contains a cycle")]
    FreeListCycle { class: usize },

    #[error("block at {addr:#x} is in class list {found_in} but bucket(size) says {expected}")]
    WrongClass {
        addr: usize,
        found_in: usize,
        expected: usize,
    },

    #[error("block at {addr:#x} appears in a class list but its allocated bit is set")]
    AllocatedBlockInFreeList { addr: usize },

    #[error(
        "free block count from heap walk ({from_heap}) disagrees with the sum over class lists ({from_lists})"
    )]
    FreeCountMismatch { from_heap: usize, from_lists: usize },
}
