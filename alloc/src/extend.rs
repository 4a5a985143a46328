//! The abstraction over the sbrk-style backing store.
//!
//! The core allocator never calls `mmap`/`VirtualAlloc` directly; it only
//! knows how to grow a contiguous region by asking an [`Extender`] for more
//! words. There is one real backend ([`MmapExtender`]) and one test backend
//! ([`FixedArrayExtender`]) since both of the allocator's actual deployment
//! surfaces (the proxy's own process, and the test suite) are plain 64-bit
//! Unix processes; a port to another target would add a backend here
//! without touching anything above this module.

use crate::error::ExtendError;
use std::ptr;

/// A monotonic, grow-only backing store for the heap.
///
/// # Safety
///
/// Implementations must return addresses from a single contiguous region
/// that never moves once reserved, and `sbrk` must never return an address
/// lower than a previous call's `heap_hi()`. `heap_lo()` must additionally
/// return an address that is already 8-byte aligned: every block boundary
/// the allocator ever computes is `heap_lo()` plus a sum of 8-byte-multiple
/// offsets, so an unaligned `heap_lo()` would put every payload address in
/// the heap permanently out of alignment — and `sbrk`'s own "always a whole
/// number of words" contract means there's no way to round it up after the
/// fact by consuming a sub-word remainder.
pub unsafe trait Extender {
    /// Grow the backing region by `increment_bytes`, returning the address
    /// of the start of the newly added region. `increment_bytes` is always
    /// a positive multiple of the machine word size.
    fn sbrk(&mut self, increment_bytes: usize) -> Result<usize, ExtendError>;

    /// The current high address of the region (one past the last byte ever
    /// handed out by `sbrk`).
    fn heap_hi(&self) -> usize;

    /// The low address of the region. Fixed at construction time, and
    /// always 8-byte aligned (see the `# Safety` note above).
    fn heap_lo(&self) -> usize;
}

/// Reserves a fixed-size arena with `mmap` up front (`PROT_READ | PROT_WRITE`,
/// anonymous, private) and then treats `sbrk` as a bump allocator within
/// that reservation. `mmap` always returns page-aligned addresses, so the
/// 8-byte alignment `Extender::heap_lo` requires comes for free here.
///
/// This plays the role of the classic `sbrk(2)`: from the allocator core's
/// point of view, the region simply grows; it does not matter that the pages
/// were actually reserved by one big `mmap` rather than incremental calls.
pub struct MmapExtender {
    base: usize,
    capacity: usize,
    cur: usize,
}

impl MmapExtender {
    /// Reserve `capacity` bytes of address space. No physical pages are
    /// committed beyond what the OS's overcommit policy decides; the
    /// allocator will only ever touch the prefix it has `sbrk`'d into.
    pub fn reserve(capacity: usize) -> Result<Self, ExtendError> {
        unsafe {
            let addr = libc::mmap(
                ptr::null_mut(),
                capacity,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_ANON | libc::MAP_PRIVATE,
                -1,
                0,
            );
            if addr == libc::MAP_FAILED {
                return Err(ExtendError::Os(std::io::Error::last_os_error()));
            }
            let base = addr as usize;
            Ok(MmapExtender {
                base,
                capacity,
                cur: base,
            })
        }
    }
}

unsafe impl Extender for MmapExtender {
    fn sbrk(&mut self, increment_bytes: usize) -> Result<usize, ExtendError> {
        let available = self.base + self.capacity - self.cur;
        if increment_bytes > available {
            return Err(ExtendError::Exhausted {
                requested: increment_bytes,
                available,
            });
        }
        let old_cur = self.cur;
        self.cur += increment_bytes;
        Ok(old_cur)
    }

    fn heap_hi(&self) -> usize {
        self.cur
    }

    fn heap_lo(&self) -> usize {
        self.base
    }
}

impl Drop for MmapExtender {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.capacity);
        }
    }
}

/// A heap-allocated, fixed-capacity extender used by tests to exercise
/// out-of-memory paths without reserving gigabytes of address space.
pub struct FixedArrayExtender {
    storage: Box<[u8]>,
    base: usize,
    cur: usize,
}

impl FixedArrayExtender {
    pub fn new(capacity: usize) -> Self {
        // `Vec<u8>`'s own allocation is only guaranteed 1-byte aligned;
        // over-allocate by a word and round the usable base up to the
        // 8-byte boundary `Extender::heap_lo` requires.
        let storage = vec![0u8; capacity + crate::units::WORD.0].into_boxed_slice();
        let raw = storage.as_ptr() as usize;
        let base = crate::units::align8(raw);
        debug_assert_eq!(base % 8, 0);
        FixedArrayExtender {
            storage,
            base,
            cur: base,
        }
    }
}

unsafe impl Extender for FixedArrayExtender {
    fn sbrk(&mut self, increment_bytes: usize) -> Result<usize, ExtendError> {
        let cap_end = self.storage.as_ptr() as usize + self.storage.len();
        let available = cap_end - self.cur;
        if increment_bytes > available {
            return Err(ExtendError::Exhausted {
                requested: increment_bytes,
                available,
            });
        }
        let old_cur = self.cur;
        self.cur += increment_bytes;
        Ok(old_cur)
    }

    fn heap_hi(&self) -> usize {
        self.cur
    }

    fn heap_lo(&self) -> usize {
        self.base
    }
}
