//! `segalloc`: a size-segregated, boundary-tag free-list allocator.
//!
//! The heap is a single contiguous region, grown monotonically through a
//! pluggable [`Extender`], and tiled by fixed-format blocks: a header word
//! and a matching footer word bracket each block's payload, encoding its
//! size and allocated bit (a boundary tag). `SEGS` doubly linked free lists,
//! one per size class, thread through the payloads of free blocks so that
//! freeing and reallocating can coalesce with physical neighbors in O(1).
//!
//! ```text
//! low address                                                high address
//! +------------------+-----------+---------------------+----------+
//! | SEGS class heads | prologue  |  tiled block region | epilogue |
//! +------------------+-----------+---------------------+----------+
//! ```
//!
//! `Extender::heap_lo` is required to already be 8-byte aligned (see its
//! docs), so there's no unaligned prefix to pad out here.
//!
//! The four classic entry points are methods on [`Heap`]: [`Heap::alloc`],
//! [`Heap::free`], [`Heap::realloc`], [`Heap::calloc`]. [`Heap::check`] is a
//! diagnostic heap walk, not part of the allocation hot path.
//!
//! `Heap` is single-threaded by design: nothing here is `Send` or `Sync`.

mod block;
mod checker;
pub mod error;
pub mod extend;
mod free_list;
mod units;

use block::{Block, MIN_BLOCK_SIZE};
use error::{ExtendError, HeapError};
use extend::Extender;
use free_list::SegList;
use std::marker::PhantomData;
use units::{Words, WORD};

/// Roughly 260 bytes, rounded up to the next even word count, as the
/// initial (and minimum incremental) chunk `init`/allocation-miss growth
/// requests from the extender.
const DEFAULT_CHUNK_BYTES: usize = 272;

/// `request = n + 16` (header + footer), rounded up to a multiple of 8,
/// floored at the 32-byte minimum block size.
fn adjust_size(n: usize) -> Option<usize> {
    let request = n.checked_add(2 * WORD.0)?;
    Some(std::cmp::max(MIN_BLOCK_SIZE, units::align8(request)))
}

/// A segregated free-list heap over an [`Extender`]-provided region.
///
/// Constructed once via [`Heap::init`] and then driven through `alloc`,
/// `free`, `realloc`, and `calloc`, exactly like the classic libc quartet,
/// but as methods on an explicit, non-global handle.
pub struct Heap<E: Extender> {
    extender: E,
    base: usize,
    seg_heads_addr: usize,
    prologue_addr: usize,
    // Heap manipulation is not reentrant and the free-list links are plain
    // (non-atomic) reads/writes through raw pointers; make sure `Heap` is
    // never accidentally shared across threads regardless of what `E`
    // happens to implement.
    _not_sync: PhantomData<*const ()>,
}

impl<E: Extender> Heap<E> {
    /// Acquire the initial region from `extender`, install the prologue,
    /// epilogue, and empty class heads, then extend by the default chunk.
    pub fn init(mut extender: E) -> Result<Heap<E>, HeapError> {
        let base = extender.heap_lo();
        debug_assert_eq!(
            base % 8,
            0,
            "Extender::heap_lo must return an 8-byte-aligned address"
        );
        let initial_region = free_list::SEG_HEADS_BYTES + MIN_BLOCK_SIZE + WORD.0;
        extender
            .sbrk(initial_region)
            .map_err(HeapError::InitialExtend)?;

        let seg_heads_addr = base;
        let prologue_addr = base + free_list::SEG_HEADS_BYTES;

        unsafe {
            Block::at(prologue_addr).set_header_footer(MIN_BLOCK_SIZE, true);
            let epilogue_addr = prologue_addr + MIN_BLOCK_SIZE;
            Block::at(epilogue_addr).set_epilogue_header();
        }

        let mut heap = Heap {
            extender,
            base,
            seg_heads_addr,
            prologue_addr,
            _not_sync: PhantomData,
        };

        let words = Words(DEFAULT_CHUNK_BYTES / WORD.0);
        heap.extend_heap(words).map_err(HeapError::InitialExtend)?;
        Ok(heap)
    }

    /// Return a pointer to at least `n` writable, 8-byte-aligned bytes, or
    /// null if the request can't be satisfied. `alloc(0)` returns null.
    pub fn alloc(&mut self, n: usize) -> *mut u8 {
        if n == 0 {
            return std::ptr::null_mut();
        }
        let asize = match adjust_size(n) {
            Some(s) => s,
            None => return std::ptr::null_mut(),
        };

        unsafe {
            let lists = SegList::at(self.seg_heads_addr);
            let block = match lists.find_fit(asize) {
                Some(block) => block,
                None => {
                    let chunk_bytes = std::cmp::max(asize, DEFAULT_CHUNK_BYTES);
                    match self.extend_heap(Words(chunk_bytes / WORD.0)) {
                        Ok(block) => block,
                        Err(_) => return std::ptr::null_mut(),
                    }
                }
            };
            self.place(block, asize)
        }
    }

    /// Release a block previously returned by `alloc`/`realloc`/`calloc`.
    /// No-op on null. Freeing a foreign or already-freed pointer is
    /// undefined behavior (the checker may catch it after the fact).
    pub fn free(&mut self, p: *mut u8) {
        if p.is_null() {
            return;
        }
        unsafe {
            let block = Block::from_payload(p as usize);
            debug_assert!(block.is_allocated(), "double free or foreign pointer");
            let size = block.size();
            #[cfg(debug_assertions)]
            block.poison(0x55);
            block.set_header_footer(size, false);
            self.coalesce(block);
        }
    }

    /// `realloc`'s classic contract: null `p` behaves like `alloc`, zero
    /// `n` behaves like `free` and returns null, otherwise the first
    /// `min(old, n)` bytes are preserved.
    pub fn realloc(&mut self, p: *mut u8, n: usize) -> *mut u8 {
        if p.is_null() {
            return self.alloc(n);
        }
        if n == 0 {
            self.free(p);
            return std::ptr::null_mut();
        }
        let asize = match adjust_size(n) {
            Some(s) => s,
            None => return std::ptr::null_mut(),
        };

        unsafe {
            let block = Block::from_payload(p as usize);
            let oldsize = block.size();

            if asize == oldsize {
                return p;
            }

            if asize < oldsize {
                if oldsize - asize >= MIN_BLOCK_SIZE {
                    block.set_header_footer(asize, true);
                    let remainder = block.next_block();
                    remainder.set_header_footer(oldsize - asize, false);
                    self.coalesce(remainder);
                }
                return p;
            }

            // asize > oldsize: try absorbing a free right neighbor whole.
            // Deliberately doesn't re-split when the combined block
            // overshoots asize; that would just duplicate the split logic
            // `place` already does, for a one-time saving on a cold path.
            let next = block.next_block();
            if next.size() != 0 && next.is_free() {
                let combined = oldsize + next.size();
                if combined >= asize {
                    SegList::at(self.seg_heads_addr).detach(next);
                    block.set_header_footer(combined, true);
                    return p;
                }
            }
        }

        // Fall back to alloc + copy + free. Leave the original block
        // intact if the new allocation fails.
        let newp = self.alloc(n);
        if newp.is_null() {
            return std::ptr::null_mut();
        }
        unsafe {
            let block = Block::from_payload(p as usize);
            let old_payload_len = block.size() - 2 * WORD.0;
            let copy_len = std::cmp::min(old_payload_len, n);
            std::ptr::copy_nonoverlapping(p, newp, copy_len);
        }
        self.free(p);
        newp
    }

    /// `k * n` zero-filled bytes, or null (on overflow of the product, or
    /// on allocation failure — checked before the zero-fill, unlike the
    /// original C implementation this was distilled from).
    pub fn calloc(&mut self, k: usize, n: usize) -> *mut u8 {
        let total = match k.checked_mul(n) {
            Some(total) => total,
            None => return std::ptr::null_mut(),
        };
        let p = self.alloc(total);
        if !p.is_null() {
            unsafe {
                std::ptr::write_bytes(p, 0, total);
            }
        }
        p
    }

    /// Walk the heap and every class list, verifying every structural
    /// invariant. A diagnostic; never called on the allocation hot path.
    pub fn check(&self) -> Result<(), error::CheckError> {
        checker::check_heap(
            self.base,
            self.extender.heap_hi(),
            self.prologue_addr,
            self.seg_heads_addr,
        )
    }

    /// Split a free block chosen by `find_fit` (or returned fresh from
    /// `extend_heap`) to satisfy `asize`, splitting off and re-coalescing
    /// a free remainder when it would be at least the minimum block size.
    unsafe fn place(&mut self, block: Block, asize: usize) -> *mut u8 {
        let lists = SegList::at(self.seg_heads_addr);
        lists.detach(block);

        let csize = block.size();
        if csize - asize >= MIN_BLOCK_SIZE {
            block.set_header_footer(asize, true);
            let remainder = block.next_block();
            remainder.set_header_footer(csize - asize, false);
            self.coalesce(remainder);
        } else {
            block.set_header_footer(csize, true);
        }

        block.payload_addr() as *mut u8
    }

    /// Grow the heap by at least `min_words` words (rounded up to an even
    /// count), repurposing the old epilogue as the new block's header and
    /// writing a fresh epilogue at the new top, then coalescing the new
    /// block with whatever free block preceded it.
    unsafe fn extend_heap(&mut self, min_words: Words) -> Result<Block, ExtendError> {
        let words = if min_words.0 % 2 != 0 {
            Words(min_words.0 + 1)
        } else {
            min_words
        };
        let size = units::Bytes::from(words).0;

        let old_brk = self.extender.sbrk(size)?;
        let new_block = Block::at(old_brk - WORD.0);
        new_block.set_header_footer(size, false);
        new_block.next_block().set_epilogue_header();

        Ok(self.coalesce(new_block))
    }

    /// Merge `block` with any free physical neighbor(s), detaching them
    /// from their class lists first, then push the (possibly merged)
    /// result onto the front of its own class list.
    unsafe fn coalesce(&mut self, block: Block) -> Block {
        let lists = SegList::at(self.seg_heads_addr);

        let prev = block.prev_block();
        let prev_free = prev.is_free().then_some(prev);

        let next = block.next_block();
        let next_free = next.is_free().then_some(next);

        let (merged, size) = match (prev_free, next_free) {
            (None, None) => (block, block.size()),
            (None, Some(next)) => {
                lists.detach(next);
                (block, block.size() + next.size())
            }
            (Some(prev), None) => {
                lists.detach(prev);
                (prev, prev.size() + block.size())
            }
            (Some(prev), Some(next)) => {
                lists.detach(prev);
                lists.detach(next);
                (prev, prev.size() + block.size() + next.size())
            }
        };

        merged.set_header_footer(size, false);
        lists.push_front(merged);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extend::FixedArrayExtender;

    fn small_heap() -> Heap<FixedArrayExtender> {
        Heap::init(FixedArrayExtender::new(64 * 1024)).expect("init should succeed")
    }

    #[test]
    fn first_alloc_is_aligned_and_minimum_sized() {
        let mut heap = small_heap();
        let p = heap.alloc(1);
        assert!(!p.is_null());
        assert_eq!(p as usize % 8, 0);
        let block = unsafe { Block::from_payload(p as usize) };
        assert_eq!(unsafe { block.size() }, MIN_BLOCK_SIZE);
        heap.check().unwrap();
    }

    #[test]
    fn lifo_free_list_reuses_freed_block() {
        let mut heap = small_heap();
        let p = heap.alloc(24);
        let _q = heap.alloc(24);
        heap.free(p);
        let r = heap.alloc(24);
        assert_eq!(p, r);
        heap.check().unwrap();
    }

    #[test]
    fn freeing_both_neighbors_coalesces() {
        let mut heap = small_heap();
        let p = heap.alloc(40);
        let q = heap.alloc(40);
        heap.free(q);
        heap.free(p);
        heap.check().unwrap();
    }

    #[test]
    fn realloc_preserves_content() {
        let mut heap = small_heap();
        let p = heap.alloc(16);
        unsafe {
            std::ptr::write_bytes(p, 0xAB, 16);
        }
        let q = heap.realloc(p, 128);
        assert!(!q.is_null());
        let bytes = unsafe { std::slice::from_raw_parts(q, 16) };
        assert!(bytes.iter().all(|&b| b == 0xAB));
        heap.check().unwrap();
    }

    #[test]
    fn alloc_zero_returns_null() {
        let mut heap = small_heap();
        assert!(heap.alloc(0).is_null());
    }

    #[test]
    fn free_of_null_is_a_no_op() {
        let mut heap = small_heap();
        heap.free(std::ptr::null_mut());
        heap.check().unwrap();
    }

    #[test]
    fn realloc_null_behaves_like_alloc() {
        let mut heap = small_heap();
        let p = heap.realloc(std::ptr::null_mut(), 32);
        assert!(!p.is_null());
    }

    #[test]
    fn realloc_zero_behaves_like_free_and_returns_null() {
        let mut heap = small_heap();
        let p = heap.alloc(32);
        let q = heap.realloc(p, 0);
        assert!(q.is_null());
        heap.check().unwrap();
    }

    #[test]
    fn calloc_zeroes_the_whole_region() {
        let mut heap = small_heap();
        let p = heap.calloc(8, 16);
        assert!(!p.is_null());
        let bytes = unsafe { std::slice::from_raw_parts(p, 128) };
        assert!(bytes.iter().all(|&b| b == 0));
        heap.check().unwrap();
    }

    #[test]
    fn calloc_overflowing_product_returns_null() {
        let mut heap = small_heap();
        assert!(heap.calloc(usize::MAX, 2).is_null());
    }

    #[test]
    fn exhaustion_leaves_heap_valid_and_returns_null() {
        let mut heap = Heap::init(FixedArrayExtender::new(4096)).unwrap();
        let mut allocated = true;
        while allocated {
            allocated = !heap.alloc(256).is_null();
        }
        heap.check().unwrap();
    }

    #[test]
    fn many_small_allocations_stay_sound() {
        let mut heap = small_heap();
        let mut ptrs = Vec::new();
        for i in 0..200 {
            let p = heap.alloc(8 + (i % 37));
            assert!(!p.is_null());
            ptrs.push(p);
        }
        heap.check().unwrap();
        for (i, p) in ptrs.into_iter().enumerate() {
            if i % 2 == 0 {
                heap.free(p);
            }
        }
        heap.check().unwrap();
    }
}
