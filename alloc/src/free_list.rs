//! Segregated size classes over the intrusive, doubly linked free lists
//! threaded through block payloads.
//!
//! The class heads themselves live inside the managed heap region (see the
//! layout diagram in `lib.rs`), not as a side table on the Rust side, so
//! that the whole heap — including its own bookkeeping — is the one thing
//! the `Extender` needs to provide. `SegList` is just a typed view over
//! that region.

use crate::block::{read_word, write_word, Block};
use crate::units::WORD;

/// Number of size classes.
pub(crate) const SEGS: usize = 5;

/// Growth ratio between adjacent classes.
const RATIO: usize = 6;

/// Smallest size a class 0 block can be (the global minimum block size).
const BASE_SIZE: usize = crate::block::MIN_BLOCK_SIZE;

/// Bytes reserved at the front of the heap for the `SEGS` class-head words.
pub(crate) const SEG_HEADS_BYTES: usize = SEGS * WORD.0;

/// `bucket(size) = min(SEGS - 1, floor(log_RATIO(size / BASE_SIZE)))`,
/// computed without floating point: walk the class boundaries
/// `BASE_SIZE * RATIO^k` until `size` no longer clears the next one.
pub(crate) fn bucket(size: usize) -> usize {
    let mut threshold = BASE_SIZE;
    for class in 0..SEGS - 1 {
        if size < threshold * RATIO {
            return class;
        }
        threshold *= RATIO;
    }
    SEGS - 1
}

/// A view over the `SEGS` class-head words living at `heads_addr`.
pub(crate) struct SegList {
    heads_addr: usize,
}

impl SegList {
    pub(crate) fn at(heads_addr: usize) -> SegList {
        SegList { heads_addr }
    }

    fn slot(&self, class: usize) -> usize {
        debug_assert!(class < SEGS);
        self.heads_addr + class * WORD.0
    }

    pub(crate) unsafe fn head(&self, class: usize) -> Option<usize> {
        let addr = read_word(self.slot(class));
        if addr == 0 {
            None
        } else {
            Some(addr)
        }
    }

    unsafe fn set_head(&self, class: usize, addr: Option<usize>) {
        write_word(self.slot(class), addr.unwrap_or(0));
    }

    /// Push `block` onto the front of its size class's list (LIFO).
    pub(crate) unsafe fn push_front(&self, block: Block) {
        let class = bucket(block.size());
        let old_head = self.head(class);
        block.set_free_prev(None);
        block.set_free_next(old_head);
        if let Some(old_head) = old_head {
            Block::at(old_head).set_free_prev(Some(block.addr));
        }
        self.set_head(class, Some(block.addr));
    }

    /// Remove `block` from whichever class list it's currently threaded
    /// into. `block` must currently be free and in `bucket(block.size())`.
    pub(crate) unsafe fn detach(&self, block: Block) {
        let class = bucket(block.size());
        let prev = block.free_prev();
        let next = block.free_next();

        match prev {
            Some(prev) => Block::at(prev).set_free_next(next),
            None => self.set_head(class, next),
        }
        if let Some(next) = next {
            Block::at(next).set_free_prev(prev);
        }
    }

    /// First-best-of-ten search starting at `bucket(asize)`, scanning
    /// upward through larger classes until one yields a fit.
    ///
    /// Within a class, examine at most the first ten blocks with
    /// `size >= asize`; return immediately on an exact match, otherwise
    /// remember the smallest candidate seen. If the class produced at
    /// least one candidate, return the best of those (without looking at
    /// higher classes); otherwise move up a class.
    pub(crate) unsafe fn find_fit(&self, asize: usize) -> Option<Block> {
        const EXAMINE_LIMIT: usize = 10;

        for class in bucket(asize)..SEGS {
            let mut best: Option<Block> = None;
            let mut examined = 0;
            let mut cursor = self.head(class);

            while let Some(addr) = cursor {
                let candidate = Block::at(addr);
                let size = candidate.size();
                if size >= asize {
                    if size == asize {
                        return Some(candidate);
                    }
                    examined += 1;
                    best = match best {
                        Some(b) if b.size() <= size => Some(b),
                        _ => Some(candidate),
                    };
                    if examined >= EXAMINE_LIMIT {
                        break;
                    }
                }
                cursor = candidate.free_next();
            }

            if best.is_some() {
                return best;
            }
        }

        None
    }
}
