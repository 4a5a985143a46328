//! The heap checker: a diagnostic, O(heap size) walk verifying every
//! boundary-tag and free-list invariant the allocator depends on. Never
//! called from `alloc`/`free`/`realloc`/`calloc` themselves — only from
//! tests, and optionally from callers that want to assert the heap is sane
//! at a checkpoint.

use crate::block::{Block, MIN_BLOCK_SIZE};
use crate::error::CheckError;
use crate::free_list::{bucket, SegList, SEGS};

pub(crate) fn check_heap(
    heap_lo: usize,
    heap_hi: usize,
    prologue_addr: usize,
    seg_heads_addr: usize,
) -> Result<(), CheckError> {
    unsafe {
        check_prologue(prologue_addr)?;
        let (epilogue_addr, heap_walk_free_count) = walk_blocks(prologue_addr, heap_lo, heap_hi)?;
        check_epilogue(epilogue_addr)?;

        let seg_lists = SegList::at(seg_heads_addr);
        let mut list_free_count = 0;
        for class in 0..SEGS {
            list_free_count += check_class_list(&seg_lists, class, heap_lo, heap_hi)?;
        }

        if heap_walk_free_count != list_free_count {
            return Err(CheckError::FreeCountMismatch {
                from_heap: heap_walk_free_count,
                from_lists: list_free_count,
            });
        }

        Ok(())
    }
}

unsafe fn check_prologue(prologue_addr: usize) -> Result<(), CheckError> {
    let prologue = Block::at(prologue_addr);
    if prologue.size() != MIN_BLOCK_SIZE || !prologue.is_allocated() {
        return Err(CheckError::BadPrologue { addr: prologue_addr });
    }
    Ok(())
}

unsafe fn check_epilogue(epilogue_addr: usize) -> Result<(), CheckError> {
    let epilogue = Block::at(epilogue_addr);
    if epilogue.size() != 0 || !epilogue.is_allocated() {
        return Err(CheckError::BadEpilogue { addr: epilogue_addr });
    }
    Ok(())
}

/// Walk every tiled block between the prologue and the epilogue, checking
/// per-block invariants and that no two adjacent blocks are both free.
/// Returns the epilogue's address and the number of free blocks seen.
unsafe fn walk_blocks(
    prologue_addr: usize,
    heap_lo: usize,
    heap_hi: usize,
) -> Result<(usize, usize), CheckError> {
    let mut block = Block::at(prologue_addr).next_block();
    let mut free_count = 0;
    let mut prev_was_free = false;

    loop {
        let addr = block.addr;
        let size = block.size();

        if size == 0 {
            // Reached the epilogue.
            return Ok((addr, free_count));
        }

        if addr % 8 != 0 {
            return Err(CheckError::Misaligned { addr });
        }
        if size < MIN_BLOCK_SIZE {
            return Err(CheckError::BlockTooSmall { addr, size });
        }
        if addr < heap_lo || addr + size > heap_hi {
            return Err(CheckError::OutOfBounds {
                addr,
                lo: heap_lo,
                hi: heap_hi,
            });
        }

        let header = crate::block::read_word(block.header_addr());
        let footer = crate::block::read_word(block.footer_addr());
        if header != footer {
            return Err(CheckError::HeaderFooterMismatch {
                addr,
                header,
                footer,
            });
        }

        let is_free = block.is_free();
        if is_free && prev_was_free {
            return Err(CheckError::UncoalescedNeighbors {
                left: block.prev_block().addr,
                right: addr,
            });
        }
        if is_free {
            free_count += 1;
        }
        prev_was_free = is_free;

        block = block.next_block();
    }
}

/// Floyd cycle detection plus per-node checks over one class's free list.
unsafe fn check_class_list(
    lists: &SegList,
    class: usize,
    heap_lo: usize,
    heap_hi: usize,
) -> Result<usize, CheckError> {
    let head = match lists.head(class) {
        None => return Ok(0),
        Some(head) => head,
    };

    let mut tortoise = head;
    let mut hare = head;
    let mut count = 0;
    let mut first = true;

    loop {
        if !first && tortoise == hare {
            return Err(CheckError::FreeListCycle { class });
        }
        first = false;

        let node = Block::at(tortoise);
        check_list_node(node, class, heap_lo, heap_hi)?;
        count += 1;

        tortoise = match node.free_next() {
            Some(next) => next,
            None => return Ok(count),
        };

        for _ in 0..2 {
            let hare_node = Block::at(hare);
            hare = match hare_node.free_next() {
                Some(next) => next,
                None => return Ok(count),
            };
            if hare == tortoise {
                return Err(CheckError::FreeListCycle { class });
            }
        }
    }
}

unsafe fn check_list_node(
    block: Block,
    class: usize,
    heap_lo: usize,
    heap_hi: usize,
) -> Result<(), CheckError> {
    let addr = block.addr;
    if addr < heap_lo || addr >= heap_hi {
        return Err(CheckError::OutOfBounds {
            addr,
            lo: heap_lo,
            hi: heap_hi,
        });
    }
    if block.is_allocated() {
        return Err(CheckError::AllocatedBlockInFreeList { addr });
    }
    let expected = bucket(block.size());
    if expected != class {
        return Err(CheckError::WrongClass {
            addr,
            found_in: class,
            expected,
        });
    }
    if let Some(next) = block.free_next() {
        if Block::at(next).free_prev() != Some(addr) {
            return Err(CheckError::WrongClass {
                addr,
                found_in: class,
                expected,
            });
        }
    }
    Ok(())
}
