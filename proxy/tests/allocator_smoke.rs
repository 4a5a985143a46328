//! A smoke test tying the two halves of this repo together: exercise
//! `segalloc` from the proxy side, the way a caller outside `alloc/` would.
//! Not wired up as this process's `#[global_allocator]` — `Heap<E>` is
//! deliberately not `Send`/`Sync`, and the proxy is multi-threaded, so that
//! would be unsound. This is purely a dependency smoke test: build a heap,
//! push it through a representative workload, and run the diagnostic
//! checker, gated behind `RUST_LOG=trace` the way any other expensive
//! diagnostic in this crate would be.

use segalloc::extend::MmapExtender;
use segalloc::Heap;

#[test]
fn segalloc_survives_a_cache_sized_workload() {
    let mut heap = Heap::init(MmapExtender::reserve(4 << 20).expect("mmap reservation"))
        .expect("heap init");

    // Sizes in the same ballpark as cached response bodies, to make this a
    // plausible stand-in for "the proxy allocates scratch buffers this way"
    // rather than a pattern with no relation to the rest of the crate.
    let sizes = [64usize, 512, 4096, 32_768, 1024];
    let mut live = Vec::new();

    for _ in 0..20 {
        for &size in &sizes {
            let p = heap.alloc(size);
            assert!(!p.is_null(), "alloc({size}) unexpectedly failed");
            unsafe {
                std::ptr::write_bytes(p, 0xCC, size);
            }
            live.push(p);
        }
    }

    for (i, p) in live.into_iter().enumerate() {
        if i % 3 != 0 {
            heap.free(p);
        }
    }

    if log::log_enabled!(log::Level::Trace) {
        log::trace!("running segalloc's diagnostic heap checker");
    }
    heap.check().expect("heap invariants must hold after the workload");
}
