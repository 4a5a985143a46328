//! The bounded, byte-budgeted response cache.
//!
//! Keyed by the exact request-line bytes, including the trailing
//! `HTTP/1.0\r\n`. Objects are held in most-recently-inserted-first order;
//! eviction always drops from the other end. A hit never reorders the list,
//! so this is an approximation of LRU by insertion time, not access time.
//!
//! Entries are reference-counted (`Arc<CachedResponse>`) rather than threaded
//! through an intrusive doubly linked list of raw pointers. `find` hands back
//! a clone of the `Arc`; a writer's eviction only drops the cache's own
//! strong reference, so a reader that already cloned its handle keeps the
//! bytes alive regardless of what happens to the list afterward. That lets
//! the read lock be released before the (possibly slow) network write that
//! follows a cache hit.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

/// Objects above this size are never admitted to the cache.
pub const MAX_OBJECT_SIZE: usize = 102_400;

/// Total bytes the cache will hold across all resident objects.
pub const MAX_CACHE_SIZE: usize = 1_049_000;

/// A single cached response: the exact bytes of the request line that
/// produced it, and the response bytes forwarded to the client.
#[derive(Debug, PartialEq, Eq)]
pub struct CachedResponse {
    pub key: Vec<u8>,
    pub body: Vec<u8>,
}

impl CachedResponse {
    fn size(&self) -> usize {
        self.body.len()
    }
}

/// A bounded cache of `CachedResponse`s, ordered most-recently-inserted
/// first. Carries no lock of its own; callers share one `Arc<RwLock<Cache>>`
/// (see `Shared` below) so that every worker sees the same cache instead of
/// each holding its own copy.
pub struct Cache {
    max_bytes: usize,
    bytes_left: usize,
    // front = most recently admitted, back = least recently admitted.
    entries: VecDeque<Arc<CachedResponse>>,
}

/// The shared handle every worker holds: one lock around one cache.
pub type Shared = Arc<RwLock<Cache>>;

impl Cache {
    pub fn new(max_bytes: usize) -> Cache {
        Cache {
            max_bytes,
            bytes_left: max_bytes,
            entries: VecDeque::new(),
        }
    }

    /// Wrap a fresh cache in the `Arc<RwLock<_>>` handle passed to workers.
    pub fn shared(max_bytes: usize) -> Shared {
        Arc::new(RwLock::new(Cache::new(max_bytes)))
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn bytes_left(&self) -> usize {
        self.bytes_left
    }

    /// Linear scan from the MRA end. Returns an owned clone of the handle
    /// so the caller can release the lock before touching its bytes.
    pub fn find(&self, key: &[u8]) -> Option<Arc<CachedResponse>> {
        self.entries
            .iter()
            .find(|entry| entry.key.as_slice() == key)
            .cloned()
    }

    /// Evict from the LRA end until there's room, then prepend a new entry
    /// at the MRA end. The caller is responsible for having already
    /// rejected anything bigger than `MAX_OBJECT_SIZE` (see `worker.rs`);
    /// this is debug-asserted, not checked, because it's a precondition
    /// violation rather than a runtime condition the cache can recover from.
    pub fn insert(&mut self, key: Vec<u8>, body: Vec<u8>) {
        let size = body.len();
        debug_assert!(
            size <= self.max_bytes,
            "object of {size} bytes can never fit in a {}-byte cache",
            self.max_bytes
        );

        while self.bytes_left < size {
            let Some(evicted) = self.entries.pop_back() else {
                break;
            };
            self.bytes_left += evicted.size();
        }

        self.bytes_left -= size;
        self.entries.push_front(Arc::new(CachedResponse { key, body }));
    }

    /// Unlink the entry keyed by `key`, if present, returning its bytes to
    /// the budget. Used by tests; the worker pipeline only ever inserts and
    /// finds.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        if let Some(pos) = self.entries.iter().position(|e| e.key.as_slice() == key) {
            let removed = self.entries.remove(pos).expect("position just found");
            self.bytes_left += removed.size();
            true
        } else {
            false
        }
    }

    /// Sum of the resident entries' own sizes, computed by walking the list
    /// rather than derived from `bytes_left` — used by tests asserting the
    /// `sum(size) + bytes_left == max_size` invariant against the actual
    /// list contents, not just its own bookkeeping.
    pub fn resident_bytes(&self) -> usize {
        self.entries.iter().map(|e| e.size()).sum()
    }
}
