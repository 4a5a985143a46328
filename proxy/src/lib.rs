//! `captive-proxy`: a concurrent HTTP/1.0 forward proxy with a bounded,
//! least-recently-added response cache.
//!
//! Two pieces share no state beyond the cache handle itself:
//!
//! - [`cache`]: the bounded, byte-budgeted, reference-counted response
//!   cache, guarded by a single `RwLock` one level up (see `Shared`).
//! - [`worker`]: the per-connection pipeline — parse, cache lookup,
//!   upstream fetch, stream back, optional cache insert — run by threads
//!   drawn from [`pool`].
//!
//! [`request`], [`headers`], and [`response`] are the small supporting
//! pieces: absolute-URI parsing, header forwarding, and the error-page
//! envelope, respectively.

pub mod cache;
pub mod error;
pub mod headers;
pub mod pool;
pub mod request;
pub mod response;
pub mod worker;
