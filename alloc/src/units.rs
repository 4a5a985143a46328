//! Small newtype wrappers around `usize` so that byte counts, word counts,
//! and block sizes can't be mixed up by accident at a call site.

use std::ops;

#[inline]
pub(crate) fn round_up_to(n: usize, divisor: usize) -> usize {
    debug_assert!(divisor > 0);
    ((n + divisor - 1) / divisor) * divisor
}

macro_rules! define_unit_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
        pub(crate) struct $name(pub(crate) usize);

        impl ops::Add<$name> for $name {
            type Output = $name;

            #[inline]
            fn add(self, rhs: $name) -> $name {
                $name(self.0 + rhs.0)
            }
        }

        impl ops::Sub<$name> for $name {
            type Output = $name;

            #[inline]
            fn sub(self, rhs: $name) -> $name {
                $name(self.0 - rhs.0)
            }
        }
    };
}

define_unit_type!(Bytes);
define_unit_type!(Words);

pub(crate) const WORD: Bytes = Bytes(std::mem::size_of::<usize>());

impl From<Words> for Bytes {
    #[inline]
    fn from(words: Words) -> Bytes {
        Bytes(words.0 * WORD.0)
    }
}

/// Round a byte count up to a whole number of 8-byte double-words, the
/// alignment the allocator guarantees for every payload.
#[inline]
pub(crate) fn align8(n: usize) -> usize {
    round_up_to(n, 8)
}
