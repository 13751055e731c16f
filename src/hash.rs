//! Weak rolling hash and strong digest for block matching.
//!
//! The weak hash is the Adler-style pair of running sums rsync uses for
//! cheap window comparison: `a` accumulates the byte sum and `b` the sum of
//! running prefix sums, both in wrapping arithmetic, truncated to 16 bits
//! when combined. It slides in O(1). Collisions are expected; every
//! candidate match is confirmed with the strong digest before acceptance.

use sha2::{Digest, Sha256};

/// Rolling weak hash over the current window.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RollingHash {
    a: u32,
    b: u32,
}

impl RollingHash {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the hash. Feeding a window in pieces is equivalent
    /// to feeding it whole: after `n` bytes, `a = Σ x[i]` and
    /// `b = Σ (n - i) · x[i]`.
    pub(crate) fn update(&mut self, bytes: &[u8]) {
        for &v in bytes {
            self.a = self.a.wrapping_add(u32::from(v));
            self.b = self.b.wrapping_add(self.a);
        }
    }

    /// Slide the window one byte: evict `old` from the front, append `new`
    /// at the back. `window_len` is the (unchanged) window length.
    #[inline]
    pub(crate) fn roll(&mut self, old: u8, new: u8, window_len: usize) {
        let old = u32::from(old);
        self.a = self.a.wrapping_sub(old).wrapping_add(u32::from(new));
        self.b = self
            .b
            .wrapping_sub((window_len as u32).wrapping_mul(old))
            .wrapping_add(self.a);
    }

    /// Combined 32-bit value: low half `a`, high half `b`.
    #[inline]
    pub(crate) fn value(&self) -> u32 {
        (self.a & 0xffff) | ((self.b & 0xffff) << 16)
    }
}

/// Weak hash of a complete block.
pub(crate) fn weak_hash(block: &[u8]) -> u32 {
    let mut h = RollingHash::new();
    h.update(block);
    h.value()
}

/// SHA-256 of a complete block, the match-confirming digest.
pub(crate) fn strong_hash(block: &[u8]) -> [u8; 32] {
    Sha256::digest(block).into()
}
