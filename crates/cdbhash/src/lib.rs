//! # cdbhash
//!
//! The hash function used by constant-database files.
//!
//! Every key is hashed with the same 32-bit function on both the write path
//! (to place the key in a subtable) and the read path (to find it again).
//! The two sides must agree **bit for bit** — a table written with one
//! function is unreadable with another — so the function is frozen here in
//! its own crate with no dependencies.
//!
//! The function itself: start from [`SEED`], then for each input byte
//! multiply the state by 33 and XOR in the byte, all in wrapping 32-bit
//! arithmetic.
//!
//! ## Example
//! ```rust
//! use cdbhash::{hash, Hasher};
//!
//! let one_shot = hash(b"hello");
//!
//! let mut h = Hasher::new();
//! h.update(b"he");
//! h.update(b"llo");
//! assert_eq!(h.finalize(), one_shot);
//! ```

/// Initial hash state. Non-zero so that short keys do not collapse onto
/// the all-zero pattern reserved for empty subtable slots.
pub const SEED: u32 = 5381;

#[inline]
fn step(state: u32, byte: u8) -> u32 {
    (state << 5).wrapping_add(state) ^ u32::from(byte)
}

/// Hashes `bytes` in one call.
pub fn hash(bytes: &[u8]) -> u32 {
    let mut state = SEED;
    for &b in bytes {
        state = step(state, b);
    }
    state
}

/// Incremental hasher for callers that receive a key in chunks.
///
/// Feeding the same bytes through any sequence of [`update`](Hasher::update)
/// calls produces the same result as [`hash`] over the concatenation.
#[derive(Debug, Clone)]
pub struct Hasher {
    state: u32,
}

impl Hasher {
    /// Creates a hasher with the initial state [`SEED`].
    pub fn new() -> Self {
        Self { state: SEED }
    }

    /// Feeds `bytes` into the hash state.
    pub fn update(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state = step(self.state, b);
        }
    }

    /// Consumes the hasher and returns the final hash value.
    pub fn finalize(self) -> u32 {
        self.state
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}
