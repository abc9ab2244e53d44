//! # Bloom Filter
//!
//! A fixed-size probabilistic membership filter for u64 keys.
//!
//! A bloom filter can tell you with certainty that a key is **not** in the
//! set (no false negatives), but may occasionally report that a key **is**
//! in the set when it isn't (false positives).
//!
//! ## Usage in StrataKV
//!
//! The memtable keeps a companion filter so point lookups can skip the
//! skip-list descent for keys that were never written, and every table file
//! embeds a snapshot of the filter so the read path can skip a table without
//! touching its index.
//!
//! ## On-disk form
//!
//! The filter occupies a fixed [`FILTER_BYTES`] region in every table file:
//! one byte per slot, non-zero meaning set. The slot positions for a key are
//! the four 32-bit words of a single 128-bit MurmurHash3 (x64 variant) of
//! the key's little-endian bytes, each word reduced modulo the slot count.
//! The hash seed is fixed at [`HASH_SEED`]; changing it would invalidate
//! every filter already on disk.
//!
//! ## Example
//!
//! ```rust
//! use bloom::BloomFilter;
//!
//! let mut bf = BloomFilter::new();
//! bf.insert(42);
//! assert!(bf.may_contain(42));
//! assert!(!bf.may_contain(43));
//! ```

use std::io::{self, Cursor, Read, Write};

use murmur3::murmur3_x64_128;

/// Number of filter slots, and the exact size of the serialized filter in
/// bytes (one byte per slot).
pub const FILTER_BYTES: usize = 10240;

/// Seed for the 128-bit murmur3 hash. Part of the on-disk contract.
pub const HASH_SEED: u32 = 1;

/// A fixed-size bloom filter keyed by u64.
///
/// Slots are whole bytes rather than packed bits so that the in-memory
/// representation can be written to disk verbatim.
#[derive(Clone)]
pub struct BloomFilter {
    slots: Vec<u8>,
}

impl BloomFilter {
    /// Creates an empty filter with every slot cleared.
    pub fn new() -> Self {
        Self {
            slots: vec![0u8; FILTER_BYTES],
        }
    }

    /// Marks the four slots derived from `key`.
    pub fn insert(&mut self, key: u64) {
        for word in hash_words(key) {
            self.slots[(word as usize) % FILTER_BYTES] = 1;
        }
    }

    /// Returns `true` if `key` **might** have been inserted, `false` if it
    /// **definitely** was not.
    #[must_use]
    pub fn may_contain(&self, key: u64) -> bool {
        hash_words(key)
            .iter()
            .all(|word| self.slots[(*word as usize) % FILTER_BYTES] != 0)
    }

    /// Clears every slot.
    pub fn reset(&mut self) {
        self.slots.fill(0);
    }

    /// Writes exactly [`FILTER_BYTES`] bytes, one per slot.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.slots)
    }

    /// Reads exactly [`FILTER_BYTES`] bytes, one per slot.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut slots = vec![0u8; FILTER_BYTES];
        r.read_exact(&mut slots)?;
        Ok(Self { slots })
    }
}

impl Default for BloomFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = self.slots.iter().filter(|s| **s != 0).count();
        f.debug_struct("BloomFilter")
            .field("slots", &FILTER_BYTES)
            .field("set", &set)
            .finish()
    }
}

/// The four u32 words of one 128-bit murmur3 hash of the key.
fn hash_words(key: u64) -> [u32; 4] {
    let mut bytes = Cursor::new(key.to_le_bytes());
    // Hashing an in-memory cursor cannot fail.
    let h = murmur3_x64_128(&mut bytes, HASH_SEED).expect("in-memory hash");
    [
        h as u32,
        (h >> 32) as u32,
        (h >> 64) as u32,
        (h >> 96) as u32,
    ]
}
