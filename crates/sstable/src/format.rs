//! Layout constants for the on-disk table format.
//!
//! The sizing constants originate in the [`memtable`] crate because the
//! memtable must project the exact file size of a flush before any byte is
//! written; they are re-exported here so table code reads naturally.

pub use bloom::FILTER_BYTES;
pub use memtable::{HEADER_SIZE, INDEX_ENTRY_SIZE, MAX_TABLE_SIZE, TOMBSTONE};

/// Largest value a table holding a single entry can carry without crossing
/// [`MAX_TABLE_SIZE`].
pub const MAX_VALUE_SIZE: u64 =
    MAX_TABLE_SIZE - (HEADER_SIZE + FILTER_BYTES as u64 + INDEX_ENTRY_SIZE);

/// Byte offset where value payloads begin in a table of `num_keys` entries.
pub fn data_start(num_keys: u64) -> u64 {
    HEADER_SIZE + FILTER_BYTES as u64 + num_keys * INDEX_ENTRY_SIZE
}
