//! # SSTable — Sorted String Table
//!
//! Immutable, on-disk storage files for the StrataKV store.
//!
//! When the in-memory [`memtable::Memtable`] can no longer accept a write
//! without its projected file size crossing the 2 MiB cap, the engine
//! flushes it to disk as an SSTable. SSTables are *write-once, read-many* —
//! once created they are never modified, only relocated between level
//! directories or replaced wholesale during compaction.
//!
//! ## File layout
//!
//! Every integer is little-endian and fixed-width. Keys are u64, value
//! offsets u32 (a table never exceeds 2 MiB, so u32 always suffices).
//!
//! ```text
//! ┌──────────┬───────┬───────────────────────────────────────────────┐
//! │ offset   │ bytes │ field                                         │
//! ├──────────┼───────┼───────────────────────────────────────────────┤
//! │ 0        │ 8     │ timestamp                                     │
//! │ 8        │ 8     │ number of keys N                              │
//! │ 16       │ 8     │ min key                                       │
//! │ 24       │ 8     │ max key                                       │
//! │ 32       │ 10240 │ bloom filter (one byte per slot)              │
//! │ 10272    │ 12·N  │ index: N × (key u64, value offset u32)        │
//! │ 10272+12N│ …     │ concatenated values, in key order             │
//! └──────────┴───────┴───────────────────────────────────────────────┘
//! ```
//!
//! The index stores only the start offset of each value; a value's length
//! is the distance to the next offset, with the last value running to
//! end-of-file.
//!
//! ## Module responsibilities
//!
//! | Module     | Purpose                                                |
//! |------------|--------------------------------------------------------|
//! | [`format`] | layout constants shared with the memtable projection   |
//! | [`reader`] | [`SsTable`]: load a file, point lookups, bulk reads    |
//! | [`writer`] | [`TableBuilder`]: accumulate sorted entries, write out |
//! | [`merge`]  | [`MergeStream`]: k-way merge over tables for compaction|

pub mod format;
mod merge;
mod reader;
mod writer;

pub use merge::MergeStream;
pub use reader::SsTable;
pub use writer::{write_from_memtable, TableBuilder};

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by table load, lookup, and write paths.
#[derive(Debug, Error)]
pub enum TableError {
    /// Filesystem failure while opening, reading, or writing a table.
    #[error("table I/O: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not parse as a table of the expected layout.
    #[error("corrupt table {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// A builder was asked to write a table with zero entries.
    #[error("refusing to write an empty table")]
    EmptyTable,
}

#[cfg(test)]
mod tests;
