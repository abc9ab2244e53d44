//! # Engine — the StrataKV store
//!
//! The central orchestrator tying the [`memtable`] and [`sstable`] crates
//! into a complete single-node LSM-tree key-value store: u64 keys, byte
//! values, durable under a caller-supplied base directory.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────────┐
//! │                    KVSTORE                        │
//! │                                                   │
//! │ write.rs → memtable put                           │
//! │              |                                    │
//! │              |  (projected table > 2 MiB?)        │
//! │              |            yes                     │
//! │              v                                    │
//! │        flush → new level-0 table → compaction     │
//! │                                                   │
//! │ read.rs → memtable → level 0 (newest first)       │
//! │             → level 1..N (binary search by range) │
//! │           (first hit wins; tombstone = absent)    │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Module responsibilities
//!
//! | Module         | Purpose                                              |
//! |----------------|------------------------------------------------------|
//! | `lib.rs`       | `KvStore` struct, startup scan, accessors, `Drop`    |
//! | [`layout`]     | level directory naming and scanning                  |
//! | [`read`]       | `get()` and the shared raw lookup                    |
//! | [`write`]      | `put()`, `del()`, `flush()`, `reset()`               |
//! | [`compaction`] | level-0, middle-level, and bottom-level compaction   |
//!
//! ## Levels
//!
//! ```text
//! ┌─────────────────────────────┐ ← freshest, checked first
//! │ MEMTABLE (skip list)        │
//! ├─────────────────────────────┤ ← flush output, ranges may overlap,
//! │ level 0  (≤ 2 tables)       │   read newest-timestamp-first
//! ├─────────────────────────────┤ ← merge output, ranges disjoint,
//! │ level 1  (≤ 4 tables)       │   sorted by min key
//! ├─────────────────────────────┤
//! │ level L  (≤ 2^(L+1) tables) │
//! └─────────────────────────────┘
//! ```
//!
//! A level that exceeds its capacity after a flush is compacted into the
//! level below; the bottom level overflows by relocating its oldest tables
//! into a freshly created deeper level.
//!
//! ## Concurrency
//!
//! None. The store assumes exclusive single-threaded access; every call
//! runs to completion, and table handles are shared with plain [`Rc`].

mod compaction;
mod layout;
mod read;
mod write;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use memtable::Memtable;
use sstable::SsTable;

/// One on-disk level: a vector of shared table handles.
pub(crate) type Level = Vec<Rc<SsTable>>;

/// A single-node LSM-tree key-value store.
///
/// # Write path
///
/// 1. Apply the mutation to the memtable.
/// 2. If the memtable reports it is full, flush it to a new level-0 table,
///    reset it, retry the write, and run compaction.
///
/// # Read path
///
/// 1. Check the memtable (freshest data, tombstones included).
/// 2. Walk level 0 newest-first, then each deeper level by range search.
/// 3. First hit wins; a tombstone reads as "not found".
///
/// # Startup
///
/// [`KvStore::open`] scans `level-<i>` subdirectories, loads every table's
/// metadata, derives the next timestamp and table id from what it saw, and
/// runs one compaction round to absorb any overflow a previous process
/// left behind.
pub struct KvStore {
    pub(crate) dir: PathBuf,
    pub(crate) mem: Memtable,
    /// `levels[0]` is the newest disk level. Level 0 is kept in ascending
    /// timestamp order; deeper levels in ascending min-key order.
    pub(crate) levels: Vec<Level>,
    /// Next write timestamp; strictly monotonic per store lifetime.
    pub(crate) timestamp: u64,
    /// Next table filename stem; strictly monotonic per store lifetime.
    pub(crate) next_table_id: u64,
}

impl KvStore {
    /// Opens (or creates) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Fails when the directory cannot be created or scanned, when a table
    /// file is unreadable or corrupt, or when the startup compaction runs
    /// into an I/O error.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating store directory {}", dir.display()))?;
        }

        let mut levels: Vec<Level> = Vec::new();
        let mut max_timestamp = 0u64;
        let mut max_table_id = 0u64;

        for (index, level_dir) in layout::scan_levels(&dir)? {
            while levels.len() <= index {
                levels.push(Vec::new());
            }
            for path in layout::table_files(&level_dir)? {
                let table = SsTable::open(&path)
                    .with_context(|| format!("loading table {}", path.display()))?;
                max_timestamp = max_timestamp.max(table.timestamp());
                max_table_id = max_table_id.max(table.id());
                levels[index].push(Rc::new(table));
            }
        }
        if levels.is_empty() {
            levels.push(Vec::new());
        }

        for (index, level) in levels.iter_mut().enumerate() {
            if index == 0 {
                level.sort_by_key(|t| t.timestamp());
            } else {
                level.sort_by_key(|t| t.min_key());
            }
        }

        let mut store = Self {
            dir,
            mem: Memtable::new(),
            levels,
            timestamp: max_timestamp + 1,
            next_table_id: max_table_id + 1,
        };

        // Absorb any overflow left by an abrupt prior termination.
        store.compact()?;

        log::info!(
            "opened store at {} ({} levels, {} tables, next timestamp {})",
            store.dir.display(),
            store.levels.len(),
            store.table_count(),
            store.timestamp,
        );
        Ok(store)
    }

    /// Number of disk levels currently tracked (level 0 always exists).
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Number of tables in `level`, or 0 for a level that does not exist.
    #[must_use]
    pub fn tables_in_level(&self, level: usize) -> usize {
        self.levels.get(level).map_or(0, Vec::len)
    }

    /// Total number of tables across all levels.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Number of entries buffered in the memtable, tombstones included.
    #[must_use]
    pub fn memtable_len(&self) -> usize {
        self.mem.len()
    }

    pub(crate) fn ensure_level_dir(&self, level: usize) -> std::io::Result<PathBuf> {
        let dir = layout::level_dir(&self.dir, level);
        if !dir.exists() {
            std::fs::create_dir(&dir)?;
        }
        Ok(dir)
    }

    pub(crate) fn alloc_table_id(&mut self) -> u64 {
        let id = self.next_table_id;
        self.next_table_id += 1;
        id
    }

    pub(crate) fn alloc_timestamp(&mut self) -> u64 {
        let ts = self.timestamp;
        self.timestamp += 1;
        ts
    }
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shape: Vec<usize> = self.levels.iter().map(Vec::len).collect();
        f.debug_struct("KvStore")
            .field("dir", &self.dir)
            .field("memtable_len", &self.mem.len())
            .field("memtable_bytes", &self.mem.file_size())
            .field("levels", &shape)
            .field("timestamp", &self.timestamp)
            .field("next_table_id", &self.next_table_id)
            .finish()
    }
}

/// Best-effort flush on drop.
///
/// There is no write-ahead log, so buffered writes survive a clean shutdown
/// only if the memtable reaches disk here. Errors are logged, not
/// propagated — `Drop` has nowhere to send them.
impl Drop for KvStore {
    fn drop(&mut self) {
        if self.mem.is_empty() {
            return;
        }
        if let Err(e) = self.flush() {
            log::error!("final flush failed: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests;
