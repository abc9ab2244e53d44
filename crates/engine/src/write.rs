//! Write path: `put()`, `del()`, `flush()`, and `reset()`.
//!
//! Every mutation lands in the memtable. A put the memtable cannot accept
//! without its projected table size crossing the 2 MiB cap triggers a flush
//! to level 0, a memtable reset, a retry, and a compaction round. Deletes
//! are tombstone puts; the prior-presence answer comes from a read probe
//! taken before the tombstone lands.

use std::fs;
use std::rc::Rc;

use anyhow::{bail, ensure, Result};
use memtable::{PutOutcome, TOMBSTONE};
use sstable::format::MAX_VALUE_SIZE;
use sstable::write_from_memtable;

use crate::{layout, KvStore};

impl KvStore {
    /// Inserts or updates a key.
    ///
    /// # Errors
    ///
    /// Fails when the value alone would exceed the table cap, or on I/O
    /// failure during the flush or compaction a full memtable triggers.
    pub fn put(&mut self, key: u64, value: Vec<u8>) -> Result<()> {
        ensure!(
            value.len() as u64 <= MAX_VALUE_SIZE,
            "value of {} bytes exceeds the {} byte table cap",
            value.len(),
            MAX_VALUE_SIZE
        );

        match self.mem.put(key, value) {
            PutOutcome::Accepted => Ok(()),
            PutOutcome::Full(value) => {
                self.flush_memtable()?;
                match self.mem.put(key, value) {
                    PutOutcome::Accepted => {}
                    PutOutcome::Full(value) => {
                        bail!("value of {} bytes rejected by an empty memtable", value.len())
                    }
                }
                self.compact()
            }
        }
    }

    /// Deletes a key by writing a tombstone.
    ///
    /// Returns `true` iff the key was present beforehand — a prior
    /// tombstone counts as absent.
    ///
    /// # Errors
    ///
    /// Propagates read-probe and tombstone-write failures.
    pub fn del(&mut self, key: u64) -> Result<bool> {
        let existed = match self.lookup_raw(key)? {
            Some(value) => value != TOMBSTONE,
            None => false,
        };
        self.put(key, TOMBSTONE.to_vec())?;
        Ok(existed)
    }

    /// Flushes the memtable to a new level-0 table and compacts. No-op on
    /// an empty memtable.
    pub fn flush(&mut self) -> Result<()> {
        if self.mem.is_empty() {
            return Ok(());
        }
        self.flush_memtable()?;
        self.compact()
    }

    /// Writes the memtable to `level-0/<id>.sst`, resets it, and registers
    /// the new table. The caller decides when to compact.
    pub(crate) fn flush_memtable(&mut self) -> Result<()> {
        let id = self.alloc_table_id();
        let timestamp = self.alloc_timestamp();
        let dir = self.ensure_level_dir(0)?;
        let path = dir.join(format!("{}.sst", id));

        let table = write_from_memtable(&self.mem, id, timestamp, &path)?;
        log::debug!(
            "flushed memtable: {} keys, {} bytes -> {}",
            table.num_keys(),
            table.file_size(),
            path.display()
        );

        self.mem.reset();
        self.levels[0].push(Rc::new(table));
        Ok(())
    }

    /// Wipes the store: memtable, every in-memory level, and every level
    /// directory on disk. Timestamps and table ids keep counting — they
    /// never repeat within a store lifetime.
    pub fn reset(&mut self) -> Result<()> {
        self.mem.reset();
        self.levels.clear();
        self.levels.push(Vec::new());

        for (_, level_dir) in layout::scan_levels(&self.dir)? {
            for entry in fs::read_dir(&level_dir)? {
                fs::remove_file(entry?.path())?;
            }
            fs::remove_dir(&level_dir)?;
        }

        log::info!("store reset: {} wiped", self.dir.display());
        Ok(())
    }
}
