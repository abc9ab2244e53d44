//! Read path: `get()` and the raw lookup shared with `del()`.
//!
//! Lookups check the memtable first, then level 0 newest-timestamp-first,
//! then each deeper level through a range binary search. The walk stops at
//! the first record found; whether that record is a tombstone is the
//! caller's concern.

use std::rc::Rc;

use anyhow::Result;
use memtable::TOMBSTONE;
use sstable::SsTable;

use crate::{KvStore, Level};

impl KvStore {
    /// Looks up a key, returning `None` when it was never written or its
    /// latest record is a tombstone.
    ///
    /// # Errors
    ///
    /// Propagates table read failures.
    pub fn get(&self, key: u64) -> Result<Option<Vec<u8>>> {
        Ok(match self.lookup_raw(key)? {
            Some(value) if value != TOMBSTONE => Some(value),
            _ => None,
        })
    }

    /// The newest record for `key` across memtable and every level,
    /// tombstones included.
    pub(crate) fn lookup_raw(&self, key: u64) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.mem.get(key) {
            return Ok(Some(value.to_vec()));
        }

        for (depth, level) in self.levels.iter().enumerate() {
            if depth == 0 {
                // Ranges may overlap; the newest table shadows the rest.
                for table in level.iter().rev() {
                    if let Some(value) = table.get(key)? {
                        return Ok(Some(value));
                    }
                }
            } else if let Some(table) = find_in_level(level, key) {
                if let Some(value) = table.get(key)? {
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }
}

/// The unique table whose `[min, max]` range contains `key`, in a level
/// whose tables are range-disjoint and sorted by min key.
pub(crate) fn find_in_level(tables: &Level, key: u64) -> Option<&Rc<SsTable>> {
    let idx = tables.partition_point(|t| t.max_key() < key);
    tables.get(idx).filter(|t| t.contains(key))
}
