//! K-way merge over table files, the core primitive of compaction.
//!
//! [`MergeStream`] walks any number of input tables and yields
//! `(key, value)` pairs in ascending key order, emitting each key exactly
//! once. When several inputs carry the same key, the input listed
//! **earliest** wins — callers rank their inputs newest-data-first (level-0
//! tables in descending timestamp order, or the evicted upper-level table
//! ahead of its overlaps), which makes "earliest input" and "newest record"
//! the same thing.
//!
//! All value payloads are read up front with one sequential pass per input,
//! so the merge itself never seeks.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;

use crate::{SsTable, TableError};

/// A cursor into one input table, ordered for the min-heap.
struct Cursor {
    key: u64,
    /// Rank of the owning input; lower rank wins key ties.
    source: usize,
    /// Index position within the owning table.
    pos: usize,
}

impl PartialEq for Cursor {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.source == other.source
    }
}

impl Eq for Cursor {}

impl PartialOrd for Cursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cursor {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse both fields so the smallest key
        // pops first, ties going to the lowest-ranked source.
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.source.cmp(&self.source))
    }
}

struct Input {
    table: Rc<SsTable>,
    /// Preloaded payloads, index-aligned with the table's keys. Taken (not
    /// cloned) as entries are emitted.
    values: Vec<Vec<u8>>,
}

/// Sorted, deduplicated stream over several tables.
pub struct MergeStream {
    inputs: Vec<Input>,
    heap: BinaryHeap<Cursor>,
    last_key: Option<u64>,
}

impl MergeStream {
    /// Builds a stream over `tables`, ranked by position: on key ties the
    /// earlier table wins. Every input's values are bulk-read here.
    pub fn new(tables: Vec<Rc<SsTable>>) -> Result<Self, TableError> {
        let mut inputs = Vec::with_capacity(tables.len());
        let mut heap = BinaryHeap::new();

        for (source, table) in tables.into_iter().enumerate() {
            let values = table.read_all_values()?;
            heap.push(Cursor {
                key: table.keys()[0],
                source,
                pos: 0,
            });
            inputs.push(Input { table, values });
        }

        Ok(Self {
            inputs,
            heap,
            last_key: None,
        })
    }

    /// The next `(key, value)` in ascending key order, or `None` when every
    /// input is exhausted. Duplicate keys beyond the winning record are
    /// discarded.
    pub fn next_entry(&mut self) -> Option<(u64, Vec<u8>)> {
        loop {
            let cur = self.heap.pop()?;

            let next_pos = cur.pos + 1;
            if let Some(&next_key) = self.inputs[cur.source].table.keys().get(next_pos) {
                self.heap.push(Cursor {
                    key: next_key,
                    source: cur.source,
                    pos: next_pos,
                });
            }

            // The winning record for this key was already emitted.
            if self.last_key == Some(cur.key) {
                continue;
            }
            self.last_key = Some(cur.key);

            let value = std::mem::take(&mut self.inputs[cur.source].values[cur.pos]);
            return Some((cur.key, value));
        }
    }
}
