//! Multi-level compaction.
//!
//! Runs after every flush and once at startup. Three cases:
//!
//! 1. **Level 0 overflow** (more than 2 tables): every level-0 table is
//!    merged with the level-1 tables whose ranges intersect level 0's
//!    union range. Level 1 is created if it does not exist yet.
//! 2. **Middle level overflow**: the oldest surplus tables are evicted one
//!    by one, each 2-way merged with its overlaps in the level below.
//!    Tombstones are dropped only when the target level is the current
//!    bottom — below it nothing can be shadowed.
//! 3. **Bottom level overflow**: a new deeper level is created and the
//!    surplus tables are physically relocated into it; with no level below
//!    there is nothing to merge against.
//!
//! Merge outputs respect the 2 MiB cap by splitting into several tables,
//! each carrying the maximum timestamp of the merge inputs and a freshly
//! allocated id. Input files are unlinked once the merge lands.

use std::collections::{BinaryHeap, HashSet};
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::Result;
use memtable::TOMBSTONE;
use sstable::{MergeStream, SsTable, TableBuilder};

use crate::{KvStore, Level};

/// Soft capacity of level `level`: 2^(level+1) tables.
pub(crate) fn level_capacity(level: usize) -> usize {
    2usize << level
}

impl KvStore {
    /// One full compaction round over every overflowing level.
    ///
    /// # Errors
    ///
    /// I/O failures during merges or relocation abort the round; there is
    /// no rollback of tables already written (see DESIGN.md).
    pub fn compact(&mut self) -> Result<()> {
        if self.levels[0].len() > level_capacity(0) {
            self.compact_level0()?;
        }

        let mut level = 1;
        while level + 1 < self.levels.len() {
            if self.levels[level].len() > level_capacity(level) {
                self.compact_into_next(level)?;
            }
            level += 1;
        }

        let bottom = self.levels.len() - 1;
        if bottom >= 1 && self.levels[bottom].len() > level_capacity(bottom) {
            self.relocate_bottom_overflow(bottom)?;
        }
        Ok(())
    }

    /// Case 1: merge all of level 0 with its level-1 overlaps.
    fn compact_level0(&mut self) -> Result<()> {
        let l0 = self.levels[0].clone();
        let union_min = l0.iter().map(|t| t.min_key()).min().expect("level 0 overflowing");
        let union_max = l0.iter().map(|t| t.max_key()).max().expect("level 0 overflowing");

        if self.levels.len() == 1 {
            self.levels.push(Vec::new());
        }
        let (overlaps, discard) = overlapping(&self.levels[1], union_min, union_max);

        // Newest data first: level 0 descending by timestamp, then the
        // strictly older level-1 overlaps.
        let mut inputs: Vec<Rc<SsTable>> = l0.iter().rev().cloned().collect();
        inputs.extend(overlaps);

        log::debug!(
            "level-0 compaction: {} inputs over keys {}..={}",
            inputs.len(),
            union_min,
            union_max
        );
        let outputs = self.merge_tables(inputs, 1, false)?;

        let retained = drop_discarded(&self.levels[1], &discard);
        self.levels[1] = splice(retained, outputs);
        self.levels[0].clear();
        Ok(())
    }

    /// Case 2: evict the oldest surplus tables of `level` into `level + 1`.
    fn compact_into_next(&mut self, level: usize) -> Result<()> {
        let excess = self.levels[level].len() - level_capacity(level);
        let evictees = select_evictees(&self.levels[level], excess);
        let evicted: HashSet<u64> = evictees.iter().map(|t| t.id()).collect();
        let into_bottom = level + 2 == self.levels.len();

        log::debug!(
            "level-{} compaction: evicting {} of {} tables",
            level,
            evictees.len(),
            self.levels[level].len()
        );

        for evictee in &evictees {
            let (overlaps, discard) =
                overlapping(&self.levels[level + 1], evictee.min_key(), evictee.max_key());

            let mut inputs = vec![Rc::clone(evictee)];
            inputs.extend(overlaps);
            let outputs = self.merge_tables(inputs, level + 1, into_bottom)?;

            let retained = drop_discarded(&self.levels[level + 1], &discard);
            self.levels[level + 1] = splice(retained, outputs);
        }

        self.levels[level].retain(|t| !evicted.contains(&t.id()));
        Ok(())
    }

    /// Case 3: the bottom level overflows; relocate its oldest tables into
    /// a freshly created deeper level.
    fn relocate_bottom_overflow(&mut self, bottom: usize) -> Result<()> {
        let excess = self.levels[bottom].len() - level_capacity(bottom);
        let evictees = select_evictees(&self.levels[bottom], excess);
        let evicted: HashSet<u64> = evictees.iter().map(|t| t.id()).collect();

        let new_dir = self.ensure_level_dir(bottom + 1)?;
        log::debug!(
            "bottom overflow: relocating {} tables into level {}",
            evictees.len(),
            bottom + 1
        );

        let mut moved: Level = Vec::with_capacity(evictees.len());
        for evictee in &evictees {
            let new_path = new_dir.join(format!("{}.sst", evictee.id()));
            fs::copy(evictee.path(), &new_path)?;
            fs::remove_file(evictee.path())?;
            moved.push(Rc::new(evictee.relocated(new_path)));
        }

        // Evictees come from a disjoint level and arrive sorted by min key.
        self.levels.push(moved);
        self.levels[bottom].retain(|t| !evicted.contains(&t.id()));
        Ok(())
    }

    /// Merges `inputs` (ranked newest-first) into `target_level`, splitting
    /// output at the table cap. Outputs carry the maximum input timestamp.
    /// Input files are unlinked afterwards.
    fn merge_tables(
        &mut self,
        inputs: Vec<Rc<SsTable>>,
        target_level: usize,
        drop_tombstones: bool,
    ) -> Result<Vec<Rc<SsTable>>> {
        let timestamp = inputs
            .iter()
            .map(|t| t.timestamp())
            .max()
            .expect("merge requires inputs");
        let dir = self.ensure_level_dir(target_level)?;

        let mut stream = MergeStream::new(inputs.clone())?;
        let mut outputs: Vec<Rc<SsTable>> = Vec::new();
        let mut builder: Option<TableBuilder> = None;

        while let Some((key, value)) = stream.next_entry() {
            if drop_tombstones && value == TOMBSTONE {
                continue;
            }
            if builder.as_ref().is_some_and(|b| !b.fits(value.len())) {
                let full = builder.take().expect("builder present");
                outputs.push(seal(full, &dir)?);
            }
            if builder.is_none() {
                builder = Some(TableBuilder::new(self.alloc_table_id(), timestamp));
            }
            builder.as_mut().expect("builder present").push(key, value);
        }
        if let Some(last) = builder.take() {
            outputs.push(seal(last, &dir)?);
        }

        for table in &inputs {
            fs::remove_file(table.path())?;
        }
        Ok(outputs)
    }
}

fn seal(builder: TableBuilder, dir: &Path) -> Result<Rc<SsTable>, sstable::TableError> {
    let path = dir.join(format!("{}.sst", builder.id()));
    Ok(Rc::new(builder.finish(&path)?))
}

/// The `count` oldest tables of a level, by ascending (timestamp, min key),
/// returned in min-key order for downstream processing.
fn select_evictees(tables: &Level, count: usize) -> Level {
    // Bounded max-heap: push everything, pop whenever it grows past
    // `count`, and the k smallest remain.
    let mut heap: BinaryHeap<(u64, u64, usize)> = BinaryHeap::new();
    for (idx, table) in tables.iter().enumerate() {
        heap.push((table.timestamp(), table.min_key(), idx));
        if heap.len() > count {
            heap.pop();
        }
    }

    let mut chosen: Level = heap
        .into_iter()
        .map(|(_, _, idx)| Rc::clone(&tables[idx]))
        .collect();
    chosen.sort_by_key(|t| t.min_key());
    chosen
}

/// Tables of a min-key-sorted level intersecting `[min, max]`, plus their
/// ids for the rebuild.
fn overlapping(tables: &Level, min: u64, max: u64) -> (Level, HashSet<u64>) {
    let start = tables.partition_point(|t| t.max_key() < min);
    let overlaps: Level = tables[start..]
        .iter()
        .take_while(|t| t.min_key() <= max)
        .cloned()
        .collect();
    let ids = overlaps.iter().map(|t| t.id()).collect();
    (overlaps, ids)
}

fn drop_discarded(tables: &Level, discard: &HashSet<u64>) -> Level {
    tables
        .iter()
        .filter(|t| !discard.contains(&t.id()))
        .cloned()
        .collect()
}

/// Rebuilds a level by inserting the contiguous, key-sorted merge outputs
/// at the position their range dictates.
fn splice(retained: Level, outputs: Level) -> Level {
    let first = match outputs.first() {
        Some(first) => first.min_key(),
        None => return retained,
    };
    let pos = retained.partition_point(|t| t.max_key() < first);
    let mut level = retained;
    level.splice(pos..pos, outputs);
    level
}
