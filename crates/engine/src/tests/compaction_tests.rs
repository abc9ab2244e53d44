use anyhow::Result;
use tempfile::tempdir;

use super::helpers::{big_value, check_invariants, level_dirs};
use crate::compaction::level_capacity;
use crate::KvStore;

// --------------------- Capacity policy ---------------------

#[test]
fn level_capacities_double_per_level() {
    assert_eq!(level_capacity(0), 2);
    assert_eq!(level_capacity(1), 4);
    assert_eq!(level_capacity(2), 8);
    assert_eq!(level_capacity(5), 64);
}

// --------------------- Level 0 ---------------------

#[test]
fn level0_overflow_merges_into_level1() -> Result<()> {
    let dir = tempdir()?;
    let mut store = KvStore::open(dir.path())?;

    // Nine large values: three flushes, the third of which overflows
    // level 0 and triggers the merge.
    for key in 0..9u64 {
        store.put(key, big_value(key))?;
    }
    store.flush()?;

    assert!(store.tables_in_level(0) <= 2, "level 0 capacity respected");
    assert!(store.tables_in_level(1) >= 1, "merge output landed in level 1");
    assert!(level_dirs(dir.path()).contains(&"level-1".to_string()));
    check_invariants(&store);

    for key in 0..9u64 {
        assert_eq!(store.get(key)?, Some(big_value(key)), "key {}", key);
    }
    Ok(())
}

#[test]
fn merge_splits_output_at_the_table_cap() -> Result<()> {
    let dir = tempdir()?;
    let mut store = KvStore::open(dir.path())?;

    // ~5.4 MB of live data cannot fit one 2 MiB table.
    for key in 0..9u64 {
        store.put(key, big_value(key))?;
    }
    store.flush()?;

    assert!(
        store.tables_in_level(1) >= 3,
        "5.4 MB of data needs at least three capped tables, got {}",
        store.tables_in_level(1)
    );
    check_invariants(&store);
    Ok(())
}

#[test]
fn newest_value_survives_compaction() -> Result<()> {
    let dir = tempdir()?;
    let mut store = KvStore::open(dir.path())?;

    for round in 0..3 {
        store.put(42, format!("round-{}", round).into_bytes())?;
        // Pad so each flush carries more than the one key.
        store.put(1000 + round, big_value(1000 + round))?;
        store.flush()?;
    }
    store.compact()?;

    assert_eq!(store.get(42)?, Some(b"round-2".to_vec()));
    check_invariants(&store);
    Ok(())
}

// --------------------- Deep cascades ---------------------

#[test]
fn cascade_creates_deeper_levels_and_keeps_every_key() -> Result<()> {
    let dir = tempdir()?;
    let mut store = KvStore::open(dir.path())?;

    // ~25 MB of distinct keys: level 0 compacts repeatedly, level 1
    // overflows into a new bottom, and later merges hit the bottom level.
    let total = 42u64;
    for key in 0..total {
        store.put(key, big_value(key))?;
        check_invariants(&store);
    }
    store.flush()?;

    assert!(
        store.level_count() >= 3,
        "expected a cascade past level 1, got {} levels",
        store.level_count()
    );
    assert!(store.tables_in_level(0) <= 2);
    check_invariants(&store);

    for key in 0..total {
        assert_eq!(store.get(key)?, Some(big_value(key)), "key {}", key);
    }
    Ok(())
}

#[test]
fn deletions_hold_across_deep_compaction() -> Result<()> {
    let dir = tempdir()?;
    let mut store = KvStore::open(dir.path())?;

    let total = 30u64;
    for key in 0..total {
        store.put(key, big_value(key))?;
    }
    for key in (0..total).step_by(2) {
        assert!(store.del(key)?, "key {} was present", key);
    }
    store.flush()?;

    check_invariants(&store);
    for key in 0..total {
        if key % 2 == 0 {
            assert_eq!(store.get(key)?, None, "deleted key {}", key);
        } else {
            assert_eq!(store.get(key)?, Some(big_value(key)), "live key {}", key);
        }
    }

    // Deletes of already-deleted keys keep answering false.
    for key in (0..total).step_by(2) {
        assert!(!store.del(key)?, "key {}", key);
    }
    Ok(())
}

#[test]
fn overwrites_across_many_flushes_resolve_to_latest() -> Result<()> {
    let dir = tempdir()?;
    let mut store = KvStore::open(dir.path())?;

    for round in 0..4u64 {
        for key in 0..12u64 {
            let mut value = big_value(key);
            value[8] = round as u8;
            store.put(key, value)?;
        }
    }
    store.flush()?;
    check_invariants(&store);

    for key in 0..12u64 {
        let mut expect = big_value(key);
        expect[8] = 3;
        assert_eq!(store.get(key)?, Some(expect), "key {}", key);
    }
    Ok(())
}
