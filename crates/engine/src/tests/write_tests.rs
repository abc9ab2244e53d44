use anyhow::Result;
use tempfile::tempdir;

use super::helpers::{big_value, check_invariants, level_dirs};
use crate::KvStore;

// --------------------- Put / overwrite ---------------------

#[test]
fn put_then_get() -> Result<()> {
    let dir = tempdir()?;
    let mut store = KvStore::open(dir.path())?;

    store.put(1, b"SE".to_vec())?;
    assert_eq!(store.get(1)?, Some(b"SE".to_vec()));
    assert_eq!(store.get(2)?, None);
    Ok(())
}

#[test]
fn overwrite_returns_latest() -> Result<()> {
    let dir = tempdir()?;
    let mut store = KvStore::open(dir.path())?;

    store.put(9, b"a".to_vec())?;
    store.put(9, b"bb".to_vec())?;
    assert_eq!(store.get(9)?, Some(b"bb".to_vec()));
    Ok(())
}

#[test]
fn oversized_value_is_an_error() -> Result<()> {
    let dir = tempdir()?;
    let mut store = KvStore::open(dir.path())?;

    assert!(store.put(1, vec![b'x'; 2_100_000]).is_err());
    assert_eq!(store.get(1)?, None, "failed put must not leave a record");
    Ok(())
}

// --------------------- Flush on full ---------------------

#[test]
fn full_memtable_flushes_to_level0() -> Result<()> {
    let dir = tempdir()?;
    let mut store = KvStore::open(dir.path())?;

    // Three 600 KB values fit the 2 MiB projection; the fourth does not.
    for key in 0..4u64 {
        store.put(key, big_value(key))?;
        check_invariants(&store);
    }

    assert_eq!(store.tables_in_level(0), 1, "exactly one flush");
    assert_eq!(store.memtable_len(), 1, "the retried put lands in a fresh memtable");
    assert_eq!(level_dirs(dir.path()), vec!["level-0"]);

    for key in 0..4u64 {
        assert_eq!(store.get(key)?, Some(big_value(key)), "key {}", key);
    }
    Ok(())
}

#[test]
fn explicit_flush_is_noop_on_empty_memtable() -> Result<()> {
    let dir = tempdir()?;
    let mut store = KvStore::open(dir.path())?;

    store.flush()?;
    assert_eq!(store.table_count(), 0);
    assert!(level_dirs(dir.path()).is_empty());
    Ok(())
}

#[test]
fn explicit_flush_persists_memtable() -> Result<()> {
    let dir = tempdir()?;
    let mut store = KvStore::open(dir.path())?;

    for key in 0..50u64 {
        store.put(key, vec![b'p'; 64])?;
    }
    store.flush()?;

    assert_eq!(store.memtable_len(), 0);
    assert_eq!(store.tables_in_level(0), 1);
    for key in 0..50u64 {
        assert_eq!(store.get(key)?, Some(vec![b'p'; 64]));
    }
    Ok(())
}

// --------------------- Delete ---------------------

#[test]
fn del_reports_prior_presence() -> Result<()> {
    let dir = tempdir()?;
    let mut store = KvStore::open(dir.path())?;

    store.put(1, b"SE".to_vec())?;
    assert!(store.del(1)?);
    assert_eq!(store.get(1)?, None);
    assert!(!store.del(1)?, "second delete sees the tombstone");
    assert!(!store.del(999)?, "never-written key");
    Ok(())
}

#[test]
fn del_finds_keys_that_live_only_in_tables() -> Result<()> {
    let dir = tempdir()?;
    let mut store = KvStore::open(dir.path())?;

    store.put(7, b"on disk".to_vec())?;
    store.flush()?;
    assert_eq!(store.memtable_len(), 0);

    assert!(store.del(7)?);
    assert_eq!(store.get(7)?, None);
    Ok(())
}

#[test]
fn delete_then_reinsert() -> Result<()> {
    let dir = tempdir()?;
    let mut store = KvStore::open(dir.path())?;

    store.put(5, b"one".to_vec())?;
    store.del(5)?;
    store.put(5, b"two".to_vec())?;
    assert_eq!(store.get(5)?, Some(b"two".to_vec()));
    Ok(())
}

// --------------------- Reset ---------------------

#[test]
fn reset_wipes_memory_and_disk() -> Result<()> {
    let dir = tempdir()?;
    let mut store = KvStore::open(dir.path())?;

    for key in 0..8u64 {
        store.put(key, big_value(key))?;
    }
    store.flush()?;
    assert!(!level_dirs(dir.path()).is_empty());

    store.reset()?;
    assert!(level_dirs(dir.path()).is_empty(), "level directories removed");
    assert_eq!(store.table_count(), 0);
    assert_eq!(store.level_count(), 1, "an empty level 0 remains in memory");
    for key in 0..8u64 {
        assert_eq!(store.get(key)?, None);
    }

    // The store keeps working after a reset.
    store.put(3, b"fresh".to_vec())?;
    assert_eq!(store.get(3)?, Some(b"fresh".to_vec()));
    Ok(())
}
