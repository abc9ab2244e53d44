use std::path::Path;

use memtable::MAX_TABLE_SIZE;

use crate::KvStore;

/// A value big enough that four of them overflow the memtable, tagged with
/// the key so every key's payload is distinct.
pub fn big_value(key: u64) -> Vec<u8> {
    let mut v = vec![b'v'; 600_000];
    v[..8].copy_from_slice(&key.to_le_bytes());
    v
}

/// Names of the `level-<i>` directories under `base`, sorted.
pub fn level_dirs(base: &Path) -> Vec<String> {
    let mut dirs: Vec<String> = std::fs::read_dir(base)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|name| name.starts_with("level-"))
        .collect();
    dirs.sort();
    dirs
}

/// Checks every structural invariant the store promises about its levels:
/// level 0 ascending by timestamp, deeper levels range-disjoint and sorted
/// by min key, every table within the size cap and byte-identical in size
/// to its backing file, no table id appearing twice.
pub fn check_invariants(store: &KvStore) {
    for (depth, level) in store.levels.iter().enumerate() {
        for pair in level.windows(2) {
            if depth == 0 {
                assert!(
                    pair[0].timestamp() <= pair[1].timestamp(),
                    "level 0 must be ordered by timestamp"
                );
            } else {
                assert!(
                    pair[0].max_key() < pair[1].min_key(),
                    "level {} tables must be disjoint and sorted: {:?} then {:?}",
                    depth,
                    pair[0],
                    pair[1]
                );
            }
        }
        for table in level {
            assert!(table.min_key() <= table.max_key());
            assert!(
                table.file_size() <= MAX_TABLE_SIZE,
                "table {} exceeds the cap: {}",
                table.id(),
                table.file_size()
            );
            let on_disk = std::fs::metadata(table.path())
                .unwrap_or_else(|e| panic!("table file {} missing: {}", table.path().display(), e))
                .len();
            assert_eq!(on_disk, table.file_size(), "table {} size drift", table.id());
        }
    }

    let mut ids = std::collections::HashSet::new();
    for level in &store.levels {
        for table in level {
            assert!(ids.insert(table.id()), "duplicate table id {}", table.id());
        }
    }
}
