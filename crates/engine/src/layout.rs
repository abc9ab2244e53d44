//! On-disk layout: `<dir>/level-<i>/<table id>.sst`.
//!
//! Level directories are created on demand and removed only by
//! [`KvStore::reset`](crate::KvStore::reset). Directory scans return
//! entries in no particular order; callers sort.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Directory holding level `level`'s tables.
pub(crate) fn level_dir(base: &Path, level: usize) -> PathBuf {
    base.join(format!("level-{}", level))
}

/// Existing level directories under `base` as `(level index, path)`,
/// ascending by index.
pub(crate) fn scan_levels(base: &Path) -> io::Result<Vec<(usize, PathBuf)>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(base)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let index = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("level-"))
            .and_then(|n| n.parse::<usize>().ok());
        if let Some(index) = index {
            found.push((index, path));
        }
    }
    found.sort_by_key(|(index, _)| *index);
    Ok(found)
}

/// `.sst` files directly under `dir`.
pub(crate) fn table_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map_or(false, |ext| ext == "sst") {
            files.push(path);
        }
    }
    Ok(files)
}
