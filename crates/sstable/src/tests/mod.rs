
use std::path::Path;
use std::rc::Rc;

use crate::{SsTable, TableBuilder};

/// Writes `<id>.sst` under `dir` with the given entries and reopens nothing:
/// the returned handle is the one the builder produced.
pub(crate) fn build_table(dir: &Path, id: u64, timestamp: u64, entries: &[(u64, &[u8])]) -> Rc<SsTable> {
    let mut builder = TableBuilder::new(id, timestamp);
    for (key, value) in entries {
        builder.push(*key, value.to_vec());
    }
    let path = dir.join(format!("{}.sst", id));
    Rc::new(builder.finish(&path).expect("write table"))
}
