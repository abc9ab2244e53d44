use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use bloom::BloomFilter;
use byteorder::{LittleEndian, WriteBytesExt};
use memtable::Memtable;

use crate::format::{data_start, FILTER_BYTES, HEADER_SIZE, INDEX_ENTRY_SIZE, MAX_TABLE_SIZE};
use crate::{SsTable, TableError};

/// Accumulates sorted entries and writes them out as one table file.
///
/// The builder tracks the running file size so callers can split output
/// across several tables at the 2 MiB cap: check [`fits`](TableBuilder::fits)
/// before each [`push`](TableBuilder::push), and [`finish`](TableBuilder::finish)
/// the builder when the next entry would not fit.
pub struct TableBuilder {
    id: u64,
    timestamp: u64,
    keys: Vec<u64>,
    values: Vec<Vec<u8>>,
    bloom: BloomFilter,
    file_size: u64,
}

impl TableBuilder {
    /// A builder for table `<id>.sst` carrying `timestamp`.
    pub fn new(id: u64, timestamp: u64) -> Self {
        Self {
            id,
            timestamp,
            keys: Vec::new(),
            values: Vec::new(),
            bloom: BloomFilter::new(),
            file_size: HEADER_SIZE + FILTER_BYTES as u64,
        }
    }

    /// Whether an entry with a value of `value_len` bytes still fits under
    /// [`MAX_TABLE_SIZE`].
    #[must_use]
    pub fn fits(&self, value_len: usize) -> bool {
        self.file_size + INDEX_ENTRY_SIZE + value_len as u64 <= MAX_TABLE_SIZE
    }

    /// Appends an entry. Keys must arrive in strictly increasing order.
    pub fn push(&mut self, key: u64, value: Vec<u8>) {
        debug_assert!(
            self.keys.last().map_or(true, |&last| last < key),
            "keys must be pushed in strictly increasing order"
        );
        self.bloom.insert(key);
        self.file_size += INDEX_ENTRY_SIZE + value.len() as u64;
        self.keys.push(key);
        self.values.push(value);
    }

    /// The table id this builder will write under.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Projected size of the finished file.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Writes the table to `path` and returns its in-memory handle, so the
    /// caller never reparses a file it just produced.
    ///
    /// # Errors
    ///
    /// [`TableError::EmptyTable`] when nothing was pushed; [`TableError::Io`]
    /// on write failure.
    pub fn finish(self, path: &Path) -> Result<SsTable, TableError> {
        if self.keys.is_empty() {
            return Err(TableError::EmptyTable);
        }

        let num_keys = self.keys.len() as u64;
        let min_key = self.keys[0];
        let max_key = *self.keys.last().expect("non-empty");

        let mut offsets = Vec::with_capacity(self.keys.len());
        let mut offset = data_start(num_keys);
        for value in &self.values {
            offsets.push(offset as u32);
            offset += value.len() as u64;
        }
        debug_assert_eq!(offset, self.file_size);

        let mut w = BufWriter::new(File::create(path)?);
        w.write_u64::<LittleEndian>(self.timestamp)?;
        w.write_u64::<LittleEndian>(num_keys)?;
        w.write_u64::<LittleEndian>(min_key)?;
        w.write_u64::<LittleEndian>(max_key)?;
        self.bloom.write_to(&mut w)?;
        for (key, off) in self.keys.iter().zip(&offsets) {
            w.write_u64::<LittleEndian>(*key)?;
            w.write_u32::<LittleEndian>(*off)?;
        }
        for value in &self.values {
            w.write_all(value)?;
        }
        w.flush()?;
        w.get_ref().sync_all()?;

        Ok(SsTable {
            path: path.to_path_buf(),
            id: self.id,
            timestamp: self.timestamp,
            min_key,
            max_key,
            file_size: offset,
            bloom: self.bloom,
            keys: self.keys,
            offsets,
        })
    }
}

/// Flushes a memtable to `path` as table `<id>.sst`.
///
/// The produced file's size equals the memtable's projected
/// [`file_size`](Memtable::file_size) exactly. Tombstones are written like
/// any other value.
pub fn write_from_memtable(
    mem: &Memtable,
    id: u64,
    timestamp: u64,
    path: &Path,
) -> Result<SsTable, TableError> {
    let mut builder = TableBuilder::new(id, timestamp);
    for (key, value) in mem.iter() {
        builder.push(key, value.to_vec());
    }
    builder.finish(path)
}
