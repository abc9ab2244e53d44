use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bloom::BloomFilter;
use byteorder::{LittleEndian, ReadBytesExt};

use crate::format::{data_start, INDEX_ENTRY_SIZE, MAX_TABLE_SIZE};
use crate::TableError;

/// An immutable on-disk table, loaded metadata-first.
///
/// [`open`](SsTable::open) reads the header, bloom filter, and full index
/// into memory; value payloads stay on disk and are fetched per lookup.
/// File handles are acquired per operation and released on return — the
/// struct holds no descriptor.
pub struct SsTable {
    pub(crate) path: PathBuf,
    /// Filename stem; unique per engine lifetime.
    pub(crate) id: u64,
    pub(crate) timestamp: u64,
    pub(crate) min_key: u64,
    pub(crate) max_key: u64,
    pub(crate) file_size: u64,
    pub(crate) bloom: BloomFilter,
    /// Strictly increasing keys, index-aligned with `offsets`.
    pub(crate) keys: Vec<u64>,
    /// Byte offset of each value within the file.
    pub(crate) offsets: Vec<u32>,
}

impl SsTable {
    /// Loads a table's header, bloom filter, and index from `path`.
    ///
    /// No value payload is read. The filename stem must be the table's
    /// decimal id (`<id>.sst`).
    ///
    /// # Errors
    ///
    /// [`TableError::Io`] on filesystem failure, [`TableError::Corrupt`]
    /// when the file is too small, the header is inconsistent with the
    /// index, or the index is not sorted.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let path = path.as_ref().to_path_buf();
        let id = table_id(&path).ok_or_else(|| corrupt(&path, "filename is not a table id"))?;

        let file = File::open(&path)?;
        let file_size = file.metadata()?.len();
        if file_size < data_start(0) {
            return Err(corrupt(&path, "file smaller than header and filter"));
        }

        let mut r = BufReader::new(file);
        let timestamp = r.read_u64::<LittleEndian>()?;
        let num_keys = r.read_u64::<LittleEndian>()?;
        let min_key = r.read_u64::<LittleEndian>()?;
        let max_key = r.read_u64::<LittleEndian>()?;

        if num_keys == 0 {
            return Err(corrupt(&path, "table holds no keys"));
        }
        if num_keys > MAX_TABLE_SIZE / INDEX_ENTRY_SIZE || data_start(num_keys) > file_size {
            return Err(corrupt(&path, "index overruns file"));
        }

        let bloom = BloomFilter::read_from(&mut r)?;

        let payload_start = data_start(num_keys);
        let mut keys = Vec::with_capacity(num_keys as usize);
        let mut offsets = Vec::with_capacity(num_keys as usize);
        for _ in 0..num_keys {
            let key = r.read_u64::<LittleEndian>()?;
            let offset = r.read_u32::<LittleEndian>()?;
            if keys.last().is_some_and(|&prev| prev >= key) {
                return Err(corrupt(&path, "index keys not strictly increasing"));
            }
            let floor = offsets.last().copied().unwrap_or(payload_start as u32);
            if offset < floor || offset as u64 > file_size {
                return Err(corrupt(&path, "value offsets out of order"));
            }
            keys.push(key);
            offsets.push(offset);
        }

        if offsets[0] as u64 != payload_start {
            return Err(corrupt(&path, "first value offset disagrees with key count"));
        }
        if keys[0] != min_key || *keys.last().expect("non-empty") != max_key {
            return Err(corrupt(&path, "header key range disagrees with index"));
        }

        Ok(Self {
            path,
            id,
            timestamp,
            min_key,
            max_key,
            file_size,
            bloom,
            keys,
            offsets,
        })
    }

    /// Point lookup.
    ///
    /// Returns `Ok(None)` when the key falls outside the table's range,
    /// the bloom filter rejects it, or the binary search misses. The bytes
    /// returned are raw — a tombstone comes back verbatim for the engine
    /// to interpret.
    pub fn get(&self, key: u64) -> Result<Option<Vec<u8>>, TableError> {
        if key < self.min_key || key > self.max_key || !self.bloom.may_contain(key) {
            return Ok(None);
        }
        match self.keys.binary_search(&key) {
            Ok(idx) => self.value_at(idx).map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Reads the value at index position `idx`.
    pub fn value_at(&self, idx: usize) -> Result<Vec<u8>, TableError> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.offsets[idx] as u64))?;
        let mut buf = vec![0u8; self.value_len(idx) as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads every value with a single sequential pass over the file.
    /// Compaction uses this to amortize the read cost across all entries.
    pub fn read_all_values(&self) -> Result<Vec<Vec<u8>>, TableError> {
        let mut r = BufReader::new(File::open(&self.path)?);
        r.seek(SeekFrom::Start(self.offsets[0] as u64))?;

        let mut values = Vec::with_capacity(self.keys.len());
        for idx in 0..self.keys.len() {
            let mut buf = vec![0u8; self.value_len(idx) as usize];
            r.read_exact(&mut buf)?;
            values.push(buf);
        }
        Ok(values)
    }

    /// A copy of this handle pointing at `path`; used when compaction moves
    /// the backing file into a deeper level directory. Content, timestamp,
    /// and id are unchanged.
    #[must_use]
    pub fn relocated(&self, path: PathBuf) -> SsTable {
        SsTable {
            path,
            id: self.id,
            timestamp: self.timestamp,
            min_key: self.min_key,
            max_key: self.max_key,
            file_size: self.file_size,
            bloom: self.bloom.clone(),
            keys: self.keys.clone(),
            offsets: self.offsets.clone(),
        }
    }

    /// `true` iff `key` lies within `[min_key, max_key]`.
    #[must_use]
    pub fn contains(&self, key: u64) -> bool {
        self.min_key <= key && key <= self.max_key
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    #[must_use]
    pub fn min_key(&self) -> u64 {
        self.min_key
    }

    #[must_use]
    pub fn max_key(&self) -> u64 {
        self.max_key
    }

    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The sorted key index.
    #[must_use]
    pub fn keys(&self) -> &[u64] {
        &self.keys
    }

    #[must_use]
    pub fn num_keys(&self) -> usize {
        self.keys.len()
    }

    fn value_len(&self, idx: usize) -> u64 {
        match self.offsets.get(idx + 1) {
            Some(&next) => (next - self.offsets[idx]) as u64,
            None => self.file_size - self.offsets[idx] as u64,
        }
    }
}

impl std::fmt::Debug for SsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsTable")
            .field("id", &self.id)
            .field("timestamp", &self.timestamp)
            .field("keys", &self.keys.len())
            .field("range", &(self.min_key..=self.max_key))
            .field("file_size", &self.file_size)
            .field("path", &self.path)
            .finish()
    }
}

fn corrupt(path: &Path, reason: &str) -> TableError {
    TableError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn table_id(path: &Path) -> Option<u64> {
    path.file_stem()?.to_str()?.parse().ok()
}
