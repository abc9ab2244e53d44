//! # Memtable — skip-list write buffer
//!
//! An ordered in-memory buffer that absorbs every write before it reaches
//! disk. Entries live in a probabilistic skip list: the bottom level is a
//! sorted singly-linked list holding every entry, and each higher level is a
//! sparse express lane over the level below. A companion bloom filter
//! mirrors membership so lookups for never-written keys skip the descent.
//!
//! The memtable also tracks the **projected table size**: the exact byte
//! size of the on-disk table a flush would produce right now
//! (`header + filter + index + values`). A put that would push this past
//! [`MAX_TABLE_SIZE`] is rejected with [`PutOutcome::Full`] and leaves the
//! memtable untouched; the engine flushes, resets, and retries.
//!
//! Deletions at the store level are ordinary puts of the [`TOMBSTONE`]
//! literal, so they flow through the same size accounting and are visible
//! through the filter.

use bloom::BloomFilter;
use rand::Rng;

/// Size in bytes of the fixed table header (timestamp, key count, min key,
/// max key — four u64 fields).
pub const HEADER_SIZE: u64 = 32;

/// Bytes each key adds to the table index (u64 key + u32 value offset).
pub const INDEX_ENTRY_SIZE: u64 = 12;

/// Hard cap on the size of any table file produced by a flush or a merge.
pub const MAX_TABLE_SIZE: u64 = 1 << 21;

/// Reserved value encoding a logical deletion. Stored and flushed like any
/// other value; the engine translates it on the read path.
pub const TOMBSTONE: &[u8] = b"~DELETED~";

/// Projected size of a table holding zero entries.
const BASE_TABLE_SIZE: u64 = HEADER_SIZE + bloom::FILTER_BYTES as u64;

/// Tallest tower a node can receive.
const MAX_HEIGHT: usize = 12;

/// Result of a [`Memtable::put`].
#[derive(Debug, PartialEq, Eq)]
pub enum PutOutcome {
    /// The write was applied.
    Accepted,
    /// Applying the write would push the projected table size past
    /// [`MAX_TABLE_SIZE`]. Nothing was modified; the value is handed back
    /// so the caller can flush the memtable and retry.
    Full(Vec<u8>),
}

/// One skip-list entry with its full tower of forward links.
///
/// `next.len()` is the node's height; `next[0]` is the bottom-level
/// successor. Links are arena indices into [`Memtable::nodes`].
struct Node {
    key: u64,
    value: Vec<u8>,
    next: Vec<Option<usize>>,
}

/// The skip-list memtable.
///
/// Nodes are arena-allocated: links are indices into `nodes`, so the
/// structure needs no unsafe code and no reference counting. Slots of
/// deleted entries become unreachable and are reclaimed wholesale by
/// [`reset`](Memtable::reset), which the engine calls after every flush.
pub struct Memtable {
    nodes: Vec<Node>,
    /// Forward pointers out of the head sentinel, one per level.
    /// `head.len()` is the current list height.
    head: Vec<Option<usize>>,
    /// Number of live entries, tombstones included.
    len: usize,
    /// Projected on-disk size of a flush of the current contents.
    file_size: u64,
    bloom: BloomFilter,
}

impl Memtable {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            head: vec![None],
            len: 0,
            file_size: BASE_TABLE_SIZE,
            bloom: BloomFilter::new(),
        }
    }

    /// Number of entries, counting tombstones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Exact byte size of the table a flush would produce right now.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// The companion membership filter.
    #[must_use]
    pub fn bloom(&self) -> &BloomFilter {
        &self.bloom
    }

    /// Looks up a key. Tombstone values are returned verbatim; callers
    /// decide what a deletion means.
    #[must_use]
    pub fn get(&self, key: u64) -> Option<&[u8]> {
        if !self.bloom.may_contain(key) {
            return None;
        }
        self.locate(key, None)
            .map(|idx| self.nodes[idx].value.as_slice())
    }

    /// Inserts or updates a key.
    ///
    /// Updates replace the value in place and adjust the projected size by
    /// the length difference; inserts charge one index entry plus the value
    /// length. Either way the filter records the key, so tombstone puts
    /// stay visible through it. If the projected size would exceed
    /// [`MAX_TABLE_SIZE`] the memtable is left untouched and the value is
    /// returned in [`PutOutcome::Full`].
    pub fn put(&mut self, key: u64, value: Vec<u8>) -> PutOutcome {
        let mut preds = vec![None; self.head.len()];
        let found = self.locate(key, Some(&mut preds));

        if let Some(idx) = found {
            let old_len = self.nodes[idx].value.len() as u64;
            let projected = self.file_size - old_len + value.len() as u64;
            if projected > MAX_TABLE_SIZE {
                return PutOutcome::Full(value);
            }
            self.bloom.insert(key);
            self.file_size = projected;
            self.nodes[idx].value = value;
            return PutOutcome::Accepted;
        }

        let delta = INDEX_ENTRY_SIZE + value.len() as u64;
        if self.file_size + delta > MAX_TABLE_SIZE {
            return PutOutcome::Full(value);
        }
        self.bloom.insert(key);
        self.file_size += delta;
        self.len += 1;

        let height = random_height();
        while self.head.len() < height {
            self.head.push(None);
            preds.push(None);
        }

        let idx = self.nodes.len();
        let mut next = Vec::with_capacity(height);
        for level in 0..height {
            next.push(match preds[level] {
                Some(p) => self.nodes[p].next[level],
                None => self.head[level],
            });
        }
        self.nodes.push(Node { key, value, next });
        for level in 0..height {
            match preds[level] {
                Some(p) => self.nodes[p].next[level] = Some(idx),
                None => self.head[level] = Some(idx),
            }
        }
        PutOutcome::Accepted
    }

    /// Physically removes a key from the list.
    ///
    /// Returns `true` iff the key was present with a live (non-tombstone)
    /// value. A key whose current value is the tombstone literal is left in
    /// place and reported as absent. The store-level delete does not use
    /// this; it writes tombstones through [`put`](Memtable::put) instead.
    pub fn del(&mut self, key: u64) -> bool {
        let mut preds = vec![None; self.head.len()];
        let idx = match self.locate(key, Some(&mut preds)) {
            Some(idx) => idx,
            None => return false,
        };
        if self.nodes[idx].value == TOMBSTONE {
            return false;
        }

        self.file_size -= INDEX_ENTRY_SIZE + self.nodes[idx].value.len() as u64;
        self.len -= 1;

        for level in 0..self.nodes[idx].next.len() {
            let successor = self.nodes[idx].next[level];
            match preds[level] {
                Some(p) => self.nodes[p].next[level] = successor,
                None => self.head[level] = successor,
            }
        }
        // Free the payload now; the arena slot itself waits for reset.
        self.nodes[idx].value = Vec::new();

        while self.head.len() > 1 && self.head.last() == Some(&None) {
            self.head.pop();
        }
        true
    }

    /// Drops every entry and returns the projected size to the empty-table
    /// baseline.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.head.clear();
        self.head.push(None);
        self.len = 0;
        self.file_size = BASE_TABLE_SIZE;
        self.bloom.reset();
    }

    /// Iterates entries in ascending key order, tombstones included.
    pub fn iter(&self) -> Entries<'_> {
        Entries {
            mem: self,
            cur: self.head[0],
        }
    }

    /// Descends the list looking for `key`.
    ///
    /// When `preds` is supplied it is filled with, per level, the last node
    /// whose key is strictly below `key` (`None` meaning the head
    /// sentinel). Returns the arena index of the matching node, if any.
    fn locate(&self, key: u64, mut preds: Option<&mut Vec<Option<usize>>>) -> Option<usize> {
        let mut pred: Option<usize> = None;
        for level in (0..self.head.len()).rev() {
            loop {
                let next = match pred {
                    Some(i) => self.nodes[i].next[level],
                    None => self.head[level],
                };
                match next {
                    Some(n) if self.nodes[n].key < key => pred = Some(n),
                    _ => break,
                }
            }
            if let Some(p) = preds.as_deref_mut() {
                p[level] = pred;
            }
        }

        let candidate = match pred {
            Some(i) => self.nodes[i].next[0],
            None => self.head[0],
        };
        candidate.filter(|&n| self.nodes[n].key == key)
    }
}

impl Default for Memtable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memtable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memtable")
            .field("len", &self.len)
            .field("file_size", &self.file_size)
            .field("height", &self.head.len())
            .finish()
    }
}

/// Sorted iterator over the bottom level.
pub struct Entries<'a> {
    mem: &'a Memtable,
    cur: Option<usize>,
}

impl<'a> Iterator for Entries<'a> {
    type Item = (u64, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cur?;
        let node = &self.mem.nodes[idx];
        self.cur = node.next[0];
        Some((node.key, node.value.as_slice()))
    }
}

/// One fair coin flip per extra level, capped.
fn random_height() -> usize {
    let mut rng = rand::thread_rng();
    let mut height = 1;
    while height < MAX_HEIGHT && rng.gen::<bool>() {
        height += 1;
    }
    height
}
