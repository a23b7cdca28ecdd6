mod bucket;
mod digest;
mod node;
mod record;

use std::mem::size_of;

use bucket::Bucket;
use node::{Index, Tag, Tuning, FANOUT};
use thiserror::Error;

pub use digest::{digest, DIGEST_SIZE};
pub use record::{MAX_CONTENT_LEN, MAX_KEY_LEN};

const DEFAULT_MAX_BUCKETS: usize = 16;
const DEFAULT_REINDEX_SCATTER: usize = 1;

/// Live memory accounting, updated on every allocation and release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
  /// Number of stored keys.
  pub num_keys: usize,
  /// Bytes of index nodes currently live.
  pub index_size: usize,
  /// Bytes of bucket headers currently live.
  pub meta_size: usize,
  /// Bytes of packed record regions currently live.
  pub data_size: usize,
}

/// Outcome of a successful [`HashTrie::store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
  /// The key was new.
  Added,
  /// The key existed; its value and flags were overwritten.
  Replaced,
}

/// The only constructible store failures: inputs that do not fit the packed
/// record's length prefixes. The table is left untouched on error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
  #[error("key length {0} exceeds the 2-byte length field")]
  KeyTooLong(usize),
  #[error("content length {0} exceeds the 4-byte length field")]
  ContentTooLong(usize),
}

/// A fetched entry: the stored flags byte plus a borrow into the packed
/// record. The borrow is tied to the table and ends at the next mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<'a> {
  pub flags: u8,
  pub content: &'a [u8],
}

/// In-memory byte-string store: a digit-trie of fan-out-16 index nodes over
/// an 8-nibble key digest, with linear bucket chains at the leaves. Chains
/// that outgrow `max_buckets` are promoted into deeper index nodes, so the
/// trie deepens exactly where keys concentrate and no global rehash ever
/// runs.
///
/// Keys and values are arbitrary byte strings, copied on store into a single
/// packed allocation per entry. Iteration order is digest-driven, not
/// lexicographic.
///
/// The structure is single-threaded: concurrent callers need external
/// synchronization, including read-only ones, since no memory ordering is
/// defined at this layer.
#[derive(Debug, Clone)]
pub struct HashTrie {
  root: Index,
  stats: Stats,
  max_buckets: usize,
  reindex_scatter: usize,
}

impl Default for HashTrie {
  fn default() -> Self {
    Self::new()
  }
}

impl HashTrie {
  pub fn new() -> Self {
    Self::with_tuning(DEFAULT_MAX_BUCKETS, DEFAULT_REINDEX_SCATTER)
  }

  /// Creates a table with a custom chain-length threshold.
  ///
  /// Smaller thresholds split chains into deeper index nodes sooner, trading
  /// index memory for shorter probes. Larger thresholds keep the trie
  /// shallow and lean on linear chain walks.
  pub fn with_max_buckets(max_buckets: usize) -> Self {
    Self::with_tuning(max_buckets, DEFAULT_REINDEX_SCATTER)
  }

  /// Creates a table with explicit `max_buckets` and `reindex_scatter`
  /// knobs. Both are clamped to at least 1; `reindex_scatter` falls back to
  /// 1 when the combined threshold would exceed 256.
  pub fn with_tuning(max_buckets: usize, reindex_scatter: usize) -> Self {
    let max_buckets = max_buckets.max(1);
    let mut reindex_scatter = reindex_scatter.max(1);
    if max_buckets + reindex_scatter > 256 {
      reindex_scatter = 1;
    }

    HashTrie {
      root: Index::default(),
      stats: Stats {
        index_size: size_of::<Index>(),
        ..Stats::default()
      },
      max_buckets,
      reindex_scatter,
    }
  }

  /// Stores a key/value pair, replacing any previous value for the key.
  ///
  /// Returns [`StoreOutcome::Added`] for a new key, [`StoreOutcome::Replaced`]
  /// when an existing value was overwritten. Fails only when `key` or
  /// `content` exceed the packed record's length fields, in which case the
  /// table is unchanged.
  pub fn store<K, C>(&mut self, key: K, content: C, flags: u8) -> Result<StoreOutcome, StoreError>
  where
    K: AsRef<[u8]>,
    C: AsRef<[u8]>,
  {
    let key = key.as_ref();
    let content = content.as_ref();
    if key.len() > MAX_KEY_LEN {
      return Err(StoreError::KeyTooLong(key.len()));
    }
    if content.len() > MAX_CONTENT_LEN {
      return Err(StoreError::ContentTooLong(content.len()));
    }

    let path = digest(key);
    let tuning = Tuning {
      max_buckets: self.max_buckets,
      reindex_scatter: self.reindex_scatter,
    };
    Ok(self.root.store(&path, 0, key, content, flags, tuning, &mut self.stats))
  }

  /// Looks up a key, returning a borrowed view of the stored value.
  pub fn fetch<K: AsRef<[u8]>>(&self, key: K) -> Option<Entry<'_>> {
    let key = key.as_ref();
    let path = digest(key);
    self.root.find(&path, 0, key).map(|bucket| Entry {
      flags: bucket.flags,
      content: bucket.record.content(),
    })
  }

  /// Removes a key. Returns false when the key is not present. An emptied
  /// slot is cleared, but index nodes are never contracted.
  pub fn remove<K: AsRef<[u8]>>(&mut self, key: K) -> bool {
    let key = key.as_ref();
    let path = digest(key);
    self.root.remove(&path, 0, key, &mut self.stats)
  }

  /// Key of the first entry in traversal order (index slots ascending,
  /// chains in link order), or `None` on an empty table.
  pub fn first_key(&self) -> Option<&[u8]> {
    let mut armed = true;
    self
      .root
      .next_entry(&[0; DIGEST_SIZE], 0, None, &mut armed)
      .map(|bucket| bucket.record.key())
  }

  /// Key of the entry immediately after `prev` in traversal order.
  ///
  /// Returns `None` at the end of the traversal, and also when `prev` is no
  /// longer stored: the resume point is found by re-descending along the
  /// previous key's digest, so any mutation between calls invalidates it.
  pub fn next_key<K: AsRef<[u8]>>(&self, prev: K) -> Option<&[u8]> {
    let prev = prev.as_ref();
    let path = digest(prev);
    let mut armed = false;
    self
      .root
      .next_entry(&path, 0, Some(prev), &mut armed)
      .map(|bucket| bucket.record.key())
  }

  /// Iterates all entries in the same traversal order as
  /// [`first_key`](Self::first_key)/[`next_key`](Self::next_key).
  pub fn iter(&self) -> Iter<'_> {
    Iter {
      stack: vec![(&self.root, 0)],
      chain: None,
    }
  }

  pub fn len(&self) -> usize {
    self.stats.num_keys
  }

  pub fn is_empty(&self) -> bool {
    self.stats.num_keys == 0
  }

  /// Snapshot of the live memory counters.
  pub fn stats(&self) -> Stats {
    self.stats
  }

  /// Releases every entry and index node and starts over from a fresh root.
  pub fn clear(&mut self) {
    self.root = Index::default();
    self.stats = Stats {
      index_size: size_of::<Index>(),
      ..Stats::default()
    };
  }

  /// Releases only the subtree under root slot `slice` (a top digest
  /// nibble), leaving the other fifteen slices intact. Useful when the top
  /// nibble doubles as a coarse manual shard.
  ///
  /// # Panics
  ///
  /// Panics when `slice` is not a nibble value (`0..16`).
  pub fn clear_slice(&mut self, slice: u8) {
    assert!((slice as usize) < FANOUT, "slice {slice} is not a nibble");
    if let Some(tag) = self.root.slots[slice as usize].take() {
      tag.retire(&mut self.stats);
    }
  }
}

// --- TRAVERSAL AS AN ITERATOR ---

/// Depth-first walk over the trie with an explicit descent stack. Yields
/// `(key, entry)` borrows in the same order the first/next protocol visits
/// them.
pub struct Iter<'a> {
  stack: Vec<(&'a Index, usize)>,
  chain: Option<&'a Bucket>,
}

impl<'a> Iterator for Iter<'a> {
  type Item = (&'a [u8], Entry<'a>);

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      if let Some(bucket) = self.chain {
        self.chain = bucket.next.as_deref();
        return Some((
          bucket.record.key(),
          Entry {
            flags: bucket.flags,
            content: bucket.record.content(),
          },
        ));
      }

      let frame = self.stack.last_mut()?;
      let index: &'a Index = frame.0;
      let cursor = frame.1;
      if cursor == FANOUT {
        self.stack.pop();
        continue;
      }
      frame.1 += 1;

      match &index.slots[cursor] {
        None => {}
        Some(Tag::Index(child)) => self.stack.push((child.as_ref(), 0)),
        Some(Tag::Chain(head)) => self.chain = Some(head.as_ref()),
      }
    }
  }
}

impl<'a> IntoIterator for &'a HashTrie {
  type Item = (&'a [u8], Entry<'a>);
  type IntoIter = Iter<'a>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

// --- RUST TRAITS ---

impl<K: AsRef<[u8]>, C: AsRef<[u8]>> Extend<(K, C)> for HashTrie {
  fn extend<T: IntoIterator<Item = (K, C)>>(&mut self, iter: T) {
    for (key, content) in iter {
      self
        .store(key, content, 0)
        .expect("key or content exceeds the record length fields");
    }
  }
}

impl<K: AsRef<[u8]>, C: AsRef<[u8]>> FromIterator<(K, C)> for HashTrie {
  fn from_iter<T: IntoIterator<Item = (K, C)>>(iter: T) -> Self {
    let mut trie = HashTrie::new();
    trie.extend(iter);
    trie
  }
}

impl<K: AsRef<[u8]>> std::ops::Index<K> for HashTrie {
  type Output = [u8];

  fn index(&self, key: K) -> &Self::Output {
    self.fetch(key).expect("no entry found for key").content
  }
}

// --- EQUALITY ---

// Content equality, independent of tuning and of where reindexing happened
// to place the chains.
impl PartialEq for HashTrie {
  fn eq(&self, other: &Self) -> bool {
    self.len() == other.len()
      && self
        .iter()
        .all(|(key, entry)| other.fetch(key) == Some(entry))
  }
}

impl Eq for HashTrie {}

// --- SERDE ---

#[cfg(feature = "serde")]
mod serde_impls {
  use super::HashTrie;
  use serde::de::Error as _;
  use serde::ser::{SerializeSeq, SerializeStruct};
  use serde::{Deserialize, Deserializer, Serialize, Serializer};

  impl Serialize for HashTrie {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
      let mut state = serializer.serialize_struct("HashTrie", 3)?;
      state.serialize_field("max_buckets", &self.max_buckets)?;
      state.serialize_field("reindex_scatter", &self.reindex_scatter)?;
      state.serialize_field("entries", &Entries(self))?;
      state.end()
    }
  }

  struct Entries<'a>(&'a HashTrie);

  impl Serialize for Entries<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
      let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
      for (key, entry) in self.0.iter() {
        seq.serialize_element(&(key, entry.flags, entry.content))?;
      }
      seq.end()
    }
  }

  #[derive(Deserialize)]
  struct Repr {
    max_buckets: usize,
    reindex_scatter: usize,
    entries: Vec<(Vec<u8>, u8, Vec<u8>)>,
  }

  impl<'de> Deserialize<'de> for HashTrie {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
      // Entries are replayed through store rather than copied structurally,
      // so packed regions and digest placement are rebuilt from scratch.
      let repr = Repr::deserialize(deserializer)?;
      let mut trie = HashTrie::with_tuning(repr.max_buckets, repr.reindex_scatter);
      for (key, flags, content) in repr.entries {
        trie.store(&key, &content, flags).map_err(D::Error::custom)?;
      }
      Ok(trie)
    }
  }
}
