use std::mem::size_of;

use crate::bucket::Bucket;
use crate::digest::{digest, Digest, DIGEST_SIZE};
use crate::record::Record;
use crate::{Stats, StoreOutcome};

/// Slots per index node, one per nibble value.
pub(crate) const FANOUT: usize = 16;

/// Chain-length knobs, copied down the descent.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tuning {
  pub(crate) max_buckets: usize,
  pub(crate) reindex_scatter: usize,
}

/// A non-empty slot holds either a deeper index or the head of a bucket
/// chain, never both.
#[derive(Debug, Clone)]
pub(crate) enum Tag {
  Index(Box<Index>),
  Chain(Box<Bucket>),
}

/// Fan-out-16 branching node. Created at root initialization or by a
/// reindex; never destroyed except through clear/teardown.
#[derive(Debug, Clone, Default)]
pub(crate) struct Index {
  pub(crate) slots: [Option<Tag>; FANOUT],
}

impl Index {
  fn fresh(stats: &mut Stats) -> Box<Index> {
    stats.index_size += size_of::<Index>();
    Box::new(Index::default())
  }

  /// Locates the bucket for `key` under this node, or proves absence.
  pub(crate) fn find(&self, digest: &Digest, depth: usize, key: &[u8]) -> Option<&Bucket> {
    match &self.slots[digest[depth] as usize] {
      None => None,
      Some(Tag::Index(child)) => child.find(digest, depth + 1, key),
      Some(Tag::Chain(head)) => head.find(key),
    }
  }

  /// Places `key`/`content`, promoting a saturated chain into a deeper
  /// index first when a digest nibble remains below this level.
  pub(crate) fn store(
    &mut self,
    digest: &Digest,
    depth: usize,
    key: &[u8],
    content: &[u8],
    flags: u8,
    tuning: Tuning,
    stats: &mut Stats,
  ) -> StoreOutcome {
    let slot = &mut self.slots[digest[depth] as usize];
    match slot {
      None => {
        *slot = Some(Tag::Chain(new_bucket(key, content, flags, stats)));
        StoreOutcome::Added
      }
      Some(Tag::Index(child)) => child.store(digest, depth + 1, key, content, flags, tuning, stats),
      Some(Tag::Chain(_)) => {
        let Some(Tag::Chain(head)) = slot.take() else { unreachable!() };
        let mut chain = Some(head);

        // 1. Existing key: swap in a fresh record, keep the bucket.
        if let Some(bucket) = Bucket::find_mut(&mut chain, key) {
          stats.data_size -= bucket.record.len();
          bucket.record = Record::pack(key, content);
          stats.data_size += bucket.record.len();
          bucket.flags = flags;
          reattach(slot, chain);
          return StoreOutcome::Replaced;
        }

        // 2. New key on a saturated chain: reindex, then retry placement in
        // the deepened subtree.
        let saturated = chain.as_ref().is_some_and(|head| head.chain_len() >= tuning.max_buckets);
        if saturated && depth + 1 < DIGEST_SIZE {
          let mut child = Index::fresh(stats);
          let mut cursor = chain;
          while let Some(mut bucket) = cursor {
            cursor = bucket.next.take();
            child.adopt(bucket, depth + 1, tuning, stats);
          }
          let outcome = child.store(digest, depth + 1, key, content, flags, tuning, stats);
          *slot = Some(Tag::Index(child));
          return outcome;
        }

        // 3. Room left (or deepest level): head insertion.
        let mut bucket = new_bucket(key, content, flags, stats);
        bucket.next = chain;
        *slot = Some(Tag::Chain(bucket));
        StoreOutcome::Added
      }
    }
  }

  /// Redistributes one bucket during a reindex, one level below the slot
  /// being split. Sub-chains formed here are only split further once they
  /// reach the widened `max_buckets + reindex_scatter` threshold, which
  /// keeps clustered digests from re-splitting in a loop.
  fn adopt(&mut self, bucket: Box<Bucket>, depth: usize, tuning: Tuning, stats: &mut Stats) {
    let path = digest(bucket.record.key());
    self.adopt_at(bucket, &path, depth, tuning, stats);
  }

  fn adopt_at(
    &mut self,
    mut bucket: Box<Bucket>,
    path: &Digest,
    depth: usize,
    tuning: Tuning,
    stats: &mut Stats,
  ) {
    let slot = &mut self.slots[path[depth] as usize];
    match slot {
      None => *slot = Some(Tag::Chain(bucket)),
      Some(Tag::Index(child)) => child.adopt_at(bucket, path, depth + 1, tuning, stats),
      Some(Tag::Chain(_)) => {
        let Some(Tag::Chain(head)) = slot.take() else { unreachable!() };
        let widened = tuning.max_buckets + tuning.reindex_scatter;
        if head.chain_len() >= widened && depth + 1 < DIGEST_SIZE {
          let mut child = Index::fresh(stats);
          let mut cursor = Some(head);
          while let Some(mut b) = cursor {
            cursor = b.next.take();
            child.adopt(b, depth + 1, tuning, stats);
          }
          child.adopt_at(bucket, path, depth + 1, tuning, stats);
          *slot = Some(Tag::Index(child));
        } else {
          bucket.next = Some(head);
          *slot = Some(Tag::Chain(bucket));
        }
      }
    }
  }

  /// Unlinks and releases the bucket for `key`. An emptied slot is cleared;
  /// the index itself is never contracted.
  pub(crate) fn remove(&mut self, digest: &Digest, depth: usize, key: &[u8], stats: &mut Stats) -> bool {
    let slot = &mut self.slots[digest[depth] as usize];
    match slot {
      None => false,
      Some(Tag::Index(child)) => child.remove(digest, depth + 1, key, stats),
      Some(Tag::Chain(_)) => {
        let Some(Tag::Chain(head)) = slot.take() else { unreachable!() };
        let mut chain = Some(head);
        let removed = Bucket::unlink(&mut chain, key);
        reattach(slot, chain);
        match removed {
          Some(bucket) => {
            stats.num_keys -= 1;
            stats.meta_size -= size_of::<Bucket>();
            stats.data_size -= bucket.record.len();
            true
          }
          None => false,
        }
      }
    }
  }

  /// In-order walk: slots ascending, chains in link order. While `armed` is
  /// unset the walk follows `path` to the entry whose key equals `prev` and
  /// arms itself there; once armed, the next bucket visited is the answer.
  pub(crate) fn next_entry<'a>(
    &'a self,
    path: &Digest,
    depth: usize,
    prev: Option<&[u8]>,
    armed: &mut bool,
  ) -> Option<&'a Bucket> {
    let start = if *armed { 0 } else { path[depth] as usize };
    for slot in &self.slots[start..] {
      match slot {
        None => {}
        Some(Tag::Index(child)) => {
          if let Some(found) = child.next_entry(path, depth + 1, prev, armed) {
            return Some(found);
          }
        }
        Some(Tag::Chain(head)) => {
          let mut cursor = Some(head.as_ref());
          while let Some(bucket) = cursor {
            if *armed {
              return Some(bucket);
            }
            if prev.is_some_and(|p| bucket.record.key() == p) {
              *armed = true;
            }
            cursor = bucket.next.as_deref();
          }
        }
      }
    }
    None
  }
}

impl Tag {
  /// Subtracts this subtree's footprint from the stats before it is dropped.
  pub(crate) fn retire(&self, stats: &mut Stats) {
    match self {
      Tag::Index(index) => {
        stats.index_size -= size_of::<Index>();
        for slot in index.slots.iter().flatten() {
          slot.retire(stats);
        }
      }
      Tag::Chain(head) => {
        let mut cursor = Some(head.as_ref());
        while let Some(bucket) = cursor {
          stats.num_keys -= 1;
          stats.meta_size -= size_of::<Bucket>();
          stats.data_size -= bucket.record.len();
          cursor = bucket.next.as_deref();
        }
      }
    }
  }
}

fn new_bucket(key: &[u8], content: &[u8], flags: u8, stats: &mut Stats) -> Box<Bucket> {
  let bucket = Bucket::boxed(key, content, flags);
  stats.num_keys += 1;
  stats.meta_size += size_of::<Bucket>();
  stats.data_size += bucket.record.len();
  bucket
}

fn reattach(slot: &mut Option<Tag>, chain: Option<Box<Bucket>>) {
  if let Some(head) = chain {
    *slot = Some(Tag::Chain(head));
  }
}
