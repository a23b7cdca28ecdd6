use crate::record::Record;

/// One stored entry: header plus packed record, linked into a per-slot
/// collision chain.
#[derive(Debug, Clone)]
pub(crate) struct Bucket {
  pub(crate) flags: u8,
  pub(crate) record: Record,
  pub(crate) next: Option<Box<Bucket>>,
}

impl Bucket {
  pub(crate) fn boxed(key: &[u8], content: &[u8], flags: u8) -> Box<Bucket> {
    Box::new(Bucket {
      flags,
      record: Record::pack(key, content),
      next: None,
    })
  }

  /// Walks the chain starting at this bucket; first key match wins.
  pub(crate) fn find(&self, key: &[u8]) -> Option<&Bucket> {
    let mut cursor = Some(self);
    while let Some(bucket) = cursor {
      if bucket.record.key() == key {
        return Some(bucket);
      }
      cursor = bucket.next.as_deref();
    }
    None
  }

  /// Chain length from this bucket to the tail, walked on demand.
  pub(crate) fn chain_len(&self) -> usize {
    let mut count = 0;
    let mut cursor = Some(self);
    while let Some(bucket) = cursor {
      count += 1;
      cursor = bucket.next.as_deref();
    }
    count
  }

  /// Mutable key lookup over an owned chain.
  pub(crate) fn find_mut<'a>(chain: &'a mut Option<Box<Bucket>>, key: &[u8]) -> Option<&'a mut Bucket> {
    let mut cursor = chain;
    while cursor.as_ref().is_some_and(|b| b.record.key() != key) {
      cursor = &mut cursor.as_mut().unwrap().next;
    }
    cursor.as_deref_mut()
  }

  /// Unlinks the bucket with `key`, preserving the remainder of the chain.
  pub(crate) fn unlink(chain: &mut Option<Box<Bucket>>, key: &[u8]) -> Option<Box<Bucket>> {
    let mut cursor = chain;
    while cursor.as_ref().is_some_and(|b| b.record.key() != key) {
      cursor = &mut cursor.as_mut().unwrap().next;
    }
    let mut removed = cursor.take()?;
    *cursor = removed.next.take();
    Some(removed)
  }
}

// Chains at the deepest trie level are unbounded, so teardown must not
// recurse per link.
impl Drop for Bucket {
  fn drop(&mut self) {
    let mut next = self.next.take();
    while let Some(mut bucket) = next {
      next = bucket.next.take();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn chain_of(keys: &[&[u8]]) -> Option<Box<Bucket>> {
    // Head insertion, so the chain reads in reverse key order.
    let mut chain = None;
    for key in keys {
      let mut bucket = Bucket::boxed(key, b"v", 0);
      bucket.next = chain;
      chain = Some(bucket);
    }
    chain
  }

  #[test]
  fn find_walks_links() {
    let chain = chain_of(&[b"a" as &[u8], b"b", b"c"]).unwrap();
    assert_eq!(chain.find(b"a").unwrap().record.key(), b"a");
    assert_eq!(chain.find(b"c").unwrap().record.key(), b"c");
    assert!(chain.find(b"d").is_none());
    assert_eq!(chain.chain_len(), 3);
  }

  #[test]
  fn unlink_head_middle_tail() {
    let mut chain = chain_of(&[b"a" as &[u8], b"b", b"c"]);

    let removed = Bucket::unlink(&mut chain, b"b").unwrap();
    assert_eq!(removed.record.key(), b"b");
    assert!(removed.next.is_none());
    assert_eq!(chain.as_ref().unwrap().chain_len(), 2);

    assert!(Bucket::unlink(&mut chain, b"c").is_some());
    assert!(Bucket::unlink(&mut chain, b"missing").is_none());
    assert!(Bucket::unlink(&mut chain, b"a").is_some());
    assert!(chain.is_none());
  }

  #[test]
  fn find_mut_allows_in_place_replace() {
    let mut chain = chain_of(&[b"x" as &[u8], b"y"]);
    let bucket = Bucket::find_mut(&mut chain, b"x").unwrap();
    bucket.record = Record::pack(b"x", b"new");
    bucket.flags = 9;

    let bucket = chain.as_ref().unwrap().find(b"x").unwrap();
    assert_eq!(bucket.record.content(), b"new");
    assert_eq!(bucket.flags, 9);
  }

  #[test]
  fn long_chain_drop_does_not_recurse() {
    let keys: Vec<Vec<u8>> = (0u32..200_000).map(|i| i.to_ne_bytes().to_vec()).collect();
    let refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
    let chain = chain_of(&refs);
    drop(chain);
  }
}
