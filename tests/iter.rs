use hashtrie::HashTrie;
use std::collections::HashSet;

// Drives the first/next protocol to exhaustion, copying keys out since the
// borrow ends at each call.
fn protocol_keys(trie: &HashTrie) -> Vec<Vec<u8>> {
  let mut keys = Vec::new();
  let mut cursor = trie.first_key().map(<[u8]>::to_vec);
  while let Some(key) = cursor {
    cursor = trie.next_key(&key).map(<[u8]>::to_vec);
    keys.push(key);
  }
  keys
}

#[test]
fn test_empty_table() {
  let trie = HashTrie::new();
  assert!(trie.first_key().is_none());
  assert!(trie.next_key("anything").is_none());
  assert_eq!(trie.iter().count(), 0);
}

#[test]
fn test_single_entry() {
  let mut trie = HashTrie::new();
  trie.store("only", "v", 0).unwrap();

  assert_eq!(trie.first_key().unwrap(), b"only");
  assert!(trie.next_key("only").is_none());
}

#[test]
fn test_visits_every_key_exactly_once() {
  let mut trie = HashTrie::new();
  for key in ["a", "b", "c", "d", "e"] {
    trie.store(key, key, 0).unwrap();
  }

  let keys = protocol_keys(&trie);
  assert_eq!(keys.len(), 5);

  let unique: HashSet<_> = keys.iter().collect();
  assert_eq!(unique.len(), 5, "duplicate visit in {keys:?}");

  let expected: HashSet<Vec<u8>> =
    ["a", "b", "c", "d", "e"].iter().map(|k| k.as_bytes().to_vec()).collect();
  assert_eq!(keys.iter().cloned().collect::<HashSet<_>>(), expected);
}

#[test]
fn test_protocol_matches_iterator() {
  let mut trie = HashTrie::with_max_buckets(2);
  for i in 0..300u32 {
    trie.store(i.to_ne_bytes(), "v", 0).unwrap();
  }

  let via_protocol = protocol_keys(&trie);
  let via_iter: Vec<Vec<u8>> = trie.iter().map(|(k, _)| k.to_vec()).collect();
  assert_eq!(via_protocol, via_iter);
}

#[test]
fn test_next_key_of_absent_key_ends_iteration() {
  let mut trie = HashTrie::new();
  trie.store("present", "v", 0).unwrap();
  assert!(trie.next_key("absent").is_none());
}

#[test]
fn test_iteration_covers_deep_chains() {
  // Full-digest collisions force a depth-8 chain; the walk must still visit
  // every bucket in link order.
  let family: Vec<[u8; 2]> = (0..6u8).map(|i| [10 + i, 233 - 33 * i]).collect();
  let mut trie = HashTrie::with_max_buckets(2);
  for key in &family {
    trie.store(key, "v", 0).unwrap();
  }

  let keys = protocol_keys(&trie);
  assert_eq!(keys.len(), family.len());
  let unique: HashSet<_> = keys.iter().collect();
  assert_eq!(unique.len(), family.len());
}

#[test]
fn test_iterator_yields_entries() {
  let mut trie = HashTrie::new();
  trie.store("k1", "v1", 4).unwrap();
  trie.store("k2", "v2", 5).unwrap();

  let mut seen: Vec<(Vec<u8>, u8, Vec<u8>)> = trie
    .iter()
    .map(|(k, e)| (k.to_vec(), e.flags, e.content.to_vec()))
    .collect();
  seen.sort();

  assert_eq!(
    seen,
    vec![
      (b"k1".to_vec(), 4, b"v1".to_vec()),
      (b"k2".to_vec(), 5, b"v2".to_vec()),
    ]
  );
}

#[test]
fn test_into_iterator_for_ref() {
  let mut trie = HashTrie::new();
  trie.store("x", "y", 0).unwrap();

  let mut count = 0;
  for (key, entry) in &trie {
    assert_eq!(key, b"x");
    assert_eq!(entry.content, b"y");
    count += 1;
  }
  assert_eq!(count, 1);
}

#[test]
fn test_iteration_spans_mixed_depths() {
  // A mix of shallow slots and promoted subtrees in one table.
  let mut trie = HashTrie::with_max_buckets(2);
  for i in 0..64u32 {
    trie.store(i.to_ne_bytes(), i.to_ne_bytes(), 0).unwrap();
  }

  let keys = protocol_keys(&trie);
  assert_eq!(keys.len(), 64);
  let unique: HashSet<_> = keys.iter().collect();
  assert_eq!(unique.len(), 64);
}
