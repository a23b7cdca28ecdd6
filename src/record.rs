use std::mem::size_of;

/// Width of the key length prefix.
pub(crate) const KLEN_SIZE: usize = size_of::<u16>();
/// Width of the content length prefix.
pub(crate) const CLEN_SIZE: usize = size_of::<u32>();

/// Longest key the record layout can hold.
pub const MAX_KEY_LEN: usize = u16::MAX as usize;
/// Longest content the record layout can hold.
pub const MAX_CONTENT_LEN: usize = u32::MAX as usize;

/// One key/value pair packed into a single byte region:
///
/// ```text
/// [ key length     : 2 bytes, host order ]
/// [ key            : key length bytes    ]
/// [ content length : 4 bytes, host order ]
/// [ content        : content length bytes ]
/// ```
///
/// The single allocation keeps per-entry overhead at one bucket header plus
/// one region, independent of key or value size. Host byte order is fine
/// because records never leave the process.
#[derive(Debug, Clone)]
pub(crate) struct Record(Box<[u8]>);

impl Record {
  /// Copies `key` and `content` into a freshly packed region.
  ///
  /// Lengths must already fit the prefix fields; the public entry point
  /// validates them before any mutation.
  pub(crate) fn pack(key: &[u8], content: &[u8]) -> Record {
    debug_assert!(key.len() <= MAX_KEY_LEN);
    debug_assert!(content.len() <= MAX_CONTENT_LEN);

    let mut buf = Vec::with_capacity(KLEN_SIZE + key.len() + CLEN_SIZE + content.len());
    buf.extend_from_slice(&(key.len() as u16).to_ne_bytes());
    buf.extend_from_slice(key);
    buf.extend_from_slice(&(content.len() as u32).to_ne_bytes());
    buf.extend_from_slice(content);
    Record(buf.into_boxed_slice())
  }

  pub(crate) fn key_len(&self) -> usize {
    u16::from_ne_bytes([self.0[0], self.0[1]]) as usize
  }

  pub(crate) fn key(&self) -> &[u8] {
    &self.0[KLEN_SIZE..KLEN_SIZE + self.key_len()]
  }

  pub(crate) fn content_len(&self) -> usize {
    let at = KLEN_SIZE + self.key_len();
    u32::from_ne_bytes([self.0[at], self.0[at + 1], self.0[at + 2], self.0[at + 3]]) as usize
  }

  pub(crate) fn content(&self) -> &[u8] {
    let start = KLEN_SIZE + self.key_len() + CLEN_SIZE;
    &self.0[start..start + self.content_len()]
  }

  /// Total bytes of the packed region, as accounted in `Stats::data_size`.
  pub(crate) fn len(&self) -> usize {
    self.0.len()
  }
}
