use xxhash_rust::xxh3::xxh3_128;

/// Content hash for input files that arrive without one. Only uniqueness and
/// determinism matter; the value feeds cache keys, never filenames.
pub fn content_hash(input: &str) -> String {
  format!("{:032x}", xxh3_128(input.as_bytes()))
}

#[test]
fn test_content_hash() {
  assert_eq!(content_hash("hello").len(), 32);
  assert_eq!(content_hash("hello"), content_hash("hello"));
  assert_ne!(content_hash("hello"), content_hash("hello\n"));
}
