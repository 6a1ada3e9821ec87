use crate::decode::decode_mappings;
use crate::raw::RawSourceMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
  pub source: Option<String>,
  /// 0-based, like the generated coordinates passed in.
  pub line: u32,
  pub column: u32,
}

/// Maps a generated position back through `map`: the closest token at or
/// before `(line, column)` on that generated line wins.
pub fn original_position_for(
  map: &RawSourceMap,
  line: u32,
  column: u32,
) -> Option<OriginalPosition> {
  let tokens = decode_mappings(&map.mappings).ok()?;
  tokens
    .iter()
    .filter(|token| token.dst_line == line && token.dst_col <= column)
    .max_by_key(|token| token.dst_col)
    .and_then(|token| token.src)
    .map(|src| OriginalPosition {
      source: map.sources.get(src.source_id as usize).cloned(),
      line: src.line,
      column: src.col,
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::builder::SourceMapBuilder;

  #[test]
  fn finds_nearest_preceding_token() {
    let mut builder = SourceMapBuilder::default();
    builder.add_empty_map("orig.js", "a\nb\nc\n", 4);
    let map = builder.into_map();

    let hit = original_position_for(&map, 5, 10).unwrap();
    assert_eq!(hit.source.as_deref(), Some("orig.js"));
    assert_eq!((hit.line, hit.column), (1, 0));
    assert!(original_position_for(&map, 0, 0).is_none());
  }
}
