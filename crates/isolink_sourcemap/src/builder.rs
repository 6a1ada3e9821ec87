use rustc_hash::FxHashMap;

use crate::decode::{decode_mappings, encode_mappings, SourcePosition, Token};
use crate::raw::{content_lines, RawSourceMap};

/// Accumulates tokens from heterogeneous inputs (upstream maps folded at a
/// line offset, synthesised straight-line maps) and emits one composed map.
#[derive(Default)]
pub struct SourceMapBuilder {
  sources: Vec<String>,
  sources_content: Vec<Option<String>>,
  source_ids: FxHashMap<String, u32>,
  names: Vec<String>,
  name_ids: FxHashMap<String, u32>,
  tokens: Vec<Token>,
}

impl SourceMapBuilder {
  pub fn add_source(&mut self, source: &str, content: Option<&str>) -> u32 {
    if let Some(&id) = self.source_ids.get(source) {
      if content.is_some() && self.sources_content[id as usize].is_none() {
        self.sources_content[id as usize] = content.map(str::to_string);
      }
      return id;
    }
    let id = u32::try_from(self.sources.len()).unwrap();
    self.sources.push(source.to_string());
    self.sources_content.push(content.map(str::to_string));
    self.source_ids.insert(source.to_string(), id);
    id
  }

  pub fn add_name(&mut self, name: &str) -> u32 {
    if let Some(&id) = self.name_ids.get(name) {
      return id;
    }
    let id = u32::try_from(self.names.len()).unwrap();
    self.names.push(name.to_string());
    self.name_ids.insert(name.to_string(), id);
    id
  }

  pub fn add_token(&mut self, dst_line: u32, dst_col: u32, src: Option<SourcePosition>) {
    self.tokens.push(Token { dst_line, dst_col, src });
  }

  /// Folds an upstream map whose generated positions start `line_offset`
  /// lines into the combined output.
  pub fn add_vlq_map(&mut self, map: &RawSourceMap, line_offset: u32) -> anyhow::Result<()> {
    let unknown = String::new();
    for token in decode_mappings(&map.mappings)? {
      let src = match token.src {
        Some(src) => {
          let source_name =
            map.sources.get(src.source_id as usize).unwrap_or(&unknown).as_str();
          let content = map
            .sources_content
            .as_ref()
            .and_then(|contents| contents.get(src.source_id as usize))
            .and_then(|content| content.as_deref());
          let source_id = self.add_source(source_name, content);
          let name_id = src
            .name_id
            .and_then(|id| map.names.get(id as usize))
            .map(|name| self.add_name(name));
          Some(SourcePosition { source_id, line: src.line, col: src.col, name_id })
        }
        None => None,
      };
      self.tokens.push(Token {
        dst_line: token.dst_line + line_offset,
        dst_col: token.dst_col,
        src,
      });
    }
    Ok(())
  }

  /// Synthesises a straight-line map for a chunk that carries no map of its
  /// own: every content line maps to the same line of the named source.
  pub fn add_empty_map(&mut self, source_name: &str, code: &str, line_offset: u32) {
    let source_id = self.add_source(source_name, Some(code));
    for line in 0..content_lines(code) {
      self.tokens.push(Token {
        dst_line: line_offset + line,
        dst_col: 0,
        src: Some(SourcePosition { source_id, line, col: 0, name_id: None }),
      });
    }
  }

  pub fn to_vlq(&mut self) -> String {
    self.tokens.sort_by_key(|token| (token.dst_line, token.dst_col));
    encode_mappings(&self.tokens)
  }

  pub fn into_map(mut self) -> RawSourceMap {
    let mappings = self.to_vlq();
    RawSourceMap {
      sources: self.sources,
      sources_content: Some(self.sources_content),
      names: self.names,
      mappings,
      ..RawSourceMap::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_map_covers_each_content_line() {
    let mut builder = SourceMapBuilder::default();
    builder.add_empty_map("a.js", "x;\ny;\n", 2);
    let map = builder.into_map();
    let tokens = decode_mappings(&map.mappings).unwrap();
    assert_eq!(tokens.len(), 2);
    assert_eq!((tokens[0].dst_line, tokens[0].src.unwrap().line), (2, 0));
    assert_eq!((tokens[1].dst_line, tokens[1].src.unwrap().line), (3, 1));
    assert_eq!(map.sources, vec!["a.js"]);
  }

  #[test]
  fn folds_upstream_map_at_offset() {
    let upstream = RawSourceMap {
      sources: vec!["orig.js".into()],
      names: vec!["foo".into()],
      mappings: "AAAAA;AACA".into(),
      ..RawSourceMap::default()
    };
    let mut builder = SourceMapBuilder::default();
    builder.add_vlq_map(&upstream, 5).unwrap();
    let map = builder.into_map();
    let tokens = decode_mappings(&map.mappings).unwrap();
    assert_eq!(tokens[0].dst_line, 5);
    assert_eq!(tokens[1].dst_line, 6);
    assert_eq!(tokens[1].src.unwrap().line, 1);
    assert_eq!(map.sources, vec!["orig.js"]);
    assert_eq!(map.names, vec!["foo"]);
  }

  #[test]
  fn shares_source_ids_across_inputs() {
    let mut builder = SourceMapBuilder::default();
    builder.add_empty_map("a.js", "x\n", 0);
    builder.add_empty_map("a.js", "x\n", 1);
    let map = builder.into_map();
    assert_eq!(map.sources.len(), 1);
  }
}
