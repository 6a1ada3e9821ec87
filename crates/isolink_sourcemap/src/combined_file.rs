use isolink_error::BuildResult;

use crate::builder::SourceMapBuilder;
use crate::lines_count::lines_count;
use crate::raw::RawSourceMap;

/// Incremental bundle-text builder. Chunks are appended with a running line
/// offset; finalisation composes one source string and one map.
#[derive(Default)]
pub struct CombinedFile {
  chunks: Vec<Chunk>,
  line_offset: u32,
}

enum Chunk {
  Generated(String),
  EmptyLines(u32),
  Mapped(MappedChunk),
}

struct MappedChunk {
  source_name: String,
  code: String,
  map: Option<RawSourceMap>,
  line_offset: u32,
}

#[derive(Debug, Clone)]
pub struct CombinedOutput {
  pub source: String,
  pub source_map: RawSourceMap,
}

impl CombinedFile {
  pub fn new() -> Self {
    Self::default()
  }

  /// Newlines emitted so far; the line every subsequent chunk starts on.
  pub fn line_offset(&self) -> u32 {
    self.line_offset
  }

  pub fn is_empty(&self) -> bool {
    self.chunks.is_empty()
  }

  pub fn add_empty_lines(&mut self, count: u32) {
    if count > 0 {
      self.line_offset += count;
      self.chunks.push(Chunk::EmptyLines(count));
    }
  }

  pub fn add_generated_code(&mut self, code: impl Into<String>) {
    let code = code.into();
    if code.is_empty() {
      return;
    }
    self.line_offset += lines_count(&code);
    self.chunks.push(Chunk::Generated(code));
  }

  pub fn add_code_with_map(
    &mut self,
    source_name: impl Into<String>,
    code: String,
    map: Option<RawSourceMap>,
  ) {
    let chunk = MappedChunk {
      source_name: source_name.into(),
      code,
      map,
      line_offset: self.line_offset,
    };
    self.line_offset += lines_count(&chunk.code);
    self.chunks.push(Chunk::Mapped(chunk));
  }

  pub fn finalize(self) -> BuildResult<CombinedOutput> {
    let mapped = self.chunks.iter().filter(|c| matches!(c, Chunk::Mapped(_))).count();
    let source = self.render_source();
    let source_map = if mapped <= 1 {
      // A lone mapped chunk keeps its VLQ body; only the generated-line bias
      // changes, expressed as prepended empty groups.
      let mut result = RawSourceMap::empty();
      for chunk in &self.chunks {
        if let Chunk::Mapped(chunk) = chunk {
          result = match &chunk.map {
            Some(map) => map.with_line_offset(chunk.line_offset),
            None => RawSourceMap::spanning_empty(&chunk.source_name, &chunk.code),
          };
        }
      }
      result
    } else {
      let mut builder = SourceMapBuilder::default();
      for chunk in &self.chunks {
        if let Chunk::Mapped(chunk) = chunk {
          match &chunk.map {
            Some(map) => builder
              .add_vlq_map(map, chunk.line_offset)
              .map_err(|err| err.context(format!("composing map of {}", chunk.source_name)))?,
            None => builder.add_empty_map(&chunk.source_name, &chunk.code, chunk.line_offset),
          }
        }
      }
      builder.into_map()
    };
    Ok(CombinedOutput { source, source_map })
  }

  fn render_source(&self) -> String {
    let size_hint = self
      .chunks
      .iter()
      .map(|chunk| match chunk {
        Chunk::Generated(code) => code.len(),
        Chunk::EmptyLines(count) => *count as usize,
        Chunk::Mapped(chunk) => chunk.code.len(),
      })
      .sum();
    let mut source = String::with_capacity(size_hint);
    for chunk in &self.chunks {
      match chunk {
        Chunk::Generated(code) => source.push_str(code),
        Chunk::EmptyLines(count) => {
          for _ in 0..*count {
            source.push('\n');
          }
        }
        Chunk::Mapped(chunk) => source.push_str(&chunk.code),
      }
    }
    source
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::decode::decode_mappings;

  #[test]
  fn biased_strategy_prepends_line_bias() {
    let upstream = RawSourceMap {
      sources: vec!["orig.js".into()],
      mappings: "AAAA;AACA".into(),
      ..RawSourceMap::default()
    };
    let mut combined = CombinedFile::new();
    combined.add_generated_code("// header\n\n");
    combined.add_code_with_map("a.js", "x;\ny;\n".into(), Some(upstream));
    combined.add_generated_code("// footer\n");

    let output = combined.finalize().unwrap();
    assert_eq!(output.source, "// header\n\nx;\ny;\n// footer\n");
    assert_eq!(output.source_map.mappings, ";;AAAA;AACA");
    assert_eq!(output.source_map.sources, vec!["orig.js"]);
  }

  #[test]
  fn biased_strategy_without_map_spans_but_maps_nothing() {
    let mut combined = CombinedFile::new();
    combined.add_generated_code("// banner\n");
    combined.add_code_with_map("bare.js", "top();\n".into(), None);

    let output = combined.finalize().unwrap();
    assert_eq!(output.source_map.sources, vec!["bare.js"]);
    assert!(!output.source_map.has_mappings());
    assert_eq!(output.source_map.version, 3);
  }

  #[test]
  fn empty_file_yields_empty_map() {
    let output = CombinedFile::new().finalize().unwrap();
    assert_eq!(output.source, "");
    assert_eq!(output.source_map, RawSourceMap::empty());
  }

  #[test]
  fn vlq_strategy_composes_multiple_chunks() {
    let upstream = RawSourceMap {
      sources: vec!["orig.js".into()],
      mappings: "AAAA".into(),
      ..RawSourceMap::default()
    };
    let mut combined = CombinedFile::new();
    combined.add_code_with_map("a.js", "a1;\na2;\n".into(), None);
    combined.add_empty_lines(2);
    combined.add_code_with_map("b.js", "b1;\n".into(), Some(upstream));

    let output = combined.finalize().unwrap();
    assert_eq!(output.source, "a1;\na2;\n\n\nb1;\n");

    let tokens = decode_mappings(&output.source_map.mappings).unwrap();
    // Straight-line tokens for a.js on generated lines 0-1, the folded
    // upstream token for b.js at its offset.
    assert_eq!(tokens.len(), 3);
    assert_eq!(tokens[0].dst_line, 0);
    assert_eq!(tokens[1].dst_line, 1);
    assert_eq!(tokens[2].dst_line, 4);
    let sources = &output.source_map.sources;
    assert_eq!(sources[tokens[0].src.unwrap().source_id as usize], "a.js");
    assert_eq!(sources[tokens[2].src.unwrap().source_id as usize], "orig.js");
  }

  #[test]
  fn line_offset_tracks_every_chunk_kind() {
    let mut combined = CombinedFile::new();
    combined.add_generated_code("a\nb\n");
    combined.add_empty_lines(3);
    combined.add_code_with_map("c.js", "c\n".into(), None);
    assert_eq!(combined.line_offset(), 6);
  }
}
