use serde::{Deserialize, Serialize};

use crate::lines_count::lines_count;

fn version_3() -> u8 {
  3
}

/// The version-3 source map wire format, kept raw so composition can work on
/// the `mappings` text without re-tokenising it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSourceMap {
  #[serde(default = "version_3")]
  pub version: u8,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub file: Option<String>,
  #[serde(default)]
  pub sources: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sources_content: Option<Vec<Option<String>>>,
  #[serde(default)]
  pub names: Vec<String>,
  #[serde(default)]
  pub mappings: String,
}

impl Default for RawSourceMap {
  fn default() -> Self {
    Self {
      version: 3,
      file: None,
      sources: Vec::new(),
      sources_content: None,
      names: Vec::new(),
      mappings: String::new(),
    }
  }
}

impl RawSourceMap {
  pub fn empty() -> Self {
    Self::default()
  }

  /// A valid map that names (and inlines) the source but maps nothing.
  pub fn spanning_empty(source_name: &str, content: &str) -> Self {
    Self {
      sources: vec![source_name.to_string()],
      sources_content: Some(vec![Some(content.to_string())]),
      ..Self::default()
    }
  }

  /// Shifts every generated position down by `lines` by prepending empty
  /// line groups; the VLQ body is reused verbatim.
  pub fn with_line_offset(&self, lines: u32) -> Self {
    let mut shifted = self.clone();
    if lines > 0 {
      let mut mappings = String::with_capacity(lines as usize + self.mappings.len());
      for _ in 0..lines {
        mappings.push(';');
      }
      mappings.push_str(&self.mappings);
      shifted.mappings = mappings;
    }
    shifted
  }

  pub fn has_mappings(&self) -> bool {
    self.mappings.bytes().any(|b| b != b';')
  }

  /// Cache weight of the serialised form.
  pub fn serialized_len(&self) -> usize {
    serde_json::to_string(self).map(|json| json.len()).unwrap_or(0)
  }

  pub fn from_json(json: &str) -> anyhow::Result<Self> {
    Ok(serde_json::from_str(json)?)
  }
}

/// Number of content lines a code chunk occupies, counting a trailing
/// unterminated line.
pub(crate) fn content_lines(code: &str) -> u32 {
  if code.is_empty() {
    return 0;
  }
  let newlines = lines_count(code);
  if code.ends_with('\n') {
    newlines
  } else {
    newlines + 1
  }
}
