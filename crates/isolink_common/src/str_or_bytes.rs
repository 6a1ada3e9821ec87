/// Input file contents as handed over by the compiler plugins: usually text
/// already, sometimes raw bytes that still need decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrOrBytes {
  Str(String),
  Bytes(Vec<u8>),
}

impl Default for StrOrBytes {
  fn default() -> Self {
    Self::Str(String::new())
  }
}

impl StrOrBytes {
  /// Decodes to text, replacing invalid UTF-8 rather than failing; a broken
  /// byte never aborts a link.
  pub fn into_string_lossy(self) -> String {
    match self {
      Self::Str(text) => text,
      Self::Bytes(bytes) => match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
      },
    }
  }

  pub fn len(&self) -> usize {
    match self {
      Self::Str(text) => text.len(),
      Self::Bytes(bytes) => bytes.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl From<String> for StrOrBytes {
  fn from(text: String) -> Self {
    Self::Str(text)
  }
}

impl From<&str> for StrOrBytes {
  fn from(text: &str) -> Self {
    Self::Str(text.to_string())
  }
}

impl From<Vec<u8>> for StrOrBytes {
  fn from(bytes: Vec<u8>) -> Self {
    Self::Bytes(bytes)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_bytes_lossily() {
    let text: StrOrBytes = "var x;".into();
    assert_eq!(text.into_string_lossy(), "var x;");

    let bytes: StrOrBytes = vec![b'o', b'k', 0xff].into();
    assert_eq!(bytes.into_string_lossy(), "ok\u{fffd}");
  }
}
