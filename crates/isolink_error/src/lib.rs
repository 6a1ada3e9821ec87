use std::fmt;
use std::ops::{Deref, DerefMut};

/// Accumulated build failures. Stages push into the list instead of failing
/// fast, so one link pass can surface every problem it found.
#[derive(Debug)]
pub struct BuildError(pub Vec<anyhow::Error>);

impl BuildError {
  pub fn msg(message: impl Into<String>) -> Self {
    Self(vec![anyhow::anyhow!(message.into())])
  }

  pub fn push(&mut self, error: anyhow::Error) {
    self.0.push(error);
  }

  pub fn into_inner(self) -> Vec<anyhow::Error> {
    self.0
  }
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (index, error) in self.0.iter().enumerate() {
      if index > 0 {
        writeln!(f)?;
      }
      write!(f, "{error}")?;
    }
    Ok(())
  }
}

impl Deref for BuildError {
  type Target = Vec<anyhow::Error>;

  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

impl DerefMut for BuildError {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut self.0
  }
}

impl From<anyhow::Error> for BuildError {
  fn from(error: anyhow::Error) -> Self {
    Self(vec![error])
  }
}

impl From<Vec<anyhow::Error>> for BuildError {
  fn from(errors: Vec<anyhow::Error>) -> Self {
    Self(errors)
  }
}

pub type BuildResult<T> = anyhow::Result<T, BuildError>;

/// Parse failure reported by the static-analysis service. Positions are
/// 1-based, in the source the analyzer was handed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} ({line}:{column})")]
pub struct SourceParseError {
  pub message: String,
  pub line: u32,
  pub column: u32,
  pub file: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn collects_and_formats_multiple_errors() {
    let mut err = BuildError::msg("first");
    err.push(anyhow::anyhow!("second"));
    assert_eq!(err.len(), 2);
    assert_eq!(err.to_string(), "first\nsecond");
  }

  #[test]
  fn parse_error_downcasts_from_anyhow() {
    let err: anyhow::Error =
      SourceParseError { message: "Unexpected token".into(), line: 3, column: 7, file: None }
        .into();
    let parse = err.downcast_ref::<SourceParseError>().unwrap();
    assert_eq!(parse.line, 3);
    assert_eq!(parse.to_string(), "Unexpected token (3:7)");
  }
}
