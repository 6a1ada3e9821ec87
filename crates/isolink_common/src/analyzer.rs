use isolink_error::SourceParseError;
use rustc_hash::FxHashSet;

/// Seam for the static-analysis service: given a file's source, report the
/// top-level identifiers assigned without a declaration in any enclosing
/// scope. The content hash keys whatever memoisation the service keeps.
pub trait AssignedGlobalsAnalyzer: Send + Sync {
  fn find_assigned_globals(
    &self,
    source: &str,
    content_hash: &str,
  ) -> Result<FxHashSet<String>, SourceParseError>;
}
