use arcstr::ArcStr;
use isolink_sourcemap::RawSourceMap;

/// One emitted bundle file, ready for the on-disk writer.
#[derive(Debug, Clone)]
pub struct OutputFile {
  pub source: String,
  pub source_map: Option<RawSourceMap>,
  pub serve_path: ArcStr,
  pub source_path: Option<ArcStr>,
  /// Dynamic modules are served separately and fetched on first import.
  pub dynamic: bool,
}
