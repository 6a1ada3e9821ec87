use arcstr::ArcStr;
use isolink_utils::indexmap::FxIndexMap;

use crate::input_file::InputFile;

/// One declared dependency of the package being linked. An unordered edge
/// breaks load cycles and does not count as runtime availability.
#[derive(Debug, Clone)]
pub struct PackageDep {
  pub name: String,
  pub unordered: bool,
}

impl PackageDep {
  pub fn ordered(name: impl Into<String>) -> Self {
    Self { name: name.into(), unordered: false }
  }
}

/// Everything `full_link` needs for one bundle.
#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
  pub input_files: Vec<InputFile>,
  /// Application bundles put their symbols on the global namespace and skip
  /// assigned-global analysis.
  pub is_app: bool,
  pub bundle_arch: ArcStr,
  pub combined_serve_path: ArcStr,
  /// Package name; `None` for the application.
  pub name: Option<ArcStr>,
  pub declared_exports: Vec<String>,
  /// Imported symbol (possibly dotted) to providing package name, in the
  /// order the compiler resolved them.
  pub imports: FxIndexMap<String, String>,
  pub include_source_map_instructions: bool,
  pub deps: Vec<PackageDep>,
  pub disable_cache: bool,
}
