use arcstr::ArcStr;
use isolink_sourcemap::RawSourceMap;
use isolink_utils::indexmap::FxIndexMap;

use crate::install_options::SharedInstallOptions;
use crate::str_or_bytes::StrOrBytes;

/// How a lazy file got pulled into the build, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportedState {
  #[default]
  No,
  Static,
  Dynamic,
}

impl ImportedState {
  pub fn is_imported(self) -> bool {
    !matches!(self, Self::No)
  }
}

/// One dependency edge as recorded by the compiler: the target module id and
/// whether every import of it was dynamic.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepInfo {
  pub dynamic: bool,
}

/// Alias leaf for a module id: either a redirect to another id or a module
/// disabled outright (a `false` browser-field mapping), which installs as an
/// empty function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleAlias {
  Id(ArcStr),
  Disabled,
}

/// Immutable descriptor of one compiled file, as handed to the linker.
#[derive(Debug, Clone, Default)]
pub struct InputFile {
  pub source: StrOrBytes,
  /// Content hash; derived from `source` when absent.
  pub hash: Option<ArcStr>,
  /// Project-relative path, for diagnostics.
  pub source_path: ArcStr,
  /// Bundle-relative path, for banners and source-map source names.
  pub serve_path: ArcStr,
  /// Absolute module id (`/a/b.js`); files without one cannot enter a
  /// module tree and must be bare or unused.
  pub abs_module_id: Option<ArcStr>,
  pub alias: Option<ModuleAlias>,
  pub source_map: Option<RawSourceMap>,
  /// Dependency map in import order.
  pub deps: FxIndexMap<ArcStr, DepInfo>,
  pub lazy: bool,
  pub imported: ImportedState,
  pub main_module: bool,
  /// Concatenated verbatim, outside the module system.
  pub bare: bool,
  /// Parsed payload of `package.json`-like files.
  pub json_data: Option<serde_json::Value>,
  pub install_options: Option<SharedInstallOptions>,
}
