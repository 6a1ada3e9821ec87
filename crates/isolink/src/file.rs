use std::sync::{Arc, LazyLock};

use arcstr::ArcStr;
use isolink_buildmessage::{self as buildmessage, MessageOptions};
use isolink_common::{
  AssignedGlobalsAnalyzer, ImportedState, InputFile, ModuleAlias, SharedInstallOptions,
};
use isolink_error::BuildResult;
use isolink_sourcemap::{original_position_for, CombinedFile, RawSourceMap};
use isolink_utils::concat_string;
use isolink_utils::hash::content_hash;

use crate::banner::banner;
use crate::prelink_cache::{self, PrelinkedOutput};

static ENABLE_CLIENT_TOP_LEVEL_AWAIT: LazyLock<bool> = LazyLock::new(|| {
  std::env::var("METEOR_ENABLE_CLIENT_TOP_LEVEL_AWAIT")
    .is_ok_and(|value| value == "true" || value == "1")
});

const BARE_MODE_NOTICE: &str = "This file is in bare mode and is not in its own closure.";

/// Hashed snapshot of one input file, plus everything prelinking needs.
#[derive(Debug, Clone)]
pub struct File {
  pub source: String,
  pub hash: ArcStr,
  pub source_path: ArcStr,
  pub serve_path: ArcStr,
  pub abs_module_id: Option<ArcStr>,
  pub alias: Option<ModuleAlias>,
  pub source_map: Option<RawSourceMap>,
  /// Non-dynamic dependency ids, in import order.
  pub deps: Vec<ArcStr>,
  pub lazy: bool,
  pub imported: ImportedState,
  pub main_module: bool,
  pub bare: bool,
  pub json_data: Option<serde_json::Value>,
  pub install_options: Option<SharedInstallOptions>,
  pub arch: ArcStr,
}

/// The four spans of a prelinked file, kept apart so the module-tree walk
/// can emit the code span with its map and the rest as generated text.
#[derive(Debug, Clone)]
pub struct PrelinkParts {
  pub header: String,
  pub code: String,
  pub map: Option<RawSourceMap>,
  pub footer: String,
}

impl File {
  pub fn new(input: InputFile, arch: ArcStr) -> Self {
    let source = input.source.into_string_lossy();
    let hash = input.hash.unwrap_or_else(|| content_hash(&source).into());
    let deps = input
      .deps
      .iter()
      .filter(|(_, info)| !info.dynamic)
      .map(|(id, _)| id.clone())
      .collect();
    Self {
      source,
      hash,
      source_path: input.source_path,
      serve_path: input.serve_path,
      abs_module_id: input.abs_module_id,
      alias: input.alias,
      source_map: input.source_map,
      deps,
      lazy: input.lazy,
      imported: input.imported,
      main_module: input.main_module,
      bare: input.bare,
      json_data: input.json_data,
      install_options: input.install_options,
      arch,
    }
  }

  pub fn is_dynamic(&self) -> bool {
    self.lazy && self.imported == ImportedState::Dynamic
  }

  /// Assigned-global discovery with parse-failure recovery: the error lands
  /// in the current job (positions mapped through the upstream map when one
  /// exists), the source is emptied and an empty set comes back.
  pub fn compute_assigned_variables(
    &mut self,
    analyzer: &dyn AssignedGlobalsAnalyzer,
  ) -> Vec<String> {
    match analyzer.find_assigned_globals(&self.source, &self.hash) {
      Ok(globals) => {
        let mut assigned: Vec<String> = globals.into_iter().collect();
        assigned.sort();
        assigned
      }
      Err(parse) => {
        let (file, line, column) = self.original_error_position(parse.line, parse.column);
        buildmessage::error(
          parse.message,
          MessageOptions {
            file: Some(file),
            line: Some(line),
            column: Some(column),
            downcase: true,
            ..MessageOptions::default()
          },
        );
        self.source = String::new();
        Vec::new()
      }
    }
  }

  /// 1-based error position mapped back into the original source where an
  /// upstream map allows it.
  fn original_error_position(&self, line: u32, column: u32) -> (String, u32, u32) {
    if let Some(map) = &self.source_map {
      if let Some(original) =
        original_position_for(map, line.saturating_sub(1), column.saturating_sub(1))
      {
        let file = original.source.unwrap_or_else(|| self.source_path.to_string());
        return (file, original.line + 1, original.column + 1);
      }
    }
    (self.source_path.to_string(), line, column)
  }

  fn banner(&self) -> String {
    let serve_path = self.serve_path.trim_start_matches('/');
    if self.bare {
      banner(&[serve_path, BARE_MODE_NOTICE])
    } else {
      banner(&[serve_path])
    }
  }

  pub fn get_prelinked_parts(&self) -> PrelinkParts {
    let mut code = self.source.clone();
    // A trailing //-comment must not devour whatever gets appended next.
    if !code.ends_with('\n') {
      code.push('\n');
    }

    // The banner sits inside the closure, right before the code, so the
    // installed tree reads `"a.js": function module(...){` at every leaf.
    let banner = self.banner();
    let (header, footer) = if self.bare {
      (banner, String::new())
    } else if self.install_options.is_some() {
      let opener = closure_opener(&self.arch, *ENABLE_CLIENT_TOP_LEVEL_AWAIT);
      let header = concat_string!(opener, module_params(&self.source), "){\n\n", banner);
      (header, "}".to_string())
    } else {
      (concat_string!("(function(){\n\n", banner), "}).call(this);\n".to_string())
    };

    PrelinkParts { header, code, map: self.source_map.clone(), footer }
  }

  /// Whole-file prelink as one `{source, sourceMap}` unit, the map biased
  /// past the header.
  pub fn get_output_with_source_map(&self, serve_path: &str) -> BuildResult<PrelinkedOutput> {
    let parts = self.get_prelinked_parts();
    let mut combined = CombinedFile::new();
    combined.add_generated_code(parts.header);
    combined.add_code_with_map(
      isolink_utils::serve_path::escape_colons(serve_path),
      parts.code,
      parts.map,
    );
    combined.add_generated_code(parts.footer);
    let output = combined.finalize()?;
    Ok(PrelinkedOutput { source: output.source, source_map: output.source_map })
  }

  pub fn get_output_with_source_map_cached(
    &self,
    serve_path: &str,
    disable_cache: bool,
  ) -> BuildResult<Arc<PrelinkedOutput>> {
    if disable_cache {
      return Ok(Arc::new(self.get_output_with_source_map(serve_path)?));
    }
    let key = prelink_cache::cache_key(
      &self.hash,
      &self.arch,
      self.bare,
      serve_path,
      self.is_dynamic(),
      self.install_options.as_deref(),
    );
    if let Some(hit) = prelink_cache::get(self.is_dynamic(), &key) {
      tracing::trace!(serve_path, "prelink cache hit");
      return Ok(hit);
    }
    tracing::trace!(serve_path, "prelink cache miss");
    let output = Arc::new(self.get_output_with_source_map(serve_path)?);
    prelink_cache::put(self.is_dynamic(), key, output.clone());
    Ok(output)
  }
}

const MODULE_PARAMS: [&str; 5] = ["require", "exports", "module", "__filename", "__dirname"];

/// Parameter list for an installed module's closure: always a prefix of the
/// loader's argument order, long enough to cover the last parameter the
/// source mentions, and never shorter than the first three.
fn module_params(source: &str) -> String {
  let mut needed = 3;
  for (index, param) in MODULE_PARAMS.iter().enumerate().skip(3) {
    if source.contains(param) {
      needed = index + 1;
    }
  }
  MODULE_PARAMS[..needed].join(",")
}

fn closure_opener(arch: &str, top_level_await: bool) -> &'static str {
  if top_level_await && arch.starts_with("web.") {
    "async function module("
  } else {
    "function module("
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use isolink_common::StrOrBytes;

  fn file(input: InputFile) -> File {
    File::new(input, arcstr::literal!("web.browser"))
  }

  #[test]
  fn derives_hash_and_filters_dynamic_deps() {
    let mut deps = isolink_utils::indexmap::FxIndexMap::default();
    deps.insert(arcstr::literal!("/static.js"), isolink_common::DepInfo { dynamic: false });
    deps.insert(arcstr::literal!("/dynamic.js"), isolink_common::DepInfo { dynamic: true });
    let file = file(InputFile {
      source: StrOrBytes::from("exports.a = 1;\n"),
      deps,
      ..InputFile::default()
    });
    assert_eq!(file.hash.len(), 32);
    assert_eq!(file.deps, vec![arcstr::literal!("/static.js")]);
  }

  #[test]
  fn dynamic_needs_lazy_and_dynamic_import() {
    let lazy_dynamic = file(InputFile {
      lazy: true,
      imported: ImportedState::Dynamic,
      ..InputFile::default()
    });
    assert!(lazy_dynamic.is_dynamic());

    let eager_dynamic =
      file(InputFile { imported: ImportedState::Dynamic, ..InputFile::default() });
    assert!(!eager_dynamic.is_dynamic());

    let lazy_static =
      file(InputFile { lazy: true, imported: ImportedState::Static, ..InputFile::default() });
    assert!(!lazy_static.is_dynamic());
  }

  #[test]
  fn module_params_cover_the_last_mentioned_parameter() {
    assert_eq!(module_params("exports.x = 1;"), "require,exports,module");
    assert_eq!(module_params("nothing of note"), "require,exports,module");
    assert_eq!(
      module_params("console.log(__filename);"),
      "require,exports,module,__filename",
    );
    assert_eq!(
      module_params("path.join(__dirname, 'x')"),
      "require,exports,module,__filename,__dirname",
    );
  }

  #[test]
  fn closure_opener_honours_the_top_level_await_flag() {
    assert_eq!(closure_opener("web.browser", false), "function module(");
    assert_eq!(closure_opener("web.browser", true), "async function module(");
    assert_eq!(closure_opener("os", true), "function module(");
  }

  #[test]
  fn bare_prelink_is_banner_only() {
    let bare = file(InputFile {
      source: StrOrBytes::from(""),
      serve_path: arcstr::literal!("/top.js"),
      bare: true,
      ..InputFile::default()
    });
    let parts = bare.get_prelinked_parts();
    assert!(parts.header.contains("top.js"));
    assert!(parts.header.contains(BARE_MODE_NOTICE));
    assert_eq!(parts.code, "\n");
    assert_eq!(parts.footer, "");
  }

  #[test]
  fn iife_prelink_wraps_with_call_this() {
    let plain = file(InputFile {
      source: StrOrBytes::from("var x = 1;\n"),
      serve_path: arcstr::literal!("/x.js"),
      ..InputFile::default()
    });
    let parts = plain.get_prelinked_parts();
    assert!(parts.header.starts_with("(function(){\n\n"));
    assert!(parts.header.contains("// x.js"));
    assert_eq!(parts.footer, "}).call(this);\n");
  }

  #[test]
  fn module_prelink_biases_the_upstream_map_past_the_header() {
    let with_map = file(InputFile {
      source: StrOrBytes::from("exports.x = 1;\n"),
      serve_path: arcstr::literal!("/a.js"),
      install_options: Some(isolink_common::InstallOptions::extensions(&[".js"])),
      source_map: Some(RawSourceMap {
        sources: vec!["a.js".into()],
        mappings: "AAAA".into(),
        ..RawSourceMap::default()
      }),
      ..InputFile::default()
    });
    let parts = with_map.get_prelinked_parts();
    assert!(parts.header.starts_with("function module(require,exports,module){\n\n"));
    assert_eq!(parts.footer, "}");

    let output = with_map.get_output_with_source_map("/a.js").unwrap();
    let header_newlines = parts.header.matches('\n').count();
    let expected: String = ";".repeat(header_newlines) + "AAAA";
    assert_eq!(output.source_map.mappings, expected);
    assert!(output.source.ends_with("exports.x = 1;\n}"));
  }
}
