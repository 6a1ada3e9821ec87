use arcstr::ArcStr;
use isolink_buildmessage as buildmessage;
use isolink_common::{AssignedGlobalsAnalyzer, LinkOptions, OutputFile, PackageDep};
use isolink_error::{BuildError, BuildResult};
use isolink_sourcemap::lines_count;
use isolink_utils::concat_string;
use isolink_utils::ecmascript::{js_quote, package_accessor};
use isolink_utils::indexmap::{FxIndexMap, FxIndexSet};
use rustc_hash::FxHashSet;

use crate::banner::source_map_instructions_comment;
use crate::file::File;
use crate::module::Module;
use crate::symbol_tree::{build_symbol_tree, write_symbol_tree, SymbolTreeNode};

/// Links one package (or the application) into its bundle files: the
/// combined main file wrapped in header and footer, plus one output per
/// dynamic module. Must run inside a buildmessage job; recoverable problems
/// accumulate there, and an empty list comes back when analysis reported
/// anything.
pub async fn full_link(
  options: LinkOptions,
  analyzer: &dyn AssignedGlobalsAnalyzer,
) -> BuildResult<Vec<OutputFile>> {
  buildmessage::assert_in_job();

  let LinkOptions {
    input_files,
    is_app,
    bundle_arch,
    combined_serve_path,
    name,
    declared_exports,
    mut imports,
    include_source_map_instructions,
    deps,
    disable_cache,
  } = options;
  tracing::debug!(
    name = name.as_deref().unwrap_or("app"),
    arch = %bundle_arch,
    files = input_files.len(),
    "full link",
  );

  let mut module =
    Module::new(name.clone(), bundle_arch.clone(), is_app, combined_serve_path.clone());
  for input in input_files {
    module.add_file(File::new(input, bundle_arch.clone()));
  }

  let main_module_path = module
    .files
    .iter()
    .find(|file| file.main_module)
    .and_then(|file| file.abs_module_id.clone());
  let eager_module_paths: Vec<ArcStr> = module
    .files
    .iter()
    .filter(|file| !file.lazy && !file.bare)
    .filter_map(|file| file.abs_module_id.clone())
    .collect();

  let prelink = module.get_prelinked_files(disable_cache)?;

  let has_runtime = deps.iter().any(|dep| !dep.unordered);
  if !has_runtime
    && (!declared_exports.is_empty() || main_module_path.is_some() || !eager_module_paths.is_empty())
  {
    let package = name.as_deref().unwrap_or("the application");
    return Err(BuildError::msg(format!(
      "{package} uses exports, a main module, or eager modules, \
       but does not depend on a runtime package (such as meteor)"
    )));
  }

  // With nothing in the bundle body, imports only matter as re-exports.
  if prelink.combined.source.is_empty() {
    imports.retain(|symbol, _| declared_exports.iter().any(|export| export == symbol));
  }

  let mut package_variables: Vec<String> = Vec::new();
  if !is_app {
    let mut discovered: FxIndexSet<String> = declared_exports.iter().cloned().collect();
    let had_messages = buildmessage::enter_job_sync(
      format!(
        "computing assigned variables for {}",
        name.as_deref().unwrap_or("the package")
      ),
      || {
        for index in module.used_files() {
          for global in module.files[index].compute_assigned_variables(analyzer) {
            discovered.insert(global);
          }
        }
        buildmessage::job_has_messages()
      },
    );
    if had_messages {
      // Callers surface the messages; partial output would only hide them.
      return Ok(Vec::new());
    }
    let import_roots: FxHashSet<&str> =
      imports.keys().map(|symbol| symbol.split('.').next().unwrap()).collect();
    package_variables = discovered
      .into_iter()
      .filter(|variable| !import_roots.contains(variable.as_str()))
      .collect();
  }

  let header = build_header(&HeaderInput {
    is_app,
    has_runtime,
    include_source_map_instructions,
    name: name.as_deref(),
    deps: &deps,
    imports: &imports,
    package_variables: &package_variables,
  });
  let footer = build_footer(
    has_runtime,
    &declared_exports,
    prelink.has_require,
    &eager_module_paths,
    main_module_path.as_deref(),
  );

  let header_lines = lines_count(&header);
  let source = concat_string!(header, prelink.combined.source, footer);
  let source_map = prelink.combined.source_map.with_line_offset(header_lines);

  let mut outputs = Vec::with_capacity(1 + prelink.dynamic_files.len());
  outputs.push(OutputFile {
    source,
    source_map: Some(source_map),
    serve_path: combined_serve_path,
    source_path: None,
    dynamic: false,
  });
  outputs.extend(prelink.dynamic_files);
  Ok(outputs)
}

struct HeaderInput<'a> {
  is_app: bool,
  has_runtime: bool,
  include_source_map_instructions: bool,
  name: Option<&'a str>,
  deps: &'a [PackageDep],
  imports: &'a FxIndexMap<String, String>,
  package_variables: &'a [String],
}

fn build_header(input: &HeaderInput<'_>) -> String {
  let mut header = String::new();
  if input.include_source_map_instructions {
    header.push_str(&source_map_instructions_comment());
  }
  if !input.has_runtime {
    header.push_str("(function() {\n\n");
    return header;
  }

  let name_literal = input.name.map_or_else(|| "null".to_string(), js_quote);
  let ordered_deps: Vec<String> = input
    .deps
    .iter()
    .filter(|dep| !dep.unordered)
    .map(|dep| js_quote(&dep.name))
    .collect();
  header.push_str(&format!(
    "Package[\"core-runtime\"].queue({}, [{}], function () {{\n",
    name_literal,
    ordered_deps.join(", "),
  ));

  if !input.imports.is_empty() {
    let trees = build_symbol_tree(input.imports.iter().map(|(symbol, package)| {
      (symbol.as_str(), concat_string!(package_accessor(package), ".", symbol))
    }));
    // App symbols deliberately leak onto the global namespace.
    let declare = if input.is_app { "" } else { "var " };
    for (root, node) in &trees {
      header.push_str(declare);
      header.push_str(root);
      header.push_str(" = ");
      header.push_str(&write_symbol_tree(node, 0));
      header.push_str(";\n");
    }
    header.push('\n');
  }

  if !input.package_variables.is_empty() {
    header.push_str("/* Package-scope variables */\n");
    header.push_str("var ");
    header.push_str(&input.package_variables.join(", "));
    header.push_str(";\n\n");
  }
  header
}

fn build_footer(
  has_runtime: bool,
  declared_exports: &[String],
  has_require: bool,
  eager_module_paths: &[ArcStr],
  main_module_path: Option<&str>,
) -> String {
  if !has_runtime {
    return "\n})();\n".to_string();
  }

  let mut props: Vec<String> = Vec::new();
  if !declared_exports.is_empty() {
    let tree = SymbolTreeNode::Branch(build_symbol_tree(
      declared_exports.iter().map(|symbol| (symbol.as_str(), symbol.clone())),
    ));
    props.push(format!("export: function () {{ return {}; }}", write_symbol_tree(&tree, 2)));
  }
  if has_require {
    props.push("require: require".to_string());
  }
  if !eager_module_paths.is_empty() {
    let ids: Vec<String> =
      eager_module_paths.iter().map(|path| concat_string!("    ", js_quote(path))).collect();
    props.push(format!("eagerModulePaths: [\n{}\n  ]", ids.join(",\n")));
  }
  if let Some(main) = main_module_path {
    props.push(format!("mainModulePath: {}", js_quote(main)));
  }

  if props.is_empty() {
    return "\nreturn {};\n});\n".to_string();
  }
  format!("\nreturn {{\n  {}\n}};\n}});\n", props.join(",\n  "))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn header_without_runtime_is_a_plain_iife() {
    let header = build_header(&HeaderInput {
      is_app: false,
      has_runtime: false,
      include_source_map_instructions: false,
      name: Some("p"),
      deps: &[],
      imports: &FxIndexMap::default(),
      package_variables: &[],
    });
    assert_eq!(header, "(function() {\n\n");
    assert_eq!(build_footer(false, &[], false, &[], None), "\n})();\n");
  }

  #[test]
  fn runtime_header_queues_ordered_deps_and_declares_scope() {
    let deps = vec![
      PackageDep::ordered("meteor"),
      PackageDep { name: "blaze".into(), unordered: true },
      PackageDep::ordered("ecmascript-runtime"),
    ];
    let mut imports = FxIndexMap::default();
    imports.insert("Foo.bar".to_string(), "x".to_string());
    let header = build_header(&HeaderInput {
      is_app: false,
      has_runtime: true,
      include_source_map_instructions: false,
      name: Some("p"),
      deps: &deps,
      imports: &imports,
      package_variables: &["A".into(), "b".into()],
    });
    assert!(header.starts_with(
      "Package[\"core-runtime\"].queue(\"p\", [\"meteor\", \"ecmascript-runtime\"], function () {\n"
    ));
    assert!(header.contains("var Foo = {\n  bar: Package.x.Foo.bar\n};\n"));
    assert!(header.contains("/* Package-scope variables */\nvar A, b;\n\n"));
  }

  #[test]
  fn app_header_assigns_imports_without_var() {
    let mut imports = FxIndexMap::default();
    imports.insert("Meteor".to_string(), "meteor".to_string());
    let header = build_header(&HeaderInput {
      is_app: true,
      has_runtime: true,
      include_source_map_instructions: false,
      name: None,
      deps: &[PackageDep::ordered("meteor")],
      imports: &imports,
      package_variables: &[],
    });
    assert!(header.starts_with("Package[\"core-runtime\"].queue(null, [\"meteor\"], function () {\n"));
    assert!(header.contains("\nMeteor = Package.meteor.Meteor;\n"));
    assert!(!header.contains("var Meteor"));
  }

  #[test]
  fn footer_orders_the_returned_properties() {
    let footer = build_footer(
      true,
      &["Foo".to_string()],
      true,
      &[arcstr::literal!("/a.js"), arcstr::literal!("/b.js")],
      Some("/a.js"),
    );
    let export_at = footer.find("export:").unwrap();
    let require_at = footer.find("require: require").unwrap();
    let eager_at = footer.find("eagerModulePaths:").unwrap();
    let main_at = footer.find("mainModulePath: \"/a.js\"").unwrap();
    assert!(export_at < require_at && require_at < eager_at && eager_at < main_at);
    assert!(footer.ends_with("};\n});\n"));
    assert!(footer.contains("eagerModulePaths: [\n    \"/a.js\",\n    \"/b.js\"\n  ]"));
  }
}
