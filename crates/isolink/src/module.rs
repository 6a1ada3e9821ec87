use std::sync::Arc;

use arcstr::ArcStr;
use isolink_common::{ModuleAlias, OutputFile, SharedInstallOptions};
use isolink_error::BuildResult;
use isolink_sourcemap::{CombinedFile, CombinedOutput};
use isolink_utils::concat_string;
use isolink_utils::ecmascript::js_quote;
use isolink_utils::indexmap::{FxIndexMap, FxIndexSet};
use isolink_utils::serve_path::escape_colons;

use crate::file::File;

/// One node of the nested literal the in-bundle loader traverses: path
/// segments nest as objects, and a leaf is an installed module function, a
/// dynamic-import stub, an alias, or a disabled module.
#[derive(Debug)]
pub enum ModuleTreeNode {
  Dir(FxIndexMap<String, ModuleTreeNode>),
  File(usize),
  Dynamic(Vec<serde_json::Value>),
  Alias(String),
  Disabled,
}

impl ModuleTreeNode {
  fn dir() -> Self {
    Self::Dir(FxIndexMap::default())
  }
}

/// Trees grouped by install-options identity, in first-seen order. Two
/// structurally equal options objects still mean two separate
/// `meteorInstall` calls; only the same shared handle groups.
#[derive(Default)]
pub struct ModuleTrees {
  groups: Vec<(SharedInstallOptions, ModuleTreeNode)>,
}

impl ModuleTrees {
  fn tree_for(&mut self, options: &SharedInstallOptions) -> &mut ModuleTreeNode {
    let position = self.groups.iter().position(|(existing, _)| Arc::ptr_eq(existing, options));
    let index = match position {
      Some(index) => index,
      None => {
        self.groups.push((options.clone(), ModuleTreeNode::dir()));
        self.groups.len() - 1
      }
    };
    &mut self.groups[index].1
  }

  pub fn is_empty(&self) -> bool {
    self.groups.is_empty()
  }

  pub fn groups(&self) -> &[(SharedInstallOptions, ModuleTreeNode)] {
    &self.groups
  }
}

fn add_to_tree(root: &mut ModuleTreeNode, abs_module_id: &str, leaf: ModuleTreeNode) {
  let mut segments: Vec<&str> = abs_module_id.split('/').filter(|s| !s.is_empty()).collect();
  let Some(last) = segments.pop() else {
    return;
  };
  let mut node = root;
  for segment in segments {
    let ModuleTreeNode::Dir(entries) = node else {
      return;
    };
    node = entries.entry(segment.to_string()).or_insert_with(ModuleTreeNode::dir);
  }
  if let ModuleTreeNode::Dir(entries) = node {
    entries.insert(last.to_string(), leaf);
  }
}

/// What one module's prelink pass produced: the combined main bundle body
/// plus separately served dynamic modules.
pub struct ModulePrelink {
  pub combined: CombinedOutput,
  pub dynamic_files: Vec<OutputFile>,
  /// Whether the body defined `require` (at least one install group).
  pub has_require: bool,
}

/// Bundle-construction context for one package or the application.
pub struct Module {
  pub name: Option<ArcStr>,
  pub arch: ArcStr,
  /// True for the application: symbols land on the global namespace.
  pub use_global_namespace: bool,
  pub combined_serve_path: ArcStr,
  pub files: Vec<File>,
  used_files: FxIndexSet<usize>,
}

impl Module {
  pub fn new(
    name: Option<ArcStr>,
    arch: ArcStr,
    use_global_namespace: bool,
    combined_serve_path: ArcStr,
  ) -> Self {
    Self {
      name,
      arch,
      use_global_namespace,
      combined_serve_path,
      files: Vec::new(),
      used_files: FxIndexSet::default(),
    }
  }

  pub fn add_file(&mut self, file: File) {
    self.files.push(file);
  }

  pub fn has_modules(&self) -> bool {
    self.files.iter().any(|file| file.install_options.is_some())
  }

  /// Indexes of files actually emitted, in emission order.
  pub fn used_files(&self) -> Vec<usize> {
    self.used_files.iter().copied().collect()
  }

  pub fn get_prelinked_files(&mut self, disable_cache: bool) -> BuildResult<ModulePrelink> {
    self.used_files.clear();
    let mut combined = CombinedFile::new();
    let mut dynamic_files = Vec::new();
    let mut has_require = false;

    if self.has_modules() {
      let (trees, bare_files) = self.build_module_trees(&mut dynamic_files, disable_cache)?;
      has_require = !trees.is_empty();
      self.chunkify_module_trees(&trees, &mut combined);
      for index in bare_files {
        combined.add_empty_lines(1);
        self.emit_whole_file(index, &mut combined, disable_cache)?;
      }
    } else {
      let mut first = true;
      for index in 0..self.files.len() {
        if self.files[index].lazy {
          continue;
        }
        if !first {
          combined.add_empty_lines(6);
        }
        first = false;
        self.used_files.insert(index);
        self.emit_whole_file(index, &mut combined, disable_cache)?;
      }
    }

    Ok(ModulePrelink { combined: combined.finalize()?, dynamic_files, has_require })
  }

  fn emit_whole_file(
    &mut self,
    index: usize,
    combined: &mut CombinedFile,
    disable_cache: bool,
  ) -> BuildResult<()> {
    let file = &self.files[index];
    let serve_path = escape_colons(&file.serve_path);
    let output = file.get_output_with_source_map_cached(&serve_path, disable_cache)?;
    combined.add_code_with_map(serve_path, output.source.clone(), Some(output.source_map.clone()));
    Ok(())
  }

  fn build_module_trees(
    &mut self,
    dynamic_files: &mut Vec<OutputFile>,
    disable_cache: bool,
  ) -> BuildResult<(ModuleTrees, Vec<usize>)> {
    let mut trees = ModuleTrees::default();
    let mut bare_files = Vec::new();

    for index in 0..self.files.len() {
      let file = &self.files[index];
      // Lazy but never imported: the file was compiled, but nothing
      // installs it.
      if file.lazy && !file.imported.is_imported() {
        continue;
      }
      if file.bare {
        self.used_files.insert(index);
        bare_files.push(index);
        continue;
      }
      let (Some(options), Some(abs_module_id)) =
        (file.install_options.clone(), file.abs_module_id.clone())
      else {
        continue;
      };
      self.used_files.insert(index);

      let file = &self.files[index];
      let leaf = if let Some(alias) = &file.alias {
        match alias {
          ModuleAlias::Id(id) => ModuleTreeNode::Alias(id.to_string()),
          ModuleAlias::Disabled => ModuleTreeNode::Disabled,
        }
      } else if file.is_dynamic() {
        let stub = dynamic_stub(file);
        let serve_path = concat_string!("dynamic/", abs_module_id);
        let output = file.get_output_with_source_map_cached(&serve_path, disable_cache)?;
        dynamic_files.push(OutputFile {
          source: output.source.clone(),
          source_map: Some(output.source_map.clone()),
          serve_path: serve_path.into(),
          source_path: Some(file.source_path.clone()),
          dynamic: true,
        });
        ModuleTreeNode::Dynamic(stub)
      } else {
        ModuleTreeNode::File(index)
      };

      add_to_tree(trees.tree_for(&options), &abs_module_id, leaf);
    }
    Ok((trees, bare_files))
  }

  fn chunkify_module_trees(&self, trees: &ModuleTrees, combined: &mut CombinedFile) {
    if trees.is_empty() {
      return;
    }
    // Dynamic modules in a package need eval access to package-scope
    // variables; the app shares the global namespace already.
    let include_eval =
      self.name.is_some() && self.files.iter().any(File::is_dynamic);

    combined.add_generated_code("var require = ");
    for (options, tree) in trees.groups() {
      combined.add_generated_code("meteorInstall(");
      self.write_tree(tree, combined);
      combined.add_generated_code(", ");
      combined.add_generated_code(options.to_install_literal(include_eval));
      combined.add_generated_code(");\n");
    }
  }

  fn write_tree(&self, node: &ModuleTreeNode, combined: &mut CombinedFile) {
    match node {
      ModuleTreeNode::Dir(entries) => {
        combined.add_generated_code("{");
        for (position, (key, child)) in entries.iter().enumerate() {
          if position > 0 {
            combined.add_generated_code(", ");
          }
          combined.add_generated_code(concat_string!(js_quote(key), ": "));
          self.write_tree(child, combined);
        }
        combined.add_generated_code("}");
      }
      ModuleTreeNode::Alias(id) => combined.add_generated_code(js_quote(id)),
      ModuleTreeNode::Dynamic(stub) => {
        combined.add_generated_code(serde_json::to_string(stub).unwrap());
      }
      ModuleTreeNode::Disabled => combined.add_generated_code("function(){}"),
      ModuleTreeNode::File(index) => {
        let file = &self.files[*index];
        let parts = file.get_prelinked_parts();
        combined.add_generated_code(parts.header);
        combined.add_code_with_map(escape_colons(&file.serve_path), parts.code, parts.map);
        combined.add_generated_code(parts.footer);
      }
    }
  }
}

/// Dependency-list stub installed in place of a dynamic module, extended
/// with the loader-relevant `package.json` fields when the file carries
/// parsed JSON.
fn dynamic_stub(file: &File) -> Vec<serde_json::Value> {
  let mut stub: Vec<serde_json::Value> =
    file.deps.iter().map(|dep| serde_json::Value::String(dep.to_string())).collect();
  if let Some(serde_json::Value::Object(json)) = &file.json_data {
    let mut picked = serde_json::Map::new();
    for key in ["browser", "module", "main"] {
      if let Some(value) = json.get(key) {
        if value.is_string() || value.is_object() {
          picked.insert(key.to_string(), value.clone());
        }
      }
    }
    if !picked.is_empty() {
      stub.push(serde_json::Value::Object(picked));
    }
  }
  stub
}

#[cfg(test)]
mod tests {
  use super::*;

  fn leaf_at<'t>(root: &'t ModuleTreeNode, path: &[&str]) -> &'t ModuleTreeNode {
    let mut node = root;
    for segment in path {
      let ModuleTreeNode::Dir(entries) = node else {
        panic!("expected a directory at {segment}");
      };
      node = entries.get(*segment).expect(segment);
    }
    node
  }

  #[test]
  fn insertion_splits_on_slashes_and_shares_parents() {
    let mut root = ModuleTreeNode::dir();
    add_to_tree(&mut root, "/client/app/a.js", ModuleTreeNode::File(0));
    add_to_tree(&mut root, "/client/app/b.js", ModuleTreeNode::File(1));
    add_to_tree(&mut root, "/client/c.js", ModuleTreeNode::File(2));

    assert!(matches!(leaf_at(&root, &["client", "app", "a.js"]), ModuleTreeNode::File(0)));
    assert!(matches!(leaf_at(&root, &["client", "app", "b.js"]), ModuleTreeNode::File(1)));
    assert!(matches!(leaf_at(&root, &["client", "c.js"]), ModuleTreeNode::File(2)));

    let ModuleTreeNode::Dir(top) = &root else { unreachable!() };
    assert_eq!(top.len(), 1);
  }

  #[test]
  fn leading_slash_produces_no_empty_segment() {
    let mut root = ModuleTreeNode::dir();
    add_to_tree(&mut root, "/a.js", ModuleTreeNode::Alias("/b.js".into()));
    let ModuleTreeNode::Dir(entries) = &root else { unreachable!() };
    assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["a.js"]);
  }

  #[test]
  fn groups_by_options_identity_not_structure() {
    let shared = isolink_common::InstallOptions::extensions(&[".js"]);
    let lookalike = isolink_common::InstallOptions::extensions(&[".js"]);
    let mut trees = ModuleTrees::default();
    trees.tree_for(&shared);
    trees.tree_for(&shared.clone());
    trees.tree_for(&lookalike);
    assert_eq!(trees.groups().len(), 2);
  }
}
