use std::sync::Arc;

use serde::Serialize;

/// Opaque options the runtime loader receives alongside a module tree.
/// Grouping is by handle identity, not structure: the compiler hands the
/// same `Arc` to every file that belongs to the same install group.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstallOptions(pub serde_json::Map<String, serde_json::Value>);

pub type SharedInstallOptions = Arc<InstallOptions>;

impl InstallOptions {
  pub fn new(map: serde_json::Map<String, serde_json::Value>) -> SharedInstallOptions {
    Arc::new(Self(map))
  }

  /// The common case: `{"extensions": [".js", ...]}`.
  pub fn extensions(extensions: &[&str]) -> SharedInstallOptions {
    let mut map = serde_json::Map::new();
    map.insert(
      "extensions".into(),
      serde_json::Value::Array(
        extensions.iter().map(|ext| serde_json::Value::String((*ext).into())).collect(),
      ),
    );
    Self::new(map)
  }

  /// Pretty-printed literal for the generated `meteorInstall(...)` call.
  /// With `include_eval`, an `eval` property goes in before the closing
  /// brace so dynamically loaded modules can reach package-scope variables
  /// through string evaluation in this lexical context.
  pub fn to_install_literal(&self, include_eval: bool) -> String {
    let json = serde_json::to_string_pretty(&self.0).unwrap();
    if !include_eval {
      return json;
    }
    match json.strip_suffix("\n}") {
      Some(head) => {
        format!("{head},\n  \"eval\": function () {{ return eval(arguments[0]); }}\n}}")
      }
      // `{}` pretty-prints without a newline.
      None => "{\n  \"eval\": function () { return eval(arguments[0]); }\n}".to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn identity_not_structure_distinguishes_groups() {
    let a = InstallOptions::extensions(&[".js"]);
    let b = InstallOptions::extensions(&[".js"]);
    assert_eq!(a, b);
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &a.clone()));
  }

  #[test]
  fn install_literal_is_pretty_json() {
    let options = InstallOptions::extensions(&[".js", ".json"]);
    assert_eq!(
      options.to_install_literal(false),
      "{\n  \"extensions\": [\n    \".js\",\n    \".json\"\n  ]\n}",
    );
  }

  #[test]
  fn eval_property_lands_before_the_closing_brace() {
    let options = InstallOptions::extensions(&[".js"]);
    let literal = options.to_install_literal(true);
    assert!(literal.ends_with(
      ",\n  \"eval\": function () { return eval(arguments[0]); }\n}"
    ));

    let empty = InstallOptions::new(serde_json::Map::new());
    assert_eq!(
      empty.to_install_literal(true),
      "{\n  \"eval\": function () { return eval(arguments[0]); }\n}",
    );
  }
}
