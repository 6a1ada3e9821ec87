/// Colons are not usable in filenames on every platform the bundle may be
/// unpacked on, so serve paths swap them for underscores before they become
/// source-map source names.
pub fn escape_colons(path: &str) -> String {
  path.replace(':', "_")
}

#[test]
fn test_escape_colons() {
  assert_eq!(escape_colons("/node_modules/foo/bar.js"), "/node_modules/foo/bar.js");
  assert_eq!(escape_colons("packages/my:pkg/a.js"), "packages/my_pkg/a.js");
}
