use crate::concat_string;

/// The accessor rule for package names: a leading ASCII letter followed by
/// ASCII letters and digits. Stricter than full JS identifier syntax on
/// purpose; anything else goes through the bracket form.
pub fn is_identifier_name(name: &str) -> bool {
  let mut chars = name.chars();
  match chars.next() {
    Some(c) if c.is_ascii_alphabetic() => {}
    _ => return false,
  }
  chars.all(|c| c.is_ascii_alphanumeric())
}

pub fn property_access_str(obj: &str, prop: &str) -> String {
  if is_identifier_name(prop) {
    concat_string!(obj, ".", prop)
  } else {
    concat_string!(obj, "[", serde_json::to_string(prop).unwrap(), "]")
  }
}

/// `Package.<name>` for accessor-safe package names, `Package['<name>']`
/// otherwise.
pub fn package_accessor(name: &str) -> String {
  if is_identifier_name(name) {
    concat_string!("Package.", name)
  } else {
    concat_string!("Package[", js_quote(name), "]")
  }
}

pub fn js_quote(value: &str) -> String {
  serde_json::to_string(value).unwrap()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_is_identifier_name() {
    assert!(is_identifier_name("foo"));
    assert!(is_identifier_name("meteor"));
    assert!(!is_identifier_name("1abc"));
    assert!(!is_identifier_name("core-runtime"));
    assert!(!is_identifier_name("a_b"));
    assert!(!is_identifier_name(""));
  }

  #[test]
  fn test_package_accessor() {
    assert_eq!(package_accessor("underscore"), "Package.underscore");
    assert_eq!(package_accessor("core-runtime"), "Package[\"core-runtime\"]");
  }
}
