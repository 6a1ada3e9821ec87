pub mod ecmascript;
pub mod hash;
pub mod indexmap;
pub mod lru;
pub mod serve_path;

/// Concatenate string-ish expressions with a single up-front allocation.
#[macro_export]
macro_rules! concat_string {
  ($($s:expr),+ $(,)?) => {{
    let mut buf = String::with_capacity(0 $(+ AsRef::<str>::as_ref(&$s).len())+);
    $(buf.push_str(AsRef::<str>::as_ref(&$s));)+
    buf
  }};
}

#[test]
fn test_concat_string() {
  let name = String::from("module");
  assert_eq!(concat_string!("function ", name, "(){"), "function module(){");
}
