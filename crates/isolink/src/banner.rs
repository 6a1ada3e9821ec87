/// Renders a `//`-framed box around the given lines, the frame every emitted
/// file opens with.
pub fn banner(lines: &[&str]) -> String {
  let max_len = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0);
  let divider = "/".repeat(max_len + 6);
  let spacer = format!("// {} //", " ".repeat(max_len));

  let mut out = String::new();
  out.push_str(&divider);
  out.push('\n');
  out.push_str(&spacer);
  out.push('\n');
  for line in lines {
    let padding = " ".repeat(max_len - line.chars().count());
    out.push_str("// ");
    out.push_str(line);
    out.push_str(&padding);
    out.push_str(" //\n");
  }
  out.push_str(&spacer);
  out.push('\n');
  out.push_str(&divider);
  out.push('\n');
  out
}

pub fn source_map_instructions_comment() -> String {
  banner(&[
    "This is a generated file. You can view the original",
    "source in your browser if your browser supports source maps.",
    "Source maps are supported by all recent versions of Chrome, Safari,",
    "and Firefox, and by Internet Explorer 11.",
  ])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn frames_lines_in_a_box() {
    let rendered = banner(&["a.js", "(bare)"]);
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "////////////");
    assert_eq!(lines[1], "//        //");
    assert_eq!(lines[2], "// a.js   //");
    assert_eq!(lines[3], "// (bare) //");
    assert_eq!(lines[5], lines[0]);
    // Every line is the same width.
    assert!(lines.iter().all(|line| line.chars().count() == lines[0].chars().count()));
  }
}
