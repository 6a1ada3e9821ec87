use isolink_utils::indexmap::FxIndexMap;

/// Nested rendering of dotted symbol names: `Foo.bar` hangs a `bar` leaf
/// under the `Foo` root.
#[derive(Debug)]
pub enum SymbolTreeNode {
  Leaf(String),
  Branch(FxIndexMap<String, SymbolTreeNode>),
}

pub fn build_symbol_tree<'a, I>(entries: I) -> FxIndexMap<String, SymbolTreeNode>
where
  I: IntoIterator<Item = (&'a str, String)>,
{
  let mut roots = FxIndexMap::default();
  for (dotted, value) in entries {
    insert(&mut roots, dotted, value);
  }
  roots
}

fn insert(roots: &mut FxIndexMap<String, SymbolTreeNode>, dotted: &str, value: String) {
  let mut parts: Vec<&str> = dotted.split('.').collect();
  let Some(last) = parts.pop() else {
    return;
  };
  let mut children = roots;
  for part in parts {
    let entry = children
      .entry(part.to_string())
      .or_insert_with(|| SymbolTreeNode::Branch(FxIndexMap::default()));
    if !matches!(entry, SymbolTreeNode::Branch(_)) {
      *entry = SymbolTreeNode::Branch(FxIndexMap::default());
    }
    let SymbolTreeNode::Branch(next) = entry else {
      unreachable!();
    };
    children = next;
  }
  children.insert(last.to_string(), SymbolTreeNode::Leaf(value));
}

/// Renders a node as a JS expression; branches become object literals
/// indented two spaces past `indent`.
pub fn write_symbol_tree(node: &SymbolTreeNode, indent: usize) -> String {
  match node {
    SymbolTreeNode::Leaf(value) => value.clone(),
    SymbolTreeNode::Branch(children) => {
      let mut out = String::from("{\n");
      let pad = " ".repeat(indent + 2);
      for (position, (key, child)) in children.iter().enumerate() {
        out.push_str(&pad);
        out.push_str(key);
        out.push_str(": ");
        out.push_str(&write_symbol_tree(child, indent + 2));
        if position + 1 < children.len() {
          out.push(',');
        }
        out.push('\n');
      }
      out.push_str(&" ".repeat(indent));
      out.push('}');
      out
    }
  }
}
