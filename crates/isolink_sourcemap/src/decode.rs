use crate::vlq;

/// One decoded mapping: a generated position, optionally tied back to an
/// original position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
  pub dst_line: u32,
  pub dst_col: u32,
  pub src: Option<SourcePosition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition {
  pub source_id: u32,
  pub line: u32,
  pub col: u32,
  pub name_id: Option<u32>,
}

fn field(value: i64, what: &str) -> anyhow::Result<u32> {
  u32::try_from(value).map_err(|_| anyhow::anyhow!("source map {what} underflowed to {value}"))
}

/// Decodes a full `mappings` string into absolute tokens.
pub fn decode_mappings(mappings: &str) -> anyhow::Result<Vec<Token>> {
  let mut tokens = Vec::new();
  let mut fields = Vec::with_capacity(5);
  let mut src_id: i64 = 0;
  let mut src_line: i64 = 0;
  let mut src_col: i64 = 0;
  let mut name_id: i64 = 0;

  for (line_index, line) in mappings.split(';').enumerate() {
    let mut dst_col: i64 = 0;
    for segment in line.split(',') {
      if segment.is_empty() {
        continue;
      }
      vlq::decode_segment(segment, &mut fields)?;
      if !matches!(fields.len(), 1 | 4 | 5) {
        anyhow::bail!("source map segment {segment:?} has {} fields", fields.len());
      }
      dst_col += fields[0];
      let src = if fields.len() >= 4 {
        src_id += fields[1];
        src_line += fields[2];
        src_col += fields[3];
        let name = if fields.len() == 5 {
          name_id += fields[4];
          Some(field(name_id, "name index")?)
        } else {
          None
        };
        Some(SourcePosition {
          source_id: field(src_id, "source index")?,
          line: field(src_line, "source line")?,
          col: field(src_col, "source column")?,
          name_id: name,
        })
      } else {
        None
      };
      tokens.push(Token {
        dst_line: u32::try_from(line_index).unwrap(),
        dst_col: field(dst_col, "generated column")?,
        src,
      });
    }
  }
  Ok(tokens)
}

/// Encodes absolute tokens back into a `mappings` string. Tokens must be
/// sorted by generated position.
pub fn encode_mappings(tokens: &[Token]) -> String {
  let mut out = String::with_capacity(tokens.len() * 6);
  let mut dst_line: u32 = 0;
  let mut dst_col: i64 = 0;
  let mut src_id: i64 = 0;
  let mut src_line: i64 = 0;
  let mut src_col: i64 = 0;
  let mut name_id: i64 = 0;
  let mut first_on_line = true;

  for token in tokens {
    while dst_line < token.dst_line {
      out.push(';');
      dst_line += 1;
      dst_col = 0;
      first_on_line = true;
    }
    if !first_on_line {
      out.push(',');
    }
    vlq::encode(i64::from(token.dst_col) - dst_col, &mut out);
    dst_col = i64::from(token.dst_col);
    if let Some(src) = token.src {
      vlq::encode(i64::from(src.source_id) - src_id, &mut out);
      src_id = i64::from(src.source_id);
      vlq::encode(i64::from(src.line) - src_line, &mut out);
      src_line = i64::from(src.line);
      vlq::encode(i64::from(src.col) - src_col, &mut out);
      src_col = i64::from(src.col);
      if let Some(name) = src.name_id {
        vlq::encode(i64::from(name) - name_id, &mut out);
        name_id = i64::from(name);
      }
    }
    first_on_line = false;
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_single_identity_token() {
    let tokens = decode_mappings("AAAA").unwrap();
    assert_eq!(
      tokens,
      vec![Token {
        dst_line: 0,
        dst_col: 0,
        src: Some(SourcePosition { source_id: 0, line: 0, col: 0, name_id: None }),
      }]
    );
  }

  #[test]
  fn skips_empty_line_groups() {
    let tokens = decode_mappings(";;AACA").unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].dst_line, 2);
    assert_eq!(tokens[0].src.unwrap().line, 1);
  }

  #[test]
  fn roundtrips_through_encode() {
    let mappings = "AAAA,IAAMC;;EACE,SAAS";
    let tokens = decode_mappings(mappings).unwrap();
    assert_eq!(encode_mappings(&tokens), mappings);
  }

  #[test]
  fn rejects_wrong_field_count() {
    assert!(decode_mappings("AAA").is_err());
  }
}
