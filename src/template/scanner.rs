use crate::error::SqlReuseError;

/// Piece of a template fragment: literal SQL or a named parameter marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Piece {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
}

/// Split `text` into literals and `#{name}` markers.
///
/// Markers inside quoted strings, quoted identifiers and comments are left as literal text.
pub(crate) fn scan_pieces(text: &str) -> Result<Vec<Piece>, SqlReuseError> {
    let bytes = text.as_bytes();
    let mut pieces = Vec::new();
    let mut state = State::Normal;
    let mut literal_start = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                    state = State::LineComment;
                    idx += 1;
                }
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'#' if bytes.get(idx + 1) == Some(&b'{') => {
                    let close = text[idx + 2..].find('}').ok_or_else(|| {
                        SqlReuseError::TemplateError(format!(
                            "unterminated parameter marker at byte {idx}"
                        ))
                    })?;
                    let name_end = idx + 2 + close;
                    let name = validate_name(&text[idx + 2..name_end], idx)?;
                    if literal_start < idx {
                        pieces.push(Piece::Literal(text[literal_start..idx].to_string()));
                    }
                    pieces.push(Piece::Param(name.to_string()));
                    idx = name_end;
                    literal_start = name_end + 1;
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if b == b'/' && bytes.get(idx + 1) == Some(&b'*') {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
        }
        idx += 1;
    }

    if literal_start < text.len() {
        pieces.push(Piece::Literal(text[literal_start..].to_string()));
    }
    Ok(pieces)
}

fn validate_name(raw: &str, at: usize) -> Result<&str, SqlReuseError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(SqlReuseError::TemplateError(format!(
            "empty parameter marker at byte {at}"
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '.'))
    {
        return Err(SqlReuseError::TemplateError(format!(
            "invalid character {bad:?} in parameter `{name}`"
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Piece {
        Piece::Literal(s.to_string())
    }

    fn param(s: &str) -> Piece {
        Piece::Param(s.to_string())
    }

    #[test]
    fn splits_markers_and_literals() {
        let pieces = scan_pieces("SELECT * FROM t WHERE a = #{a} AND b = #{ b }").expect("scan");
        assert_eq!(
            pieces,
            vec![
                lit("SELECT * FROM t WHERE a = "),
                param("a"),
                lit(" AND b = "),
                param("b"),
            ]
        );
    }

    #[test]
    fn markers_in_strings_and_comments_stay_literal() {
        let sql = "SELECT '#{a}', \"#{b}\" -- #{c}\n/* #{d} /* nested */ #{e} */ FROM t";
        assert_eq!(scan_pieces(sql).expect("scan"), vec![lit(sql)]);
    }

    #[test]
    fn escaped_quote_does_not_end_string() {
        let pieces = scan_pieces("SELECT 'it''s #{x}' , #{y}").expect("scan");
        assert_eq!(pieces, vec![lit("SELECT 'it''s #{x}' , "), param("y")]);
    }

    #[test]
    fn rejects_malformed_markers() {
        assert!(matches!(
            scan_pieces("SELECT #{a"),
            Err(SqlReuseError::TemplateError(_))
        ));
        assert!(matches!(
            scan_pieces("SELECT #{  }"),
            Err(SqlReuseError::TemplateError(_))
        ));
        assert!(matches!(
            scan_pieces("SELECT #{a-b}"),
            Err(SqlReuseError::TemplateError(_))
        ));
    }
}
