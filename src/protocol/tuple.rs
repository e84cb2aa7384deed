//! Tuple Line Parser (`spec.md` §4.5): decodes `[ ... ]` result rows and
//! `=value` singleton rows into per-column values.

use smallvec::SmallVec;

use crate::error::{parse_err, protocol_err, Result};
use crate::protocol::escape::unescape;

/// One decoded row. Inlines up to 8 columns before spilling to the heap,
/// which covers the overwhelming majority of result sets.
pub type TupleRow = SmallVec<[Option<String>; 8]>;

/// Parses a `[ ... ]` tuple line into `expected_columns` values. Fields are
/// separated by `,\t`; double-quoted fields are unescaped with the same
/// table as the Header Line Parser; a bare, unquoted `NULL` decodes to
/// `None`.
pub(crate) fn parse(line: &str, expected_columns: usize) -> Result<TupleRow> {
    if line.as_bytes().first() != Some(&b'[') {
        return Err(protocol_err!("not a tuple line: {line:?}"));
    }
    let content = &line[1..];
    let (fields, closed) = scan_fields(content);
    if !closed {
        return Err(protocol_err!("unterminated tuple line: {line:?}"));
    }
    if fields.len() != expected_columns {
        return Err(parse_err!(line.len(), "illegal result length"));
    }
    Ok(fields)
}

/// Parses a `=value` singleton row (the entire result is one column, one
/// row, with no surrounding `[ ]`).
pub(crate) fn parse_singleton(line: &str) -> Result<Option<String>> {
    if line.as_bytes().first() != Some(&b'=') {
        return Err(protocol_err!("not a singleton result line: {line:?}"));
    }
    Ok(decode_field(line[1..].trim(), line[1..].trim().starts_with('"')))
}

/// Scans comma-tab separated, quote-aware fields out of `content` until a
/// closing `]` is found. Returns the parsed fields and whether the line
/// was properly closed.
fn scan_fields(content: &str) -> (TupleRow, bool) {
    let mut fields = TupleRow::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut field_quoted = false;
    let mut closed = false;

    for c in content.chars() {
        if in_string {
            if escaped {
                current.push(c);
                escaped = false;
            } else if c == '\\' {
                current.push(c);
                escaped = true;
            } else if c == '"' {
                in_string = false;
            } else {
                current.push(c);
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                field_quoted = true;
            }
            ',' => {
                fields.push(decode_field(&current, field_quoted));
                current.clear();
                field_quoted = false;
            }
            '\t' => {}
            ']' => {
                fields.push(decode_field(&current, field_quoted));
                closed = true;
                break;
            }
            _ => current.push(c),
        }
    }

    (fields, closed)
}

/// Unescapes a quoted field, or trims and NULL-checks an unquoted one.
fn decode_field(raw: &str, quoted: bool) -> Option<String> {
    if quoted {
        let inner = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')).unwrap_or(raw);
        Some(unescape(inner))
    } else {
        let trimmed = raw.trim();
        if trimmed == "NULL" {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}
