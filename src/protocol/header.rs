//! Header Line Parser (`spec.md` §4.4): decodes `% value,\tvalue # name`
//! metadata lines attached to a result set.

use crate::error::{protocol_err, Result};
use crate::protocol::escape::unescape;

/// Which metadata field a `%` line carries, keyed off its trailing
/// `# name` suffix (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderName {
    Name,
    Length,
    Type,
    TypeSizes,
    TableName,
    Other(String),
}

/// A parsed `%` line: the field it names plus its comma-tab-separated raw
/// value tokens, still quoted/escaped as received.
#[derive(Debug, Clone)]
pub struct HeaderLine {
    pub field: HeaderName,
    raw_values: Vec<String>,
}

impl HeaderLine {
    /// Decodes each value token, stripping and unescaping surrounding
    /// quotes where present.
    pub fn strings(&self) -> Vec<String> {
        self.raw_values.iter().map(|v| decode_value(v)).collect()
    }

    /// Decodes every value token as an integer (used for `length` and
    /// `typesizes` lines).
    pub fn ints(&self) -> Result<Vec<i64>> {
        self.raw_values
            .iter()
            .map(|v| {
                v.trim()
                    .parse::<i64>()
                    .map_err(|_| protocol_err!("expected an integer in header field, got {v:?}"))
            })
            .collect()
    }

    /// Decodes every value token as a `precision scale` pair of integers
    /// separated by whitespace, the shape a `typesizes` line uses (`spec.md`
    /// §4.4), e.g. `"9 2"`.
    pub fn int_pairs(&self) -> Result<Vec<(i64, i64)>> {
        self.raw_values
            .iter()
            .map(|v| {
                let mut parts = v.trim().split_whitespace();
                let precision = parts
                    .next()
                    .and_then(|p| p.parse::<i64>().ok())
                    .ok_or_else(|| protocol_err!("expected a 'precision scale' pair, got {v:?}"))?;
                let scale = parts
                    .next()
                    .and_then(|p| p.parse::<i64>().ok())
                    .ok_or_else(|| protocol_err!("expected a 'precision scale' pair, got {v:?}"))?;
                if parts.next().is_some() {
                    return Err(protocol_err!("expected a 'precision scale' pair, got {v:?}"));
                }
                Ok((precision, scale))
            })
            .collect()
    }

    pub fn column_count(&self) -> usize {
        self.raw_values.len()
    }
}

/// Parses a `%` line. The field name is the text after the last `#`,
/// searching backwards from the end of the line; everything before it is
/// split on `,\t` into per-column value tokens.
pub(crate) fn parse(line: &str) -> Result<HeaderLine> {
    let bytes = line.as_bytes();
    if bytes.first() != Some(&b'%') {
        return Err(protocol_err!("not a header line: {line:?}"));
    }
    let body = &line[1..];

    let hash_pos = body
        .rfind('#')
        .ok_or_else(|| protocol_err!("missing '#' field name in header line: {line:?}"))?;

    let name_part = body[hash_pos + 1..].trim();
    let values_part = body[..hash_pos].trim();

    let field = match name_part {
        "name" => HeaderName::Name,
        "length" => HeaderName::Length,
        "type" => HeaderName::Type,
        "typesizes" => HeaderName::TypeSizes,
        "table_name" => HeaderName::TableName,
        other => HeaderName::Other(other.to_string()),
    };

    let raw_values = if values_part.is_empty() {
        Vec::new()
    } else {
        values_part.split(",\t").map(|v| v.trim().to_string()).collect()
    };

    Ok(HeaderLine { field, raw_values })
}

/// Strips a pair of surrounding double quotes and unescapes the contents;
/// unquoted tokens pass through unchanged.
fn decode_value(v: &str) -> String {
    let trimmed = v.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        unescape(&trimmed[1..trimmed.len() - 1])
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_header() {
        let h = parse("% sys.foo,\tsys.foo # name").unwrap();
        assert_eq!(h.field, HeaderName::Name);
        assert_eq!(h.strings(), vec!["sys.foo", "sys.foo"]);
    }

    #[test]
    fn parses_length_header_as_ints() {
        let h = parse("% 7,\t24 # length").unwrap();
        assert_eq!(h.field, HeaderName::Length);
        assert_eq!(h.ints().unwrap(), vec![7, 24]);
    }

    #[test]
    fn parses_typesizes_header_as_precision_scale_pairs() {
        let h = parse("% 9 2,\t18 0 # typesizes").unwrap();
        assert_eq!(h.field, HeaderName::TypeSizes);
        assert_eq!(h.int_pairs().unwrap(), vec![(9, 2), (18, 0)]);
    }

    #[test]
    fn rejects_malformed_typesizes_pair() {
        let h = parse("% 9 # typesizes").unwrap();
        assert!(h.int_pairs().is_err());
    }

    #[test]
    fn parses_type_header() {
        let h = parse("% int,\tvarchar # type").unwrap();
        assert_eq!(h.field, HeaderName::Type);
        assert_eq!(h.strings(), vec!["int", "varchar"]);
    }

    #[test]
    fn parses_table_name_header() {
        let h = parse("% sys.foo # table_name").unwrap();
        assert_eq!(h.field, HeaderName::TableName);
        assert_eq!(h.strings(), vec!["sys.foo"]);
    }

    #[test]
    fn unescapes_quoted_values() {
        let h = parse("% \"a\\tb\",\t\"c\" # name").unwrap();
        assert_eq!(h.strings(), vec!["a\tb", "c"]);
    }

    #[test]
    fn unknown_field_name_is_preserved() {
        let h = parse("% 1 # something_else").unwrap();
        assert_eq!(h.field, HeaderName::Other("something_else".to_string()));
    }

    #[test]
    fn rejects_missing_hash() {
        assert!(parse("% 1 2 3").is_err());
    }
}
