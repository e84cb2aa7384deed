//! Start-of-Header Parser (`spec.md` §4.3): tokenizes `&<kind> <int>...`
//! lines into a typed record of integers/strings.

use crate::error::{parse_err, protocol_err, Result};

/// The kind of response a `&` line announces (`spec.md` §3). `Q_PREPARE`
/// is parsed as `Table`-shaped, per the REDESIGN FLAGS resolution in
/// `SPEC_FULL.md` §F (9.b).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoHeaderKind {
    Parse,
    Table,
    Update,
    Schema,
    Trans,
    Prepare,
    Block,
    Unknown,
}

impl SoHeaderKind {
    fn from_digit(d: u8) -> Self {
        match d {
            0 => SoHeaderKind::Parse,
            1 => SoHeaderKind::Table,
            2 => SoHeaderKind::Update,
            3 => SoHeaderKind::Schema,
            4 => SoHeaderKind::Trans,
            5 => SoHeaderKind::Prepare,
            6 => SoHeaderKind::Block,
            _ => SoHeaderKind::Unknown,
        }
    }

    /// Number of fields this kind's SOHeader line carries (`spec.md` §3).
    fn field_count(self) -> usize {
        match self {
            SoHeaderKind::Parse | SoHeaderKind::Schema => 0,
            SoHeaderKind::Table | SoHeaderKind::Prepare => 4,
            SoHeaderKind::Update => 2,
            SoHeaderKind::Trans => 1,
            SoHeaderKind::Block => 4,
            SoHeaderKind::Unknown => 0,
        }
    }
}

/// A parsed `&` line: `(kind, fields...)` (`spec.md` §3). Integer fields are
/// always present in `ints`; `Trans`'s single field is the `t`/`f`
/// autocommit flag, decoded into `autocommit` instead.
#[derive(Debug, Clone)]
pub struct SoHeader {
    pub kind: SoHeaderKind,
    pub ints: Vec<i64>,
    pub autocommit: Option<bool>,
}

impl SoHeader {
    /// Table/Prepare shape: `(id, tuplecount, columncount, rowcount)`.
    pub fn table_fields(&self) -> Option<(i64, i64, i64, i64)> {
        match self.ints.as_slice() {
            [id, tuplecount, columncount, rowcount] => {
                Some((*id, *tuplecount, *columncount, *rowcount))
            }
            _ => None,
        }
    }

    /// Update shape: `(count, lastid)`.
    pub fn update_fields(&self) -> Option<(i64, i64)> {
        match self.ints.as_slice() {
            [count, lastid] => Some((*count, *lastid)),
            _ => None,
        }
    }

    /// Block shape: `(id, columncount, rowcount, offset)`.
    pub fn block_fields(&self) -> Option<(i64, i64, i64, i64)> {
        match self.ints.as_slice() {
            [id, columncount, rowcount, offset] => Some((*id, *columncount, *rowcount, *offset)),
            _ => None,
        }
    }
}

/// Parses a `&` line. The second byte is the kind digit; one space is
/// skipped if the kind carries parameters; remaining tokens are
/// space-separated integers (optionally signed) except `Trans`'s `t`/`f`
/// flag.
pub(crate) fn parse(line: &str) -> Result<SoHeader> {
    let bytes = line.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'&' {
        return Err(protocol_err!("not a start-of-header line: {line:?}"));
    }

    if !bytes[1].is_ascii_digit() {
        return Err(parse_err!(1, "expected a digit"));
    }
    let kind = SoHeaderKind::from_digit(bytes[1] - b'0');
    let field_count = kind.field_count();

    if field_count == 0 {
        return Ok(SoHeader {
            kind,
            ints: Vec::new(),
            autocommit: None,
        });
    }

    let mut rest = &line[2..];
    if let Some(stripped) = rest.strip_prefix(' ') {
        rest = stripped;
    } else if !rest.is_empty() {
        return Err(protocol_err!(
            "expected a space after the SOHeader kind in {line:?}"
        ));
    }

    if kind == SoHeaderKind::Trans {
        let token = rest.trim_end();
        let autocommit = match token {
            "t" => true,
            "f" => false,
            _ => {
                return Err(protocol_err!(
                    "expected `t` or `f` for the autocommit flag, got {token:?}"
                ))
            }
        };
        return Ok(SoHeader {
            kind,
            ints: Vec::new(),
            autocommit: Some(autocommit),
        });
    }

    let mut ints = Vec::with_capacity(field_count);
    let mut offset = 2 + (line.len() - 2 - rest.len());
    for token in rest.split(' ') {
        if token.is_empty() {
            return Err(parse_err!(offset, "expected a digit"));
        }
        ints.push(parse_signed_int(token, offset)?);
        offset += token.len() + 1;
    }

    if ints.len() != field_count {
        return Err(protocol_err!(
            "expected {field_count} fields for a {kind:?} SOHeader, got {}: {line:?}",
            ints.len()
        ));
    }

    Ok(SoHeader {
        kind,
        ints,
        autocommit: None,
    })
}

fn parse_signed_int(token: &str, offset: usize) -> Result<i64> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(parse_err!(offset, "expected a digit"));
    }

    let value: i64 = digits
        .parse()
        .map_err(|_| parse_err!(offset, "expected a digit"))?;
    Ok(if negative { -value } else { value })
}
