//! Line Classifier (`spec.md` §4.2): maps the first byte of a server line
//! to a [`LineType`].

/// The class of a decoded server line, keyed off its first character
/// (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineType {
    /// `.` — the server is ready for a new command.
    Prompt,
    /// `,` — a "more data" prompt.
    More,
    /// `&` — start-of-header.
    SoHeader,
    /// `%` — header metadata.
    Header,
    /// `#` — informational/warning text.
    Info,
    /// `!` — error.
    Error,
    /// `^` — redirect.
    Redirect,
    /// `[` — tuple row.
    Result,
    /// `=` — single-value row.
    ResultSingleton,
    /// Reserved for file-transfer lines; never produced by this core
    /// driver's supported command set but classified so the reader can
    /// reject it explicitly rather than falling through to `Unknown`.
    FileTransfer,
    /// Anything else, including a completely empty line.
    Unknown,
}

/// Classifies `line`'s first byte into a [`LineType`]. A line starting
/// with `!` that is not `![0-9A-Z]{5}!.+` is rewritten to prefix
/// `22000!` (the generic data-exception SQLSTATE) before being returned,
/// per `spec.md` §4.2.
pub(crate) fn classify(line: &str) -> (LineType, std::borrow::Cow<'_, str>) {
    use std::borrow::Cow;

    let Some(first) = line.as_bytes().first().copied() else {
        return (LineType::Unknown, Cow::Borrowed(line));
    };

    let ty = match first {
        b'.' => LineType::Prompt,
        b',' => LineType::More,
        b'&' => LineType::SoHeader,
        b'%' => LineType::Header,
        b'#' => LineType::Info,
        b'!' => LineType::Error,
        b'^' => LineType::Redirect,
        b'[' => LineType::Result,
        b'=' => LineType::ResultSingleton,
        _ => LineType::Unknown,
    };

    if ty == LineType::Error && !is_well_formed_sqlstate_error(line) {
        return (ty, Cow::Owned(format!("!22000!{}", &line[1..])));
    }

    (ty, Cow::Borrowed(line))
}

/// `true` if `line` (including its leading `!`) matches
/// `![0-9A-Z]{5}!.+`.
fn is_well_formed_sqlstate_error(line: &str) -> bool {
    let bytes = line.as_bytes();
    if bytes.len() < 8 || bytes[0] != b'!' {
        return false;
    }
    let sqlstate = &bytes[1..6];
    if bytes[6] != b'!' {
        return false;
    }
    sqlstate
        .iter()
        .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
}
