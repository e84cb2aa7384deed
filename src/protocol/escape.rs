//! Shared quote/escape table used by the Header Line Parser (`spec.md`
//! §4.4) and the Tuple Line Parser (`spec.md` §4.5).

/// Unescapes `\\ \f \n \r \t \"` and three-digit octal `\NNN` (0-255)
/// sequences in `s`. An unrecognized escape sequence emits the escaped
/// character literally (`spec.md` §4.4).
pub(crate) fn unescape(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 >= bytes.len() {
            // Safe: we only ever re-slice at ASCII-boundary indices because
            // `\\` and digits are single-byte; non-ASCII runs are copied
            // whole via the `find` below.
            let start = i;
            i += 1;
            while i < bytes.len() && bytes[i] != b'\\' {
                i += 1;
            }
            out.push_str(&s[start..i]);
            continue;
        }

        let escaped = bytes[i + 1];
        if escaped.is_ascii_digit() && i + 4 <= bytes.len() {
            let octal = &bytes[i + 1..i + 4];
            if octal.iter().all(|b| (b'0'..=b'7').contains(b)) {
                if let Ok(value) = u8::from_str_radix(std::str::from_utf8(octal).unwrap(), 8) {
                    out.push(value as char);
                    i += 4;
                    continue;
                }
            }
        }

        match escaped {
            b'\\' => out.push('\\'),
            b'f' => out.push('\u{c}'),
            b'n' => out.push('\n'),
            b'r' => out.push('\r'),
            b't' => out.push('\t'),
            b'"' => out.push('"'),
            other => out.push(other as char),
        }
        i += 2;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescapes_known_sequences() {
        // source text: a\tb\n\"c\"  (literal backslash-t etc.)
        assert_eq!(unescape("a\\tb\\n\\\"c\\\""), "a\tb\n\"c\"");
    }

    #[test]
    fn unescapes_octal() {
        // \101 is 'A' in octal.
        assert_eq!(unescape("\\101BC"), "ABC");
    }

    #[test]
    fn unrecognized_escape_emits_literally() {
        assert_eq!(unescape("a\\zb"), "azb");
    }

    #[test]
    fn passes_through_plain_text() {
        assert_eq!(unescape("hello world"), "hello world");
    }
}
