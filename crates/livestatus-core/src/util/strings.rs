//! String helpers shared by the request parser, log parser and renderers.

/// Characters treated as field-separating whitespace.
const WHITESPACE: &[char] = &[' ', '\t', '\n', '\x0b', '\x0c', '\r'];

/// Splits `text` at every `delimiter`, keeping empty fields.
pub fn split(text: &str, delimiter: char) -> Vec<String> {
    text.split(delimiter).map(str::to_string).collect()
}

/// Splits at most once, returning the part before and after the first delimiter.
pub fn split_once(text: &str, delimiter: char) -> (&str, Option<&str>) {
    match text.split_once(delimiter) {
        Some((head, tail)) => (head, Some(tail)),
        None => (text, None),
    }
}

pub fn lstrip(text: &str) -> &str {
    text.trim_start_matches(WHITESPACE)
}

pub fn rstrip(text: &str) -> &str {
    text.trim_end_matches(WHITESPACE)
}

pub fn strip(text: &str) -> &str {
    rstrip(lstrip(text))
}

pub fn starts_with(input: &str, test: &str) -> bool {
    input.starts_with(test)
}

pub fn ends_with(input: &str, test: &str) -> bool {
    input.ends_with(test)
}

/// Replaces every occurrence of `from` with `to`.
///
/// An empty `from` inserts `to` between all characters and at both ends,
/// so `replace_all("abc", "", "|")` is `"|a|b|c|"`.
pub fn replace_all(text: &str, from: &str, to: &str) -> String {
    if !from.is_empty() {
        return text.replace(from, to);
    }
    let mut result = String::with_capacity(text.len() + (text.len() + 1) * to.len());
    result.push_str(to);
    for c in text.chars() {
        result.push(c);
        result.push_str(to);
    }
    result
}

/// Returns the next whitespace-delimited token and advances `text` past it.
pub fn next_field<'a>(text: &mut &'a str) -> Option<&'a str> {
    let rest = lstrip(text);
    if rest.is_empty() {
        *text = rest;
        return None;
    }
    let end = rest.find(WHITESPACE).unwrap_or(rest.len());
    let (field, tail) = rest.split_at(end);
    *text = tail;
    Some(field)
}

/// Returns the next field up to `delimiter`, advancing past the delimiter.
pub fn next_delimited<'a>(text: &mut &'a str, delimiter: char) -> Option<&'a str> {
    if text.is_empty() {
        return None;
    }
    match text.find(delimiter) {
        Some(pos) => {
            let field = &text[..pos];
            *text = &text[pos + delimiter.len_utf8()..];
            Some(field)
        }
        None => {
            let field = *text;
            *text = "";
            Some(field)
        }
    }
}

/// Undoes the `\n` and `\\` escaping the core applies to long plugin output.
pub fn unescape_newlines(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('\\') => result.push('\\'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

/// Parses a leading integer like C's `atoi`: optional sign, digits, rest ignored.
pub fn parse_leading_int(text: &str) -> i64 {
    let text = lstrip(text);
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value.saturating_mul(10).saturating_add(i64::from(b - b'0'));
    }
    if negative { -value } else { value }
}

/// Parses a leading floating point number like C's `atof`.
pub fn parse_leading_double(text: &str) -> f64 {
    let text = lstrip(text);
    let end = text
        .char_indices()
        .find(|&(i, c)| {
            !(c.is_ascii_digit() || c == '.' || ((c == '-' || c == '+') && i == 0) || c == 'e' || c == 'E')
        })
        .map_or(text.len(), |(i, _)| i);
    // Shrink until the prefix parses, so "1e" or "3.5-" still yield a number.
    let mut candidate = &text[..end];
    while !candidate.is_empty() {
        if let Ok(value) = candidate.parse::<f64>() {
            return value;
        }
        candidate = &candidate[..candidate.len() - 1];
    }
    0.0
}

/// Checks whether the bytes are valid UTF-8.
pub fn is_utf8(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_all_empty_needle() {
        assert_eq!(replace_all("", "", "x"), "x");
        assert_eq!(replace_all("abc", "", "|"), "|a|b|c|");
    }

    #[test]
    fn test_replace_all_regular() {
        assert_eq!(replace_all("a.b.c", ".", "::"), "a::b::c");
        assert_eq!(replace_all("aaa", "aa", "b"), "ba");
        assert_eq!(replace_all("", "a", "b"), "");
    }

    #[test]
    fn test_starts_and_ends_with_reflexive() {
        for s in ["", "a", "host;service", "ümlaut"] {
            assert!(starts_with(s, s));
            assert!(ends_with(s, s));
            assert!(starts_with(s, ""));
            assert!(ends_with(s, ""));
        }
        assert!(!starts_with("abc", "abcd"));
        assert!(!ends_with("abc", "xbc"));
    }

    #[test]
    fn test_strip() {
        assert_eq!(strip("  \tfoo bar \r\n"), "foo bar");
        assert_eq!(lstrip("  x "), "x ");
        assert_eq!(rstrip("  x "), "  x");
        assert_eq!(strip("   "), "");
    }

    #[test]
    fn test_split_keeps_empty_fields() {
        assert_eq!(split("a;;b;", ';'), vec!["a", "", "b", ""]);
        assert_eq!(split("", ';'), vec![""]);
    }

    #[test]
    fn test_next_field() {
        let mut text = "  state   >= 2 ";
        assert_eq!(next_field(&mut text), Some("state"));
        assert_eq!(next_field(&mut text), Some(">="));
        assert_eq!(next_field(&mut text), Some("2"));
        assert_eq!(next_field(&mut text), None);
    }

    #[test]
    fn test_next_delimited() {
        let mut text = "a;b;;c";
        assert_eq!(next_delimited(&mut text, ';'), Some("a"));
        assert_eq!(next_delimited(&mut text, ';'), Some("b"));
        assert_eq!(next_delimited(&mut text, ';'), Some(""));
        assert_eq!(next_delimited(&mut text, ';'), Some("c"));
        assert_eq!(next_delimited(&mut text, ';'), None);
    }

    #[test]
    fn test_unescape_newlines() {
        assert_eq!(unescape_newlines("a\\nb\\\\n"), "a\nb\\n");
        assert_eq!(unescape_newlines("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_parse_leading_numbers() {
        assert_eq!(parse_leading_int("42abc"), 42);
        assert_eq!(parse_leading_int("  -7"), -7);
        assert_eq!(parse_leading_int("x"), 0);
        assert_eq!(parse_leading_double("3.5s"), 3.5);
        assert_eq!(parse_leading_double("-1e3ms"), -1000.0);
        assert_eq!(parse_leading_double("U"), 0.0);
    }
}
