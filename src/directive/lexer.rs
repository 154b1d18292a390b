//! Argument lexer for tool-call directives
//!
//! Splits the text between a directive's parentheses into ordered argument
//! strings. Model output is untrusted free text, so the lexer tolerates
//! embedded quotes, escape pairs, commas inside nested groups, and stray
//! `keyword=` prefixes, and never fails: worst case it returns fewer or
//! differently-shaped arguments than the model intended.

/// Split a raw argument span into normalized positional arguments.
///
/// A comma separates arguments only outside quotes and at bracket depth zero.
/// All three bracket kinds (`()`, `[]`, `{}`) share one depth counter; a
/// closer below depth zero is clamped rather than treated as an error.
/// Backslash escape pairs are carried verbatim and decoded during
/// normalization.
///
/// When the scan finds no separator at all and the span contains no quote
/// characters, the span is split naively on every comma instead — the common
/// case where the model emits bare arguments with no nested structure.
#[must_use]
pub fn split(raw: &str) -> Vec<String> {
    let mut spans: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth: u32 = 0;
    let mut separators = 0usize;

    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            // Two-character escape literal, decoded later by the normalizer
            current.push(c);
            if let Some(next) = chars.next() {
                current.push(next);
            }
            continue;
        }

        if c == '"' || c == '\'' {
            match quote {
                None => quote = Some(c),
                Some(q) if q == c => quote = None,
                Some(_) => {}
            }
            current.push(c);
            continue;
        }

        if quote.is_none() {
            match c {
                '(' | '[' | '{' => {
                    depth += 1;
                    current.push(c);
                    continue;
                }
                ')' | ']' | '}' => {
                    depth = depth.saturating_sub(1);
                    current.push(c);
                    continue;
                }
                ',' if depth == 0 => {
                    separators += 1;
                    spans.push(std::mem::take(&mut current));
                    continue;
                }
                _ => {}
            }
        }

        current.push(c);
    }
    spans.push(current);

    if separators == 0 && !raw.contains('"') && !raw.contains('\'') {
        return raw.split(',').filter_map(normalize).collect();
    }

    spans.iter().filter_map(|s| normalize(s)).collect()
}

/// Normalize one trimmed argument span.
///
/// Strips one layer of matching outer quotes, then a stray `identifier =`
/// prefix the model sometimes emits (re-stripping quotes it was wrapped
/// around), then decodes the supported escape pairs. Returns `None` for
/// spans that are empty after whitespace trimming.
fn normalize<S: AsRef<str>>(span: S) -> Option<String> {
    let trimmed = span.as_ref().trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut value = strip_outer_quotes(trimmed);
    if let Some(rest) = strip_keyword_prefix(value) {
        value = strip_outer_quotes(rest);
    }

    Some(decode_escapes(value))
}

/// Strip one layer of matching outer quotes (double or single).
fn strip_outer_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Strip a leading `identifier = ` prefix, a workaround for models that emit
/// keyword-argument syntax (`content="..."`) despite being told not to.
///
/// Returns the remainder if a prefix was present. A doubled `==` is left
/// alone so comparison expressions survive.
fn strip_keyword_prefix(s: &str) -> Option<&str> {
    let mut chars = s.char_indices();
    let (_, first) = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }

    let mut pos = first.len_utf8();
    for (i, c) in chars.by_ref() {
        if c.is_ascii_alphanumeric() || c == '_' {
            pos = i + c.len_utf8();
        } else {
            break;
        }
    }

    let rest = s[pos..].trim_start();
    let rest = rest.strip_prefix('=')?;
    if rest.starts_with('=') {
        return None;
    }
    Some(rest.trim_start())
}

/// Decode the supported two-character escape pairs.
///
/// `\n`, `\t`, `\r`, `\"`, `\'` and `\\` become their literal equivalents;
/// any other pair is kept verbatim.
fn decode_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Escape a string so that re-parsing it through [`split`] round-trips.
///
/// Inverse of [`decode_escapes`] for the supported escape set.
#[must_use]
pub fn encode_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_quoted_arguments() {
        assert_eq!(split(r#""a", "b""#), vec!["a", "b"]);
    }

    #[test]
    fn comma_inside_quotes_is_not_a_separator() {
        assert_eq!(split(r#""hello, world", "x""#), vec!["hello, world", "x"]);
    }

    #[test]
    fn comma_inside_nested_group_is_not_a_separator() {
        // Quote characters present, so the depth-tracking path is taken
        assert_eq!(split(r#""outer(inner, x)""#), vec!["outer(inner, x)"]);
        assert_eq!(split(r#"[1, 2], "b""#), vec!["[1, 2]", "b"]);
    }

    #[test]
    fn unquoted_single_span_splits_on_every_comma() {
        // No quotes and no top-level separator: the simple fallback applies
        assert_eq!(split("add(1,2)"), vec!["add(1", "2)"]);
        assert_eq!(split("plain"), vec!["plain"]);
    }

    #[test]
    fn empty_arguments_are_dropped() {
        assert_eq!(split(r#""a", , "b""#), vec!["a", "b"]);
        assert_eq!(split("  "), Vec::<String>::new());
    }

    #[test]
    fn unterminated_quote_closes_at_end_of_input() {
        assert_eq!(split(r#""abc"#), vec!["abc"]);
    }

    #[test]
    fn unbalanced_closers_clamp_at_zero() {
        assert_eq!(split(r#")x), "a""#), vec![")x)", "a"]);
    }

    #[test]
    fn decodes_escape_pairs() {
        assert_eq!(split(r#""line1\nline2""#), vec!["line1\nline2"]);
        assert_eq!(split(r#""tab\there""#), vec!["tab\there"]);
        assert_eq!(split(r#""quote: \" done""#), vec![r#"quote: " done"#]);
        assert_eq!(split(r#""back\\slash""#), vec![r"back\slash"]);
    }

    #[test]
    fn unknown_escape_pairs_are_kept_verbatim() {
        assert_eq!(split(r#""a\qb""#), vec![r"a\qb"]);
    }

    #[test]
    fn escaped_quote_does_not_toggle_quoting() {
        assert_eq!(split(r#""a\",b", "c""#), vec![r#"a",b"#, "c"]);
    }

    #[test]
    fn strips_keyword_prefix() {
        assert_eq!(split(r#"content="hello""#), vec!["hello"]);
        assert_eq!(
            split(r#""note.txt", content="line1\nline2""#),
            vec!["note.txt", "line1\nline2"]
        );
    }

    #[test]
    fn keyword_prefix_inside_quotes_is_preserved() {
        assert_eq!(split(r#""content=hello""#), vec!["content=hello"]);
    }

    #[test]
    fn comparison_expression_is_not_a_keyword_prefix() {
        assert_eq!(split(r#""x", a==b"#), vec!["x", "a==b"]);
    }

    #[test]
    fn escape_roundtrip() {
        let original = "line1\nline2\twith \"quotes\" and \\ back";
        let escaped = encode_escapes(original);
        let reparsed = split(&format!("\"{escaped}\""));
        assert_eq!(reparsed, vec![original.to_string()]);
    }
}
