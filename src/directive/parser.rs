//! Tool-call directive extraction from model output
//!
//! A directive is a `TOOL: name(args)` span embedded in otherwise free text.
//! The regex below only locates candidate markers; argument splitting and the
//! closing-parenthesis search are done by hand so that quoted and nested
//! spans survive intact.

use std::sync::LazyLock;

use regex::Regex;

use super::lexer;

/// Literal token that introduces a directive in model output
pub const MARKER: &str = "TOOL:";

/// Matches a directive marker, the capability name, and its opening paren
static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"TOOL:\s*([A-Za-z_][A-Za-z0-9_]*)\(").expect("valid regex")
});

/// One parsed tool invocation.
///
/// Constructed per match by [`extract`], consumed exactly once by the
/// dispatcher; argument order is positional and significant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Capability name
    pub name: String,
    /// Normalized positional arguments
    pub arguments: Vec<String>,
}

/// Locate every directive in a block of model output.
///
/// Returns the directives in left-to-right source order plus a cleaned copy
/// of the text with the matched spans removed, blank-line runs collapsed,
/// and surrounding whitespace trimmed.
///
/// A marker with no matching closing parenthesis before end of text is not
/// matched at all: the span stays in the cleaned text and yields no
/// directive. Text without the marker is returned unchanged.
#[must_use]
pub fn extract(text: &str) -> (Vec<Directive>, String) {
    if !text.contains(MARKER) {
        return (Vec::new(), text.to_string());
    }

    let mut directives = Vec::new();
    let mut matched_spans: Vec<(usize, usize)> = Vec::new();
    let mut cursor = 0usize;

    for caps in DIRECTIVE_RE.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        // Skip candidates inside an already-matched span
        if whole.start() < cursor {
            continue;
        }

        let args_start = whole.end();
        let Some(close) = find_closing_paren(&text[args_start..]) else {
            // Malformed: leave untouched, keep scanning after the open paren
            cursor = args_start;
            continue;
        };

        let raw = &text[args_start..args_start + close];
        directives.push(Directive {
            name: name.as_str().to_string(),
            arguments: lexer::split(raw),
        });

        let span_end = args_start + close + 1;
        matched_spans.push((whole.start(), span_end));
        cursor = span_end;
    }

    if directives.is_empty() {
        return (Vec::new(), text.to_string());
    }

    let mut cleaned = String::with_capacity(text.len());
    let mut pos = 0;
    for (start, end) in matched_spans {
        cleaned.push_str(&text[pos..start]);
        pos = end;
    }
    cleaned.push_str(&text[pos..]);

    (directives, collapse_blank_lines(&cleaned))
}

/// Find the byte offset of the first unescaped, unquoted `)` at bracket
/// depth zero relative to the span start.
fn find_closing_paren(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut depth: u32 = 0;

    let mut iter = s.char_indices();
    while let Some((i, c)) = iter.next() {
        if c == '\\' {
            iter.next();
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' if depth == 0 => return Some(i),
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}

/// Collapse runs of blank lines to at most one and trim the result.
fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;

    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_single_directive() {
        let (dirs, cleaned) = extract(r#"TOOL: create_file("a.txt", "hi")"#);
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].name, "create_file");
        assert_eq!(dirs[0].arguments, vec!["a.txt", "hi"]);
        assert!(cleaned.is_empty());
    }

    #[test]
    fn cleaned_text_keeps_surrounding_prose() {
        let text = "Let me check.\nTOOL: list_files(\".\")\nDone.";
        let (dirs, cleaned) = extract(text);
        assert_eq!(dirs.len(), 1);
        assert!(!cleaned.contains("list_files"));
        assert!(cleaned.contains("Let me check."));
        assert!(cleaned.contains("Done."));
    }

    #[test]
    fn multiple_directives_in_source_order() {
        let text = "TOOL: a(\"1\") then TOOL: b(\"2\")";
        let (dirs, _) = extract(text);
        assert_eq!(dirs.len(), 2);
        assert_eq!(dirs[0].name, "a");
        assert_eq!(dirs[1].name, "b");
    }

    #[test]
    fn nested_parens_in_quoted_argument() {
        let (dirs, _) = extract(r#"TOOL: f("outer(inner, x)")"#);
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].arguments, vec!["outer(inner, x)"]);
    }

    #[test]
    fn unterminated_directive_is_left_untouched() {
        let text = r#"TOOL: f("abc"#;
        let (dirs, cleaned) = extract(text);
        assert!(dirs.is_empty());
        assert_eq!(cleaned, text);
    }

    #[test]
    fn text_without_marker_is_unchanged() {
        let text = "Nothing to do here, just chat.";
        let (dirs, cleaned) = extract(text);
        assert!(dirs.is_empty());
        assert_eq!(cleaned, text);
    }

    #[test]
    fn malformed_then_wellformed_still_matches_later() {
        let text = "TOOL: broken(\"x then\nTOOL: ok(\"y\") end";
        let (dirs, _) = extract(text);
        // The unterminated quote swallows the rest of the text for the first
        // candidate, but the second is still considered on its own
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].name, "ok");
        assert_eq!(dirs[0].arguments, vec!["y"]);
    }

    #[test]
    fn blank_line_runs_collapse() {
        let text = "Before\nTOOL: f(\"x\")\n\nTOOL: g(\"y\")\n\nAfter";
        let (dirs, cleaned) = extract(text);
        assert_eq!(dirs.len(), 2);
        assert!(!cleaned.contains("\n\n\n"));
        assert!(cleaned.starts_with("Before"));
        assert!(cleaned.ends_with("After"));
    }
}
