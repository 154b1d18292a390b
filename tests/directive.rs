//! Directive parsing and dispatch integration tests
//!
//! Exercises the public extract → dispatch path the conversation loop uses.

use vesper_assistant::directive::{extract, lexer};
use vesper_assistant::{Arity, Directive, ToolRegistry};

mod common;

#[test]
fn well_formed_directive_extracts_name_and_arguments() {
    let (directives, cleaned) = extract(r#"TOOL: create_note("a", "b")"#);

    assert_eq!(directives.len(), 1);
    assert_eq!(directives[0].name, "create_note");
    assert_eq!(directives[0].arguments, vec!["a", "b"]);
    assert!(!cleaned.contains("create_note"));
    assert!(!cleaned.contains('('));
}

#[test]
fn escape_decoding_roundtrips() {
    // Escaped newline decodes to a real newline
    let (directives, _) = extract(r#"TOOL: f("line1\nline2")"#);
    assert_eq!(directives[0].arguments, vec!["line1\nline2"]);

    // Re-escaping and re-lexing yields the original content back
    let original = "line1\nline2";
    let escaped = lexer::encode_escapes(original);
    let args = lexer::split(&format!("\"{escaped}\""));
    assert_eq!(args, vec![original.to_string()]);
}

#[test]
fn nested_parenthesis_stays_one_argument() {
    let (directives, _) = extract(r#"TOOL: f("outer(inner, x)")"#);
    assert_eq!(directives.len(), 1);
    assert_eq!(directives[0].arguments, vec!["outer(inner, x)"]);
}

#[test]
fn unterminated_directive_is_a_no_op() {
    let text = r#"I will call TOOL: f("abc"#;
    let (directives, cleaned) = extract(text);
    assert!(directives.is_empty());
    assert_eq!(cleaned, text);
}

#[test]
fn keyword_prefix_is_stripped() {
    let (directives, _) = extract(r#"TOOL: write_note("a.txt", content="hello")"#);
    assert_eq!(directives[0].arguments, vec!["a.txt", "hello"]);
}

#[test]
fn multiline_file_content_survives_the_pipeline() {
    let (directives, _) =
        extract(r#"TOOL: create_file("note.txt", "Line 1\nLine 2\nLine 3")"#);
    assert_eq!(directives[0].arguments[1], "Line 1\nLine 2\nLine 3");
}

#[test]
fn dispatch_order_matches_source_order() {
    let (calls, registry) = common::recording_registry();

    // slow_tool appears first and takes longer; results and side effects
    // must still come back in source order
    let text = r#"Doing both. TOOL: slow_tool("1") TOOL: fast_tool("2")"#;
    let (directives, _) = extract(text);
    assert_eq!(directives.len(), 2);

    let results = registry.dispatch_all(&directives);
    assert_eq!(results[0].output, "slow:1");
    assert_eq!(results[1].output, "fast:2");

    let recorded = calls.lock().unwrap();
    assert_eq!(*recorded, vec!["slow_tool(1)", "fast_tool(2)"]);
}

#[test]
fn unknown_and_misarity_directives_become_failed_results() {
    let registry = ToolRegistry::builder()
        .register("known", "known tool", Arity::exact(1), |args| {
            Ok(args[0].clone())
        })
        .build();

    let results = registry.dispatch_all(&[
        Directive {
            name: "missing".to_string(),
            arguments: vec![],
        },
        Directive {
            name: "known".to_string(),
            arguments: vec![],
        },
        Directive {
            name: "known".to_string(),
            arguments: vec!["ok".to_string()],
        },
    ]);

    assert_eq!(results.len(), 3);
    assert!(!results[0].success);
    assert!(results[0].output.contains("not found"));
    assert!(!results[1].success);
    assert!(results[1].output.contains("expected 1 arguments, got 0"));
    assert!(results[2].success);
}

#[test]
fn directives_on_multiple_lines_all_extract() {
    let text = "First step:\nTOOL: a(\"x\")\nSecond step:\nTOOL: b(\"y\")\nDone.";
    let (directives, cleaned) = extract(text);

    assert_eq!(directives.len(), 2);
    assert_eq!(directives[0].name, "a");
    assert_eq!(directives[1].name, "b");
    assert!(cleaned.contains("First step:"));
    assert!(cleaned.contains("Done."));
    assert!(!cleaned.contains("TOOL:"));
}
