//! Lexer integration tests: token streams for whole programs, layout
//! tokens and positions.

use proptest::prelude::*;
use rivet::{Scanner, TokenKind};

fn kinds(src: &str) -> Vec<TokenKind> {
    Scanner::new(src).scan_all().into_iter().map(|t| t.kind).collect()
}

fn ident(s: &str) -> TokenKind {
    TokenKind::Ident(s.to_string())
}

// ============================================================================
// Declarations
// ============================================================================

#[test]
fn test_node_header_with_config_and_flags() {
    assert_eq!(
        kinds("node Cam : Camera {fps: 30} controller ignore system\n"),
        vec![
            TokenKind::Node,
            ident("Cam"),
            TokenKind::Colon,
            ident("Camera"),
            TokenKind::Config("{fps: 30}".to_string()),
            TokenKind::Controller,
            TokenKind::Ignore,
            TokenKind::System,
            TokenKind::Newline,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_topic_with_path() {
    assert_eq!(
        kinds("topic frame : Image = \"/cam/frame\""),
        vec![
            TokenKind::Topic,
            ident("frame"),
            TokenKind::Colon,
            ident("Image"),
            TokenKind::Eq,
            TokenKind::Str("/cam/frame".to_string()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_mode_binding_quoted_and_bare() {
    assert_eq!(
        kinds("mode A->\"Idle\" do Init"),
        vec![
            TokenKind::Mode,
            ident("A"),
            TokenKind::Arrow,
            TokenKind::Str("Idle".to_string()),
            TokenKind::Do,
            ident("Init"),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_type_keywords() {
    assert_eq!(
        kinds("int float string bool"),
        vec![
            TokenKind::IntType,
            TokenKind::FloatType,
            TokenKind::StringType,
            TokenKind::BoolType,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_log_levels_are_keywords() {
    assert_eq!(
        kinds("log warn \"x\""),
        vec![
            TokenKind::Log,
            TokenKind::Warn,
            TokenKind::Str("x".to_string()),
            TokenKind::Eof,
        ]
    );
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn test_nested_blocks() {
    let src = "mode A->Init\n    if x\n        print \"a\"\n    print \"b\"\n";
    let layout: Vec<TokenKind> = kinds(src)
        .into_iter()
        .filter(|k| matches!(k, TokenKind::Indent | TokenKind::Dedent))
        .collect();
    assert_eq!(
        layout,
        vec![
            TokenKind::Indent,
            TokenKind::Indent,
            TokenKind::Dedent,
            TokenKind::Dedent,
        ]
    );
}

#[test]
fn test_tabs_count_as_four_columns() {
    let layout: Vec<TokenKind> = kinds("a\n\tb\n    c\n\t\td\n")
        .into_iter()
        .filter(|k| matches!(k, TokenKind::Indent | TokenKind::Dedent | TokenKind::Invalid(_)))
        .collect();
    assert_eq!(
        layout,
        vec![TokenKind::Indent, TokenKind::Indent, TokenKind::Dedent, TokenKind::Dedent]
    );
}

#[test]
fn test_dedent_between_levels_is_reported() {
    let src = "a\n    b\n        c\n      d\n";
    let k = kinds(src);
    let dedent = k.iter().position(|k| *k == TokenKind::Dedent).expect("dedent");
    assert!(
        matches!(&k[dedent + 1], TokenKind::Invalid(m) if m.starts_with("inconsistent dedent")),
        "{:?}",
        k
    );
    assert_eq!(k[dedent + 2], ident("d"));
    let indents = k.iter().filter(|k| **k == TokenKind::Indent).count();
    let dedents = k.iter().filter(|k| **k == TokenKind::Dedent).count();
    assert_eq!((indents, dedents), (2, 2));
}

#[test]
fn test_config_blob_does_not_affect_layout() {
    let src = "node A : T {\n  a: 1,\n      b: 2\n}\n    topic t : int\n";
    let k = kinds(src);
    assert_eq!(k.iter().filter(|k| **k == TokenKind::Indent).count(), 1);
    assert!(matches!(&k[4], TokenKind::Config(text) if text.contains("b: 2")));
}

#[test]
fn test_layout_token_names() {
    let names: Vec<&str> = kinds("a\n  b\n").iter().map(|k| k.name()).collect();
    assert_eq!(
        names,
        vec!["IDENT", "NEWLINE", "INDENT", "IDENT", "NEWLINE", "DEDENT", "EOF"]
    );
}

// ============================================================================
// Positions
// ============================================================================

#[test]
fn test_positions_are_one_based() {
    let tokens = Scanner::new("node A : T\n    topic t : int\n").scan_all();
    let topic = tokens
        .iter()
        .find(|t| t.kind == TokenKind::Topic)
        .expect("topic token");
    assert_eq!((topic.span.line, topic.span.column), (2, 5));
    assert_eq!(topic.lexeme, "topic");
}

#[test]
fn test_invalid_tokens_do_not_stop_scanning() {
    let k = kinds("a $ b ! c");
    assert_eq!(k.iter().filter(|k| matches!(k, TokenKind::Invalid(_))).count(), 2);
    assert!(k.contains(&ident("c")));
}

// ============================================================================
// Properties
// ============================================================================

/// Leading whitespace of any width, tabs mixed in.
fn indent_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(vec![' ', ' ', ' ', '\t']), 0..12)
        .prop_map(|chars| chars.into_iter().collect())
}

fn line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => (indent_strategy(), "[a-z]{1,6}( [a-z0-9]{1,4}){0,2}")
            .prop_map(|(indent, text)| format!("{}{}", indent, text)),
        1 => indent_strategy(),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_indents_and_dedents_balance(lines in prop::collection::vec(line_strategy(), 0..12)) {
        let src = lines.join("\n");
        let tokens = Scanner::new(&src).scan_all();
        let k: Vec<&TokenKind> = tokens.iter().map(|t| &t.kind).collect();
        let indents = k.iter().filter(|k| ***k == TokenKind::Indent).count();
        let dedents = k.iter().filter(|k| ***k == TokenKind::Dedent).count();
        prop_assert_eq!(indents, dedents);
        prop_assert_eq!(k.last(), Some(&&TokenKind::Eof));

        // One Newline per line break, whatever the indentation.
        let newlines = k.iter().filter(|k| ***k == TokenKind::Newline).count();
        prop_assert_eq!(newlines, src.matches('\n').count());

        // Layout never swallows text: every non-blank character is in some token.
        let text: String = tokens
            .iter()
            .filter(|t| {
                !matches!(
                    t.kind,
                    TokenKind::Indent | TokenKind::Dedent | TokenKind::Newline | TokenKind::Eof | TokenKind::Invalid(_)
                )
            })
            .map(|t| t.lexeme.as_str())
            .collect();
        let expected: String = src.chars().filter(|c| !c.is_whitespace()).collect();
        prop_assert_eq!(text, expected);

        // The only problem layout can report is a dedent between levels.
        for kind in &k {
            if let TokenKind::Invalid(message) = kind {
                prop_assert!(message.starts_with("inconsistent dedent"), "{}", message);
            }
        }
    }

    #[test]
    fn prop_scanner_is_total(src in "\\PC{0,80}") {
        let tokens = Scanner::new(&src).scan_all();
        prop_assert_eq!(tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
        for token in &tokens {
            prop_assert!(token.span.end <= src.len());
        }
    }
}
