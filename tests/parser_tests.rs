//! Parser integration tests: whole programs, declaration shapes and error
//! recovery.

use proptest::prelude::*;
use rivet::driver;
use rivet::parser::{BinOp, Decl, ExprKind, Handler, InterpPart, Literal, ModeDecl, StmtKind, TypeKind};
use rivet::{parse_source, Diagnostics, Program, SourceMap};

fn parse(src: &str) -> (Program, Diagnostics) {
    let mut diags = Diagnostics::new();
    let program = parse_source(src, &mut diags);
    (program, diags)
}

fn parse_ok(src: &str) -> Program {
    let (program, diags) = parse(src);
    assert!(!diags.has_errors(), "unexpected errors: {:?}", diags.sorted());
    program
}

fn mode<'p>(program: &'p Program, node: &str, name: &str) -> &'p ModeDecl {
    program
        .modes()
        .find(|m| m.node.name == node && m.name.text == name)
        .unwrap_or_else(|| panic!("mode {}->{} not found", node, name))
}

const NETWORK: &str = r#"// camera pipeline
systemMode Startup

node Cam : Camera {fps: 30, device: "/dev/video0"} controller
    topic frame : Image = "/cam/frame"
    topic count : int
    onRequest shoot(n: int) -> bool
        count.publish(n)
        return true
    onRequest reset() do clear
    func clear()
        count.publish(0)

node Ai : Detector ignore system
    onListen Cam.frame(img: Image)
        request silent Cam.shoot(1)

mode Cam->Startup
    log info "starting at {30 * 2} fps"
    transition system Normal

mode Ai->"Busy" ignore system do "Idle"

mode Ai->"Idle"
    onListen Cam.count(c: int) do track
"#;

// ============================================================================
// Declarations
// ============================================================================

#[test]
fn test_declaration_order_is_kept() {
    let program = parse_ok(NETWORK);
    let kinds: Vec<&str> = program
        .decls
        .iter()
        .map(|d| match d {
            Decl::SystemMode(_) => "systemMode",
            Decl::Node(_) => "node",
            Decl::Mode(_) => "mode",
            Decl::Func(_) => "func",
        })
        .collect();
    assert_eq!(kinds, vec!["systemMode", "node", "node", "mode", "mode", "mode"]);
}

#[test]
fn test_node_members() {
    let program = parse_ok(NETWORK);
    let cam = program.node("Cam").expect("Cam");
    assert!(cam.is_controller);
    assert_eq!(cam.config.as_deref(), Some("{fps: 30, device: \"/dev/video0\"}"));

    assert_eq!(cam.topics.len(), 2);
    assert_eq!(cam.topics[0].path, "/cam/frame");
    assert_eq!(cam.topics[0].ty.kind, TypeKind::Custom("Image".to_string()));
    assert_eq!(cam.topics[1].path, "/Cam/count");
    assert_eq!(cam.topics[1].ty.kind, TypeKind::Int);

    assert_eq!(cam.requests.len(), 2);
    let shoot = &cam.requests[0];
    assert_eq!(shoot.sig.params.len(), 1);
    assert_eq!(shoot.sig.return_type.as_ref().map(|t| &t.kind), Some(&TypeKind::Bool));
    assert!(matches!(&cam.requests[1].handler, Handler::Delegate(target) if target.name == "clear"));
    assert_eq!(cam.private_funcs[0].sig.name.name, "clear");
}

#[test]
fn test_listener_with_source_and_param() {
    let program = parse_ok(NETWORK);
    let ai = program.node("Ai").expect("Ai");
    assert!(ai.ignores_system);
    let listener = &ai.listeners[0];
    assert_eq!(listener.source_node.as_ref().map(|n| n.name.as_str()), Some("Cam"));
    assert_eq!(listener.topic.name, "frame");
    assert_eq!(listener.param.as_ref().map(|p| p.name.name.as_str()), Some("img"));
    match listener.handler.body() {
        [stmt] => match &stmt.kind {
            StmtKind::Request {
                node,
                func,
                args,
                silent,
            } => {
                assert_eq!(node.name, "Cam");
                assert_eq!(func.name, "shoot");
                assert_eq!(args.len(), 1);
                assert!(*silent);
            }
            other => panic!("expected request, got {:?}", other),
        },
        other => panic!("expected one statement, got {:?}", other),
    }
}

#[test]
fn test_mode_bindings() {
    let program = parse_ok(NETWORK);

    let startup = mode(&program, "Cam", "Startup");
    assert!(!startup.name.quoted);
    assert_eq!(startup.body.len(), 2);
    assert!(matches!(
        &startup.body[1].kind,
        StmtKind::Transition { system: true, state, .. } if state.text == "Normal"
    ));

    let busy = mode(&program, "Ai", "Busy");
    assert!(busy.name.quoted);
    assert!(busy.ignores_system);
    assert_eq!(busy.delegate_to.as_ref().map(|d| d.text.as_str()), Some("Idle"));
    assert!(busy.body.is_empty());

    let idle = mode(&program, "Ai", "Idle");
    assert_eq!(idle.listeners.len(), 1);
    assert!(matches!(&idle.listeners[0].handler, Handler::Delegate(t) if t.name == "track"));
}

#[test]
fn test_if_elif_else_chain() {
    let src = "func f(x: int) -> int\n    if x > 10\n        return 2\n    elif x > 5\n        return 1\n    else\n        return 0\n";
    let program = parse_ok(src);
    let func = program.funcs().next().expect("func");
    match &func.body[0].kind {
        StmtKind::If {
            then_body,
            elifs,
            else_body,
            ..
        } => {
            assert_eq!(then_body.len(), 1);
            assert_eq!(elifs.len(), 1);
            assert_eq!(else_body.as_ref().map(Vec::len), Some(1));
        }
        other => panic!("expected if, got {:?}", other),
    }
}

#[test]
fn test_empty_program() {
    let program = parse_ok("// nothing here\n\n");
    assert!(program.decls.is_empty());
}

// ============================================================================
// Error recovery
// ============================================================================

#[test]
fn test_independent_errors_reported_together() {
    let src = "node : Camera\n\nnode B : Sensor\n    topic t : int\n\nmode B->\n\nnode C : Sensor\n";
    let (program, diags) = parse(src);
    assert!(diags.error_count() >= 2, "{:?}", diags.sorted());
    // Declarations after the broken ones still parse.
    assert!(program.node("B").is_some());
    assert!(program.node("C").is_some());
}

#[test]
fn test_bad_statement_does_not_lose_the_block() {
    let src = "func f()\n    print \"a\"\n    publish\n    print \"b\"\n";
    let (program, diags) = parse(src);
    assert!(diags.has_errors());
    let func = program.funcs().next().expect("func");
    assert!(func.body.len() >= 2);
}

#[test]
fn test_errors_are_sorted_by_position() {
    let (_, diags) = parse("node : A\nnode : B\n");
    let starts: Vec<usize> = diags.sorted().iter().map(|d| d.span.start).collect();
    let mut sorted = starts.clone();
    sorted.sort();
    assert_eq!(starts, sorted);
}

// ============================================================================
// String interpolation
// ============================================================================

fn print_in_func(message: &str) -> String {
    format!("func f(a: int, b: int)\n    print \"{}\"\n", message)
}

fn log_parts(src: &str) -> Vec<InterpPart> {
    let program = parse_ok(src);
    let func = program.funcs().next().expect("func");
    match &func.body[0].kind {
        StmtKind::Log { parts, .. } => parts.clone(),
        other => panic!("expected a log statement, got {:?}", other),
    }
}

/// Parses through the driver and checks the run is a syntax failure whose
/// errors include `needle`.
fn assert_syntax_error(src: &str, needle: &str) {
    let analysis = driver::parse(SourceMap::new("t.rv", src));
    let err = analysis.status().expect_err("expected syntax errors");
    assert_eq!(err.exit_code(), 3, "{}", err);
    let messages: Vec<&str> = analysis.diagnostics.errors().map(|d| d.message.as_str()).collect();
    assert!(
        messages.iter().any(|m| m.contains(needle)),
        "no error contains '{}': {:?}",
        needle,
        messages
    );
}

#[test]
fn test_interpolation_nested_expression() {
    let parts = log_parts(&print_in_func("sum={a + b * 2}"));
    assert_eq!(parts.len(), 2);
    assert!(matches!(&parts[0], InterpPart::Text(t) if t == "sum="));
    let InterpPart::Expr(expr) = &parts[1] else {
        panic!("expected an expression part, got {:?}", parts[1]);
    };
    let ExprKind::Binary { op: BinOp::Add, left, right } = &expr.kind else {
        panic!("expected '+' at the root, got {:?}", expr.kind);
    };
    assert!(matches!(&left.kind, ExprKind::Ident(id) if id.name == "a"));
    match &right.kind {
        ExprKind::Binary { op: BinOp::Mul, left, right } => {
            assert!(matches!(&left.kind, ExprKind::Ident(id) if id.name == "b"));
            assert!(matches!(&right.kind, ExprKind::Literal(Literal::Int(2))));
        }
        other => panic!("expected '*' on the right, got {:?}", other),
    }
}

#[test]
fn test_interpolation_escaped_braces() {
    let parts = log_parts(&print_in_func("{{a}} = {a}}}"));
    assert_eq!(parts.len(), 3, "{:?}", parts);
    assert!(matches!(&parts[0], InterpPart::Text(t) if t == "{a} = "));
    assert!(matches!(&parts[1], InterpPart::Expr(e) if matches!(&e.kind, ExprKind::Ident(id) if id.name == "a")));
    assert!(matches!(&parts[2], InterpPart::Text(t) if t == "}"));
}

#[test]
fn test_interpolation_expression_spans_point_into_the_file() {
    let src = print_in_func("x {b}");
    let parts = log_parts(&src);
    let InterpPart::Expr(expr) = &parts[1] else {
        panic!("expected an expression part");
    };
    assert_eq!(&src[expr.span.start..expr.span.end], "b");
    assert_eq!(expr.span.line, 2);
}

#[test]
fn test_interpolation_unclosed_brace() {
    assert_syntax_error(&print_in_func("value {a"), "unclosed '{'");
}

#[test]
fn test_interpolation_unmatched_closing_brace() {
    assert_syntax_error(&print_in_func("value }"), "unmatched '}'");
}

#[test]
fn test_interpolation_empty_braces() {
    assert_syntax_error(&print_in_func("value {}"), "empty interpolation");
    assert_syntax_error(&print_in_func("value {  }"), "empty interpolation");
}

#[test]
fn test_interpolation_trailing_tokens() {
    let analysis = driver::parse(SourceMap::new("t.rv", print_in_func("{a b}")));
    assert_eq!(analysis.status().map_err(|e| e.exit_code()), Err(3));
}

// ============================================================================
// Properties
// ============================================================================

fn fragment_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "node", "A", ":", "T", "mode", "->", "\"X\"", "topic", "t", "int", "(", ")", "do",
        "onListen", "onRequest", "request", "silent", ".", "publish", "if", "elif", "else",
        "return", "transition", "system", "print", "\"s {x}\"", "1", "2.5", "+", "*", "==",
        "not", "and", "{a: 1}", "\n", "\n    ", "\n        ", ",",
    ])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_parser_never_panics(parts in prop::collection::vec(fragment_strategy(), 0..40)) {
        let src = parts.join(" ");
        let (_, diags) = parse(&src);
        // Every diagnostic points inside the source.
        for diag in diags.iter() {
            prop_assert!(diag.span.start <= src.len());
        }
    }

    #[test]
    fn prop_well_formed_nodes_parse(
        name in "[A-Z][a-z]{0,6}",
        handle in "[a-z]{1,6}",
        ty in prop::sample::select(vec!["int", "float", "string", "bool", "Image"]),
    ) {
        prop_assume!(rivet::lexer::TokenKind::keyword(&handle).is_none());
        let src = format!("node {} : T\n    topic {} : {}\n", name, handle, ty);
        let (program, diags) = parse(&src);
        prop_assert!(!diags.has_errors());
        let node = program.node(&name).expect("node");
        prop_assert_eq!(node.topics[0].path.clone(), format!("/{}/{}", name, handle));
    }
}
