//! Semantic validation tests: type rules, mode classification, delegation
//! cycles and request checking.

use rivet::driver::analyze;
use rivet::types::{ModeClass, SymbolTable};
use rivet::{parse_source, validate, Diagnostics, SourceMap, Validator};

fn check(src: &str) -> (bool, Diagnostics) {
    let mut diags = Diagnostics::new();
    let program = parse_source(src, &mut diags);
    assert!(!diags.has_errors(), "parse errors: {:?}", diags.sorted());
    let ok = validate(&program, &mut diags);
    (ok, diags)
}

fn symbols(src: &str) -> SymbolTable {
    let mut diags = Diagnostics::new();
    let program = parse_source(src, &mut diags);
    let mut validator = Validator::new(&mut diags);
    validator.validate(&program);
    validator.into_symbols()
}

fn errors(diags: &Diagnostics) -> Vec<String> {
    diags.errors().map(|d| d.message.clone()).collect()
}

fn assert_valid(src: &str) {
    let (ok, diags) = check(src);
    assert!(ok, "expected a valid program, got {:?}", errors(&diags));
}

fn assert_error(src: &str, needle: &str) {
    let (ok, diags) = check(src);
    assert!(!ok, "expected an error containing '{}'", needle);
    let messages = errors(&diags);
    assert!(
        messages.iter().any(|m| m.contains(needle)),
        "no error contains '{}': {:?}",
        needle,
        messages
    );
}

/// Runs the whole front end and checks the first error mentioning `needle`:
/// its line, and that the run maps to the semantic-error exit code.
fn assert_semantic_error_at(src: &str, needle: &str, line: usize) {
    let analysis = analyze(SourceMap::new("t.rv", src));
    let err = analysis.status().expect_err("expected semantic errors");
    assert_eq!(err.exit_code(), 4, "{}", err);
    let messages: Vec<&str> = analysis.diagnostics.errors().map(|d| d.message.as_str()).collect();
    let diag = analysis
        .diagnostics
        .errors()
        .find(|d| d.message.contains(needle))
        .unwrap_or_else(|| panic!("no error contains '{}': {:?}", needle, messages));
    assert_eq!(diag.span.line, line, "'{}' reported on the wrong line", diag.message);
}

// ============================================================================
// Types
// ============================================================================

#[test]
fn test_int_plus_float_is_float() {
    assert_valid("node A : W\n    topic v : float\n    func f()\n        v.publish(2 + 3.0)\n");
    assert_error(
        "node A : W\n    topic v : int\n    func f()\n        v.publish(2 + 3.0)\n",
        "cannot publish float",
    );
}

#[test]
fn test_int_plus_int_is_int() {
    assert_valid("node A : W\n    topic v : int\n    func f()\n        v.publish(2 + 3)\n");
    assert_error(
        "node A : W\n    topic v : float\n    func f()\n        v.publish(2 + 3)\n",
        "cannot publish int",
    );
}

#[test]
fn test_clamp_of_ints_is_int() {
    assert_valid("func f() -> int\n    return clamp(5, 0, 10)\n");
    assert_valid("func f() -> float\n    return clamp(5, 0.5, 10)\n");
    assert_error("func f() -> int\n    return clamp(5, 0.5, 10)\n", "float");
}

#[test]
fn test_builtin_arity_and_operand_types() {
    assert_error("func f() -> int\n    return clamp(5, 0)\n", "argument count mismatch");
    assert_error("func f() -> int\n    return min(1, \"a\")\n", "string");
}

#[test]
fn test_return_promotes_int_to_float() {
    assert_valid("func f() -> float\n    return 1\n");
}

#[test]
fn test_operator_rules() {
    assert_error("func f() -> bool\n    return not 1\n", "not");
    assert_error("func f() -> bool\n    return 1 and true\n", "bool operands");
    assert_error("func f() -> bool\n    return \"a\" < \"b\"\n", "numeric operands");
    assert_valid("func f() -> bool\n    return 1 == 1.0\n");
    assert_error("func f() -> bool\n    return 1 == \"1\"\n", "same type");
}

#[test]
fn test_identifier_resolution_prefers_parameters() {
    assert_valid(
        "node A : W\n    topic x : string\n    func f(x: int) -> int\n        return x + 1\n",
    );
}

#[test]
fn test_conditions_must_be_bool() {
    assert_error("func f(x: int)\n    if x\n        print \"yes\"\n", "bool");
}

// ============================================================================
// Mode classification
// ============================================================================

const CLASSIFY: &str = r#"systemMode Startup

node A : W
mode A->Startup
    print "system"
mode A->"Startup2"
    print "local"

node B : W ignore system
mode B->Startup
    print "local, node ignores system"

node C : W
mode C->Normal ignore system
    print "local, mode ignores system"
"#;

#[test]
fn test_bare_system_mode_is_system() {
    let table = symbols(CLASSIFY);
    let a = table.node("A").expect("A");
    assert_eq!(a.mode("Startup").map(|m| m.class), Some(ModeClass::System));
    assert_eq!(a.mode("Startup2").map(|m| m.class), Some(ModeClass::Local));
}

#[test]
fn test_quoted_name_is_local() {
    let table = symbols("systemMode Startup\nnode A : W\nmode A->\"Startup\"\n    print \"x\"\n");
    let a = table.node("A").expect("A");
    assert_eq!(a.mode("Startup").map(|m| m.class), Some(ModeClass::Local));
}

#[test]
fn test_ignore_system_makes_every_mode_local() {
    let table = symbols(CLASSIFY);
    assert_eq!(
        table.node("B").and_then(|b| b.mode("Startup")).map(|m| m.class),
        Some(ModeClass::Local)
    );
    assert_eq!(
        table.node("C").and_then(|c| c.mode("Normal")).map(|m| m.class),
        Some(ModeClass::Local)
    );
    assert_valid(CLASSIFY);
}

#[test]
fn test_unknown_bare_mode_name_is_an_error() {
    assert_error("node A : W\nmode A->Waiting\n    print \"x\"\n", "Waiting");
}

#[test]
fn test_reserved_modes_exist_without_declaration() {
    assert_valid("node A : W\nmode A->Init\n    print \"i\"\nmode A->Normal\n    print \"n\"\nmode A->Shutdown\n    print \"s\"\n");
}

#[test]
fn test_duplicate_bindings_rejected() {
    let (ok, _) = check("node A : W\nmode A->\"X\"\n    print \"1\"\nmode A->\"X\"\n    print \"2\"\n");
    assert!(!ok);
    let (ok, _) = check("node A : W\nnode A : V\n");
    assert!(!ok);
}

// ============================================================================
// Delegation cycles
// ============================================================================

#[test]
fn test_two_mode_cycle_detected() {
    assert_error(
        "node A : W\nmode A->\"X\" do \"Y\"\nmode A->\"Y\" do \"X\"\n",
        "circular mode delegation",
    );
}

#[test]
fn test_three_mode_chain_is_fine() {
    assert_valid(
        "node A : W\nmode A->\"X\" do \"Y\"\nmode A->\"Y\" do \"Z\"\nmode A->\"Z\"\n    print \"z\"\n",
    );
}

#[test]
fn test_delegation_to_system_mode_is_external() {
    assert_valid("systemMode Startup\nnode A : W\nmode A->\"X\" do Startup\n");
}

#[test]
fn test_cycles_are_per_node() {
    assert_valid(
        "node A : W\nnode B : W\nmode A->\"X\" do \"Y\"\nmode B->\"Y\" do \"X\"\nmode A->\"Y\"\n    print \"a\"\nmode B->\"X\"\n    print \"b\"\n",
    );
}

// ============================================================================
// Requests, publishes and transitions
// ============================================================================

#[test]
fn test_silent_request_arity_mismatch() {
    let src = r#"node Target : Worker
    onRequest doWork(a: int, b: int, c: int)
        print "work"

node Caller : Client
    func go()
        request silent Target.doWork(1, 2)
"#;
    let (ok, diags) = check(src);
    assert!(!ok);
    assert!(errors(&diags)
        .iter()
        .any(|m| m.contains("argument count mismatch") && m.contains("Target.doWork")));
}

#[test]
fn test_request_to_private_function_rejected() {
    let src = "node T : W\n    func hidden()\n        print \"h\"\nnode C : W\n    func go()\n        request T.hidden()\n";
    let (ok, diags) = check(src);
    assert!(!ok);
    let diag = diags.errors().next().expect("error");
    assert!(diag.help().is_some_and(|h| h.contains("onRequest")));
}

#[test]
fn test_publish_on_unknown_topic() {
    assert_error("node A : W\n    func f()\n        nope.publish(1)\n", "nope");
}

#[test]
fn test_system_transition_needs_controller() {
    assert_error(
        "systemMode Active\nnode A : W\nmode A->Init\n    transition system Active\n",
        "controller",
    );
    assert_valid("systemMode Active\nnode A : W controller\nmode A->Init\n    transition system Active\n");
}

#[test]
fn test_quoted_system_transition_target() {
    assert_valid("systemMode Active\nnode A : W controller\nmode A->Init\n    transition system \"Active\"\n");
}

#[test]
fn test_local_transition_to_system_mode_rejected() {
    assert_error(
        "systemMode Active\nnode A : W\nmode A->Active\n    print \"a\"\nmode A->Init\n    transition Active\n",
        "system mode",
    );
}

#[test]
fn test_transition_of_other_node_needs_controller() {
    let src = "node A : W\nnode B : W\nmode B->\"Run\"\n    print \"r\"\nmode A->Init\n    transition B->\"Run\"\n";
    assert_error(src, "controller");
    assert_valid(&src.replace("node A : W", "node A : W controller"));
}

#[test]
fn test_listener_param_must_match_topic() {
    assert_error(
        "node A : W\n    topic x : int\nnode B : W\n    onListen A.x(v: string)\n        print \"{v}\"\n",
        "string",
    );
}

#[test]
fn test_warnings_do_not_fail_validation() {
    let (ok, diags) = check("node A : W\n    func f() -> int\n        print \"no return\"\n");
    assert!(ok);
    assert!(diags.warning_count() >= 1);
}

#[test]
fn test_request_argument_types() {
    let src = r#"node T : Worker
    onRequest scale(factor: float) -> float
        return factor * 2.0

node C : Client
    func go()
        request T.scale(3)
        request T.scale("fast")
"#;
    assert_semantic_error_at(src, "argument 'factor' of 'T.scale' expects float, found string", 8);

    // Int arguments widen to a float parameter.
    assert_valid(&src.replace("        request T.scale(\"fast\")\n", ""));
}

// ============================================================================
// Listener and request delegation
// ============================================================================

fn listener_delegate(topic_ty: &str, func_params: &str) -> String {
    format!(
        "node A : W\n    topic speed : {}\n    onListen speed do g\n    func g({})\n        print \"g\"\n",
        topic_ty, func_params
    )
}

#[test]
fn test_listener_delegate_with_matching_parameter() {
    assert_valid(&listener_delegate("int", "v: int"));
    assert_valid(&listener_delegate("float", "v: float"));
}

#[test]
fn test_listener_delegate_without_parameters() {
    assert_semantic_error_at(
        &listener_delegate("int", ""),
        "listener delegate 'g' must take exactly one parameter of type int",
        3,
    );
}

#[test]
fn test_listener_delegate_with_two_parameters() {
    assert_semantic_error_at(
        &listener_delegate("int", "a: int, b: int"),
        "listener delegate 'g' must take exactly one parameter of type int",
        3,
    );
}

#[test]
fn test_listener_delegate_with_wrong_type() {
    assert_semantic_error_at(
        &listener_delegate("int", "v: string"),
        "listener delegate 'g' must take exactly one parameter of type int",
        3,
    );
}

#[test]
fn test_listener_delegate_does_not_narrow_float_to_int() {
    assert_semantic_error_at(
        &listener_delegate("float", "v: int"),
        "listener delegate 'g' must take exactly one parameter of type float",
        3,
    );
}

#[test]
fn test_listener_delegate_must_exist() {
    let src = "node A : W\n    topic speed : int\n    onListen speed do missing\n";
    assert_semantic_error_at(src, "unknown private function 'missing' on node 'A'", 3);
}

#[test]
fn test_request_delegate_signature_must_match() {
    let src = r#"node A : W
    onRequest reset(level: int) -> bool do doReset
    func doReset(level: float) -> bool
        return true
"#;
    assert_semantic_error_at(src, "'doReset' cannot handle request 'reset': the signatures differ", 2);

    let same = src.replace("doReset(level: float)", "doReset(level: int)");
    assert_valid(&same);

    let other_return = src.replace("doReset(level: float) -> bool", "doReset(level: int) -> int");
    let other_return = other_return.replace("return true", "return 1");
    assert_semantic_error_at(&other_return, "the signatures differ", 2);
}

// ============================================================================
// Free functions
// ============================================================================

#[test]
fn test_publish_in_free_function_rejected() {
    assert_semantic_error_at(
        "func f()\n    speed.publish(1)\n",
        "'publish' needs an owning node",
        2,
    );
}

#[test]
fn test_request_in_free_function_rejected() {
    let src = "node T : W\n    onRequest work()\n        print \"w\"\nfunc f()\n    request T.work()\n";
    assert_semantic_error_at(src, "'request' needs an owning node", 5);
}

#[test]
fn test_transition_in_free_function_rejected() {
    assert_semantic_error_at(
        "func f()\n    transition \"Idle\"\n",
        "'transition' needs an owning node",
        2,
    );
}

// ============================================================================
// Mode delegation targets and mode listeners
// ============================================================================

#[test]
fn test_unknown_delegation_target() {
    let src = "node A : W\nmode A->\"X\" do \"Nowhere\"\n";
    assert_semantic_error_at(
        src,
        "delegation target 'Nowhere' is neither a mode of node 'A' nor a system mode",
        2,
    );
}

#[test]
fn test_mode_listener_on_unknown_topic() {
    let src = r#"node A : W
    topic level : int
node B : W
mode B->Init
    onListen A.depth(d: int)
        print "{d}"
"#;
    assert_semantic_error_at(src, "node 'A' has no topic 'depth'", 5);
    assert_valid(&src.replace("A.depth", "A.level"));
}
