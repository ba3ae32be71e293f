//! CLI integration tests for `rivetc`.
//!
//! Runs the built binary end-to-end with `std::process::Command`.

use std::path::PathBuf;
use std::process::{Command, Output};

/// Path to a test fixture file.
fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn rivetc(args: &[&str], file: Option<&str>) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rivetc"));
    cmd.args(args).env_remove("RIVET_LOG");
    if let Some(name) = file {
        cmd.arg(fixture(name));
    }
    cmd.output().expect("failed to execute rivetc")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

// ============================================================================
// check
// ============================================================================

#[test]
fn test_check_valid() {
    let output = rivetc(&["check"], Some("hello.rv"));
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(stdout(&output).contains("ok (2 node(s), 3 mode binding(s)"));
}

#[test]
fn test_check_syntax_error_exits_3() {
    let output = rivetc(&["check", "--color", "never"], Some("syntax_error.rv"));
    assert_eq!(output.status.code(), Some(3));
    let err = stderr(&output);
    assert!(err.contains("E0100"), "{}", err);
    assert!(err.contains("aborting due to"), "{}", err);
}

#[test]
fn test_check_semantic_error_exits_4() {
    let output = rivetc(&["check"], Some("semantic_error.rv"));
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_check_short_format() {
    let output = rivetc(&["--error-format", "short", "--color", "never", "check"], Some("semantic_error.rv"));
    let err = stderr(&output);
    assert!(
        err.contains("semantic_error.rv:2:9 error: unknown mode 'Waiting' for node 'A'"),
        "{}",
        err
    );
    assert!(err.contains("mode A->Waiting\n        ^"), "{}", err);
}

#[test]
fn test_check_json_format() {
    let output = rivetc(&["--error-format", "json", "check"], Some("semantic_error.rv"));
    assert_eq!(output.status.code(), Some(4));
    let doc = json(&output);
    assert_eq!(doc["success"], false);
    let first = &doc["errors"][0];
    assert_eq!(first["severity"], "error");
    assert_eq!(first["code"], "E0200");
    assert_eq!(first["line"], 2);
    assert_eq!(first["column"], 9);
    assert!(first["help"].as_str().is_some_and(|h| h.contains("systemMode Waiting")));
}

#[test]
fn test_check_json_success() {
    let output = rivetc(&["--error-format", "json", "check"], Some("hello.rv"));
    assert_eq!(output.status.code(), Some(0));
    let doc = json(&output);
    assert_eq!(doc["success"], true);
    assert_eq!(doc["errors"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_missing_file_exits_1() {
    let output = rivetc(&["check"], Some("does_not_exist.rv"));
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("cannot read"));
}

#[test]
fn test_usage_error_exits_2() {
    let output = rivetc(&["frobnicate"], None);
    assert_eq!(output.status.code(), Some(2));
}

// ============================================================================
// lex / parse
// ============================================================================

#[test]
fn test_lex_prints_tokens() {
    let output = rivetc(&["lex"], Some("hello.rv"));
    assert_eq!(output.status.code(), Some(0));
    let out = stdout(&output);
    assert!(out.contains("KEYWORD"));
    assert!(out.contains("INDENT"));
    assert!(out.lines().last().is_some_and(|l| l.contains("EOF")));
}

#[test]
fn test_parse_prints_tree() {
    let output = rivetc(&["parse"], Some("hello.rv"));
    assert_eq!(output.status.code(), Some(0));
    let out = stdout(&output);
    assert!(out.starts_with("Program\n"));
    assert!(out.contains("  Node name=Main type=Supervisor controller"));
    assert!(out.contains("    Topic speed : float path=/worker/speed"));
}

// ============================================================================
// fmt
// ============================================================================

#[test]
fn test_fmt_check_passes_on_canonical_file() {
    let output = rivetc(&["fmt", "--check"], Some("hello.rv"));
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
}

#[test]
fn test_fmt_check_fails_on_unformatted_file() {
    let output = rivetc(&["fmt", "--check"], Some("unformatted.rv"));
    assert_eq!(output.status.code(), Some(5));
    assert!(stderr(&output).contains("is not formatted"));
}

#[test]
fn test_fmt_prints_canonical_source() {
    let output = rivetc(&["fmt"], Some("unformatted.rv"));
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "node A : W\n    topic x : int\n");
}

#[test]
fn test_fmt_write_in_place() {
    let path = std::env::temp_dir().join(format!("rivet_fmt_{}.rv", std::process::id()));
    std::fs::write(&path, "node A:W\n").expect("write temp file");
    let output = Command::new(env!("CARGO_BIN_EXE_rivetc"))
        .args(["fmt", "-w"])
        .arg(&path)
        .output()
        .expect("failed to execute rivetc");
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(std::fs::read_to_string(&path).expect("read back"), "node A : W\n");
    let _ = std::fs::remove_file(&path);
}

// ============================================================================
// build
// ============================================================================

#[test]
fn test_build_to_stdout() {
    let output = rivetc(&["build"], Some("hello.rv"));
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    let code = stdout(&output);
    assert!(code.contains("pub struct MainNode"));
    assert!(code.contains("fn main()"));
    assert!(code.contains("thread::sleep"));
}

#[test]
fn test_build_no_loop_to_file() {
    let path = std::env::temp_dir().join(format!("rivet_build_{}.rs", std::process::id()));
    let output = Command::new(env!("CARGO_BIN_EXE_rivetc"))
        .args(["build", "--no-loop", "-o"])
        .arg(&path)
        .arg(fixture("hello.rv"))
        .output()
        .expect("failed to execute rivetc");
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    let code = std::fs::read_to_string(&path).expect("generated file");
    assert!(code.contains("network.boot();"));
    assert!(!code.contains("thread::sleep"));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_build_refuses_invalid_program() {
    let output = rivetc(&["build"], Some("semantic_error.rv"));
    assert_eq!(output.status.code(), Some(4));
    assert!(stdout(&output).is_empty());
}

// ============================================================================
// graph
// ============================================================================

#[test]
fn test_graph_dot() {
    let output = rivetc(&["graph"], Some("pipeline.rv"));
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    let dot = stdout(&output);
    assert!(dot.starts_with("digraph RivetArchitecture {"));
    assert!(dot.contains("\"Cam__frame\" -> \"Ai\" [color=green];"));
    assert!(dot.contains("\"Ai\" -> \"Cam\" [style=dashed, label=\"shoot\"];"));
}

#[test]
fn test_graph_html() {
    let output = rivetc(&["graph", "--html"], Some("pipeline.rv"));
    assert_eq!(output.status.code(), Some(0));
    let html = stdout(&output);
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("new Viz()"));
}

// ============================================================================
// simulate
// ============================================================================

#[test]
fn test_simulate_prints_program_output() {
    let output = rivetc(&["simulate"], Some("hello.rv"));
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert_eq!(
        stdout(&output),
        "[SYS] Transitioning to: Startup\nstarting\n[SYS] Transitioning to: Active\n[Worker] [INFO] worker active\n"
    );
}

#[test]
fn test_simulate_trace_shows_all_events() {
    let output = rivetc(&["simulate", "--trace"], Some("hello.rv"));
    assert_eq!(output.status.code(), Some(0));
    let out = stdout(&output);
    assert!(out.contains("[SYS] Transitioning to: Active"));
    assert!(out.lines().count() > 4);
}

#[test]
fn test_simulate_requested_modes() {
    let output = rivetc(&["simulate", "--mode", "Normal"], Some("hello.rv"));
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.ends_with("[Worker] [INFO] worker active\n[SYS] Transitioning to: Normal\n"), "{}", out);
}

#[test]
fn test_simulate_unknown_mode_exits_1() {
    let output = rivetc(&["simulate", "--mode", "Nowhere"], Some("hello.rv"));
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Nowhere"));
}

#[test]
fn test_simulate_json() {
    let output = rivetc(&["--error-format", "json", "simulate"], Some("hello.rv"));
    assert_eq!(output.status.code(), Some(0));
    let doc = json(&output);
    assert_eq!(doc["success"], true);
    let trace = doc["trace"].as_array().expect("trace array");
    assert!(trace
        .iter()
        .any(|r| r["kind"] == "system" && r["text"] == "[SYS] Transitioning to: Startup"));
}
