//! Code generation tests: the shape of the emitted Rust program.

use rivet::codegen::runtime_source;
use rivet::{generate, parse_source, validate, CodegenOptions, Diagnostics};

fn build_with(src: &str, options: &CodegenOptions) -> String {
    let mut diags = Diagnostics::new();
    let program = parse_source(src, &mut diags);
    assert!(validate(&program, &mut diags), "{:?}", diags.sorted());
    generate(&program, options).expect("codegen")
}

fn build(src: &str) -> String {
    build_with(src, &CodegenOptions::default())
}

const PIPELINE: &str = r#"systemMode Startup
systemMode Active

node Main : Supervisor controller
    topic tick : int
    onRequest ping(n: int) -> int
        return n + 1

node Worker : Motor {gain: 2}
    topic speed : float = "/worker/speed"
    func scaled(v: int) -> float
        return v * 1.5

mode Main->Startup
    tick.publish(1)
    transition system Active

mode Worker->Startup
    onListen Main.tick(t: int)
        speed.publish(scaled(t))
        request Main.ping(t)

mode Worker->"Busy"
    onListen Main.tick(t: int)
        log warn "busy {t}"
        request silent Main.ping(clamp(t, 0, 10))
"#;

#[test]
fn test_prelude_embeds_runtime() {
    let code = build(PIPELINE);
    assert!(code.starts_with("// Generated by rivetc. Do not edit."));
    assert!(code.contains("mod runtime {"));
    assert!(code.contains("use runtime::{log_line, ModeBus, ModePhase, ModeQueue, SubId, Topic};"));
    let first_runtime_line = runtime_source().lines().next().expect("runtime text");
    assert!(code.contains(first_runtime_line.trim()));
}

#[test]
fn test_header_can_be_disabled() {
    let options = CodegenOptions {
        header: false,
        ..CodegenOptions::default()
    };
    let code = build_with(PIPELINE, &options);
    assert!(!code.contains("Generated by rivetc"));
}

#[test]
fn test_node_structs_and_topics() {
    let code = build(PIPELINE);
    assert!(code.contains("pub struct MainNode {"));
    assert!(code.contains("pub struct WorkerNode {"));
    assert!(code.contains("pub tick: Topic<i64>,"));
    assert!(code.contains("pub speed: Topic<f64>,"));
    assert!(code.contains("tick: Topic::new(\"/Main/tick\"),"));
    assert!(code.contains("speed: Topic::new(\"/worker/speed\"),"));
}

#[test]
fn test_functions_lowered_with_promotion() {
    let code = build(PIPELINE);
    assert!(code.contains("pub fn ping(&self, n: i64) -> i64 {"));
    assert!(code.contains("fn scaled(&self, v: i64) -> f64 {"));
    assert!(code.contains("as f64"));
}

#[test]
fn test_mode_scoped_listeners_get_slots() {
    let code = build(PIPELINE);
    // One slot per mode-scoped listener on Worker.
    assert!(code.contains("rv_slots: (0..2).map(|_| Cell::new(None)).collect(),"));
    assert!(code.contains("self.rv_slots[0].set(Some(rv_net.Main.tick.subscribe("));
    assert!(code.contains("self.rv_slots[1].set(Some(rv_net.Main.tick.subscribe("));
    assert!(code.contains("if let Some(id) = self.rv_slots[0].take() {"));
    assert!(code.contains("rv_net.Main.tick.unsubscribe(id);"));
}

#[test]
fn test_mode_change_procedures() {
    let code = build(PIPELINE);
    assert!(code.contains("pub fn on_system_change(&self, phase: ModePhase, mode: &str) {"));
    assert!(code.contains("self.rv_retire_system();"));
    assert!(code.contains("\"Startup\" => self.rv_arm_0(),"));
    assert!(code.contains("ModePhase::Run => self.run_system_mode(mode),"));
    assert!(code.contains("fn on_local_change(&self, state: &str) {"));
    assert!(code.contains("self.rv_retire_local();"));
    assert!(code.contains("\"Busy\" => {"));
}

#[test]
fn test_statements() {
    let code = build(PIPELINE);
    assert!(code.contains("self.tick.publish(1_i64);"));
    assert!(code.contains("self.rv_net().rv_bus.request(\"Active\");"));
    assert!(code.contains("log_line(\"Worker\", \"DEBUG\", \"request Main.ping\");"));
    assert!(code.contains("log_line(\"Worker\", \"WARN\", &format!(\"busy {}\", t));"));
    assert!(code.contains(".max(0_i64).min(10_i64)"));
    // Silent requests log nothing.
    assert_eq!(code.matches("\"request Main.ping\"").count(), 1);
}

#[test]
fn test_network_boot_order() {
    let code = build(PIPELINE);
    let listen = code.find("self.rv_bus.listen(").expect("bus listener");
    let wire = code.find("self.Main.rv_wire();").expect("wire");
    let enter = code
        .find("self.Main.on_system_change(ModePhase::Enter, \"Init\");")
        .expect("enter Init");
    let init = code.find("self.Main.init();").expect("init");
    assert!(listen < wire && wire < enter && enter < init);
}

#[test]
fn test_ignoring_node_starts_in_local_init() {
    let code = build("node Solo : Lone ignore system\nmode Solo->Init\n    print \"alone\"\n");
    assert!(code.contains("self.set_state(\"Init\");"));
    assert!(code.contains("let _ = (phase, mode);"));
    assert!(!code.contains("self.rv_bus.listen("));
}

#[test]
fn test_main_loop_toggle() {
    let code = build(PIPELINE);
    assert!(code.contains("println!(\"--- Rivet System Started ---\");"));
    assert!(code.contains("std::thread::sleep(std::time::Duration::from_millis(100));"));

    let options = CodegenOptions {
        steady_state: false,
        ..CodegenOptions::default()
    };
    let code = build_with(PIPELINE, &options);
    assert!(!code.contains("thread::sleep"));
}

#[test]
fn test_custom_types_become_unit_structs() {
    let code = build("node Cam : Camera\n    topic frame : Image\n");
    assert!(code.contains("pub struct Image;"));
    assert!(code.contains("pub frame: Topic<custom::Image>,"));
    assert!(code.contains("write!(f, \"<Image>\")"));
}

#[test]
fn test_keywords_are_escaped() {
    let code = build("node A : W\n    topic type : int\n");
    assert!(code.contains("pub r#type: Topic<i64>,"));
}

#[test]
fn test_interpolation_escapes_braces() {
    let code = build("func f(x: int)\n    print \"{{x}} = {x}\"\n");
    assert!(code.contains("println!(\"{{x}} = {}\", x);"));
}

#[test]
fn test_free_functions_module() {
    let code = build("func twice(x: int) -> int\n    return x * 2\nnode A : W\n    topic v : int\n    func go()\n        v.publish(twice(2))\n");
    assert!(code.contains("funcs::twice(2_i64)"));
}

// ============================================================================
// Generated program vs. simulator
// ============================================================================

const RELAY: &str = r#"systemMode Startup
systemMode Active

node Boss : Supervisor controller
    topic level : float
    onRequest audit(n: int)
        print "audit {n}"

node Arm : Manipulator

mode Boss->Init
    transition system Startup

mode Boss->Startup
    level.publish(2.5)
    transition Arm->"Moving"
    transition system Active

mode Arm->Startup
    onListen Boss.level(x: float)
        print "arm saw {x}"

mode Arm->"Moving"
    print "arm moving"
    transition "Done"

mode Arm->"Done"
    request Boss.audit(3)
    log info "arm done"

mode Arm->Active
    print "arm active"
"#;

const RELAY_OUTPUT: &[&str] = &[
    "[SYS] Transitioning to: Startup",
    "arm saw 2.5",
    "arm moving",
    "[Arm] [DEBUG] request Boss.audit",
    "audit 3",
    "[Arm] [INFO] arm done",
    "[SYS] Transitioning to: Active",
    "arm active",
];

fn relay_program() -> rivet::Program {
    let mut diags = Diagnostics::new();
    let program = parse_source(RELAY, &mut diags);
    assert!(validate(&program, &mut diags), "{:?}", diags.sorted());
    program
}

#[test]
fn test_cross_node_transitions_simulated_output() {
    let trace = rivet::simulate(&relay_program(), &[]).expect("trace");
    assert_eq!(trace.output_lines(), RELAY_OUTPUT);
}

#[test]
fn test_generated_program_matches_simulator() {
    let options = CodegenOptions {
        steady_state: false,
        ..CodegenOptions::default()
    };
    let program = relay_program();
    let code = generate(&program, &options).expect("codegen");

    let dir = std::env::temp_dir().join(format!("rivet-codegen-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir");
    let source = dir.join("relay.rs");
    let binary = dir.join(if cfg!(windows) { "relay.exe" } else { "relay" });
    std::fs::write(&source, &code).expect("write source");

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let compiled = match std::process::Command::new(&rustc)
        .args(["--edition", "2021", "-o"])
        .arg(&binary)
        .arg(&source)
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            eprintln!("skipping: cannot run {}: {}", rustc, e);
            return;
        }
    };
    assert!(
        compiled.status.success(),
        "rustc failed:\n{}",
        String::from_utf8_lossy(&compiled.stderr)
    );

    let run = std::process::Command::new(&binary).output().expect("run generated program");
    assert!(run.status.success());
    let stdout = String::from_utf8(run.stdout).expect("utf-8 stdout");

    let mut expected = rivet::simulate(&program, &[]).expect("trace").output_lines();
    expected.push("--- Rivet System Started ---".to_string());
    assert_eq!(stdout.lines().collect::<Vec<_>>(), expected);

    let _ = std::fs::remove_dir_all(&dir);
}
