//! Rivet Compiler CLI
//!
//! Command-line interface for the Rivet compiler.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use rivet::codegen::CodegenOptions;
use rivet::driver::{self, Analysis};
use rivet::errors::{render_short, report_diagnostic, CompileError, Diagnostic, LEX_CODE};
use rivet::lexer::TokenKind;
use rivet::sim::{Simulation, TraceRecord};
use rivet::source::SourceMap;
use rivet::{dump, graph};

/// Error format for output
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum ErrorFormat {
    /// ariadne reports with labels and help (default)
    #[default]
    Human,
    /// `file:line:col level: message` with the source line and a caret
    Short,
    /// JSON document on stdout for tooling
    Json,
}

/// When to color diagnostics
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn enabled(self) -> bool {
        match self {
            ColorChoice::Auto => std::io::stderr().is_terminal(),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        }
    }
}

/// A structured diagnostic for JSON output
#[derive(Serialize)]
struct JsonError {
    file: String,
    line: usize,
    column: usize,
    end_line: usize,
    end_column: usize,
    severity: String,
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    help: Option<String>,
}

/// Collection of diagnostics for JSON output
#[derive(Serialize)]
struct JsonOutput {
    success: bool,
    errors: Vec<JsonError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    items_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<Vec<TraceRecord>>,
}

#[derive(Parser)]
#[command(name = "rivetc")]
#[command(version)]
#[command(about = "Rivet compiler - reactive node networks to Rust")]
struct Cli {
    /// Error output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    error_format: ErrorFormat,

    /// Color diagnostics
    #[arg(long, value_enum, default_value = "auto", global = true)]
    color: ColorChoice,

    /// More logging on stderr (-v info, -vv debug, -vvv trace); RIVET_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lex a file and print tokens (for debugging)
    Lex {
        /// Input file
        file: PathBuf,
    },

    /// Parse a file and print the AST
    Parse {
        /// Input file
        file: PathBuf,
    },

    /// Check a file for errors without generating code
    Check {
        /// Input file
        file: PathBuf,
    },

    /// Print a file in canonical form
    Fmt {
        /// Input file
        file: PathBuf,

        /// Exit with status 5 if the file is not already formatted
        #[arg(long)]
        check: bool,

        /// Rewrite the file in place
        #[arg(short, long)]
        write: bool,
    },

    /// Generate a standalone Rust program
    Build {
        /// Input file
        file: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Return from main after start-up instead of idling
        #[arg(long)]
        no_loop: bool,
    },

    /// Export the architecture diagram as Graphviz DOT
    Graph {
        /// Input file
        file: PathBuf,

        /// Emit an HTML page that renders the diagram
        #[arg(long)]
        html: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a network in-process and print what it would print
    Simulate {
        /// Input file
        file: PathBuf,

        /// System modes to request after start-up, in order
        #[arg(long = "mode", value_name = "MODE")]
        modes: Vec<String>,

        /// Print every trace event, not only program output
        #[arg(long)]
        trace: bool,
    },
}

/// Shared output settings.
#[derive(Clone, Copy)]
struct Output {
    format: ErrorFormat,
    color: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let out = Output {
        format: cli.error_format,
        color: cli.color.enabled(),
    };

    let result = match cli.command {
        Commands::Lex { file } => lex(&file, out),
        Commands::Parse { file } => parse(&file, out),
        Commands::Check { file } => check(&file, out),
        Commands::Fmt { file, check, write } => fmt(&file, check, write, out),
        Commands::Build {
            file,
            output,
            no_loop,
        } => build(&file, output.as_deref(), no_loop, out),
        Commands::Graph { file, html, output } => graph(&file, html, output.as_deref(), out),
        Commands::Simulate { file, modes, trace } => simulate(&file, &modes, trace, out),
    };

    if let Err(e) = result {
        match e {
            // Diagnostics were already printed.
            CompileError::Syntax(_) | CompileError::Semantic(_) if out.format != ErrorFormat::Json => {
                eprintln!("error: aborting due to {}", e)
            }
            CompileError::Syntax(_) | CompileError::Semantic(_) => {}
            _ if out.format == ErrorFormat::Json => output_json(JsonOutput {
                success: false,
                errors: vec![plain_json_error(&e)],
                items_count: None,
                trace: None,
            }),
            _ => eprintln!("error: {}", e),
        }
        process::exit(e.exit_code());
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("RIVET_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

// ============================================================================
// Diagnostics output
// ============================================================================

fn to_json_error(source: &SourceMap, diag: &Diagnostic) -> JsonError {
    let (line, column) = source.loc(diag.span.start);
    let (end_line, end_column) = source.loc(diag.span.end.max(diag.span.start));
    JsonError {
        file: source.name().to_string(),
        line,
        column,
        end_line,
        end_column,
        severity: diag.severity.as_str().to_string(),
        code: diag.code.clone().unwrap_or_default(),
        message: diag.message.clone(),
        help: diag.help().map(|s| s.to_string()),
    }
}

/// A driver failure that has no source position.
fn plain_json_error(e: &CompileError) -> JsonError {
    let file = match e {
        CompileError::Read { path, .. } | CompileError::Write { path, .. } => {
            path.display().to_string()
        }
        _ => String::new(),
    };
    JsonError {
        file,
        line: 0,
        column: 0,
        end_line: 0,
        end_column: 0,
        severity: "error".to_string(),
        code: String::new(),
        message: e.to_string(),
        help: None,
    }
}

fn output_json(output: JsonOutput) {
    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("error: cannot serialize output: {}", e),
    }
}

/// Print diagnostics in the human or short form. JSON output is assembled
/// by each command instead.
fn print_diagnostics<'a>(source: &SourceMap, diags: impl IntoIterator<Item = &'a Diagnostic>, out: Output) {
    for diag in diags {
        match out.format {
            ErrorFormat::Human => {
                if let Err(e) = report_diagnostic(source, diag, out.color) {
                    tracing::warn!(error = %e, "cannot render diagnostic");
                }
            }
            ErrorFormat::Short => eprint!("{}", render_short(source, diag, out.color)),
            ErrorFormat::Json => {}
        }
    }
}

/// Report an analysis' diagnostics and pass its status on. In JSON mode
/// this also writes the JSON document unless `more_output` says the
/// command still has something to add on success.
fn finish_front_end(analysis: &Analysis, out: Output, more_output: bool) -> rivet::Result<()> {
    let sorted = analysis.diagnostics.sorted();
    if out.format == ErrorFormat::Json {
        let status = analysis.status();
        if status.is_err() || !more_output {
            output_json(JsonOutput {
                success: status.is_ok(),
                errors: sorted
                    .iter()
                    .map(|d| to_json_error(&analysis.source, d))
                    .collect(),
                items_count: Some(analysis.program.decls.len()),
                trace: None,
            });
        }
        return status;
    }
    print_diagnostics(&analysis.source, sorted, out);
    analysis.status()
}

fn write_or_print(output: Option<&Path>, text: &str) -> rivet::Result<()> {
    match output {
        Some(path) => driver::write_output(path, text),
        None => {
            print!("{}", text);
            Ok(())
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn lex(file: &Path, out: Output) -> rivet::Result<()> {
    let source = driver::read_source(file)?;
    let tokens = driver::tokenize(&source);

    let errors: Vec<Diagnostic> = tokens
        .iter()
        .filter_map(|t| match &t.kind {
            TokenKind::Invalid(message) => {
                Some(Diagnostic::error(message.clone(), t.span).with_code(LEX_CODE))
            }
            _ => None,
        })
        .collect();

    match out.format {
        ErrorFormat::Json => output_json(JsonOutput {
            success: errors.is_empty(),
            errors: errors.iter().map(|d| to_json_error(&source, d)).collect(),
            items_count: Some(tokens.len()),
            trace: None,
        }),
        _ => {
            for token in &tokens {
                let (line, col) = source.loc(token.span.start);
                println!("{:>4}:{:<3} {:<10} {}", line, col, token.kind.name(), token.lexeme.trim_end());
            }
            print_diagnostics(&source, &errors, out);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(CompileError::Syntax(errors.len()))
    }
}

fn parse(file: &Path, out: Output) -> rivet::Result<()> {
    let analysis = driver::parse(driver::read_source(file)?);
    finish_front_end(&analysis, out, false)?;
    if out.format != ErrorFormat::Json {
        print!("{}", dump::dump_program(&analysis.program));
    }
    Ok(())
}

fn check(file: &Path, out: Output) -> rivet::Result<()> {
    let analysis = driver::analyze(driver::read_source(file)?);
    finish_front_end(&analysis, out, false)?;
    if out.format != ErrorFormat::Json {
        let program = &analysis.program;
        println!(
            "{}: ok ({} node(s), {} mode binding(s), {} warning(s))",
            analysis.source.name(),
            program.nodes().count(),
            program.modes().count(),
            analysis.diagnostics.warning_count()
        );
    }
    Ok(())
}

fn fmt(file: &Path, check: bool, write: bool, out: Output) -> rivet::Result<()> {
    let analysis = driver::parse(driver::read_source(file)?);
    finish_front_end(&analysis, out, true)?;

    if check {
        // A mismatch is reported by `main` like any other driver failure.
        driver::format_check(&analysis)?;
        if out.format == ErrorFormat::Json {
            finish_front_end(&analysis, out, false)?;
        }
        return Ok(());
    }

    let formatted = driver::format(&analysis)?;
    if write {
        if formatted != analysis.source.text() {
            driver::write_output(file, &formatted)?;
        }
    } else {
        print!("{}", formatted);
    }
    if out.format == ErrorFormat::Json {
        finish_front_end(&analysis, out, false)?;
    }
    Ok(())
}

fn build(file: &Path, output: Option<&Path>, no_loop: bool, out: Output) -> rivet::Result<()> {
    let analysis = driver::analyze(driver::read_source(file)?);
    finish_front_end(&analysis, out, true)?;
    let options = CodegenOptions {
        steady_state: !no_loop,
        ..CodegenOptions::default()
    };
    let code = driver::build(&analysis, &options)?;
    write_or_print(output, &code)?;
    if out.format == ErrorFormat::Json {
        finish_front_end(&analysis, out, false)?;
    }
    Ok(())
}

fn graph(file: &Path, html: bool, output: Option<&Path>, out: Output) -> rivet::Result<()> {
    let analysis = driver::analyze(driver::read_source(file)?);
    finish_front_end(&analysis, out, true)?;
    let text = if html {
        graph::to_html(&analysis.program)
    } else {
        graph::to_dot(&analysis.program)
    };
    write_or_print(output, &text)?;
    if out.format == ErrorFormat::Json {
        finish_front_end(&analysis, out, false)?;
    }
    Ok(())
}

fn simulate(file: &Path, modes: &[String], all_events: bool, out: Output) -> rivet::Result<()> {
    let analysis = driver::analyze(driver::read_source(file)?);
    finish_front_end(&analysis, out, true)?;

    if out.format == ErrorFormat::Json {
        let trace = driver::run_simulation(&analysis, modes)?;
        output_json(JsonOutput {
            success: trace.faults().next().is_none(),
            errors: analysis
                .diagnostics
                .sorted()
                .iter()
                .map(|d| to_json_error(&analysis.source, d))
                .collect(),
            items_count: None,
            trace: Some(trace.records()),
        });
        return Ok(());
    }

    // Stream output lines as the compiled program would print them.
    let sim = Simulation::new(&analysis.program)?.echo(!all_events);
    sim.boot();
    for mode in modes {
        sim.request_system_mode(mode)?;
    }
    let trace = sim.trace();
    if all_events {
        for event in &trace.events {
            println!("{}", event);
        }
    }
    for fault in trace.faults() {
        eprintln!("warning: {}", fault);
    }
    Ok(())
}
