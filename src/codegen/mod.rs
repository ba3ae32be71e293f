//! Rust code generation for Rivet.
//!
//! This module lowers a validated program to a single self-contained Rust
//! source file that depends on nothing but `std`. The file embeds the
//! [`runtime`](crate::runtime) module verbatim, declares one struct per
//! node and a `Network` that owns them, and wires the subscriptions and
//! mode state machines described by the program.
//!
//! # Usage
//! ```ignore
//! use rivet::codegen::{generate, CodegenOptions};
//!
//! let rust_source = generate(&program, &CodegenOptions::default())?;
//! std::fs::write("network.rs", rust_source)?;
//! ```

mod emit;
mod lower;
mod network;

use thiserror::Error;
use tracing::debug;

use crate::parser::Program;
use crate::plan::{NetworkPlan, PlanError};

pub use lower::rust_ident;

use emit::Emitter;

/// Error during code generation. The input is assumed to be validated, so
/// any of these is a compiler bug rather than a problem in the program.
#[derive(Debug, Error)]
#[error("codegen error: {message}")]
pub struct CodegenError {
    pub message: String,
}

impl CodegenError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<PlanError> for CodegenError {
    fn from(e: PlanError) -> Self {
        Self::new(e.to_string())
    }
}

/// Knobs for the generated program.
#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// End `main` in a 100 ms sleep loop instead of returning after boot.
    pub steady_state: bool,
    /// Start the file with a "generated" banner.
    pub header: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            steady_state: true,
            header: true,
        }
    }
}

/// Generate Rust source for a validated program.
pub fn generate(program: &Program, options: &CodegenOptions) -> Result<String, CodegenError> {
    let plan = NetworkPlan::build(program)?;
    CodeGenerator::new(&plan, options.clone()).generate()
}

/// Rust code generator over a [`NetworkPlan`].
pub struct CodeGenerator<'a, 'p> {
    plan: &'a NetworkPlan<'p>,
    options: CodegenOptions,
    out: Emitter,
}

/// Everything after this marker in the runtime source is test code.
const RUNTIME_END_MARKER: &str = "// rivet:runtime-end";

const RUNTIME_SOURCE: &str = include_str!("../runtime/mod.rs");

/// The runtime as it is embedded into generated programs.
pub fn runtime_source() -> &'static str {
    match RUNTIME_SOURCE.find(RUNTIME_END_MARKER) {
        Some(end) => RUNTIME_SOURCE[..end].trim_end(),
        None => RUNTIME_SOURCE,
    }
}

impl<'a, 'p> CodeGenerator<'a, 'p> {
    pub fn new(plan: &'a NetworkPlan<'p>, options: CodegenOptions) -> Self {
        Self {
            plan,
            options,
            out: Emitter::new(),
        }
    }

    pub fn generate(mut self) -> Result<String, CodegenError> {
        self.emit_prelude();
        self.emit_custom_types();
        self.emit_free_functions()?;
        for index in 0..self.plan.nodes.len() {
            self.emit_node(index)?;
        }
        self.emit_network()?;
        self.emit_main();

        debug!(
            nodes = self.plan.nodes.len(),
            bytes = self.out.len(),
            "generated rust source"
        );
        Ok(self.out.finish())
    }

    fn emit_prelude(&mut self) {
        if self.options.header {
            self.out.line("// Generated by rivetc. Do not edit.");
            self.out.blank();
        }
        self.out.line(
            "#![allow(dead_code, unused_variables, unused_mut, unused_imports, unused_parens, \
             unreachable_code, unreachable_patterns, non_snake_case, non_camel_case_types)]",
        );
        self.out.blank();
        self.out.open("mod runtime");
        for line in runtime_source().lines() {
            self.out.line(line);
        }
        self.out.close();
        self.out.blank();
        self.out.line("use std::cell::Cell;");
        self.out.line("use std::rc::{Rc, Weak};");
        self.out.blank();
        self.out
            .line("use runtime::{log_line, ModeBus, ModePhase, ModeQueue, SubId, Topic};");
        self.out.blank();
    }

    fn emit_custom_types(&mut self) {
        self.out.open("mod custom");
        self.out.line("use std::fmt;");
        for name in &self.plan.custom_types {
            let ident = rust_ident(name);
            self.out.blank();
            self.out.line("#[derive(Debug, Clone, Default, PartialEq)]");
            self.out.line(&format!("pub struct {};", ident));
            self.out.blank();
            self.out.open(&format!("impl fmt::Display for {}", ident));
            self.out
                .open("fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result");
            self.out.line(&format!("write!(f, \"<{}>\")", name));
            self.out.close();
            self.out.close();
        }
        self.out.close();
        self.out.blank();
    }

    fn emit_main(&mut self) {
        self.out.open("fn main()");
        self.out.line("let network = Network::new();");
        self.out.line("network.boot();");
        self.out.line("println!(\"--- Rivet System Started ---\");");
        if self.options.steady_state {
            self.out.open("loop");
            self.out
                .line("std::thread::sleep(std::time::Duration::from_millis(100));");
            self.out.close();
        }
        self.out.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_source_stops_at_marker() {
        let src = runtime_source();
        assert!(src.contains("pub struct Topic"));
        assert!(!src.contains("#[cfg(test)]"));
        assert!(!src.contains(RUNTIME_END_MARKER));
    }
}
