//! Compilation pipeline.
//!
//! Stages run in order (lex, parse, validate, then a back end) over one
//! [`SourceMap`], sharing one [`Diagnostics`] sink. A stage only runs when
//! the stages before it reported no errors. Every entry point hands back
//! the diagnostics it collected, even on failure, so callers can render
//! them in whatever format they need.

use std::fs;
use std::path::Path;

use crate::codegen::{generate, CodegenOptions};
use crate::errors::{CompileError, Diagnostics, Result};
use crate::fmt::Formatter;
use crate::lexer::{Scanner, Token};
use crate::parser::{parse_source, Program};
use crate::sim::{simulate, Trace};
use crate::source::SourceMap;
use crate::types::validate;

/// How far a source file got through the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    SyntaxErrors(usize),
    SemanticErrors(usize),
    /// Parsed; validation was not requested.
    Parsed,
    Valid,
}

/// Result of running the front end over one file.
#[derive(Debug)]
pub struct Analysis {
    pub source: SourceMap,
    pub program: Program,
    pub diagnostics: Diagnostics,
    pub outcome: Outcome,
}

impl Analysis {
    pub fn is_valid(&self) -> bool {
        self.outcome == Outcome::Valid
    }

    /// `Ok` for a program that got through every stage that ran.
    pub fn status(&self) -> Result<()> {
        match self.outcome {
            Outcome::SyntaxErrors(n) => Err(CompileError::Syntax(n)),
            Outcome::SemanticErrors(n) => Err(CompileError::Semantic(n)),
            Outcome::Parsed | Outcome::Valid => Ok(()),
        }
    }
}

pub fn read_source(path: &Path) -> Result<SourceMap> {
    let text = fs::read_to_string(path).map_err(|source| CompileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "read source");
    Ok(SourceMap::new(path.display().to_string(), text))
}

pub fn write_output(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|source| CompileError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), bytes = text.len(), "wrote output");
    Ok(())
}

/// Token stream of a file, layout tokens and `Invalid` tokens included.
pub fn tokenize(source: &SourceMap) -> Vec<Token> {
    let tokens = Scanner::new(source.text()).scan_all();
    tracing::debug!(tokens = tokens.len(), "lexed");
    tokens
}

/// Lex and parse.
pub fn parse(source: SourceMap) -> Analysis {
    let mut diagnostics = Diagnostics::new();
    let program = parse_source(source.text(), &mut diagnostics);
    let errors = diagnostics.error_count();
    tracing::debug!(decls = program.decls.len(), errors, "parsed");
    let outcome = if errors > 0 {
        Outcome::SyntaxErrors(errors)
    } else {
        Outcome::Parsed
    };
    Analysis {
        source,
        program,
        diagnostics,
        outcome,
    }
}

/// Lex, parse and, if parsing succeeded, validate.
pub fn analyze(source: SourceMap) -> Analysis {
    let mut analysis = parse(source);
    if analysis.outcome != Outcome::Parsed {
        return analysis;
    }
    let before = analysis.diagnostics.error_count();
    let ok = validate(&analysis.program, &mut analysis.diagnostics);
    let errors = analysis.diagnostics.error_count() - before;
    tracing::debug!(
        errors,
        warnings = analysis.diagnostics.warning_count(),
        "validated"
    );
    analysis.outcome = if ok {
        Outcome::Valid
    } else {
        Outcome::SemanticErrors(errors)
    };
    analysis
}

/// Generate the Rust program for a validated analysis.
pub fn build(analysis: &Analysis, options: &CodegenOptions) -> Result<String> {
    analysis.status()?;
    let code = generate(&analysis.program, options).map_err(|e| {
        tracing::warn!(error = %e, "code generation failed");
        e
    })?;
    tracing::info!(bytes = code.len(), "generated");
    Ok(code)
}

/// Canonical source for a file that parses without errors.
pub fn format(analysis: &Analysis) -> Result<String> {
    analysis.status()?;
    Ok(Formatter::new().format(&analysis.program))
}

/// `Err(Check)` when `analysis` is not already in canonical form.
pub fn format_check(analysis: &Analysis) -> Result<()> {
    let formatted = format(analysis)?;
    if formatted == analysis.source.text() {
        Ok(())
    } else {
        Err(CompileError::Check(format!(
            "{} is not formatted",
            analysis.source.name()
        )))
    }
}

/// Boot a validated program and request each of `modes` in order.
pub fn run_simulation(analysis: &Analysis, modes: &[String]) -> Result<Trace> {
    analysis.status()?;
    let trace = simulate(&analysis.program, modes)?;
    tracing::info!(events = trace.events.len(), "simulated");
    Ok(trace)
}
