//! Error reporting and diagnostics for the Rivet compiler.
//!
//! User-facing problems are [`Diagnostic`] values collected in a
//! [`Diagnostics`] sink. The sink never aborts a stage; it only remembers
//! whether an error was reported so the driver can stop between stages.

use std::path::PathBuf;

use thiserror::Error;

use crate::lexer::Span;

/// Diagnostic code for lexical problems (invalid characters, bad literals).
pub const LEX_CODE: &str = "E0001";
/// Diagnostic code for syntax errors.
pub const PARSE_CODE: &str = "E0100";
/// Diagnostic code for semantic errors.
pub const SEMA_CODE: &str = "E0200";
/// Diagnostic code for semantic warnings.
pub const SEMA_WARN_CODE: &str = "W0200";

/// A parser error with source location.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    pub help: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl From<ParseError> for Diagnostic {
    fn from(e: ParseError) -> Self {
        let diag = Diagnostic::error(e.message, e.span).with_code(PARSE_CODE);
        match e.help {
            Some(help) => diag.with_help(help),
            None => diag,
        }
    }
}

/// Failures of the compiler driver itself, as opposed to problems in the
/// program being compiled.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("cannot read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} syntax error(s)")]
    Syntax(usize),

    #[error("{0} semantic error(s)")]
    Semantic(usize),

    #[error(transparent)]
    Codegen(#[from] crate::codegen::CodegenError),

    #[error(transparent)]
    Sim(#[from] crate::sim::SimError),

    #[error("{0}")]
    Check(String),
}

impl CompileError {
    /// Process exit status for `rivetc`. Usage errors (`2`) are reported
    /// by clap before any of these can occur.
    pub fn exit_code(&self) -> i32 {
        match self {
            CompileError::Syntax(_) => 3,
            CompileError::Semantic(_) => 4,
            CompileError::Check(_) => 5,
            CompileError::Read { .. }
            | CompileError::Write { .. }
            | CompileError::Codegen(_)
            | CompileError::Sim(_) => 1,
        }
    }
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        }
    }
}

/// A diagnostic message with optional notes and help text.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<String>,
    pub message: String,
    pub span: Span,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity,
            code: None,
            message: message.into(),
            span,
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self::new(Severity::Error, message, span)
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self::new(Severity::Warning, message, span)
    }

    pub fn note(message: impl Into<String>, span: Span) -> Self {
        Self::new(Severity::Note, message, span)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.notes.push(format!("help: {}", help.into()));
        self
    }

    /// The first `help:` note, without its prefix.
    pub fn help(&self) -> Option<&str> {
        self.notes.iter().find_map(|n| n.strip_prefix("help: "))
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// A label attached to a source span.
#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
    pub style: LabelStyle,
}

impl Label {
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            style: LabelStyle::Primary,
        }
    }

    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            style: LabelStyle::Secondary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    Primary,
    Secondary,
}

/// Collects diagnostics for one compilation.
///
/// `error` and any report at [`Severity::Error`] set a sticky flag that the
/// driver reads to decide whether the next stage runs.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    had_error: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic at the given level.
    pub fn report(&mut self, severity: Severity, span: Span, message: impl Into<String>) {
        self.push(Diagnostic::new(severity, message, span));
    }

    pub fn error(&mut self, span: Span, message: impl Into<String>) {
        self.report(Severity::Error, span, message);
    }

    pub fn warning(&mut self, span: Span, message: impl Into<String>) {
        self.report(Severity::Warning, span, message);
    }

    pub fn note(&mut self, span: Span, message: impl Into<String>) {
        self.report(Severity::Note, span, message);
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.had_error = true;
        }
        self.items.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.had_error
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_error())
    }

    /// Diagnostics in source order, errors before warnings on the same span.
    pub fn sorted(&self) -> Vec<&Diagnostic> {
        let mut items: Vec<&Diagnostic> = self.items.iter().collect();
        items.sort_by_key(|d| (d.span.start, d.severity));
        items
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        for d in iter {
            self.push(d);
        }
    }
}
