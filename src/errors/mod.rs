//! Error handling module for the Rivet compiler.
//!
//! This module provides the diagnostic sink shared by every stage, the
//! driver-level error type, and renderers for diagnostic output.

pub mod diagnostic;
pub mod report;

pub use diagnostic::{
    CompileError, Diagnostic, Diagnostics, Label, LabelStyle, ParseError, Result, Severity,
    LEX_CODE, PARSE_CODE, SEMA_CODE, SEMA_WARN_CODE,
};
pub use report::{render_short, report_all, report_diagnostic, write_report};
