//! Rivet Compiler Library
//!
//! Rivet is a small language for reactive, message-driven node networks:
//! nodes own typed publish/subscribe topics, expose request functions, and
//! carry two independent state machines, a node-local one and a system-wide
//! one driven by broadcasts.
//!
//! # Key Features
//!
//! - **Indentation-significant**: blocks are delimited by layout, the lexer
//!   synthesizes `Indent`/`Dedent` tokens
//! - **Error-recovering parser**: one run surfaces every independent syntax
//!   error
//! - **Mode classification**: every mode binding is system or local, and
//!   `do` delegation chains are checked for cycles
//! - **Rust back end**: validated networks become standalone Rust programs
//!   with subscription lifecycles tied to mode changes
//!
//! # Modules
//!
//! - [`lexer`]: Tokenizes source code
//! - [`parser`]: Parses tokens into an AST
//! - [`types`]: Type system, symbol tables and validation
//! - [`plan`]: Lowered network description shared by the back ends
//! - [`codegen`]: Rust code generation
//! - [`runtime`]: Topic and mode primitives used by generated programs
//! - [`sim`]: In-process execution of validated networks
//! - [`fmt`], [`graph`], [`dump`]: Source printer, diagrams, AST dump
//! - [`driver`]: The compilation pipeline
//! - [`errors`]: Error types and diagnostics

pub mod codegen;
pub mod driver;
pub mod dump;
pub mod errors;
pub mod fmt;
pub mod graph;
pub mod lexer;
pub mod parser;
pub mod plan;
pub mod runtime;
pub mod sim;
pub mod source;
pub mod types;

pub use codegen::{generate, CodegenError, CodegenOptions};
pub use driver::{analyze, Analysis, Outcome};
pub use errors::{CompileError, Diagnostic, Diagnostics, Result};
pub use fmt::Formatter;
pub use lexer::{Scanner, Span, Token, TokenKind};
pub use parser::{parse_source, Parser, Program};
pub use plan::NetworkPlan;
pub use sim::{simulate, Simulation, Trace, TraceEvent, Value};
pub use source::SourceMap;
pub use types::{validate, Ty, Validator};
