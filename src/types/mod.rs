//! Type system and semantic validation for Rivet.
//!
//! This module provides:
//! - Type representations (`types`)
//! - Builtin function signatures (`builtins`)
//! - Symbol tables built from declarations (`symbols`)
//! - System/local mode classification (`modes`)
//! - The validator (`checker`)
//!
//! # Architecture
//!
//! Validation runs in sequential passes over an already-parsed program:
//!
//! - **Symbol collection**: system modes, nodes with their topics and
//!   function tables, free functions
//! - **Mode classification**: every `mode Node->Name` binding becomes
//!   system or local
//! - **Logic checking**: expression types with `int` to `float`
//!   promotion, publish, request and transition rules
//! - **Cycle detection**: per-node walk of `do` delegation edges
//!
//! # Usage
//!
//! ```ignore
//! use rivet::types::validate;
//!
//! let ok = validate(&program, &mut diags);
//! ```

pub mod builtins;
pub mod checker;
pub mod modes;
pub mod symbols;
pub mod types;

pub use builtins::Builtin;
pub use checker::{validate, Validator};
pub use modes::{classify, Classification, ModeClass, INITIAL_SYSTEM_MODE, RESERVED_SYSTEM_MODES};
pub use symbols::{FuncSig, ModeSym, NodeSymbols, SymbolTable, TopicSym};
pub use types::Ty;
