//! Parser module for the Rivet compiler.
//!
//! This module is responsible for parsing tokens into an Abstract Syntax Tree (AST).
//! It implements a recursive descent parser that handles Rivet's indentation-significant syntax.

pub mod ast;
pub mod parser;

pub use ast::*;
pub use parser::{parse_source, Parser};
