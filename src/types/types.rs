//! Internal type representations for the Rivet type system.
//!
//! These are separate from the AST types and represent the semantic meaning
//! of types, including the `Unit` result of functions without a return type
//! and an `Error` type that absorbs follow-on errors.

use std::fmt;

use crate::parser::TypeKind;

/// A type in the Rivet type system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Int,
    Float,
    String,
    Bool,
    /// A named payload type the language treats opaquely.
    Custom(String),
    /// Result of a function without a return type.
    Unit,
    /// The type of an expression that already produced a diagnostic.
    Error,
}

impl Ty {
    pub fn from_ast(kind: &TypeKind) -> Ty {
        match kind {
            TypeKind::Int => Ty::Int,
            TypeKind::Float => Ty::Float,
            TypeKind::String => Ty::String,
            TypeKind::Bool => Ty::Bool,
            TypeKind::Custom(name) => Ty::Custom(name.clone()),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Ty::Int | Ty::Float)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Ty::Error)
    }

    /// Join of two numeric types: `Int` widens to `Float`.
    pub fn promote(a: &Ty, b: &Ty) -> Option<Ty> {
        match (a, b) {
            (Ty::Int, Ty::Int) => Some(Ty::Int),
            (Ty::Int, Ty::Float) | (Ty::Float, Ty::Int) | (Ty::Float, Ty::Float) => Some(Ty::Float),
            _ => None,
        }
    }

    /// Whether a value of type `actual` may be passed where `self` is
    /// expected. The only implicit conversion is `Int` to `Float`.
    pub fn accepts(&self, actual: &Ty) -> bool {
        self == actual
            || (*self == Ty::Float && *actual == Ty::Int)
            || self.is_error()
            || actual.is_error()
    }

    /// Strict equality used where no promotion applies (publish, listener
    /// payloads). `Error` still matches anything.
    pub fn matches_exactly(&self, actual: &Ty) -> bool {
        self == actual || self.is_error() || actual.is_error()
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Int => write!(f, "int"),
            Ty::Float => write!(f, "float"),
            Ty::String => write!(f, "string"),
            Ty::Bool => write!(f, "bool"),
            Ty::Custom(name) => write!(f, "{}", name),
            Ty::Unit => write!(f, "nothing"),
            Ty::Error => write!(f, "{{error}}"),
        }
    }
}
