//! Runtime values.

use std::fmt;

use crate::types::Ty;

/// A value flowing through a simulated network.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    /// A payload of a custom type; carries only the type name.
    Opaque(String),
    #[default]
    Unit,
}

impl Value {
    /// The value a topic of type `ty` reads as before anything is published.
    pub fn default_for(ty: &Ty) -> Value {
        match ty {
            Ty::Int => Value::Int(0),
            Ty::Float => Value::Float(0.0),
            Ty::String => Value::Str(String::new()),
            Ty::Bool => Value::Bool(false),
            Ty::Custom(name) => Value::Opaque(name.clone()),
            Ty::Unit | Ty::Error => Value::Unit,
        }
    }

    /// Apply the implicit `int` to `float` widening.
    pub fn coerce(self, ty: &Ty) -> Value {
        match (self, ty) {
            (Value::Int(v), Ty::Float) => Value::Float(v as f64),
            (v, _) => v,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    pub fn type_name(&self) -> &str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Opaque(name) => name,
            Value::Unit => "nothing",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Opaque(name) => write!(f, "<{}>", name),
            Value::Unit => write!(f, "()"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}
