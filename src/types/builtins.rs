//! Builtin numeric functions.

use super::types::Ty;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Min,
    Max,
    Clamp,
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Builtin> {
        match name {
            "min" => Some(Builtin::Min),
            "max" => Some(Builtin::Max),
            "clamp" => Some(Builtin::Clamp),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Clamp => "clamp",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::Min | Builtin::Max => 2,
            Builtin::Clamp => 3,
        }
    }

    /// Result type for well-typed numeric arguments: `Float` if any
    /// argument is `Float`, else `Int`.
    pub fn result_type(self, args: &[Ty]) -> Ty {
        if args.iter().any(|t| *t == Ty::Float) {
            Ty::Float
        } else {
            Ty::Int
        }
    }

    /// Evaluate over integers. `None` when the argument count is wrong.
    pub fn apply_int(self, args: &[i64]) -> Option<i64> {
        match (self, args) {
            (Builtin::Min, &[a, b]) => Some(a.min(b)),
            (Builtin::Max, &[a, b]) => Some(a.max(b)),
            (Builtin::Clamp, &[x, lo, hi]) => Some(x.max(lo).min(hi)),
            (Builtin::Min | Builtin::Max | Builtin::Clamp, _) => None,
        }
    }

    /// Evaluate over floats. `None` when the argument count is wrong.
    pub fn apply_float(self, args: &[f64]) -> Option<f64> {
        match (self, args) {
            (Builtin::Min, &[a, b]) => Some(a.min(b)),
            (Builtin::Max, &[a, b]) => Some(a.max(b)),
            (Builtin::Clamp, &[x, lo, hi]) => Some(x.max(lo).min(hi)),
            (Builtin::Min | Builtin::Max | Builtin::Clamp, _) => None,
        }
    }
}
