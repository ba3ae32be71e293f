//! Mode classification.
//!
//! Every mode binding is either *system* (the node enters it when the whole
//! network changes system mode) or *local* (entered only through a node's
//! own `transition`).

use crate::parser::ModeName;

/// System modes that exist in every program without a declaration.
pub const RESERVED_SYSTEM_MODES: [&str; 3] = ["Init", "Normal", "Shutdown"];

/// The system mode every network starts in.
pub const INITIAL_SYSTEM_MODE: &str = "Init";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeClass {
    System,
    Local,
}

impl ModeClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ModeClass::System => "system",
            ModeClass::Local => "local",
        }
    }
}

/// Outcome of classifying one mode binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub class: ModeClass,
    /// A bare identifier that names no known system mode. The binding is
    /// treated as local but must be reported.
    pub unknown: bool,
}

/// Classify a binding from its name, the `ignore system` flags on the node
/// and on the mode, and the set of known system modes.
pub fn classify(
    name: &ModeName,
    node_ignores_system: bool,
    mode_ignores_system: bool,
    is_system_mode: impl Fn(&str) -> bool,
) -> Classification {
    let local = Classification {
        class: ModeClass::Local,
        unknown: false,
    };
    if name.quoted || node_ignores_system || mode_ignores_system {
        return local;
    }
    if is_system_mode(&name.text) {
        Classification {
            class: ModeClass::System,
            unknown: false,
        }
    } else {
        Classification {
            class: ModeClass::Local,
            unknown: true,
        }
    }
}

pub fn is_reserved_system_mode(name: &str) -> bool {
    RESERVED_SYSTEM_MODES.contains(&name)
}
