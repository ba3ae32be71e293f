//! Symbol collection and mode classification.
//!
//! The symbol table is built from declarations alone, before any statement
//! is looked at, so bodies may refer to nodes, topics and modes declared
//! later in the file.

use indexmap::IndexMap;

use crate::errors::{Diagnostic, Diagnostics, Label, SEMA_CODE};
use crate::lexer::Span;
use crate::parser::{Decl, FuncDecl, ModeName, NodeDecl, Program, Signature};

use super::builtins::Builtin;
use super::modes::{classify, is_reserved_system_mode, ModeClass, RESERVED_SYSTEM_MODES};
use super::types::Ty;

/// Method names every generated node already has.
pub const RESERVED_FUNCTION_NAMES: [&str; 5] = [
    "init",
    "set_state",
    "on_system_change",
    "run_system_mode",
    "on_local_change",
];

/// Prefix reserved for names introduced by code generation.
pub const RESERVED_PREFIX: &str = "rv_";

/// Identifiers that cannot be spelled in generated Rust even as raw
/// identifiers.
const UNSPELLABLE: [&str; 4] = ["self", "Self", "super", "crate"];

/// A function signature after type resolution.
#[derive(Debug, Clone)]
pub struct FuncSig {
    pub name: String,
    pub params: Vec<(String, Ty)>,
    pub ret: Ty,
    pub span: Span,
}

impl FuncSig {
    pub fn from_signature(sig: &Signature) -> Self {
        Self {
            name: sig.name.name.clone(),
            params: sig
                .params
                .iter()
                .map(|p| (p.name.name.clone(), Ty::from_ast(&p.ty.kind)))
                .collect(),
            ret: sig
                .return_type
                .as_ref()
                .map(|t| Ty::from_ast(&t.kind))
                .unwrap_or(Ty::Unit),
            span: sig.name.span,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn param_types(&self) -> impl Iterator<Item = &Ty> {
        self.params.iter().map(|(_, t)| t)
    }
}

#[derive(Debug, Clone)]
pub struct TopicSym {
    pub handle: String,
    pub path: String,
    pub ty: Ty,
    pub span: Span,
}

/// A mode binding of one node.
#[derive(Debug, Clone)]
pub struct ModeSym {
    pub name: ModeName,
    pub class: ModeClass,
    pub delegate_to: Option<ModeName>,
    /// Index of the declaration in `Program::decls`.
    pub decl: usize,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct NodeSymbols {
    pub name: String,
    pub type_name: String,
    pub is_controller: bool,
    pub ignores_system: bool,
    pub topics: IndexMap<String, TopicSym>,
    pub requests: IndexMap<String, FuncSig>,
    pub private_funcs: IndexMap<String, FuncSig>,
    pub modes: IndexMap<String, ModeSym>,
    /// Index of the declaration in `Program::decls`.
    pub decl: usize,
    pub span: Span,
}

impl NodeSymbols {
    pub fn topic(&self, handle: &str) -> Option<&TopicSym> {
        self.topics.get(handle)
    }

    pub fn mode(&self, name: &str) -> Option<&ModeSym> {
        self.modes.get(name)
    }

    pub fn modes_of_class(&self, class: ModeClass) -> impl Iterator<Item = &ModeSym> {
        self.modes.values().filter(move |m| m.class == class)
    }
}

/// Everything declared in a program.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    /// Known system modes; built-in ones carry no declaration span.
    pub system_modes: IndexMap<String, Option<Span>>,
    pub nodes: IndexMap<String, NodeSymbols>,
    pub free_funcs: IndexMap<String, FuncSig>,
}

impl SymbolTable {
    /// Collect declarations and classify every mode binding, reporting
    /// duplicates, reserved names and unknown mode names.
    pub fn collect(program: &Program, diags: &mut Diagnostics) -> Self {
        let mut table = SymbolTable::default();
        for name in RESERVED_SYSTEM_MODES {
            table.system_modes.insert(name.to_string(), None);
        }

        for decl in &program.decls {
            if let Decl::SystemMode(sm) = decl {
                let name = &sm.name.name;
                if is_reserved_system_mode(name) {
                    diags.push(
                        sema_error(sm.name.span, format!("system mode '{}' is built in", name))
                            .with_help("remove this declaration"),
                    );
                } else if let Some(Some(first)) = table.system_modes.get(name) {
                    diags.push(duplicate(
                        sm.name.span,
                        *first,
                        format!("system mode '{}' is declared twice", name),
                    ));
                } else {
                    table.system_modes.insert(name.clone(), Some(sm.name.span));
                }
            }
        }

        for (index, decl) in program.decls.iter().enumerate() {
            match decl {
                Decl::Node(node) => table.collect_node(index, node, diags),
                Decl::Func(func) => table.collect_free_func(func, diags),
                _ => {}
            }
        }

        for (index, decl) in program.decls.iter().enumerate() {
            if let Decl::Mode(mode) = decl {
                let is_system = |name: &str| table.system_modes.contains_key(name);
                let Some(node) = table.nodes.get(&mode.node.name) else {
                    if !mode.node.is_error() {
                        diags.push(sema_error(
                            mode.node.span,
                            format!("mode bound to unknown node '{}'", mode.node.name),
                        ));
                    }
                    continue;
                };
                let classification =
                    classify(&mode.name, node.ignores_system, mode.ignores_system, is_system);
                if classification.unknown {
                    diags.push(
                        sema_error(
                            mode.name.span,
                            format!(
                                "unknown mode '{}' for node '{}'",
                                mode.name.text, mode.node.name
                            ),
                        )
                        .with_help(format!(
                            "declare it with 'systemMode {}' or quote it as \"{}\" for a node-local mode",
                            mode.name.text, mode.name.text
                        )),
                    );
                }

                let Some(node) = table.nodes.get_mut(&mode.node.name) else {
                    continue;
                };
                if let Some(first) = node.modes.get(&mode.name.text) {
                    diags.push(duplicate(
                        mode.name.span,
                        first.span,
                        format!("duplicate mode binding '{}->{}'", mode.node.name, mode.name.text),
                    ));
                    continue;
                }
                node.modes.insert(
                    mode.name.text.clone(),
                    ModeSym {
                        name: mode.name.clone(),
                        class: classification.class,
                        delegate_to: mode.delegate_to.clone(),
                        decl: index,
                        span: mode.name.span,
                    },
                );
            }
        }

        table
    }

    fn collect_node(&mut self, index: usize, node: &NodeDecl, diags: &mut Diagnostics) {
        let name = &node.name.name;
        if let Some(first) = self.nodes.get(name) {
            diags.push(duplicate(
                node.name.span,
                first.span,
                format!("node '{}' is declared twice", name),
            ));
            return;
        }
        check_identifier(&node.name.name, node.name.span, diags);

        let mut symbols = NodeSymbols {
            name: name.clone(),
            type_name: node.type_name.name.clone(),
            is_controller: node.is_controller,
            ignores_system: node.ignores_system,
            topics: IndexMap::new(),
            requests: IndexMap::new(),
            private_funcs: IndexMap::new(),
            modes: IndexMap::new(),
            decl: index,
            span: node.name.span,
        };

        for topic in &node.topics {
            let handle = &topic.handle.name;
            if let Some(first) = symbols.topics.get(handle) {
                diags.push(duplicate(
                    topic.handle.span,
                    first.span,
                    format!("topic '{}' is declared twice on node '{}'", handle, name),
                ));
                continue;
            }
            check_identifier(handle, topic.handle.span, diags);
            symbols.topics.insert(
                handle.clone(),
                TopicSym {
                    handle: handle.clone(),
                    path: topic.path.clone(),
                    ty: Ty::from_ast(&topic.ty.kind),
                    span: topic.handle.span,
                },
            );
        }

        // Requests and private functions both become methods of the node.
        let sigs = node
            .requests
            .iter()
            .map(|r| (&r.sig, true))
            .chain(node.private_funcs.iter().map(|f| (&f.sig, false)));
        for (sig, public) in sigs {
            check_signature(sig, diags);
            let fname = &sig.name.name;
            let first = symbols
                .requests
                .get(fname)
                .or_else(|| symbols.private_funcs.get(fname))
                .map(|f| f.span);
            if let Some(first) = first {
                diags.push(duplicate(
                    sig.name.span,
                    first,
                    format!("function '{}' is declared twice on node '{}'", fname, name),
                ));
                continue;
            }
            let resolved = FuncSig::from_signature(sig);
            if public {
                symbols.requests.insert(fname.clone(), resolved);
            } else {
                symbols.private_funcs.insert(fname.clone(), resolved);
            }
        }

        self.nodes.insert(name.clone(), symbols);
    }

    fn collect_free_func(&mut self, func: &FuncDecl, diags: &mut Diagnostics) {
        check_signature(&func.sig, diags);
        let fname = &func.sig.name.name;
        if let Some(first) = self.free_funcs.get(fname) {
            diags.push(duplicate(
                func.sig.name.span,
                first.span,
                format!("function '{}' is declared twice", fname),
            ));
            return;
        }
        self.free_funcs
            .insert(fname.clone(), FuncSig::from_signature(&func.sig));
    }

    pub fn node(&self, name: &str) -> Option<&NodeSymbols> {
        self.nodes.get(name)
    }

    pub fn is_system_mode(&self, name: &str) -> bool {
        self.system_modes.contains_key(name)
    }

    /// System modes in declaration order, built-in ones first.
    pub fn system_mode_names(&self) -> impl Iterator<Item = &str> {
        self.system_modes.keys().map(|s| s.as_str())
    }
}

/// Reserved-name checks shared by functions and parameters.
fn check_signature(sig: &Signature, diags: &mut Diagnostics) {
    let name = &sig.name.name;
    if RESERVED_FUNCTION_NAMES.contains(&name.as_str()) {
        diags.push(sema_error(
            sig.name.span,
            format!("'{}' is reserved for generated node methods", name),
        ));
    } else if Builtin::lookup(name).is_some() {
        diags.push(sema_error(
            sig.name.span,
            format!("'{}' is a builtin function and cannot be redefined", name),
        ));
    } else {
        check_identifier(name, sig.name.span, diags);
    }

    let mut seen: IndexMap<&str, Span> = IndexMap::new();
    for param in &sig.params {
        let pname = param.name.name.as_str();
        if let Some(first) = seen.get(pname) {
            diags.push(duplicate(
                param.name.span,
                *first,
                format!("parameter '{}' is declared twice", pname),
            ));
            continue;
        }
        check_identifier(pname, param.name.span, diags);
        seen.insert(pname, param.name.span);
    }
}

/// Names that would clash with generated code.
pub(crate) fn check_identifier(name: &str, span: Span, diags: &mut Diagnostics) {
    if name.starts_with(RESERVED_PREFIX) {
        diags.push(sema_error(
            span,
            format!("names starting with '{}' are reserved", RESERVED_PREFIX),
        ));
    } else if UNSPELLABLE.contains(&name) {
        diags.push(sema_error(span, format!("'{}' cannot be used as a name", name)));
    }
}

pub(crate) fn sema_error(span: Span, message: impl Into<String>) -> Diagnostic {
    Diagnostic::error(message, span).with_code(SEMA_CODE)
}

fn duplicate(span: Span, first: Span, message: String) -> Diagnostic {
    sema_error(span, message.clone())
        .with_label(Label::primary(span, "declared again here"))
        .with_label(Label::secondary(first, "first declared here"))
}
