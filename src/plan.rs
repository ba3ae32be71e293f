//! Lowered network description.
//!
//! A [`NetworkPlan`] is built from a validated [`Program`] and resolves
//! everything the back ends need by index: nodes, topics with their types,
//! listeners with their subscription slots, and modes with `do` delegation
//! already followed to the body that actually runs.

use indexmap::IndexMap;
use thiserror::Error;

use crate::errors::Diagnostics;
use crate::parser::{
    Expr, ExprKind, FuncDecl, Literal, ModeDecl, NodeDecl, OnListenDecl, Program, Stmt,
    UnaryOp,
};
use crate::types::{Builtin, FuncSig, ModeClass, SymbolTable, Ty};

/// Lookups that a validated program never fails. Hitting one means the
/// validator let something through.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("internal error: unknown node '{0}'")]
    UnknownNode(String),

    #[error("internal error: node '{node}' has no topic '{topic}'")]
    UnknownTopic { node: String, topic: String },

    #[error("internal error: mode '{node}->{mode}' has no declaration")]
    UnknownMode { node: String, mode: String },

    #[error("internal error: delegation of '{node}->{mode}' does not terminate")]
    DelegationCycle { node: String, mode: String },
}

/// A validated program ready for code generation or simulation.
#[derive(Debug)]
pub struct NetworkPlan<'p> {
    pub program: &'p Program,
    pub symbols: SymbolTable,
    pub nodes: Vec<NodePlan<'p>>,
    pub free_funcs: Vec<&'p FuncDecl>,
    /// Custom payload type names, sorted.
    pub custom_types: Vec<String>,
    index: IndexMap<String, usize>,
}

#[derive(Debug)]
pub struct NodePlan<'p> {
    pub name: String,
    pub decl: &'p NodeDecl,
    pub is_controller: bool,
    pub ignores_system: bool,
    pub topics: Vec<TopicPlan>,
    /// Listeners wired once at start-up and never retired.
    pub static_listeners: Vec<ListenerPlan<'p>>,
    pub modes: Vec<ModePlan<'p>>,
    /// Number of subscription slots used by mode-scoped listeners.
    pub slots: usize,
}

#[derive(Debug, Clone)]
pub struct TopicPlan {
    pub handle: String,
    pub path: String,
    pub ty: Ty,
}

#[derive(Debug)]
pub struct ListenerPlan<'p> {
    pub decl: &'p OnListenDecl,
    /// Index of the node owning the topic.
    pub source: usize,
    pub topic: String,
    pub ty: Ty,
    /// Subscription slot; unused for static listeners.
    pub slot: usize,
}

#[derive(Debug)]
pub struct ModePlan<'p> {
    pub name: String,
    pub class: ModeClass,
    pub decl: &'p ModeDecl,
    /// Body after following `do` delegation.
    pub body: &'p [Stmt],
    pub listeners: Vec<ListenerPlan<'p>>,
    /// The mode whose body this one runs, if it delegates.
    pub delegates_to: Option<String>,
}

/// Resolved target of a local call.
#[derive(Debug, Clone, Copy)]
pub enum Callee<'a> {
    Builtin(Builtin),
    Private(&'a FuncSig),
    Free(&'a FuncSig),
}

impl<'a> Callee<'a> {
    pub fn ret(&self, arg_tys: &[Ty]) -> Ty {
        match self {
            Callee::Builtin(b) => b.result_type(arg_tys),
            Callee::Private(sig) | Callee::Free(sig) => sig.ret.clone(),
        }
    }

    /// Declared parameter types; builtins take promoted numbers.
    pub fn param_types(&self, arg_tys: &[Ty]) -> Vec<Ty> {
        match self {
            Callee::Builtin(b) => vec![b.result_type(arg_tys); arg_tys.len()],
            Callee::Private(sig) | Callee::Free(sig) => sig.param_types().cloned().collect(),
        }
    }
}

/// Names visible to an expression: parameters, then the node's topics.
#[derive(Debug, Clone, Default)]
pub struct BodyScope {
    pub node: Option<usize>,
    pub params: Vec<(String, Ty)>,
}

impl BodyScope {
    pub fn node(node: usize) -> Self {
        Self {
            node: Some(node),
            params: Vec::new(),
        }
    }

    pub fn with_params(node: Option<usize>, params: Vec<(String, Ty)>) -> Self {
        Self { node, params }
    }

    pub fn param(&self, name: &str) -> Option<&Ty> {
        self.params
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }
}

impl<'p> NetworkPlan<'p> {
    /// Lower a program that passed validation.
    pub fn build(program: &'p Program) -> Result<Self, PlanError> {
        let mut scratch = Diagnostics::new();
        let symbols = SymbolTable::collect(program, &mut scratch);
        let index: IndexMap<String, usize> = symbols
            .nodes
            .keys()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let mut custom_types = Vec::new();
        let mut note_type = |ty: &Ty| {
            if let Ty::Custom(name) = ty {
                if !custom_types.contains(name) {
                    custom_types.push(name.clone());
                }
            }
        };
        for node in symbols.nodes.values() {
            for topic in node.topics.values() {
                note_type(&topic.ty);
            }
            for sig in node.requests.values().chain(node.private_funcs.values()) {
                sig.param_types().for_each(&mut note_type);
                note_type(&sig.ret);
            }
        }
        for sig in symbols.free_funcs.values() {
            sig.param_types().for_each(&mut note_type);
            note_type(&sig.ret);
        }
        custom_types.sort();

        let mut plan = NetworkPlan {
            program,
            symbols,
            nodes: Vec::new(),
            free_funcs: Vec::new(),
            custom_types,
            index,
        };

        for (name, sym) in &plan.symbols.nodes {
            let decl = match program.decls.get(sym.decl) {
                Some(crate::parser::Decl::Node(n)) => n,
                _ => return Err(PlanError::UnknownNode(name.clone())),
            };
            let topics = sym
                .topics
                .values()
                .map(|t| TopicPlan {
                    handle: t.handle.clone(),
                    path: t.path.clone(),
                    ty: t.ty.clone(),
                })
                .collect();
            let mut static_listeners = Vec::new();
            for listener in &decl.listeners {
                static_listeners.push(plan.listener(name, listener, 0)?);
            }
            plan.nodes.push(NodePlan {
                name: name.clone(),
                decl,
                is_controller: sym.is_controller,
                ignores_system: sym.ignores_system,
                topics,
                static_listeners,
                modes: Vec::new(),
                slots: 0,
            });
        }

        for i in 0..plan.nodes.len() {
            let mut modes = Vec::new();
            let mut slot = 0;
            let node_name = plan.nodes[i].name.clone();
            let Some(sym) = plan.symbols.node(&node_name) else {
                return Err(PlanError::UnknownNode(node_name));
            };
            for mode in sym.modes.values() {
                let decl = plan.mode_decl(&node_name, &mode.name.text)?;
                let source = plan.resolve_delegation(&node_name, &mode.name.text)?;
                let (body, listener_decls): (&'p [Stmt], &'p [OnListenDecl]) = match source {
                    Some(d) => (&d.body, &d.listeners),
                    None => (&[], &[]),
                };
                let mut listeners = Vec::new();
                for l in listener_decls {
                    listeners.push(plan.listener(&node_name, l, slot)?);
                    slot += 1;
                }
                modes.push(ModePlan {
                    name: mode.name.text.clone(),
                    class: mode.class,
                    decl,
                    body,
                    listeners,
                    delegates_to: mode.delegate_to.as_ref().map(|d| d.text.clone()),
                });
            }
            plan.nodes[i].modes = modes;
            plan.nodes[i].slots = slot;
        }

        plan.free_funcs = program
            .funcs()
            .filter(|f| {
                plan.symbols
                    .free_funcs
                    .get(&f.sig.name.name)
                    .is_some_and(|s| s.span == f.sig.name.span)
            })
            .collect();

        Ok(plan)
    }

    fn mode_decl(&self, node: &str, mode: &str) -> Result<&'p ModeDecl, PlanError> {
        let program: &'p Program = self.program;
        self.symbols
            .node(node)
            .and_then(|n| n.mode(mode))
            .and_then(|m| match program.decls.get(m.decl) {
                Some(crate::parser::Decl::Mode(d)) => Some(d),
                _ => None,
            })
            .ok_or_else(|| PlanError::UnknownMode {
                node: node.to_string(),
                mode: mode.to_string(),
            })
    }

    /// Follow `do` edges within `node` starting at `mode`. Returns the
    /// declaration whose body runs, or `None` when the chain leaves the
    /// node for a system mode it does not bind.
    fn resolve_delegation(&self, node: &str, mode: &str) -> Result<Option<&'p ModeDecl>, PlanError> {
        let Some(sym) = self.symbols.node(node) else {
            return Err(PlanError::UnknownNode(node.to_string()));
        };
        let mut current = mode.to_string();
        for _ in 0..=sym.modes.len() {
            let decl = self.mode_decl(node, &current)?;
            match &decl.delegate_to {
                None => return Ok(Some(decl)),
                Some(target) if sym.mode(&target.text).is_some() => current = target.text.clone(),
                Some(_) => return Ok(None),
            }
        }
        Err(PlanError::DelegationCycle {
            node: node.to_string(),
            mode: mode.to_string(),
        })
    }

    fn listener(
        &self,
        owner: &str,
        decl: &'p OnListenDecl,
        slot: usize,
    ) -> Result<ListenerPlan<'p>, PlanError> {
        let source_name = decl
            .source_node
            .as_ref()
            .map(|s| s.name.as_str())
            .unwrap_or(owner);
        let source = self.node_index(source_name)?;
        let ty = self
            .symbols
            .node(source_name)
            .and_then(|n| n.topic(&decl.topic.name))
            .map(|t| t.ty.clone())
            .ok_or_else(|| PlanError::UnknownTopic {
                node: source_name.to_string(),
                topic: decl.topic.name.clone(),
            })?;
        Ok(ListenerPlan {
            decl,
            source,
            topic: decl.topic.name.clone(),
            ty,
            slot,
        })
    }

    pub fn node_index(&self, name: &str) -> Result<usize, PlanError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| PlanError::UnknownNode(name.to_string()))
    }

    pub fn node(&self, index: usize) -> &NodePlan<'p> {
        &self.nodes[index]
    }

    pub fn node_by_name(&self, name: &str) -> Option<&NodePlan<'p>> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    pub fn topic_type(&self, node: usize, handle: &str) -> Option<&Ty> {
        self.nodes
            .get(node)
            .and_then(|n| n.topics.iter().find(|t| t.handle == handle))
            .map(|t| &t.ty)
    }

    /// Signature of an `onRequest` function.
    pub fn request_sig(&self, node: &str, func: &str) -> Option<&FuncSig> {
        self.symbols.node(node).and_then(|n| n.requests.get(func))
    }

    /// Resolve a local call: builtins, then the node's private functions,
    /// then free functions.
    pub fn resolve_call(&self, node: Option<usize>, name: &str) -> Option<Callee<'_>> {
        if let Some(b) = Builtin::lookup(name) {
            return Some(Callee::Builtin(b));
        }
        if let Some(sig) = node
            .and_then(|i| self.nodes.get(i))
            .and_then(|n| self.symbols.node(&n.name))
            .and_then(|n| n.private_funcs.get(name))
        {
            return Some(Callee::Private(sig));
        }
        self.symbols.free_funcs.get(name).map(Callee::Free)
    }

    /// Type of an expression in a validated body.
    pub fn type_of(&self, scope: &BodyScope, expr: &Expr) -> Ty {
        match &expr.kind {
            ExprKind::Literal(lit) => match lit {
                Literal::Int(_) => Ty::Int,
                Literal::Float(_) => Ty::Float,
                Literal::String(_) => Ty::String,
                Literal::Bool(_) => Ty::Bool,
            },
            ExprKind::Ident(ident) => scope
                .param(&ident.name)
                .cloned()
                .or_else(|| {
                    scope
                        .node
                        .and_then(|n| self.topic_type(n, &ident.name))
                        .cloned()
                })
                .unwrap_or(Ty::Error),
            ExprKind::Call { callee, args } => {
                let arg_tys: Vec<Ty> = args.iter().map(|a| self.type_of(scope, a)).collect();
                self.resolve_call(scope.node, &callee.name)
                    .map(|c| c.ret(&arg_tys))
                    .unwrap_or(Ty::Error)
            }
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Not => Ty::Bool,
                UnaryOp::Neg => self.type_of(scope, operand),
            },
            ExprKind::Binary { op, left, right } if op.is_arithmetic() => {
                let lt = self.type_of(scope, left);
                let rt = self.type_of(scope, right);
                Ty::promote(&lt, &rt).unwrap_or(Ty::Error)
            }
            ExprKind::Binary { .. } => Ty::Bool,
            ExprKind::Error => Ty::Error,
        }
    }

    /// Nodes that take part in system mode broadcasts.
    pub fn system_nodes(&self) -> impl Iterator<Item = (usize, &NodePlan<'p>)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.ignores_system)
    }
}

impl<'p> NodePlan<'p> {
    pub fn modes_of_class(&self, class: ModeClass) -> impl Iterator<Item = &ModePlan<'p>> {
        self.modes.iter().filter(move |m| m.class == class)
    }

    pub fn mode(&self, name: &str) -> Option<&ModePlan<'p>> {
        self.modes.iter().find(|m| m.name == name)
    }

    pub fn topic(&self, handle: &str) -> Option<&TopicPlan> {
        self.topics.iter().find(|t| t.handle == handle)
    }
}
