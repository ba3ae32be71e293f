//! Semantic validation for Rivet.
//!
//! The [`Validator`] runs after parsing and only reads the AST. It builds a
//! [`SymbolTable`], type checks every body reachable from requests, private
//! and free functions, mode bodies and listeners, and walks each node's
//! mode delegation graph looking for cycles.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::errors::{Diagnostic, Diagnostics, Label, SEMA_WARN_CODE};
use crate::lexer::Span;
use crate::parser::{
    BinOp, Decl, Expr, ExprKind, Handler, Ident, InterpPart, Literal, ModeDecl, OnListenDecl,
    Program, Stmt, StmtKind, UnaryOp,
};

use super::builtins::Builtin;
use super::modes::ModeClass;
use super::symbols::{check_identifier, sema_error, FuncSig, NodeSymbols, SymbolTable};
use super::types::Ty;

/// Validate a parsed program. Returns `true` iff no semantic error was
/// reported; warnings do not count.
pub fn validate(program: &Program, diags: &mut Diagnostics) -> bool {
    Validator::new(diags).validate(program)
}

/// What a `return` may carry in the body being checked.
#[derive(Debug, Clone)]
enum ReturnRule {
    Value(Ty),
    Unit,
    /// Mode and listener bodies.
    Forbidden,
}

/// Where a body lives.
struct Scope<'s> {
    /// `None` inside a free function.
    node: Option<&'s NodeSymbols>,
    params: Vec<(String, Ty)>,
    ret: ReturnRule,
}

impl<'s> Scope<'s> {
    fn lookup(&self, name: &str) -> Option<Ty> {
        if let Some((_, ty)) = self.params.iter().rev().find(|(n, _)| n == name) {
            return Some(ty.clone());
        }
        self.node
            .and_then(|n| n.topic(name))
            .map(|t| t.ty.clone())
    }
}

/// Three-color marks for the delegation walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Semantic validator. All state lives in the value, so independent
/// programs can be validated one after another or side by side.
pub struct Validator<'d> {
    diags: &'d mut Diagnostics,
    symbols: SymbolTable,
    /// `(node, topic)` pairs that some body publishes to.
    published: HashSet<(String, String)>,
}

impl<'d> Validator<'d> {
    pub fn new(diags: &'d mut Diagnostics) -> Self {
        Self {
            diags,
            symbols: SymbolTable::default(),
            published: HashSet::new(),
        }
    }

    /// Run every pass over `program`.
    pub fn validate(&mut self, program: &Program) -> bool {
        let before = self.diags.error_count();
        self.symbols = SymbolTable::collect(program, self.diags);

        let symbols = std::mem::take(&mut self.symbols);
        self.check_bodies(program, &symbols);
        self.check_delegation_targets(program, &symbols);
        self.detect_cycles(&symbols);
        self.check_unused(program, &symbols);
        self.symbols = symbols;

        let errors = self.diags.error_count() - before;
        debug!(errors, "validation finished");
        errors == 0
    }

    /// The symbol table built by the last [`Validator::validate`] call.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn into_symbols(self) -> SymbolTable {
        self.symbols
    }

    fn error(&mut self, diag: Diagnostic) {
        self.diags.push(diag);
    }

    fn err(&mut self, span: Span, message: impl Into<String>) {
        self.error(sema_error(span, message));
    }

    fn warn(&mut self, span: Span, message: impl Into<String>) {
        self.diags
            .push(Diagnostic::warning(message, span).with_code(SEMA_WARN_CODE));
    }

    // ========================================================================
    // Bodies
    // ========================================================================

    fn check_bodies(&mut self, program: &Program, symbols: &SymbolTable) {
        for decl in &program.decls {
            match decl {
                Decl::Node(node) => {
                    // Skip the second declaration of a duplicated node.
                    let Some(sym) = symbols.node(&node.name.name).filter(|s| s.span == node.name.span)
                    else {
                        continue;
                    };
                    for req in &node.requests {
                        let sig = FuncSig::from_signature(&req.sig);
                        match &req.handler {
                            Handler::Body(body) => {
                                self.check_function_body(symbols, Some(sym), &sig, body);
                            }
                            Handler::Delegate(target) => {
                                self.check_request_delegate(sym, &sig, target);
                            }
                        }
                    }
                    for func in &node.private_funcs {
                        let sig = FuncSig::from_signature(&func.sig);
                        self.check_function_body(symbols, Some(sym), &sig, &func.body);
                    }
                    for listener in &node.listeners {
                        self.check_listener(symbols, sym, listener);
                    }
                }
                Decl::Func(func) => {
                    let sig = FuncSig::from_signature(&func.sig);
                    self.check_function_body(symbols, None, &sig, &func.body);
                }
                Decl::Mode(mode) => {
                    if let Some(sym) = symbols.node(&mode.node.name) {
                        self.check_mode(symbols, sym, mode);
                    }
                }
                Decl::SystemMode(_) => {}
            }
        }
    }

    fn check_function_body(
        &mut self,
        symbols: &SymbolTable,
        node: Option<&NodeSymbols>,
        sig: &FuncSig,
        body: &[Stmt],
    ) {
        let ret = match &sig.ret {
            Ty::Unit => ReturnRule::Unit,
            ty => ReturnRule::Value(ty.clone()),
        };
        let scope = Scope {
            node,
            params: sig.params.clone(),
            ret,
        };
        self.check_block(symbols, &scope, body);

        if sig.ret != Ty::Unit && !returns_value(body) {
            self.warn(
                sig.span,
                format!(
                    "function '{}' declares return type {} but never returns a value",
                    sig.name, sig.ret
                ),
            );
        }
    }

    fn check_request_delegate(&mut self, node: &NodeSymbols, sig: &FuncSig, target: &Ident) {
        let Some(func) = node.private_funcs.get(&target.name) else {
            self.error(
                sema_error(
                    target.span,
                    format!("unknown private function '{}' on node '{}'", target.name, node.name),
                )
                .with_help("a request can only forward to a 'func' declared inside the same node"),
            );
            return;
        };
        let same_params = func.arity() == sig.arity()
            && func.param_types().zip(sig.param_types()).all(|(a, b)| a == b);
        if !same_params || func.ret != sig.ret {
            self.error(
                sema_error(
                    target.span,
                    format!(
                        "'{}' cannot handle request '{}': the signatures differ",
                        target.name, sig.name
                    ),
                )
                .with_label(Label::primary(target.span, "forwarded to here"))
                .with_label(Label::secondary(func.span, "declared here")),
            );
        }
    }

    fn check_mode(&mut self, symbols: &SymbolTable, node: &NodeSymbols, mode: &ModeDecl) {
        let scope = Scope {
            node: Some(node),
            params: Vec::new(),
            ret: ReturnRule::Forbidden,
        };
        self.check_block(symbols, &scope, &mode.body);
        for listener in &mode.listeners {
            self.check_listener(symbols, node, listener);
        }
    }

    fn check_listener(&mut self, symbols: &SymbolTable, node: &NodeSymbols, listener: &OnListenDecl) {
        let source = match &listener.source_node {
            Some(src) => match symbols.node(&src.name) {
                Some(s) => s,
                None => {
                    self.err(src.span, format!("unknown node '{}'", src.name));
                    return;
                }
            },
            None => node,
        };
        let Some(topic) = source.topic(&listener.topic.name) else {
            self.err(
                listener.topic.span,
                format!("node '{}' has no topic '{}'", source.name, listener.topic.name),
            );
            return;
        };
        let topic_ty = topic.ty.clone();

        if let Some(param) = &listener.param {
            check_identifier(&param.name.name, param.name.span, self.diags);
            let declared = Ty::from_ast(&param.ty.kind);
            if declared != topic_ty {
                self.err(
                    param.ty.span,
                    format!(
                        "listener parameter has type {} but topic '{}' carries {}",
                        declared, listener.topic.name, topic_ty
                    ),
                );
            }
        }

        match &listener.handler {
            Handler::Delegate(target) => {
                let Some(func) = node.private_funcs.get(&target.name) else {
                    self.err(
                        target.span,
                        format!("unknown private function '{}' on node '{}'", target.name, node.name),
                    );
                    return;
                };
                let fits = func.arity() == 1 && func.param_types().all(|t| *t == topic_ty);
                if !fits {
                    self.error(
                        sema_error(
                            target.span,
                            format!(
                                "listener delegate '{}' must take exactly one parameter of type {}",
                                target.name, topic_ty
                            ),
                        )
                        .with_label(Label::primary(target.span, "delegated here"))
                        .with_label(Label::secondary(func.span, "declared here")),
                    );
                }
            }
            Handler::Body(body) => {
                let scope = Scope {
                    node: Some(node),
                    params: vec![(listener.param_name().to_string(), topic_ty)],
                    ret: ReturnRule::Forbidden,
                };
                self.check_block(symbols, &scope, body);
            }
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn check_block(&mut self, symbols: &SymbolTable, scope: &Scope<'_>, body: &[Stmt]) {
        for stmt in body {
            self.check_stmt(symbols, scope, stmt);
        }
    }

    fn check_stmt(&mut self, symbols: &SymbolTable, scope: &Scope<'_>, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Call { callee, args } => {
                self.check_call(symbols, scope, callee, args);
            }
            StmtKind::Request {
                node: target,
                func,
                args,
                ..
            } => {
                if scope.node.is_none() {
                    self.err(stmt.span, "'request' needs an owning node and cannot appear in a free function");
                    self.infer_args(symbols, scope, args);
                    return;
                }
                self.check_request(symbols, scope, target, func, args);
            }
            StmtKind::Publish { topic, value } => {
                let value_ty = self.infer(symbols, scope, value);
                let Some(node) = scope.node else {
                    self.err(stmt.span, "'publish' needs an owning node and cannot appear in a free function");
                    return;
                };
                let Some(sym) = node.topic(&topic.name) else {
                    self.err(
                        topic.span,
                        format!("unknown topic '{}' on node '{}'", topic.name, node.name),
                    );
                    return;
                };
                self.published.insert((node.name.clone(), topic.name.clone()));
                if !sym.ty.matches_exactly(&value_ty) {
                    self.error(
                        sema_error(
                            value.span,
                            format!(
                                "cannot publish {} on topic '{}' of type {}",
                                value_ty, topic.name, sym.ty
                            ),
                        )
                        .with_note("published values must match the topic type exactly"),
                    );
                }
            }
            StmtKind::Return(value) => self.check_return(symbols, scope, stmt.span, value.as_ref()),
            StmtKind::Transition {
                system,
                target_node,
                state,
            } => {
                let Some(node) = scope.node else {
                    self.err(stmt.span, "'transition' needs an owning node and cannot appear in a free function");
                    return;
                };
                if *system {
                    self.check_system_transition(symbols, node, stmt.span, target_node.as_ref(), state);
                } else {
                    self.check_local_transition(symbols, node, stmt.span, target_node.as_ref(), state);
                }
            }
            StmtKind::Log { parts, .. } => {
                for part in parts {
                    if let InterpPart::Expr(expr) = part {
                        self.infer(symbols, scope, expr);
                    }
                }
            }
            StmtKind::If {
                condition,
                then_body,
                elifs,
                else_body,
            } => {
                self.check_condition(symbols, scope, condition);
                self.check_block(symbols, scope, then_body);
                for (cond, body) in elifs {
                    self.check_condition(symbols, scope, cond);
                    self.check_block(symbols, scope, body);
                }
                if let Some(body) = else_body {
                    self.check_block(symbols, scope, body);
                }
            }
        }
    }

    fn check_condition(&mut self, symbols: &SymbolTable, scope: &Scope<'_>, cond: &Expr) {
        let ty = self.infer(symbols, scope, cond);
        if !Ty::Bool.matches_exactly(&ty) {
            self.err(cond.span, format!("condition must be bool, found {}", ty));
        }
    }

    fn check_return(
        &mut self,
        symbols: &SymbolTable,
        scope: &Scope<'_>,
        span: Span,
        value: Option<&Expr>,
    ) {
        let value_ty = value.map(|v| self.infer(symbols, scope, v));
        match (&scope.ret, value_ty) {
            (ReturnRule::Forbidden, Some(_)) => {
                self.err(span, "mode and listener bodies cannot return a value");
            }
            (ReturnRule::Forbidden, None) | (ReturnRule::Unit, None) => {}
            (ReturnRule::Unit, Some(_)) => {
                self.error(
                    sema_error(span, "this function has no return type but returns a value")
                        .with_help("add '-> type' to the signature"),
                );
            }
            (ReturnRule::Value(expected), None) => {
                self.err(span, format!("missing return value of type {}", expected));
            }
            (ReturnRule::Value(expected), Some(actual)) => {
                if !expected.accepts(&actual) {
                    self.err(
                        span,
                        format!("return type mismatch: expected {}, found {}", expected, actual),
                    );
                }
            }
        }
    }

    fn check_request(
        &mut self,
        symbols: &SymbolTable,
        scope: &Scope<'_>,
        target: &Ident,
        func: &Ident,
        args: &[Expr],
    ) {
        let arg_tys = self.infer_args(symbols, scope, args);
        if target.is_error() || func.is_error() {
            return;
        }
        let Some(node) = symbols.node(&target.name) else {
            self.err(target.span, format!("unknown node '{}'", target.name));
            return;
        };
        let Some(sig) = node.requests.get(&func.name) else {
            let mut diag = sema_error(
                func.span,
                format!("node '{}' has no onRequest function '{}'", node.name, func.name),
            );
            if node.private_funcs.contains_key(&func.name) {
                diag = diag.with_help(format!(
                    "'{}' is private to '{}'; expose it with 'onRequest'",
                    func.name, node.name
                ));
            }
            self.error(diag);
            return;
        };
        let callee = format!("{}.{}", node.name, func.name);
        self.check_arguments(&callee, sig, args, &arg_tys, func.span);
    }

    fn check_system_transition(
        &mut self,
        symbols: &SymbolTable,
        node: &NodeSymbols,
        span: Span,
        target_node: Option<&Ident>,
        state: &crate::parser::ModeName,
    ) {
        if !node.is_controller {
            self.error(
                sema_error(span, "only controller nodes can trigger system transitions")
                    .with_help(format!("mark node '{}' as 'controller'", node.name)),
            );
        }
        if let Some(target) = target_node {
            self.err(target.span, "a system transition applies to every node and cannot name one");
        }
        if !symbols.is_system_mode(&state.text) {
            self.error(
                sema_error(state.span, format!("unknown system mode '{}'", state.text))
                    .with_help(format!("declare it with 'systemMode {}'", state.text)),
            );
        }
    }

    fn check_local_transition(
        &mut self,
        symbols: &SymbolTable,
        node: &NodeSymbols,
        span: Span,
        target_node: Option<&Ident>,
        state: &crate::parser::ModeName,
    ) {
        let target = match target_node {
            Some(t) => {
                if t.name != node.name && !node.is_controller {
                    self.error(
                        sema_error(span, "only controller nodes can change another node's mode")
                            .with_help(format!("mark node '{}' as 'controller'", node.name)),
                    );
                }
                match symbols.node(&t.name) {
                    Some(n) => n,
                    None => {
                        self.err(t.span, format!("unknown node '{}'", t.name));
                        return;
                    }
                }
            }
            None => node,
        };

        let system_hint = || {
            format!(
                "use 'transition system {}' or mark the mode 'ignore system'",
                state.text
            )
        };
        match target.mode(&state.text) {
            Some(mode) if mode.class == ModeClass::Local => {}
            Some(_) => {
                self.error(
                    sema_error(
                        state.span,
                        format!("'{}' is a system mode of node '{}'", state.text, target.name),
                    )
                    .with_help(system_hint()),
                );
            }
            None if symbols.is_system_mode(&state.text) => {
                self.error(
                    sema_error(state.span, format!("'{}' is a system mode", state.text))
                        .with_help(system_hint()),
                );
            }
            None => {
                self.err(
                    state.span,
                    format!("node '{}' has no local mode '{}'", target.name, state.text),
                );
            }
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn infer_args(&mut self, symbols: &SymbolTable, scope: &Scope<'_>, args: &[Expr]) -> Vec<Ty> {
        args.iter().map(|a| self.infer(symbols, scope, a)).collect()
    }

    fn check_arguments(&mut self, callee: &str, sig: &FuncSig, args: &[Expr], arg_tys: &[Ty], span: Span) {
        if sig.arity() != args.len() {
            self.error(
                sema_error(
                    span,
                    format!(
                        "argument count mismatch: '{}' takes {} argument(s) but {} were given",
                        callee,
                        sig.arity(),
                        args.len()
                    ),
                )
                .with_label(Label::primary(span, "called here"))
                .with_label(Label::secondary(sig.span, "declared here")),
            );
            return;
        }
        for ((arg, actual), (pname, expected)) in args.iter().zip(arg_tys).zip(&sig.params) {
            if !expected.accepts(actual) {
                self.err(
                    arg.span,
                    format!(
                        "argument '{}' of '{}' expects {}, found {}",
                        pname, callee, expected, actual
                    ),
                );
            }
        }
    }

    /// Resolve a local call: builtins, then the node's private functions,
    /// then free functions.
    fn check_call(&mut self, symbols: &SymbolTable, scope: &Scope<'_>, callee: &Ident, args: &[Expr]) -> Ty {
        let arg_tys = self.infer_args(symbols, scope, args);
        if callee.is_error() {
            return Ty::Error;
        }

        if let Some(builtin) = Builtin::lookup(&callee.name) {
            if builtin.arity() != args.len() {
                self.err(
                    callee.span,
                    format!(
                        "argument count mismatch: '{}' takes {} argument(s) but {} were given",
                        builtin.name(),
                        builtin.arity(),
                        args.len()
                    ),
                );
                return Ty::Error;
            }
            let mut ok = true;
            for (arg, ty) in args.iter().zip(&arg_tys) {
                if !ty.is_numeric() && !ty.is_error() {
                    self.err(
                        arg.span,
                        format!("'{}' expects numeric arguments, found {}", builtin.name(), ty),
                    );
                    ok = false;
                }
            }
            if !ok || arg_tys.iter().any(Ty::is_error) {
                return Ty::Error;
            }
            return builtin.result_type(&arg_tys);
        }

        let sig = scope
            .node
            .and_then(|n| n.private_funcs.get(&callee.name))
            .or_else(|| symbols.free_funcs.get(&callee.name));
        let Some(sig) = sig else {
            let mut diag = sema_error(callee.span, format!("unknown function '{}'", callee.name));
            if scope.node.is_some_and(|n| n.requests.contains_key(&callee.name)) {
                diag = diag.with_help(format!(
                    "'{}' is an onRequest function; call it with 'request'",
                    callee.name
                ));
            }
            self.error(diag);
            return Ty::Error;
        };
        self.check_arguments(&callee.name, sig, args, &arg_tys, callee.span);
        sig.ret.clone()
    }

    fn infer(&mut self, symbols: &SymbolTable, scope: &Scope<'_>, expr: &Expr) -> Ty {
        match &expr.kind {
            ExprKind::Literal(lit) => match lit {
                Literal::Int(_) => Ty::Int,
                Literal::Float(_) => Ty::Float,
                Literal::String(_) => Ty::String,
                Literal::Bool(_) => Ty::Bool,
            },
            ExprKind::Ident(ident) => match scope.lookup(&ident.name) {
                Some(ty) => ty,
                None => {
                    if !ident.is_error() {
                        self.err(ident.span, format!("unknown identifier '{}'", ident.name));
                    }
                    Ty::Error
                }
            },
            ExprKind::Call { callee, args } => {
                let ty = self.check_call(symbols, scope, callee, args);
                if ty == Ty::Unit {
                    self.err(
                        expr.span,
                        format!("function '{}' does not return a value", callee.name),
                    );
                    return Ty::Error;
                }
                ty
            }
            ExprKind::Unary { op, operand } => {
                let ty = self.infer(symbols, scope, operand);
                if ty.is_error() {
                    return Ty::Error;
                }
                match op {
                    UnaryOp::Not if ty == Ty::Bool => Ty::Bool,
                    UnaryOp::Not => {
                        self.err(expr.span, format!("'not' requires bool, found {}", ty));
                        Ty::Error
                    }
                    UnaryOp::Neg if ty.is_numeric() => ty,
                    UnaryOp::Neg => {
                        self.err(expr.span, format!("unary '-' requires a number, found {}", ty));
                        Ty::Error
                    }
                }
            }
            ExprKind::Binary { op, left, right } => {
                let lt = self.infer(symbols, scope, left);
                let rt = self.infer(symbols, scope, right);
                self.infer_binary(*op, &lt, &rt, expr.span)
            }
            ExprKind::Error => Ty::Error,
        }
    }

    fn infer_binary(&mut self, op: BinOp, lt: &Ty, rt: &Ty, span: Span) -> Ty {
        let poisoned = lt.is_error() || rt.is_error();
        if op.is_arithmetic() {
            if poisoned {
                return Ty::Error;
            }
            return match Ty::promote(lt, rt) {
                Some(ty) => ty,
                None => {
                    self.err(
                        span,
                        format!("'{}' requires numeric operands, found {} and {}", op.symbol(), lt, rt),
                    );
                    Ty::Error
                }
            };
        }

        if !poisoned {
            let ok = if op.is_equality() {
                lt == rt || Ty::promote(lt, rt).is_some()
            } else if op.is_ordering() {
                Ty::promote(lt, rt).is_some()
            } else {
                *lt == Ty::Bool && *rt == Ty::Bool
            };
            if !ok {
                let need = if op.is_equality() {
                    "operands of the same type"
                } else if op.is_ordering() {
                    "numeric operands"
                } else {
                    "bool operands"
                };
                self.err(
                    span,
                    format!("'{}' requires {}, found {} and {}", op.symbol(), need, lt, rt),
                );
            }
        }
        Ty::Bool
    }

    // ========================================================================
    // Delegation
    // ========================================================================

    fn check_delegation_targets(&mut self, program: &Program, symbols: &SymbolTable) {
        for mode in program.modes() {
            let (Some(node), Some(target)) = (symbols.node(&mode.node.name), &mode.delegate_to) else {
                continue;
            };
            if node.mode(&target.text).is_some() {
                continue;
            }
            if !target.quoted && symbols.is_system_mode(&target.text) {
                continue;
            }
            self.err(
                target.span,
                format!(
                    "delegation target '{}' is neither a mode of node '{}' nor a system mode",
                    target.text, node.name
                ),
            );
        }
    }

    /// Depth-first walk over each node's delegation edges. A mode reached
    /// while still on the stack closes a cycle and is reported at its
    /// declaration.
    fn detect_cycles(&mut self, symbols: &SymbolTable) {
        for node in symbols.nodes.values() {
            let mut marks: HashMap<&str, Mark> = HashMap::new();
            for name in node.modes.keys() {
                if !marks.contains_key(name.as_str()) {
                    self.visit(node, name, &mut marks);
                }
            }
        }
    }

    fn visit<'n>(&mut self, node: &'n NodeSymbols, name: &'n str, marks: &mut HashMap<&'n str, Mark>) {
        marks.insert(name, Mark::Visiting);
        let next = node
            .mode(name)
            .and_then(|m| m.delegate_to.as_ref())
            .and_then(|target| node.modes.get_key_value(&target.text));
        if let Some((target, sym)) = next {
            match marks.get(target.as_str()) {
                Some(Mark::Visiting) => {
                    self.error(
                        sema_error(
                            sym.span,
                            format!("circular mode delegation detected for '{}->{}'", node.name, target),
                        )
                        .with_label(Label::primary(sym.span, "this mode delegates back to itself")),
                    );
                }
                Some(Mark::Done) => {}
                None => self.visit(node, target, marks),
            }
        }
        marks.insert(name, Mark::Done);
    }

    // ========================================================================
    // Warnings
    // ========================================================================

    fn check_unused(&mut self, program: &Program, symbols: &SymbolTable) {
        for sm in program.system_modes() {
            let bound = symbols.nodes.values().any(|n| {
                n.mode(&sm.name.name)
                    .is_some_and(|m| m.class == ModeClass::System)
            });
            if !bound {
                self.warn(
                    sm.name.span,
                    format!("system mode '{}' is declared but no node binds it", sm.name.name),
                );
            }
        }
        for node in symbols.nodes.values() {
            for topic in node.topics.values() {
                if !self.published.contains(&(node.name.clone(), topic.handle.clone())) {
                    self.warn(
                        topic.span,
                        format!("topic '{}.{}' is never published", node.name, topic.handle),
                    );
                }
            }
        }
    }
}

/// Whether some path through `body` returns a value.
fn returns_value(body: &[Stmt]) -> bool {
    body.iter().any(|stmt| match &stmt.kind {
        StmtKind::Return(Some(_)) => true,
        StmtKind::If {
            then_body,
            elifs,
            else_body,
            ..
        } => {
            returns_value(then_body)
                || elifs.iter().any(|(_, b)| returns_value(b))
                || else_body.as_deref().is_some_and(returns_value)
        }
        _ => false,
    })
}
