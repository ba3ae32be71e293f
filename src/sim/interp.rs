//! Tree-walking execution of a network.
//!
//! The [`World`] owns everything it runs: topic and mode callbacks outlive
//! any borrow of the source program, so node bodies are copied out of the
//! [`NetworkPlan`] once at construction. Callbacks hold a `Weak<World>` the
//! same way generated node structs hold a `Weak<Network>`.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::parser::{
    BinOp, Expr, ExprKind, FuncDecl, Handler, InterpPart, Literal, LogLevel, OnListenDecl,
    OnRequestDecl, Program, Stmt, StmtKind, UnaryOp,
};
use crate::plan::{ListenerPlan, NetworkPlan};
use crate::runtime::{ModeBus, ModePhase, ModeQueue, SubId, Topic};
use crate::types::{Builtin, FuncSig, ModeClass, Ty, INITIAL_SYSTEM_MODE};

use super::trace::TraceEvent;
use super::value::Value;

/// Nested calls and handler activations allowed before a run is treated
/// as runaway recursion.
pub const MAX_DEPTH: usize = 256;

/// Error raised while executing a body. It aborts the handler it occurs
/// in and is recorded in the trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub message: String,
}

impl Fault {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

type Exec<T> = Result<T, Fault>;

enum Flow {
    Next,
    Return(Value),
}

struct SimListener {
    decl: OnListenDecl,
    source: usize,
    topic: String,
    ty: Ty,
    slot: usize,
}

impl SimListener {
    fn from_plan(plan: &ListenerPlan<'_>) -> Self {
        Self {
            decl: plan.decl.clone(),
            source: plan.source,
            topic: plan.topic.clone(),
            ty: plan.ty.clone(),
            slot: plan.slot,
        }
    }
}

struct SimMode {
    name: String,
    class: ModeClass,
    body: Vec<Stmt>,
    listeners: Vec<SimListener>,
}

struct SimTopic {
    ty: Ty,
    channel: Topic<Value>,
}

struct SimNode {
    name: String,
    ignores_system: bool,
    topics: IndexMap<String, SimTopic>,
    requests: IndexMap<String, OnRequestDecl>,
    private_funcs: IndexMap<String, FuncDecl>,
    static_listeners: Vec<SimListener>,
    modes: Vec<SimMode>,
    slots: Vec<Cell<Option<SubId>>>,
    local: ModeQueue,
}

impl SimNode {
    fn mode(&self, class: ModeClass, name: &str) -> Option<(usize, &SimMode)> {
        self.modes
            .iter()
            .enumerate()
            .find(|(_, m)| m.class == class && m.name == name)
    }
}

/// Which handler a delivered value goes to.
#[derive(Debug, Clone, Copy)]
enum ListenerKey {
    Static(usize),
    Mode { mode: usize, index: usize },
}

/// Local names of one activation.
struct Frame<'a> {
    node: Option<usize>,
    origin: &'a str,
    locals: Vec<(String, Value)>,
}

impl<'a> Frame<'a> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.locals
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

pub(crate) struct World {
    nodes: Vec<SimNode>,
    index: IndexMap<String, usize>,
    free_funcs: IndexMap<String, FuncDecl>,
    system_modes: Vec<String>,
    bus: ModeBus,
    trace: RefCell<Vec<TraceEvent>>,
    depth: Cell<usize>,
    echo: Cell<bool>,
    booted: Cell<bool>,
    self_ref: Weak<World>,
}

impl World {
    pub(crate) fn new(plan: &NetworkPlan<'_>) -> Rc<World> {
        Rc::new_cyclic(|weak: &Weak<World>| {
            let nodes = plan
                .nodes
                .iter()
                .map(|node| SimNode {
                    name: node.name.clone(),
                    ignores_system: node.ignores_system,
                    topics: node
                        .topics
                        .iter()
                        .map(|t| {
                            let topic = SimTopic {
                                ty: t.ty.clone(),
                                channel: Topic::with_value(t.path.clone(), Value::default_for(&t.ty)),
                            };
                            (t.handle.clone(), topic)
                        })
                        .collect(),
                    requests: node
                        .decl
                        .requests
                        .iter()
                        .map(|r| (r.sig.name.name.clone(), r.clone()))
                        .collect(),
                    private_funcs: node
                        .decl
                        .private_funcs
                        .iter()
                        .map(|f| (f.sig.name.name.clone(), f.clone()))
                        .collect(),
                    static_listeners: node.static_listeners.iter().map(SimListener::from_plan).collect(),
                    modes: node
                        .modes
                        .iter()
                        .map(|m| SimMode {
                            name: m.name.clone(),
                            class: m.class,
                            body: m.body.to_vec(),
                            listeners: m.listeners.iter().map(SimListener::from_plan).collect(),
                        })
                        .collect(),
                    slots: (0..node.slots).map(|_| Cell::new(None)).collect(),
                    local: ModeQueue::new(),
                })
                .collect();

            let announcer = weak.clone();
            World {
                nodes,
                index: plan
                    .nodes
                    .iter()
                    .enumerate()
                    .map(|(i, n)| (n.name.clone(), i))
                    .collect(),
                free_funcs: plan
                    .free_funcs
                    .iter()
                    .map(|f| (f.sig.name.name.clone(), (*f).clone()))
                    .collect(),
                system_modes: plan.symbols.system_mode_names().map(str::to_string).collect(),
                bus: ModeBus::with_announcer(move |mode| {
                    if let Some(world) = announcer.upgrade() {
                        world.record(TraceEvent::SystemChange {
                            mode: mode.to_string(),
                        });
                    }
                }),
                trace: RefCell::new(Vec::new()),
                depth: Cell::new(0),
                echo: Cell::new(false),
                booted: Cell::new(false),
                self_ref: weak.clone(),
            }
        })
    }

    fn record(&self, event: TraceEvent) {
        if self.echo.get() && event.is_output() {
            println!("{}", event);
        }
        tracing::trace!(event = %event, "sim");
        self.trace.borrow_mut().push(event);
    }

    pub(crate) fn fault(&self, node: &str, fault: Fault) {
        tracing::debug!(node, message = %fault.message, "handler aborted");
        self.record(TraceEvent::Fault {
            node: node.to_string(),
            message: fault.message,
        });
    }

    pub(crate) fn set_echo(&self, on: bool) {
        self.echo.set(on);
    }

    pub(crate) fn events(&self) -> Vec<TraceEvent> {
        self.trace.borrow().clone()
    }

    pub(crate) fn node_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn node_name(&self, index: usize) -> &str {
        &self.nodes[index].name
    }

    pub(crate) fn has_request(&self, node: usize, func: &str) -> bool {
        self.nodes[node].requests.contains_key(func)
    }

    pub(crate) fn topic_value(&self, node: usize, topic: &str) -> Option<Value> {
        self.nodes[node].topics.get(topic).map(|t| t.channel.value())
    }

    pub(crate) fn local_state(&self, node: usize) -> String {
        self.nodes[node].local.current()
    }

    pub(crate) fn system_mode(&self) -> String {
        self.bus.current()
    }

    pub(crate) fn knows_system_mode(&self, mode: &str) -> bool {
        self.system_modes.iter().any(|m| m == mode)
    }

    // ========================================================================
    // Start-up
    // ========================================================================

    /// Register bus listeners, wire static listeners, then run every
    /// node's `Init` behavior with the bus held.
    pub(crate) fn boot(&self) {
        if self.booted.replace(true) {
            return;
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.ignores_system {
                continue;
            }
            let weak = self.self_ref.clone();
            self.bus.listen(move |phase, mode| {
                if let Some(world) = weak.upgrade() {
                    world.on_system_change(i, phase, mode);
                }
            });
        }
        for (i, node) in self.nodes.iter().enumerate() {
            for (l, listener) in node.static_listeners.iter().enumerate() {
                self.subscribe(i, listener, ListenerKey::Static(l));
            }
        }
        self.bus.boot(|| {
            for (i, node) in self.nodes.iter().enumerate() {
                if !node.ignores_system {
                    self.on_system_change(i, ModePhase::Enter, INITIAL_SYSTEM_MODE);
                }
            }
            for i in 0..self.nodes.len() {
                self.init(i);
            }
        });
    }

    fn init(&self, node: usize) {
        if self.nodes[node].ignores_system {
            self.set_state(node, INITIAL_SYSTEM_MODE);
        } else {
            self.run_system_mode(node, INITIAL_SYSTEM_MODE);
        }
    }

    /// Publish on a topic from outside any handler.
    pub(crate) fn publish_external(&self, node: usize, topic: &str, value: Value) {
        let sim = &self.nodes[node];
        if let Some(target) = sim.topics.get(topic) {
            let value = value.coerce(&target.ty);
            self.record(TraceEvent::Publish {
                node: sim.name.clone(),
                topic: topic.to_string(),
                value: value.clone(),
            });
            target.channel.publish(value);
        }
    }

    pub(crate) fn request_system_mode(&self, mode: &str) {
        self.bus.request(mode);
    }

    fn subscribe(&self, node: usize, listener: &SimListener, key: ListenerKey) -> SubId {
        let weak = self.self_ref.clone();
        self.nodes[listener.source]
            .topics
            .get(&listener.topic)
            .map(|t| {
                t.channel.subscribe(move |value: &Value| {
                    if let Some(world) = weak.upgrade() {
                        world.deliver(node, key, value.clone());
                    }
                })
            })
            .unwrap_or_default()
    }

    // ========================================================================
    // Modes
    // ========================================================================

    fn on_system_change(&self, node: usize, phase: ModePhase, mode: &str) {
        match phase {
            ModePhase::Enter => {
                self.retire(node, ModeClass::System);
                if let Some((m, _)) = self.nodes[node].mode(ModeClass::System, mode) {
                    self.arm(node, m);
                }
            }
            ModePhase::Run => self.run_system_mode(node, mode),
        }
    }

    fn run_system_mode(&self, node: usize, mode: &str) {
        if let Some((m, _)) = self.nodes[node].mode(ModeClass::System, mode) {
            self.run_mode_body(node, m);
        }
    }

    pub(crate) fn set_state(&self, node: usize, state: &str) {
        self.nodes[node]
            .local
            .request(state, |next| self.on_local_change(node, next));
    }

    fn on_local_change(&self, node: usize, state: &str) {
        self.record(TraceEvent::LocalChange {
            node: self.nodes[node].name.clone(),
            state: state.to_string(),
        });
        self.retire(node, ModeClass::Local);
        if let Some((m, _)) = self.nodes[node].mode(ModeClass::Local, state) {
            self.arm(node, m);
            self.run_mode_body(node, m);
        }
    }

    fn run_mode_body(&self, node: usize, mode: usize) {
        let sim = &self.nodes[node];
        let mut frame = Frame {
            node: Some(node),
            origin: &sim.name,
            locals: Vec::new(),
        };
        let result = self.enter().and_then(|_| {
            let flow = self.exec_block(&mut frame, &sim.modes[mode].body);
            self.leave();
            flow
        });
        if let Err(fault) = result {
            self.fault(&sim.name, fault);
        }
    }

    fn arm(&self, node: usize, mode: usize) {
        let sim = &self.nodes[node];
        for (index, listener) in sim.modes[mode].listeners.iter().enumerate() {
            let id = self.subscribe(node, listener, ListenerKey::Mode { mode, index });
            sim.slots[listener.slot].set(Some(id));
        }
    }

    fn retire(&self, node: usize, class: ModeClass) {
        let sim = &self.nodes[node];
        for mode in sim.modes.iter().filter(|m| m.class == class) {
            for listener in &mode.listeners {
                if let Some(id) = sim.slots[listener.slot].take() {
                    if let Some(topic) = self.nodes[listener.source].topics.get(&listener.topic) {
                        topic.channel.unsubscribe(id);
                    }
                }
            }
        }
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    fn deliver(&self, node: usize, key: ListenerKey, value: Value) {
        let sim = &self.nodes[node];
        let listener = match key {
            ListenerKey::Static(i) => &sim.static_listeners[i],
            ListenerKey::Mode { mode, index } => &sim.modes[mode].listeners[index],
        };
        self.record(TraceEvent::Deliver {
            node: sim.name.clone(),
            source: format!("{}.{}", self.nodes[listener.source].name, listener.topic),
            value: value.clone(),
        });
        let value = value.coerce(&listener.ty);
        let result = self.enter().and_then(|_| {
            let outcome = match &listener.decl.handler {
                Handler::Body(body) => {
                    let mut frame = Frame {
                        node: Some(node),
                        origin: &sim.name,
                        locals: vec![(listener.decl.param_name().to_string(), value)],
                    };
                    self.exec_block(&mut frame, body).map(|_| ())
                }
                Handler::Delegate(target) => self
                    .call_private(node, &target.name, vec![value])
                    .map(|_| ()),
            };
            self.leave();
            outcome
        });
        if let Err(fault) = result {
            self.fault(&sim.name, fault);
        }
    }

    /// Run an `onRequest` function of `node`.
    pub(crate) fn call_request(&self, node: usize, func: &str, args: Vec<Value>) -> Exec<Value> {
        let sim = &self.nodes[node];
        let req = sim
            .requests
            .get(func)
            .ok_or_else(|| Fault::new(format!("node '{}' has no request '{}'", sim.name, func)))?;
        let sig = FuncSig::from_signature(&req.sig);
        let args = bind_args(&sig, args)?;
        match &req.handler {
            Handler::Body(body) => self.run_function(Some(node), &sim.name, &sig, args, body),
            Handler::Delegate(target) => {
                let values = args.into_iter().map(|(_, v)| v).collect();
                let result = self.call_private(node, &target.name, values)?;
                Ok(result.coerce(&sig.ret))
            }
        }
    }

    fn call_private(&self, node: usize, name: &str, args: Vec<Value>) -> Exec<Value> {
        let sim = &self.nodes[node];
        let func = sim.private_funcs.get(name).ok_or_else(|| {
            Fault::new(format!("node '{}' has no function '{}'", sim.name, name))
        })?;
        let sig = FuncSig::from_signature(&func.sig);
        let args = bind_args(&sig, args)?;
        self.run_function(Some(node), &sim.name, &sig, args, &func.body)
    }

    fn call_free(&self, func: &FuncDecl, args: Vec<Value>) -> Exec<Value> {
        let sig = FuncSig::from_signature(&func.sig);
        let args = bind_args(&sig, args)?;
        self.run_function(None, &func.sig.name.name, &sig, args, &func.body)
    }

    fn run_function(
        &self,
        node: Option<usize>,
        origin: &str,
        sig: &FuncSig,
        locals: Vec<(String, Value)>,
        body: &[Stmt],
    ) -> Exec<Value> {
        self.enter()?;
        let mut frame = Frame {
            node,
            origin,
            locals,
        };
        let flow = self.exec_block(&mut frame, body);
        self.leave();
        Ok(match flow? {
            Flow::Return(value) if sig.ret != Ty::Unit => value.coerce(&sig.ret),
            Flow::Return(_) => Value::Unit,
            // A body that falls off the end yields the type's default.
            Flow::Next => Value::default_for(&sig.ret),
        })
    }

    fn enter(&self) -> Exec<()> {
        let depth = self.depth.get() + 1;
        if depth > MAX_DEPTH {
            return Err(Fault::new(format!("call depth exceeded {}", MAX_DEPTH)));
        }
        self.depth.set(depth);
        Ok(())
    }

    fn leave(&self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn exec_block(&self, frame: &mut Frame<'_>, body: &[Stmt]) -> Exec<Flow> {
        for stmt in body {
            if let Flow::Return(value) = self.exec_stmt(frame, stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn exec_stmt(&self, frame: &mut Frame<'_>, stmt: &Stmt) -> Exec<Flow> {
        match &stmt.kind {
            StmtKind::Call { callee, args } => {
                self.eval_call(frame, &callee.name, args)?;
            }
            StmtKind::Request {
                node,
                func,
                args,
                silent,
            } => {
                let target = self
                    .node_index(&node.name)
                    .ok_or_else(|| Fault::new(format!("unknown node '{}'", node.name)))?;
                let values = args
                    .iter()
                    .map(|a| self.eval(frame, a))
                    .collect::<Exec<Vec<_>>>()?;
                self.record(TraceEvent::Request {
                    from: frame.origin.to_string(),
                    node: node.name.clone(),
                    func: func.name.clone(),
                    silent: *silent,
                });
                if !silent {
                    self.record(TraceEvent::Log {
                        node: frame.origin.to_string(),
                        level: Some("DEBUG".to_string()),
                        message: format!("request {}.{}", node.name, func.name),
                    });
                }
                self.call_request(target, &func.name, values)?;
            }
            StmtKind::Publish { topic, value } => {
                let node = frame
                    .node
                    .ok_or_else(|| Fault::new("publish outside a node"))?;
                let value = self.eval(frame, value)?;
                let sim = &self.nodes[node];
                let target = sim.topics.get(&topic.name).ok_or_else(|| {
                    Fault::new(format!("node '{}' has no topic '{}'", sim.name, topic.name))
                })?;
                let value = value.coerce(&target.ty);
                self.record(TraceEvent::Publish {
                    node: sim.name.clone(),
                    topic: topic.name.clone(),
                    value: value.clone(),
                });
                target.channel.publish(value);
            }
            StmtKind::Return(None) => return Ok(Flow::Return(Value::Unit)),
            StmtKind::Return(Some(expr)) => return Ok(Flow::Return(self.eval(frame, expr)?)),
            StmtKind::Transition {
                system: true,
                state,
                ..
            } => self.request_system_mode(&state.text),
            StmtKind::Transition {
                target_node, state, ..
            } => {
                let target = match target_node {
                    Some(name) => self
                        .node_index(&name.name)
                        .ok_or_else(|| Fault::new(format!("unknown node '{}'", name.name)))?,
                    None => frame
                        .node
                        .ok_or_else(|| Fault::new("local transition outside a node"))?,
                };
                self.set_state(target, &state.text);
            }
            StmtKind::Log { level, parts } => {
                let mut message = String::new();
                for part in parts {
                    match part {
                        InterpPart::Text(text) => message.push_str(text),
                        InterpPart::Expr(expr) => message.push_str(&self.eval(frame, expr)?.to_string()),
                    }
                }
                let level = match level {
                    LogLevel::Print => None,
                    other => Some(other.keyword().to_uppercase()),
                };
                self.record(TraceEvent::Log {
                    node: frame.origin.to_string(),
                    level,
                    message,
                });
            }
            StmtKind::If {
                condition,
                then_body,
                elifs,
                else_body,
            } => {
                if self.eval_bool(frame, condition)? {
                    return self.exec_block(frame, then_body);
                }
                for (cond, body) in elifs {
                    if self.eval_bool(frame, cond)? {
                        return self.exec_block(frame, body);
                    }
                }
                if let Some(body) = else_body {
                    return self.exec_block(frame, body);
                }
            }
        }
        Ok(Flow::Next)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn eval_bool(&self, frame: &Frame<'_>, expr: &Expr) -> Exec<bool> {
        let value = self.eval(frame, expr)?;
        value
            .as_bool()
            .ok_or_else(|| Fault::new(format!("expected bool, found {}", value.type_name())))
    }

    fn eval(&self, frame: &Frame<'_>, expr: &Expr) -> Exec<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(match lit {
                Literal::Int(v) => Value::Int(*v),
                Literal::Float(v) => Value::Float(*v),
                Literal::String(s) => Value::Str(s.clone()),
                Literal::Bool(b) => Value::Bool(*b),
            }),
            ExprKind::Ident(ident) => {
                if let Some(value) = frame.lookup(&ident.name) {
                    return Ok(value.clone());
                }
                frame
                    .node
                    .and_then(|n| self.topic_value(n, &ident.name))
                    .ok_or_else(|| Fault::new(format!("unresolved identifier '{}'", ident.name)))
            }
            ExprKind::Call { callee, args } => self.eval_call(frame, &callee.name, args),
            ExprKind::Unary { op, operand } => {
                let value = self.eval(frame, operand)?;
                match (op, value) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, Value::Int(v)) => v
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| Fault::new("integer overflow")),
                    (UnaryOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
                    (op, value) => Err(Fault::new(format!(
                        "cannot apply {:?} to {}",
                        op,
                        value.type_name()
                    ))),
                }
            }
            ExprKind::Binary {
                op: BinOp::And,
                left,
                right,
            } => Ok(Value::Bool(
                self.eval_bool(frame, left)? && self.eval_bool(frame, right)?,
            )),
            ExprKind::Binary {
                op: BinOp::Or,
                left,
                right,
            } => Ok(Value::Bool(
                self.eval_bool(frame, left)? || self.eval_bool(frame, right)?,
            )),
            ExprKind::Binary { op, left, right } => {
                let l = self.eval(frame, left)?;
                let r = self.eval(frame, right)?;
                binary(*op, l, r)
            }
            ExprKind::Error => Err(Fault::new(format!(
                "placeholder expression at line {}",
                expr.span.line
            ))),
        }
    }

    /// Builtins, then the node's private functions, then free functions.
    fn eval_call(&self, frame: &Frame<'_>, name: &str, args: &[Expr]) -> Exec<Value> {
        let values = args
            .iter()
            .map(|a| self.eval(frame, a))
            .collect::<Exec<Vec<_>>>()?;
        if let Some(builtin) = Builtin::lookup(name) {
            return apply_builtin(builtin, &values);
        }
        if let Some(node) = frame.node {
            if self.nodes[node].private_funcs.contains_key(name) {
                return self.call_private(node, name, values);
            }
        }
        match self.free_funcs.get(name) {
            Some(func) => self.call_free(func, values),
            None => Err(Fault::new(format!("unknown function '{}'", name))),
        }
    }
}

/// Pair arguments with parameter names, widening where the parameter is
/// `float`.
fn bind_args(sig: &FuncSig, args: Vec<Value>) -> Exec<Vec<(String, Value)>> {
    if args.len() != sig.arity() {
        return Err(Fault::new(format!(
            "'{}' takes {} argument(s) but {} were given",
            sig.name,
            sig.arity(),
            args.len()
        )));
    }
    Ok(sig
        .params
        .iter()
        .zip(args)
        .map(|((name, ty), value)| (name.clone(), value.coerce(ty)))
        .collect())
}

fn apply_builtin(builtin: Builtin, args: &[Value]) -> Exec<Value> {
    let arity = || {
        Fault::new(format!(
            "'{}' takes {} argument(s) but {} were given",
            builtin.name(),
            builtin.arity(),
            args.len()
        ))
    };
    let not_numeric = || Fault::new(format!("'{}' expects numbers", builtin.name()));

    if args.iter().any(Value::is_float) {
        let floats = args
            .iter()
            .map(|v| v.as_float().ok_or_else(not_numeric))
            .collect::<Exec<Vec<f64>>>()?;
        return builtin.apply_float(&floats).map(Value::Float).ok_or_else(arity);
    }
    let ints = args
        .iter()
        .map(|v| match v {
            Value::Int(i) => Ok(*i),
            _ => Err(not_numeric()),
        })
        .collect::<Exec<Vec<i64>>>()?;
    builtin.apply_int(&ints).map(Value::Int).ok_or_else(arity)
}

fn binary(op: BinOp, l: Value, r: Value) -> Exec<Value> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => int_binary(op, a, b),
        (l, r) if op.is_arithmetic() || op.is_ordering() || op.is_equality() => {
            match (l.as_float(), r.as_float()) {
                (Some(a), Some(b)) => Ok(float_binary(op, a, b)),
                _ if op.is_equality() => {
                    let equal = l == r;
                    Ok(Value::Bool(if op == BinOp::Eq { equal } else { !equal }))
                }
                _ => match (&l, &r) {
                    (Value::Str(a), Value::Str(b)) if op.is_ordering() => {
                        Ok(Value::Bool(compare(op, a.cmp(b))))
                    }
                    _ => Err(Fault::new(format!(
                        "cannot apply '{}' to {} and {}",
                        op.symbol(),
                        l.type_name(),
                        r.type_name()
                    ))),
                },
            }
        }
        (l, r) => Err(Fault::new(format!(
            "cannot apply '{}' to {} and {}",
            op.symbol(),
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn int_binary(op: BinOp, a: i64, b: i64) -> Exec<Value> {
    let checked = |result: Option<i64>| {
        result
            .map(Value::Int)
            .ok_or_else(|| Fault::new(format!("integer overflow in '{} {} {}'", a, op.symbol(), b)))
    };
    match op {
        BinOp::Add => checked(a.checked_add(b)),
        BinOp::Sub => checked(a.checked_sub(b)),
        BinOp::Mul => checked(a.checked_mul(b)),
        BinOp::Div | BinOp::Rem if b == 0 => Err(Fault::new("division by zero")),
        BinOp::Div => checked(a.checked_div(b)),
        BinOp::Rem => checked(a.checked_rem(b)),
        BinOp::And | BinOp::Or => Err(Fault::new(format!(
            "cannot apply '{}' to int and int",
            op.symbol()
        ))),
        _ => Ok(Value::Bool(compare(op, a.cmp(&b)))),
    }
}

fn float_binary(op: BinOp, a: f64, b: f64) -> Value {
    match op {
        BinOp::Add => Value::Float(a + b),
        BinOp::Sub => Value::Float(a - b),
        BinOp::Mul => Value::Float(a * b),
        BinOp::Div => Value::Float(a / b),
        BinOp::Rem => Value::Float(a % b),
        BinOp::Eq => Value::Bool(a == b),
        BinOp::Ne => Value::Bool(a != b),
        BinOp::Lt => Value::Bool(a < b),
        BinOp::Le => Value::Bool(a <= b),
        BinOp::Gt => Value::Bool(a > b),
        BinOp::Ge => Value::Bool(a >= b),
        BinOp::And | BinOp::Or => Value::Bool(false),
    }
}

fn compare(op: BinOp, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        BinOp::Eq => ordering == Equal,
        BinOp::Ne => ordering != Equal,
        BinOp::Lt => ordering == Less,
        BinOp::Le => ordering != Greater,
        BinOp::Gt => ordering == Greater,
        BinOp::Ge => ordering != Less,
        _ => false,
    }
}

/// Build a world for `program`, which must have passed validation.
pub(crate) fn world_for(program: &Program) -> Result<Rc<World>, crate::plan::PlanError> {
    let plan = NetworkPlan::build(program)?;
    Ok(World::new(&plan))
}
