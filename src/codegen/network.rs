//! Node structs, mode state machines and network wiring.

use crate::parser::{Handler, Signature, Stmt};
use crate::plan::{BodyScope, ListenerPlan, NodePlan};
use crate::types::{FuncSig, ModeClass, Ty, INITIAL_SYSTEM_MODE};

use super::lower::{rust_ident, rust_type, string_literal, BodyCtx};
use super::{CodeGenerator, CodegenError};

/// Rust struct name of a node.
fn struct_name(node: &str) -> String {
    format!("{}Node", node)
}

fn signature_text(sig: &FuncSig, receiver: bool) -> String {
    let mut params: Vec<String> = Vec::new();
    if receiver {
        params.push("&self".to_string());
    }
    params.extend(
        sig.params
            .iter()
            .map(|(name, ty)| format!("{}: {}", rust_ident(name), rust_type(ty))),
    );
    let mut text = format!("fn {}({})", rust_ident(&sig.name), params.join(", "));
    if sig.ret != Ty::Unit {
        text.push_str(" -> ");
        text.push_str(&rust_type(&sig.ret));
    }
    text
}

impl<'a, 'p> CodeGenerator<'a, 'p> {
    pub(super) fn emit_free_functions(&mut self) -> Result<(), CodegenError> {
        self.out.open("mod funcs");
        self.out.line("use super::*;");
        for func in &self.plan.free_funcs {
            let sig = FuncSig::from_signature(&func.sig);
            self.out.blank();
            let ctx = BodyCtx {
                scope: BodyScope::with_params(None, sig.params.clone()),
                origin: func.sig.name.name.clone(),
                ret: sig.ret.clone(),
            };
            self.out.open(&format!("pub {}", signature_text(&sig, false)));
            self.lower_block(&ctx, &func.body)?;
            self.emit_fallback_return(&sig.ret);
            self.out.close();
        }
        self.out.close();
        self.out.blank();
        Ok(())
    }

    /// Functions with a return type end in a default value so that bodies
    /// returning on some paths only still compile.
    fn emit_fallback_return(&mut self, ret: &Ty) {
        if *ret != Ty::Unit {
            self.out.line("Default::default()");
        }
    }

    pub(super) fn emit_node(&mut self, index: usize) -> Result<(), CodegenError> {
        let plan = self.plan;
        let node = plan.node(index);
        let name = struct_name(&node.name);

        self.out.open(&format!("pub struct {}", name));
        self.out.line("rv_net: Weak<Network>,");
        self.out.line("rv_local: ModeQueue,");
        self.out.line("rv_slots: Vec<Cell<Option<SubId>>>,");
        for topic in &node.topics {
            self.out.line(&format!(
                "pub {}: Topic<{}>,",
                rust_ident(&topic.handle),
                rust_type(&topic.ty)
            ));
        }
        self.out.close();
        self.out.blank();

        self.out.open(&format!("impl {}", name));
        self.out.open("fn rv_new(rv_net: Weak<Network>) -> Self");
        self.out.open("Self");
        self.out.line("rv_net,");
        self.out.line("rv_local: ModeQueue::new(),");
        self.out.line(&format!(
            "rv_slots: (0..{}).map(|_| Cell::new(None)).collect(),",
            node.slots
        ));
        for topic in &node.topics {
            self.out.line(&format!(
                "{}: Topic::new({}),",
                rust_ident(&topic.handle),
                string_literal(&topic.path)
            ));
        }
        self.out.close();
        self.out.close();
        self.out.blank();
        self.out.open("fn rv_net(&self) -> Rc<Network>");
        self.out
            .line("self.rv_net.upgrade().expect(\"network outlives its nodes\")");
        self.out.close();

        self.emit_functions(index, node)?;
        self.emit_listeners(index, node)?;
        self.emit_modes(index, node)?;
        self.emit_mode_changes(node);

        self.out.close();
        self.out.blank();
        Ok(())
    }

    fn node_ctx(&self, index: usize, params: Vec<(String, Ty)>, ret: Ty) -> BodyCtx {
        BodyCtx {
            scope: BodyScope::with_params(Some(index), params),
            origin: self.plan.node(index).name.clone(),
            ret,
        }
    }

    fn emit_functions(&mut self, index: usize, node: &NodePlan<'p>) -> Result<(), CodegenError> {
        for req in &node.decl.requests {
            let sig = FuncSig::from_signature(&req.sig);
            self.out.blank();
            self.out.open(&format!("pub {}", signature_text(&sig, true)));
            match &req.handler {
                Handler::Body(body) => {
                    let ctx = self.node_ctx(index, sig.params.clone(), sig.ret.clone());
                    self.lower_block(&ctx, body)?;
                    self.emit_fallback_return(&sig.ret);
                }
                Handler::Delegate(target) => {
                    let args: Vec<String> = sig.params.iter().map(|(n, _)| rust_ident(n)).collect();
                    let call = format!("self.{}({})", rust_ident(&target.name), args.join(", "));
                    if sig.ret == Ty::Unit {
                        self.out.line(&format!("{};", call));
                    } else {
                        self.out.line(&call);
                    }
                }
            }
            self.out.close();
        }

        for func in &node.decl.private_funcs {
            self.emit_private(index, &func.sig, &func.body)?;
        }
        Ok(())
    }

    fn emit_private(&mut self, index: usize, sig: &Signature, body: &[Stmt]) -> Result<(), CodegenError> {
        let sig = FuncSig::from_signature(sig);
        let ctx = self.node_ctx(index, sig.params.clone(), sig.ret.clone());
        self.out.blank();
        self.out.open(&signature_text(&sig, true));
        self.lower_block(&ctx, body)?;
        self.emit_fallback_return(&sig.ret);
        self.out.close();
        Ok(())
    }

    /// One handler method per listener: `rv_static_<i>` for node-level
    /// listeners, `rv_slot_<slot>` for mode-scoped ones.
    fn emit_listeners(&mut self, index: usize, node: &NodePlan<'p>) -> Result<(), CodegenError> {
        for (i, listener) in node.static_listeners.iter().enumerate() {
            self.emit_listener_method(index, &format!("rv_static_{}", i), listener)?;
        }
        for mode in &node.modes {
            for listener in &mode.listeners {
                self.emit_listener_method(index, &format!("rv_slot_{}", listener.slot), listener)?;
            }
        }

        self.out.blank();
        self.out.open("fn rv_wire(&self)");
        if !node.static_listeners.is_empty() {
            self.out.line("let rv_net = self.rv_net();");
        }
        for (i, listener) in node.static_listeners.iter().enumerate() {
            let subscribe = self.subscribe_expr(index, listener, &format!("rv_static_{}", i));
            self.out.line(&format!("{};", subscribe));
        }
        self.out.close();
        Ok(())
    }

    fn emit_listener_method(
        &mut self,
        index: usize,
        method: &str,
        listener: &ListenerPlan<'p>,
    ) -> Result<(), CodegenError> {
        let param = listener.decl.param_name().to_string();
        self.out.blank();
        self.out.open(&format!(
            "fn {}(&self, {}: {})",
            method,
            rust_ident(&param),
            rust_type(&listener.ty)
        ));
        match &listener.decl.handler {
            Handler::Body(body) => {
                let ctx = self.node_ctx(index, vec![(param, listener.ty.clone())], Ty::Unit);
                self.lower_block(&ctx, body)?;
            }
            Handler::Delegate(target) => {
                self.out
                    .line(&format!("self.{}({});", rust_ident(&target.name), rust_ident(&param)));
            }
        }
        self.out.close();
        Ok(())
    }

    /// `rv_net.<source>.<topic>.subscribe(..)` forwarding to `method` on
    /// the listening node. Expects a `rv_net` binding in scope.
    fn subscribe_expr(&self, index: usize, listener: &ListenerPlan<'p>, method: &str) -> String {
        format!(
            "rv_net.{}.{}.subscribe({{ let rv_weak = self.rv_net.clone(); move |rv_value: &{}| {{ if let Some(rv_net) = rv_weak.upgrade() {{ rv_net.{}.{}(rv_value.clone()); }} }} }})",
            self.node_field(listener.source),
            rust_ident(&listener.topic),
            rust_type(&listener.ty),
            self.node_field(index),
            method
        )
    }

    fn emit_modes(&mut self, index: usize, node: &NodePlan<'p>) -> Result<(), CodegenError> {
        for (m, mode) in node.modes.iter().enumerate() {
            self.out.blank();
            self.out.line(&format!(
                "// {} mode {}",
                mode.class.as_str(),
                string_literal(&mode.name)
            ));
            self.out.open(&format!("fn rv_mode_{}(&self)", m));
            let ctx = self.node_ctx(index, Vec::new(), Ty::Unit);
            self.lower_block(&ctx, mode.body)?;
            self.out.close();

            self.out.blank();
            self.out.open(&format!("fn rv_arm_{}(&self)", m));
            if !mode.listeners.is_empty() {
                self.out.line("let rv_net = self.rv_net();");
            }
            for listener in &mode.listeners {
                let subscribe =
                    self.subscribe_expr(index, listener, &format!("rv_slot_{}", listener.slot));
                self.out.line(&format!(
                    "self.rv_slots[{}].set(Some({}));",
                    listener.slot, subscribe
                ));
            }
            self.out.close();
        }

        for class in [ModeClass::System, ModeClass::Local] {
            self.out.blank();
            self.out
                .open(&format!("fn rv_retire_{}(&self)", class.as_str()));
            let listeners: Vec<&ListenerPlan<'p>> = node
                .modes_of_class(class)
                .flat_map(|m| m.listeners.iter())
                .collect();
            if !listeners.is_empty() {
                self.out.line("let rv_net = self.rv_net();");
            }
            for listener in listeners {
                self.out.open(&format!(
                    "if let Some(id) = self.rv_slots[{}].take()",
                    listener.slot
                ));
                self.out.line(&format!(
                    "rv_net.{}.{}.unsubscribe(id);",
                    self.node_field(listener.source),
                    rust_ident(&listener.topic)
                ));
                self.out.close();
            }
            self.out.close();
        }
        Ok(())
    }

    fn emit_mode_changes(&mut self, node: &NodePlan<'p>) {
        let system: Vec<(usize, &str)> = node
            .modes
            .iter()
            .enumerate()
            .filter(|(_, m)| m.class == ModeClass::System)
            .map(|(i, m)| (i, m.name.as_str()))
            .collect();
        let local: Vec<(usize, &str)> = node
            .modes
            .iter()
            .enumerate()
            .filter(|(_, m)| m.class == ModeClass::Local)
            .map(|(i, m)| (i, m.name.as_str()))
            .collect();

        self.out.blank();
        self.out
            .open("pub fn on_system_change(&self, phase: ModePhase, mode: &str)");
        if node.ignores_system {
            self.out.line("let _ = (phase, mode);");
        } else {
            self.out.open("match phase");
            self.out.open("ModePhase::Enter =>");
            self.out.line("self.rv_retire_system();");
            self.out.open("match mode");
            for (i, name) in &system {
                self.out
                    .line(&format!("{} => self.rv_arm_{}(),", string_literal(name), i));
            }
            self.out.line("_ => {}");
            self.out.close();
            self.out.close();
            self.out.line("ModePhase::Run => self.run_system_mode(mode),");
            self.out.close();
        }
        self.out.close();

        self.out.blank();
        self.out.open("pub fn run_system_mode(&self, mode: &str)");
        self.out.open("match mode");
        for (i, name) in &system {
            self.out
                .line(&format!("{} => self.rv_mode_{}(),", string_literal(name), i));
        }
        self.out.line("_ => {}");
        self.out.close();
        self.out.close();

        self.out.blank();
        self.out.open("pub fn set_state(&self, state: &str)");
        self.out
            .line("self.rv_local.request(state, |next| self.on_local_change(next));");
        self.out.close();

        self.out.blank();
        self.out.open("fn on_local_change(&self, state: &str)");
        self.out.line("self.rv_retire_local();");
        self.out.open("match state");
        for (i, name) in &local {
            self.out.open(&format!("{} =>", string_literal(name)));
            self.out.line(&format!("self.rv_arm_{}();", i));
            self.out.line(&format!("self.rv_mode_{}();", i));
            self.out.close();
        }
        self.out.line("_ => {}");
        self.out.close();
        self.out.close();

        self.out.blank();
        self.out.open("pub fn init(&self)");
        if node.ignores_system {
            self.out.line(&format!(
                "self.set_state({});",
                string_literal(INITIAL_SYSTEM_MODE)
            ));
        } else {
            self.out.line(&format!(
                "self.run_system_mode({});",
                string_literal(INITIAL_SYSTEM_MODE)
            ));
        }
        self.out.close();
    }

    pub(super) fn emit_network(&mut self) -> Result<(), CodegenError> {
        let plan = self.plan;

        self.out.open("pub struct Network");
        self.out.line("rv_bus: ModeBus,");
        for node in &plan.nodes {
            self.out.line(&format!(
                "pub {}: {},",
                rust_ident(&node.name),
                struct_name(&node.name)
            ));
        }
        self.out.close();
        self.out.blank();

        self.out.open("impl Network");
        self.out.open("pub fn new() -> Rc<Network>");
        self.out.open("Rc::new_cyclic(|rv_net: &Weak<Network>| Network");
        self.out.line("rv_bus: ModeBus::new(),");
        for node in &plan.nodes {
            self.out.line(&format!(
                "{}: {}::rv_new(rv_net.clone()),",
                rust_ident(&node.name),
                struct_name(&node.name)
            ));
        }
        self.out.close_with("})");
        self.out.close();
        self.out.blank();

        self.out.open("pub fn boot(self: &Rc<Self>)");
        for (index, _) in plan.system_nodes() {
            let field = self.node_field(index);
            self.out.line(&format!(
                "self.rv_bus.listen({{ let rv_weak = Rc::downgrade(self); move |phase, mode| {{ if let Some(rv_net) = rv_weak.upgrade() {{ rv_net.{}.on_system_change(phase, mode); }} }} }});",
                field
            ));
        }
        for index in 0..plan.nodes.len() {
            self.out
                .line(&format!("self.{}.rv_wire();", self.node_field(index)));
        }
        self.out.open("self.rv_bus.boot(||");
        for (index, _) in plan.system_nodes() {
            self.out.line(&format!(
                "self.{}.on_system_change(ModePhase::Enter, {});",
                self.node_field(index),
                string_literal(INITIAL_SYSTEM_MODE)
            ));
        }
        for index in 0..plan.nodes.len() {
            self.out
                .line(&format!("self.{}.init();", self.node_field(index)));
        }
        self.out.close_with("});");
        self.out.close();
        self.out.close();
        self.out.blank();
        Ok(())
    }
}
