//! Structural text dump of a parsed program, used by `rivetc parse`.

use std::fmt::Write as _;

use crate::fmt::expr_to_string;
use crate::parser::{
    Decl, FuncDecl, Handler, InterpPart, OnListenDecl, Program, Signature, Stmt, StmtKind,
};

struct Dumper {
    out: String,
}

impl Dumper {
    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::SystemMode(s) => self.line(1, &format!("SystemMode {}", s.name.name)),
            Decl::Node(n) => {
                let mut flags = String::new();
                if n.is_controller {
                    flags.push_str(" controller");
                }
                if n.ignores_system {
                    flags.push_str(" ignore-system");
                }
                self.line(
                    1,
                    &format!("Node name={} type={}{}", n.name.name, n.type_name.name, flags),
                );
                if let Some(config) = &n.config {
                    self.line(2, &format!("config={}", config));
                }
                for topic in &n.topics {
                    self.line(
                        2,
                        &format!("Topic {} : {} path={}", topic.handle.name, topic.ty.kind, topic.path),
                    );
                }
                for req in &n.requests {
                    self.line(2, &format!("OnRequest {}", signature(&req.sig)));
                    self.handler(3, &req.handler);
                }
                for listener in &n.listeners {
                    self.listener(2, listener);
                }
                for func in &n.private_funcs {
                    self.func(2, func);
                }
            }
            Decl::Mode(m) => {
                let ignore = if m.ignores_system { " ignore-system" } else { "" };
                self.line(1, &format!("Mode {}->{}{}", m.node.name, m.name, ignore));
                if let Some(target) = &m.delegate_to {
                    self.line(2, &format!("do {}", target));
                }
                if !m.body.is_empty() {
                    self.line(2, "body:");
                    self.block(3, &m.body);
                }
                for listener in &m.listeners {
                    self.listener(2, listener);
                }
            }
            Decl::Func(f) => self.func(1, f),
        }
    }

    fn func(&mut self, depth: usize, func: &FuncDecl) {
        self.line(depth, &format!("Func {}", signature(&func.sig)));
        self.block(depth + 1, &func.body);
    }

    fn listener(&mut self, depth: usize, listener: &OnListenDecl) {
        let source = listener
            .source_node
            .as_ref()
            .map(|s| format!("{}.", s.name))
            .unwrap_or_default();
        let param = listener
            .param
            .as_ref()
            .map(|p| format!("({}: {})", p.name.name, p.ty.kind))
            .unwrap_or_default();
        self.line(depth, &format!("OnListen {}{}{}", source, listener.topic.name, param));
        self.handler(depth + 1, &listener.handler);
    }

    fn handler(&mut self, depth: usize, handler: &Handler) {
        match handler {
            Handler::Delegate(target) => self.line(depth, &format!("do {}", target.name)),
            Handler::Body(body) => self.block(depth, body),
        }
    }

    fn block(&mut self, depth: usize, body: &[Stmt]) {
        for stmt in body {
            self.stmt(depth, stmt);
        }
    }

    fn stmt(&mut self, depth: usize, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Call { callee, args } => {
                self.line(depth, &format!("Call {}({})", callee.name, args_text(args)))
            }
            StmtKind::Request {
                node,
                func,
                args,
                silent,
            } => {
                let silent = if *silent { " silent" } else { "" };
                self.line(
                    depth,
                    &format!("Request{} {}.{}({})", silent, node.name, func.name, args_text(args)),
                );
            }
            StmtKind::Publish { topic, value } => self.line(
                depth,
                &format!("Publish {} <- {}", topic.name, expr_to_string(value)),
            ),
            StmtKind::Return(None) => self.line(depth, "Return"),
            StmtKind::Return(Some(value)) => {
                self.line(depth, &format!("Return {}", expr_to_string(value)))
            }
            StmtKind::Transition {
                system,
                target_node,
                state,
            } => {
                let scope = if *system { "system " } else { "" };
                let target = target_node
                    .as_ref()
                    .map(|n| format!("{}->", n.name))
                    .unwrap_or_default();
                self.line(depth, &format!("Transition {}{}{}", scope, target, state));
            }
            StmtKind::Log { level, parts } => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        InterpPart::Text(t) => text.push_str(t),
                        InterpPart::Expr(e) => {
                            let _ = write!(text, "{{{}}}", expr_to_string(e));
                        }
                    }
                }
                self.line(depth, &format!("Log {} \"{}\"", level.keyword(), text));
            }
            StmtKind::If {
                condition,
                then_body,
                elifs,
                else_body,
            } => {
                self.line(depth, &format!("If {}", expr_to_string(condition)));
                self.block(depth + 1, then_body);
                for (cond, body) in elifs {
                    self.line(depth, &format!("Elif {}", expr_to_string(cond)));
                    self.block(depth + 1, body);
                }
                if let Some(body) = else_body {
                    self.line(depth, "Else");
                    self.block(depth + 1, body);
                }
            }
        }
    }
}

fn signature(sig: &Signature) -> String {
    let params: Vec<String> = sig
        .params
        .iter()
        .map(|p| format!("{}: {}", p.name.name, p.ty.kind))
        .collect();
    match &sig.return_type {
        Some(ret) => format!("{}({}) -> {}", sig.name.name, params.join(", "), ret.kind),
        None => format!("{}({})", sig.name.name, params.join(", ")),
    }
}

fn args_text(args: &[crate::parser::Expr]) -> String {
    args.iter().map(expr_to_string).collect::<Vec<_>>().join(", ")
}

/// Indented tree of every declaration, statement and expression.
pub fn dump_program(program: &Program) -> String {
    let mut dumper = Dumper { out: String::new() };
    dumper.line(0, "Program");
    for decl in &program.decls {
        dumper.decl(decl);
    }
    dumper.out
}
