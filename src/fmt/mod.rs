//! Code formatter for Rivet.
//!
//! This module provides a pretty-printer that writes a parsed program back
//! out in canonical form: 4-space indentation, one blank line between
//! declarations, single spaces around operators and parentheses only where
//! precedence needs them. Re-parsing the output yields the same program.
//!
//! Comments are not part of the AST and are not preserved.

use crate::parser::*;

/// A code formatter for Rivet source files.
pub struct Formatter {
    output: String,
    indent: usize,
    indent_size: usize,
}

impl Formatter {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            indent: 0,
            indent_size: 4,
        }
    }

    /// Format a program and return the formatted source.
    pub fn format(&mut self, program: &Program) -> String {
        self.output.clear();
        self.indent = 0;

        let mut previous: Option<&Decl> = None;
        for decl in &program.decls {
            if let Some(prev) = previous {
                // Consecutive `systemMode` lines stay together.
                let grouped = matches!((prev, decl), (Decl::SystemMode(_), Decl::SystemMode(_)));
                if !grouped {
                    self.newline();
                }
            }
            self.format_decl(decl);
            previous = Some(decl);
        }

        self.output.clone()
    }

    fn write(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn newline(&mut self) {
        self.output.push('\n');
    }

    fn write_indent(&mut self) {
        for _ in 0..(self.indent * self.indent_size) {
            self.output.push(' ');
        }
    }

    fn line(&mut self, s: &str) {
        self.write_indent();
        self.write(s);
        self.newline();
    }

    fn format_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::SystemMode(s) => self.line(&format!("systemMode {}", s.name.name)),
            Decl::Node(n) => self.format_node(n),
            Decl::Mode(m) => self.format_mode(m),
            Decl::Func(f) => self.format_func(f),
        }
    }

    fn format_node(&mut self, node: &NodeDecl) {
        let mut header = format!("node {} : {}", node.name.name, node.type_name.name);
        if let Some(config) = &node.config {
            header.push(' ');
            header.push_str(config);
        }
        if node.is_controller {
            header.push_str(" controller");
        }
        if node.ignores_system {
            header.push_str(" ignore system");
        }
        self.line(&header);

        self.indent += 1;
        for topic in &node.topics {
            let mut text = format!("topic {} : {}", topic.handle.name, topic.ty.kind);
            if topic.path != format!("/{}/{}", node.name.name, topic.handle.name) {
                text.push_str(&format!(" = \"{}\"", topic.path));
            }
            self.line(&text);
        }
        for req in &node.requests {
            self.write_indent();
            self.write("onRequest ");
            self.format_signature(&req.sig);
            self.format_handler(&req.handler);
        }
        for listener in &node.listeners {
            self.format_listener(listener);
        }
        for func in &node.private_funcs {
            self.format_func(func);
        }
        self.indent -= 1;
    }

    fn format_mode(&mut self, mode: &ModeDecl) {
        let mut header = format!("mode {}->{}", mode.node.name, mode.name);
        if mode.ignores_system {
            header.push_str(" ignore system");
        }
        if let Some(target) = &mode.delegate_to {
            header.push_str(&format!(" do {}", target));
        }
        self.line(&header);

        self.indent += 1;
        self.format_block(&mode.body);
        for listener in &mode.listeners {
            self.format_listener(listener);
        }
        self.indent -= 1;
    }

    fn format_func(&mut self, func: &FuncDecl) {
        self.write_indent();
        self.write("func ");
        self.format_signature(&func.sig);
        self.newline();
        self.indent += 1;
        self.format_block(&func.body);
        self.indent -= 1;
    }

    fn format_listener(&mut self, listener: &OnListenDecl) {
        self.write_indent();
        self.write("onListen ");
        if let Some(source) = &listener.source_node {
            self.write(&source.name);
            self.write(".");
        }
        self.write(&listener.topic.name);
        if let Some(param) = &listener.param {
            self.write(&format!("({}: {})", param.name.name, param.ty.kind));
        }
        self.format_handler(&listener.handler);
    }

    /// Finish a header line with ` do target` or an indented body.
    fn format_handler(&mut self, handler: &Handler) {
        match handler {
            Handler::Delegate(target) => {
                self.write(" do ");
                self.write(&target.name);
                self.newline();
            }
            Handler::Body(body) => {
                self.newline();
                self.indent += 1;
                self.format_block(body);
                self.indent -= 1;
            }
        }
    }

    fn format_signature(&mut self, sig: &Signature) {
        self.write(&sig.name.name);
        self.write("(");
        for (i, param) in sig.params.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write(&param.name.name);
            self.write(": ");
            self.write(&param.ty.kind.to_string());
        }
        self.write(")");
        if let Some(ret) = &sig.return_type {
            self.write(" -> ");
            self.write(&ret.kind.to_string());
        }
    }

    fn format_block(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.format_stmt(stmt);
        }
    }

    fn format_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Call { callee, args } => {
                let text = format!("{}({})", callee.name, args_to_string(args));
                self.line(&text);
            }
            StmtKind::Request {
                node,
                func,
                args,
                silent,
            } => {
                let silent = if *silent { "silent " } else { "" };
                let text = format!(
                    "request {}{}.{}({})",
                    silent,
                    node.name,
                    func.name,
                    args_to_string(args)
                );
                self.line(&text);
            }
            StmtKind::Publish { topic, value } => {
                let text = format!("{}.publish({})", topic.name, expr_to_string(value));
                self.line(&text);
            }
            StmtKind::Return(None) => self.line("return"),
            StmtKind::Return(Some(value)) => {
                let text = format!("return {}", expr_to_string(value));
                self.line(&text);
            }
            StmtKind::Transition {
                system,
                target_node,
                state,
            } => {
                let mut text = String::from("transition ");
                if *system {
                    text.push_str("system ");
                }
                if let Some(node) = target_node {
                    text.push_str(&node.name);
                    text.push_str("->");
                }
                text.push_str(&state.to_string());
                self.line(&text);
            }
            StmtKind::Log { level, parts } => {
                let keyword = match level {
                    LogLevel::Print => "print".to_string(),
                    other => format!("log {}", other.keyword()),
                };
                let text = format!("{} \"{}\"", keyword, interpolation_to_string(parts));
                self.line(&text);
            }
            StmtKind::If {
                condition,
                then_body,
                elifs,
                else_body,
            } => {
                self.line(&format!("if {}", expr_to_string(condition)));
                self.indent += 1;
                self.format_block(then_body);
                self.indent -= 1;
                for (cond, body) in elifs {
                    self.line(&format!("elif {}", expr_to_string(cond)));
                    self.indent += 1;
                    self.format_block(body);
                    self.indent -= 1;
                }
                if let Some(body) = else_body {
                    self.line("else");
                    self.indent += 1;
                    self.format_block(body);
                    self.indent -= 1;
                }
            }
        }
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Source text of an expression with minimal parentheses.
pub fn expr_to_string(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

fn args_to_string(args: &[Expr]) -> String {
    args.iter().map(expr_to_string).collect::<Vec<_>>().join(", ")
}

/// Body of a log string: literal braces doubled, expressions in `{}`.
fn interpolation_to_string(parts: &[InterpPart]) -> String {
    let mut out = String::new();
    for part in parts {
        match part {
            InterpPart::Text(text) => out.push_str(&text.replace('{', "{{").replace('}', "}}")),
            InterpPart::Expr(expr) => {
                out.push('{');
                write_expr(&mut out, expr);
                out.push('}');
            }
        }
    }
    out
}

fn write_expr(out: &mut String, expr: &Expr) {
    match &expr.kind {
        ExprKind::Literal(lit) => out.push_str(&literal_to_string(lit)),
        ExprKind::Ident(ident) => out.push_str(&ident.name),
        ExprKind::Call { callee, args } => {
            out.push_str(&callee.name);
            out.push('(');
            out.push_str(&args_to_string(args));
            out.push(')');
        }
        ExprKind::Unary { op, operand } => {
            out.push_str(match op {
                UnaryOp::Not => "not ",
                UnaryOp::Neg => "-",
            });
            let wrap = matches!(operand.kind, ExprKind::Binary { .. })
                || (*op == UnaryOp::Neg && is_negative_literal(operand));
            write_wrapped(out, operand, wrap);
        }
        ExprKind::Binary { op, left, right } => {
            let prec = op.precedence();
            write_wrapped(out, left, binary_precedence(left).is_some_and(|p| p < prec));
            out.push(' ');
            out.push_str(op.symbol());
            out.push(' ');
            // Left-associative: an equal-precedence right operand needs parens.
            write_wrapped(out, right, binary_precedence(right).is_some_and(|p| p <= prec));
        }
        ExprKind::Error => out.push_str(ERROR_IDENT),
    }
}

fn write_wrapped(out: &mut String, expr: &Expr, wrap: bool) {
    if wrap {
        out.push('(');
        write_expr(out, expr);
        out.push(')');
    } else {
        write_expr(out, expr);
    }
}

fn binary_precedence(expr: &Expr) -> Option<u8> {
    match &expr.kind {
        ExprKind::Binary { op, .. } => Some(op.precedence()),
        _ => None,
    }
}

fn is_negative_literal(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Literal(Literal::Int(v)) if v < 0
    ) || matches!(expr.kind, ExprKind::Literal(Literal::Float(v)) if v < 0.0)
}

fn literal_to_string(lit: &Literal) -> String {
    match lit {
        Literal::Int(v) => v.to_string(),
        Literal::Float(v) => {
            let text = v.to_string();
            if text.contains('.') {
                text
            } else {
                format!("{}.0", text)
            }
        }
        Literal::String(s) => format!("\"{}\"", s),
        Literal::Bool(b) => b.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Diagnostics;

    fn format_str(src: &str) -> String {
        let mut diags = Diagnostics::new();
        let program = parse_source(src, &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.into_vec());
        Formatter::new().format(&program)
    }

    #[test]
    fn test_normalizes_spacing() {
        let out = format_str("node   A:W controller\n  topic x:int\n  onRequest f(a:int)\n    x.publish(a+1)\n");
        assert_eq!(
            out,
            "node A : W controller\n    topic x : int\n    onRequest f(a: int)\n        x.publish(a + 1)\n"
        );
    }

    #[test]
    fn test_parentheses_follow_precedence() {
        let out = format_str("func f(a: int, b: int) -> int\n    return (a + b) * (a - (b - 1))\n");
        assert!(out.contains("return (a + b) * (a - (b - 1))"), "{}", out);
        let out = format_str("func g(a: int, b: int) -> int\n    return ((a * b)) + 1\n");
        assert!(out.contains("return a * b + 1"), "{}", out);
    }

    #[test]
    fn test_system_modes_grouped() {
        let out = format_str("systemMode A\nsystemMode B\nnode N : T\n");
        assert_eq!(out, "systemMode A\nsystemMode B\n\nnode N : T\n");
    }

    #[test]
    fn test_interpolation_and_braces() {
        let out = format_str("node A : W\n    topic x : int\n    onListen x\n        log warn \"{{raw}} {value * 2}\"\n");
        assert!(out.contains("log warn \"{{raw}} {value * 2}\""), "{}", out);
    }

    #[test]
    fn test_custom_path_kept_default_dropped() {
        let out = format_str("node A : W\n    topic x : int = \"/A/x\"\n    topic y : float = \"/bus/y\"\n");
        assert!(out.contains("topic x : int\n"));
        assert!(out.contains("topic y : float = \"/bus/y\"\n"));
    }

    #[test]
    fn test_float_literals_keep_a_point() {
        assert_eq!(literal_to_string(&Literal::Float(3.0)), "3.0");
        assert_eq!(literal_to_string(&Literal::Float(0.25)), "0.25");
    }
}
