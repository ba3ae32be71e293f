//! Statement and expression lowering.

use crate::parser::{
    BinOp, Expr, ExprKind, Ident, InterpPart, Literal, LogLevel, ModeName, Stmt, StmtKind,
    UnaryOp,
};
use crate::plan::{BodyScope, Callee};
use crate::types::{Builtin, Ty};

use super::{CodeGenerator, CodegenError};

const RUST_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "if", "impl", "in", "let",
    "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return",
    "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized", "use",
    "virtual", "where", "while", "yield",
];

/// Spell a Rivet name as a Rust identifier.
pub fn rust_ident(name: &str) -> String {
    match name {
        "self" | "Self" | "super" | "crate" => format!("{}_", name),
        _ if RUST_KEYWORDS.contains(&name) => format!("r#{}", name),
        _ => name.to_string(),
    }
}

/// Rust spelling of a value type.
pub(super) fn rust_type(ty: &Ty) -> String {
    match ty {
        Ty::Int => "i64".to_string(),
        Ty::Float => "f64".to_string(),
        Ty::String => "String".to_string(),
        Ty::Bool => "bool".to_string(),
        Ty::Custom(name) => format!("custom::{}", rust_ident(name)),
        Ty::Unit | Ty::Error => "()".to_string(),
    }
}

/// Values that must be cloned out of a binding.
fn needs_clone(ty: &Ty) -> bool {
    matches!(ty, Ty::String | Ty::Custom(_))
}

/// A Rust string literal with the same contents.
pub(super) fn string_literal(text: &str) -> String {
    format!("{:?}", text)
}

/// Context of the body being lowered.
pub(super) struct BodyCtx {
    pub scope: BodyScope,
    /// Label for log lines: the node name, or the free function name.
    pub origin: String,
    pub ret: Ty,
}

impl<'a, 'p> CodeGenerator<'a, 'p> {
    /// Access path of a node inside the network, given a binding to it.
    pub(super) fn node_field(&self, index: usize) -> String {
        rust_ident(&self.plan.node(index).name)
    }

    /// Path to another node from inside a node method.
    fn node_path(&self, ctx: &BodyCtx, name: &str) -> Result<String, CodegenError> {
        let index = self.plan.node_index(name)?;
        if ctx.scope.node == Some(index) {
            Ok("self".to_string())
        } else {
            Ok(format!("self.rv_net().{}", self.node_field(index)))
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub(super) fn lower_block(&mut self, ctx: &BodyCtx, body: &[Stmt]) -> Result<(), CodegenError> {
        for stmt in body {
            self.lower_stmt(ctx, stmt)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, ctx: &BodyCtx, stmt: &Stmt) -> Result<(), CodegenError> {
        match &stmt.kind {
            StmtKind::Call { callee, args } => {
                let call = self.lower_call(ctx, callee, args)?;
                self.out.line(&format!("{};", call));
            }
            StmtKind::Request {
                node,
                func,
                args,
                silent,
            } => {
                let sig = self.plan.request_sig(&node.name, &func.name).ok_or_else(|| {
                    CodegenError::new(format!("no request '{}.{}'", node.name, func.name))
                })?;
                let params: Vec<Ty> = sig.param_types().cloned().collect();
                let args = self.lower_args(ctx, args, &params)?;
                if !silent {
                    self.out.line(&format!(
                        "log_line({}, \"DEBUG\", {});",
                        string_literal(&ctx.origin),
                        string_literal(&format!("request {}.{}", node.name, func.name))
                    ));
                }
                let target = self.node_path(ctx, &node.name)?;
                self.out.line(&format!(
                    "{}.{}({});",
                    target,
                    rust_ident(&func.name),
                    args.join(", ")
                ));
            }
            StmtKind::Publish { topic, value } => {
                let value = self.lower_expr(ctx, value)?;
                self.out
                    .line(&format!("self.{}.publish({});", rust_ident(&topic.name), value));
            }
            StmtKind::Return(None) => self.out.line("return;"),
            StmtKind::Return(Some(value)) => {
                let value = self.lower_expr_as(ctx, value, &ctx.ret)?;
                self.out.line(&format!("return {};", value));
            }
            StmtKind::Transition {
                system,
                target_node,
                state,
            } => self.lower_transition(ctx, *system, target_node.as_ref(), state)?,
            StmtKind::Log { level, parts } => self.lower_log(ctx, *level, parts)?,
            StmtKind::If {
                condition,
                then_body,
                elifs,
                else_body,
            } => {
                let cond = self.lower_expr(ctx, condition)?;
                self.out.open(&format!("if {}", cond));
                self.lower_block(ctx, then_body)?;
                for (cond, body) in elifs {
                    let cond = self.lower_expr(ctx, cond)?;
                    self.out.reopen(&format!("}} else if {} {{", cond));
                    self.lower_block(ctx, body)?;
                }
                if let Some(body) = else_body {
                    self.out.reopen("} else {");
                    self.lower_block(ctx, body)?;
                }
                self.out.close();
            }
        }
        Ok(())
    }

    fn lower_transition(
        &mut self,
        ctx: &BodyCtx,
        system: bool,
        target_node: Option<&Ident>,
        state: &ModeName,
    ) -> Result<(), CodegenError> {
        let state = string_literal(&state.text);
        if system {
            self.out
                .line(&format!("self.rv_net().rv_bus.request({});", state));
            return Ok(());
        }
        let target = match target_node {
            Some(node) => self.node_path(ctx, &node.name)?,
            None => "self".to_string(),
        };
        self.out.line(&format!("{}.set_state({});", target, state));
        Ok(())
    }

    fn lower_log(&mut self, ctx: &BodyCtx, level: LogLevel, parts: &[InterpPart]) -> Result<(), CodegenError> {
        let mut template = String::new();
        let mut args = Vec::new();
        for part in parts {
            match part {
                InterpPart::Text(text) => template.push_str(&text.replace('{', "{{").replace('}', "}}")),
                InterpPart::Expr(expr) => {
                    template.push_str("{}");
                    args.push(self.lower_expr(ctx, expr)?);
                }
            }
        }
        let mut format_args = string_literal(&template);
        for arg in &args {
            format_args.push_str(", ");
            format_args.push_str(arg);
        }

        let origin = string_literal(&ctx.origin);
        let line = match level {
            LogLevel::Print => format!("println!({});", format_args),
            _ if args.is_empty() => {
                let text: String = parts
                    .iter()
                    .filter_map(|p| match p {
                        InterpPart::Text(t) => Some(t.as_str()),
                        InterpPart::Expr(_) => None,
                    })
                    .collect();
                format!(
                    "log_line({}, {}, {});",
                    origin,
                    string_literal(level_name(level)),
                    string_literal(&text)
                )
            }
            _ => format!(
                "log_line({}, {}, &format!({}));",
                origin,
                string_literal(level_name(level)),
                format_args
            ),
        };
        self.out.line(&line);
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn lower_args(&self, ctx: &BodyCtx, args: &[Expr], params: &[Ty]) -> Result<Vec<String>, CodegenError> {
        args.iter()
            .zip(params)
            .map(|(arg, ty)| self.lower_expr_as(ctx, arg, ty))
            .collect()
    }

    fn lower_call(&self, ctx: &BodyCtx, callee: &Ident, args: &[Expr]) -> Result<String, CodegenError> {
        let arg_tys: Vec<Ty> = args.iter().map(|a| self.plan.type_of(&ctx.scope, a)).collect();
        let target = self
            .plan
            .resolve_call(ctx.scope.node, &callee.name)
            .ok_or_else(|| CodegenError::new(format!("unresolved call to '{}'", callee.name)))?;
        let params = target.param_types(&arg_tys);
        let lowered = self.lower_args(ctx, args, &params)?;

        Ok(match target {
            Callee::Builtin(builtin) => match (builtin, lowered.as_slice()) {
                (Builtin::Min, [a, b]) => format!("({}).min({})", a, b),
                (Builtin::Max, [a, b]) => format!("({}).max({})", a, b),
                (Builtin::Clamp, [x, lo, hi]) => format!("({}).max({}).min({})", x, lo, hi),
                _ => {
                    return Err(CodegenError::new(format!(
                        "builtin '{}' called with {} argument(s)",
                        builtin.name(),
                        lowered.len()
                    )))
                }
            },
            Callee::Private(_) => format!("self.{}({})", rust_ident(&callee.name), lowered.join(", ")),
            Callee::Free(_) => format!("funcs::{}({})", rust_ident(&callee.name), lowered.join(", ")),
        })
    }

    /// Lower `expr`, widening an `int` to `f64` where `want` is `float`.
    pub(super) fn lower_expr_as(&self, ctx: &BodyCtx, expr: &Expr, want: &Ty) -> Result<String, CodegenError> {
        let lowered = self.lower_expr(ctx, expr)?;
        if *want == Ty::Float && self.plan.type_of(&ctx.scope, expr) == Ty::Int {
            Ok(format!("({} as f64)", lowered))
        } else {
            Ok(lowered)
        }
    }

    pub(super) fn lower_expr(&self, ctx: &BodyCtx, expr: &Expr) -> Result<String, CodegenError> {
        Ok(match &expr.kind {
            ExprKind::Literal(lit) => match lit {
                Literal::Int(v) if *v < 0 => format!("({}_i64)", v),
                Literal::Int(v) => format!("{}_i64", v),
                Literal::Float(v) if *v < 0.0 => format!("({:?}_f64)", v),
                Literal::Float(v) => format!("{:?}_f64", v),
                Literal::String(s) => format!("String::from({})", string_literal(s)),
                Literal::Bool(b) => b.to_string(),
            },
            ExprKind::Ident(ident) => {
                if let Some(ty) = ctx.scope.param(&ident.name) {
                    let name = rust_ident(&ident.name);
                    if needs_clone(ty) {
                        format!("{}.clone()", name)
                    } else {
                        name
                    }
                } else if ctx.scope.node.is_some() {
                    format!("self.{}.value()", rust_ident(&ident.name))
                } else {
                    return Err(CodegenError::new(format!("unresolved identifier '{}'", ident.name)));
                }
            }
            ExprKind::Call { callee, args } => self.lower_call(ctx, callee, args)?,
            ExprKind::Unary { op, operand } => {
                let inner = self.lower_expr(ctx, operand)?;
                match op {
                    UnaryOp::Not => format!("(!{})", inner),
                    UnaryOp::Neg => format!("(-{})", inner),
                }
            }
            ExprKind::Binary { op, left, right } => {
                let lt = self.plan.type_of(&ctx.scope, left);
                let rt = self.plan.type_of(&ctx.scope, right);
                // Mixed int/float operands meet at f64.
                let want = if lt.is_numeric() && rt.is_numeric() {
                    Ty::promote(&lt, &rt).unwrap_or(Ty::Int)
                } else {
                    lt.clone()
                };
                let l = self.lower_expr_as(ctx, left, &want)?;
                let r = self.lower_expr_as(ctx, right, &want)?;
                let symbol = match op {
                    BinOp::And => "&&",
                    BinOp::Or => "||",
                    other => other.symbol(),
                };
                format!("({} {} {})", l, symbol, r)
            }
            ExprKind::Error => {
                return Err(CodegenError::new(format!(
                    "placeholder expression at line {}",
                    expr.span.line
                )))
            }
        })
    }
}

fn level_name(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Print => "PRINT",
        LogLevel::Error => "ERROR",
        LogLevel::Warn => "WARN",
        LogLevel::Info => "INFO",
        LogLevel::Debug => "DEBUG",
    }
}
