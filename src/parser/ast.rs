//! Abstract Syntax Tree definitions for Rivet.
//!
//! This module defines all AST nodes that represent parsed Rivet programs.
//! The tree is built once by the parser and only read afterwards; later
//! passes keep their results in side tables.

use std::fmt;

use crate::lexer::Span;

/// A complete program: declarations in source order.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub decls: Vec<Decl>,
    pub span: Span,
}

impl Program {
    pub fn nodes(&self) -> impl Iterator<Item = &NodeDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Node(n) => Some(n),
            _ => None,
        })
    }

    pub fn modes(&self) -> impl Iterator<Item = &ModeDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Mode(m) => Some(m),
            _ => None,
        })
    }

    pub fn system_modes(&self) -> impl Iterator<Item = &SystemModeDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::SystemMode(s) => Some(s),
            _ => None,
        })
    }

    pub fn funcs(&self) -> impl Iterator<Item = &FuncDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Func(f) => Some(f),
            _ => None,
        })
    }

    pub fn node(&self, name: &str) -> Option<&NodeDecl> {
        self.nodes().find(|n| n.name.name == name)
    }
}

/// Top-level declarations.
#[derive(Debug, Clone)]
pub enum Decl {
    SystemMode(SystemModeDecl),
    Node(NodeDecl),
    Mode(ModeDecl),
    Func(FuncDecl),
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::SystemMode(d) => d.span,
            Decl::Node(d) => d.span,
            Decl::Mode(d) => d.span,
            Decl::Func(d) => d.span,
        }
    }
}

/// `systemMode Name`
#[derive(Debug, Clone)]
pub struct SystemModeDecl {
    pub name: Ident,
    pub span: Span,
}

/// A node instance with its topics, public and private functions, and
/// static listeners.
#[derive(Debug, Clone)]
pub struct NodeDecl {
    pub name: Ident,
    pub type_name: Ident,
    /// Raw `{...}` configuration text, braces included.
    pub config: Option<String>,
    pub is_controller: bool,
    pub ignores_system: bool,
    pub topics: Vec<TopicDecl>,
    pub requests: Vec<OnRequestDecl>,
    pub listeners: Vec<OnListenDecl>,
    pub private_funcs: Vec<FuncDecl>,
    pub span: Span,
}

/// `topic handle : type [= "path"]`
#[derive(Debug, Clone)]
pub struct TopicDecl {
    pub handle: Ident,
    pub path: String,
    pub ty: Type,
    pub span: Span,
}

/// `name(params) [-> type]`
#[derive(Debug, Clone)]
pub struct Signature {
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Ident,
    pub ty: Type,
    pub span: Span,
}

/// The body of a request or listener: inline statements or a forward to a
/// private function.
#[derive(Debug, Clone)]
pub enum Handler {
    Body(Vec<Stmt>),
    Delegate(Ident),
}

impl Handler {
    pub fn body(&self) -> &[Stmt] {
        match self {
            Handler::Body(stmts) => stmts,
            Handler::Delegate(_) => &[],
        }
    }
}

/// `onRequest sig` with a body, or `onRequest sig do func`.
#[derive(Debug, Clone)]
pub struct OnRequestDecl {
    pub sig: Signature,
    pub handler: Handler,
    pub span: Span,
}

/// `onListen [Node.]topic[(param: type)]` with a body, or `... do func`.
#[derive(Debug, Clone)]
pub struct OnListenDecl {
    /// `None` listens to the declaring node's own topic.
    pub source_node: Option<Ident>,
    pub topic: Ident,
    pub param: Option<Param>,
    pub handler: Handler,
    pub span: Span,
}

impl OnListenDecl {
    /// Name the payload is bound to inside an inline body.
    pub fn param_name(&self) -> &str {
        self.param
            .as_ref()
            .map(|p| p.name.name.as_str())
            .unwrap_or(DEFAULT_PAYLOAD_NAME)
    }
}

/// Payload binding of a listener written without a parameter.
pub const DEFAULT_PAYLOAD_NAME: &str = "value";

/// A mode name: a bare identifier (a system mode reference) or a quoted
/// string (always node-local).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeName {
    pub text: String,
    pub quoted: bool,
    pub span: Span,
}

impl fmt::Display for ModeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write!(f, "\"{}\"", self.text)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

/// `mode Node->Name` with a body, or `mode Node->Name do Target`.
#[derive(Debug, Clone)]
pub struct ModeDecl {
    pub node: Ident,
    pub name: ModeName,
    pub ignores_system: bool,
    pub body: Vec<Stmt>,
    pub listeners: Vec<OnListenDecl>,
    pub delegate_to: Option<ModeName>,
    pub span: Span,
}

/// A free function, or a private function inside a node.
#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub sig: Signature,
    pub body: Vec<Stmt>,
    pub span: Span,
}

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct Type {
    pub kind: TypeKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Int,
    Float,
    String,
    Bool,
    Custom(String),
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Int => write!(f, "int"),
            TypeKind::Float => write!(f, "float"),
            TypeKind::String => write!(f, "string"),
            TypeKind::Bool => write!(f, "bool"),
            TypeKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// `helper(args)`
    Call { callee: Ident, args: Vec<Expr> },
    /// `request [silent] Node.func(args)`
    Request {
        node: Ident,
        func: Ident,
        args: Vec<Expr>,
        silent: bool,
    },
    /// `topic.publish(value)`
    Publish { topic: Ident, value: Expr },
    Return(Option<Expr>),
    /// `transition [system] [Node->]state`
    Transition {
        system: bool,
        target_node: Option<Ident>,
        state: ModeName,
    },
    /// `print "..."` or `log [level] "..."`
    Log { level: LogLevel, parts: Vec<InterpPart> },
    If {
        condition: Expr,
        then_body: Vec<Stmt>,
        elifs: Vec<(Expr, Vec<Stmt>)>,
        else_body: Option<Vec<Stmt>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Plain `print`: the message goes out without a prefix.
    Print,
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn keyword(self) -> &'static str {
        match self {
            LogLevel::Print => "print",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

/// A segment of an interpolated string.
#[derive(Debug, Clone)]
pub enum InterpPart {
    Text(String),
    Expr(Expr),
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Placeholder for an expression the parser could not read.
    pub fn error(span: Span) -> Self {
        Self::new(ExprKind::Error, span)
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    Ident(Ident),
    Call { callee: Ident, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }

    /// Binding strength, loosest first (`or` = 1).
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Eq | BinOp::Ne => 3,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 4,
            BinOp::Add | BinOp::Sub => 5,
            BinOp::Mul | BinOp::Div | BinOp::Rem => 6,
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne)
    }

    pub fn is_ordering(self) -> bool {
        matches!(self, BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

/// Name of the placeholder identifier the parser inserts after an error.
pub const ERROR_IDENT: &str = "<error>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.name == ERROR_IDENT
    }
}
