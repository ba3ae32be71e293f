//! Token definitions for the Rivet lexer.
//!
//! This module defines all tokens that can appear in Rivet source code,
//! including keywords, operators, literals, and layout tokens.

use std::fmt;

/// A token with its location in the source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub lexeme: String,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, lexeme: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            lexeme: lexeme.into(),
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

/// Source location information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: self.line.min(other.line),
            column: if self.line <= other.line {
                self.column
            } else {
                other.column
            },
        }
    }

    /// Shift a span produced by a sub-scanner over `base`'s text.
    pub fn offset_by(self, base: Span, byte_offset: usize) -> Span {
        Span {
            start: self.start + byte_offset,
            end: self.end + byte_offset,
            line: base.line + self.line - 1,
            column: if self.line == 1 {
                base.column + self.column - 1
            } else {
                self.column
            },
        }
    }
}

/// All token types in the Rivet language.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Declarations
    Node,
    Mode,
    SystemMode,
    Func,
    Topic,
    OnRequest,
    OnListen,
    Controller,
    Ignore,
    System,
    Do,

    // Statements
    Request,
    Silent,
    Return,
    Publish,
    Transition,
    If,
    Elif,
    Else,
    Log,
    Print,

    // Log levels
    Error,
    Warn,
    Info,
    Debug,

    // Builtin type names
    IntType,
    FloatType,
    StringType,
    BoolType,

    // Word operators and literals
    And,
    Or,
    Not,
    True,
    False,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    BangEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    Arrow,

    // Delimiters
    LParen,
    RParen,
    Comma,
    Dot,
    Colon,

    // Literals
    Int(i64),
    Float(f64),
    Str(String),
    /// Raw `{...}` node configuration, braces included.
    Config(String),

    Ident(String),

    // Layout
    Newline,
    Indent,
    Dedent,
    Eof,

    /// Lexically invalid input; the payload is the message.
    Invalid(String),
}

impl TokenKind {
    /// Look up a keyword.
    pub fn keyword(s: &str) -> Option<TokenKind> {
        let kind = match s {
            "node" => TokenKind::Node,
            "mode" => TokenKind::Mode,
            "systemMode" => TokenKind::SystemMode,
            "func" => TokenKind::Func,
            "topic" => TokenKind::Topic,
            "onRequest" => TokenKind::OnRequest,
            "onListen" => TokenKind::OnListen,
            "controller" => TokenKind::Controller,
            "ignore" => TokenKind::Ignore,
            "system" => TokenKind::System,
            "do" => TokenKind::Do,
            "request" => TokenKind::Request,
            "silent" => TokenKind::Silent,
            "return" => TokenKind::Return,
            "publish" => TokenKind::Publish,
            "transition" => TokenKind::Transition,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "log" => TokenKind::Log,
            "print" => TokenKind::Print,
            "error" => TokenKind::Error,
            "warn" => TokenKind::Warn,
            "info" => TokenKind::Info,
            "debug" => TokenKind::Debug,
            "int" => TokenKind::IntType,
            "float" => TokenKind::FloatType,
            "string" => TokenKind::StringType,
            "bool" => TokenKind::BoolType,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => return None,
        };
        Some(kind)
    }

    /// Keywords that open a top-level declaration.
    pub fn is_decl_start(&self) -> bool {
        matches!(
            self,
            TokenKind::Node | TokenKind::Mode | TokenKind::SystemMode | TokenKind::Func
        )
    }

    /// Whether a token of this kind can end an operand. A `-` directly
    /// after such a token is a binary minus, never the sign of a literal.
    pub fn ends_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Ident(_)
                | TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::RParen
        )
    }

    /// Whether this is one of the layout tokens synthesized from whitespace.
    pub fn is_layout(&self) -> bool {
        matches!(
            self,
            TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent | TokenKind::Eof
        )
    }

    /// Short name used by `rivetc lex`.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Int(_) => "INT",
            TokenKind::Float(_) => "FLOAT",
            TokenKind::Str(_) => "STRING",
            TokenKind::Config(_) => "CONFIG",
            TokenKind::Ident(_) => "IDENT",
            TokenKind::Newline => "NEWLINE",
            TokenKind::Indent => "INDENT",
            TokenKind::Dedent => "DEDENT",
            TokenKind::Eof => "EOF",
            TokenKind::Invalid(_) => "INVALID",
            k if TokenKind::keyword(&k.to_string()).is_some() => "KEYWORD",
            _ => "PUNCT",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Node => write!(f, "node"),
            TokenKind::Mode => write!(f, "mode"),
            TokenKind::SystemMode => write!(f, "systemMode"),
            TokenKind::Func => write!(f, "func"),
            TokenKind::Topic => write!(f, "topic"),
            TokenKind::OnRequest => write!(f, "onRequest"),
            TokenKind::OnListen => write!(f, "onListen"),
            TokenKind::Controller => write!(f, "controller"),
            TokenKind::Ignore => write!(f, "ignore"),
            TokenKind::System => write!(f, "system"),
            TokenKind::Do => write!(f, "do"),
            TokenKind::Request => write!(f, "request"),
            TokenKind::Silent => write!(f, "silent"),
            TokenKind::Return => write!(f, "return"),
            TokenKind::Publish => write!(f, "publish"),
            TokenKind::Transition => write!(f, "transition"),
            TokenKind::If => write!(f, "if"),
            TokenKind::Elif => write!(f, "elif"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::Log => write!(f, "log"),
            TokenKind::Print => write!(f, "print"),
            TokenKind::Error => write!(f, "error"),
            TokenKind::Warn => write!(f, "warn"),
            TokenKind::Info => write!(f, "info"),
            TokenKind::Debug => write!(f, "debug"),
            TokenKind::IntType => write!(f, "int"),
            TokenKind::FloatType => write!(f, "float"),
            TokenKind::StringType => write!(f, "string"),
            TokenKind::BoolType => write!(f, "bool"),
            TokenKind::And => write!(f, "and"),
            TokenKind::Or => write!(f, "or"),
            TokenKind::Not => write!(f, "not"),
            TokenKind::True => write!(f, "true"),
            TokenKind::False => write!(f, "false"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::BangEq => write!(f, "!="),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::LtEq => write!(f, "<="),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::GtEq => write!(f, ">="),
            TokenKind::Eq => write!(f, "="),
            TokenKind::Arrow => write!(f, "->"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Int(n) => write!(f, "{}", n),
            TokenKind::Float(n) => write!(f, "{}", n),
            TokenKind::Str(s) => write!(f, "\"{}\"", s),
            TokenKind::Config(s) => write!(f, "{}", s),
            TokenKind::Ident(s) => write!(f, "{}", s),
            TokenKind::Newline => write!(f, "end of line"),
            TokenKind::Indent => write!(f, "indent"),
            TokenKind::Dedent => write!(f, "dedent"),
            TokenKind::Eof => write!(f, "end of file"),
            TokenKind::Invalid(msg) => write!(f, "invalid token ({})", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_table_round_trips() {
        for word in [
            "node", "mode", "do", "systemMode", "request", "onRequest", "silent", "return",
            "func", "publish", "onListen", "topic", "transition", "system", "controller",
            "ignore", "log", "print", "error", "warn", "info", "debug", "int", "float",
            "string", "bool", "if", "elif", "else", "and", "or", "not", "true", "false",
        ] {
            let kind = TokenKind::keyword(word).expect(word);
            assert_eq!(kind.to_string(), word);
        }
        assert_eq!(TokenKind::keyword("Node"), None);
        assert_eq!(TokenKind::keyword("value"), None);
    }

    #[test]
    fn test_offset_by_first_line() {
        let base = Span::new(20, 30, 4, 9);
        let inner = Span::new(2, 5, 1, 3);
        assert_eq!(inner.offset_by(base, 21), Span::new(23, 26, 4, 11));
    }
}
