//! Recursive descent parser for Rivet.
//!
//! This module implements a hand-written recursive descent parser that
//! handles Rivet's indentation-significant syntax. Parsing never fails as a
//! whole: every syntax error is recorded in the shared [`Diagnostics`] and
//! the parser resynchronizes, so one run reports as many independent
//! errors as it can and always returns a [`Program`].

use tracing::debug;

use crate::errors::{Diagnostic, Diagnostics, ParseError, LEX_CODE};
use crate::lexer::{Scanner, Span, Token, TokenKind};
use crate::parser::ast::*;

type PResult<T> = std::result::Result<T, ParseError>;

/// The parser for Rivet source code.
pub struct Parser<'d> {
    tokens: Vec<Token>,
    pos: usize,
    diags: &'d mut Diagnostics,
}

impl<'d> Parser<'d> {
    /// Create a parser over a token stream ending in `Eof`. Invalid tokens
    /// are reported here, once, and dropped from the stream.
    pub fn new(tokens: &[Token], diags: &'d mut Diagnostics) -> Self {
        let mut kept = Vec::with_capacity(tokens.len());
        for token in tokens {
            match &token.kind {
                TokenKind::Invalid(message) => {
                    diags.push(Diagnostic::error(message.clone(), token.span).with_code(LEX_CODE));
                }
                _ => kept.push(token.clone()),
            }
        }
        if !matches!(kept.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            let span = kept.last().map(|t| t.span).unwrap_or_default();
            kept.push(Token::new(TokenKind::Eof, Span::new(span.end, span.end, span.line, span.column), ""));
        }

        Self {
            tokens: kept,
            pos: 0,
            diags,
        }
    }

    /// Parse a complete program.
    /// Uses error recovery to continue parsing after errors and report multiple issues.
    pub fn parse_program(mut self) -> Program {
        let start = self.current_span();
        let mut decls = Vec::new();

        while !self.at_end() {
            match self.current_kind() {
                TokenKind::Newline | TokenKind::Dedent => {
                    self.advance();
                }
                TokenKind::Indent => {
                    let err = self.error("unexpected indentation at top level");
                    self.report(err);
                    self.skip_block();
                }
                _ => match self.parse_decl() {
                    Ok(decl) => decls.push(decl),
                    Err(e) => {
                        self.report(e);
                        self.synchronize();
                    }
                },
            }
        }

        let end = self.previous_span();
        debug!(decls = decls.len(), "parsed program");
        Program {
            decls,
            span: start.merge(end),
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn parse_decl(&mut self) -> PResult<Decl> {
        match self.current_kind() {
            TokenKind::SystemMode => self.parse_system_mode().map(Decl::SystemMode),
            TokenKind::Node => self.parse_node().map(Decl::Node),
            TokenKind::Mode => self.parse_mode().map(Decl::Mode),
            TokenKind::Func => self.parse_func().map(Decl::Func),
            _ => Err(self.error_expected("a declaration (systemMode, node, mode, func)")),
        }
    }

    fn parse_system_mode(&mut self) -> PResult<SystemModeDecl> {
        let start = self.advance().span;
        let name = self.expect_ident("system mode name")?;
        self.expect_line_end()?;
        Ok(SystemModeDecl {
            span: start.merge(name.span),
            name,
        })
    }

    fn parse_node(&mut self) -> PResult<NodeDecl> {
        let start = self.advance().span;
        let name = self.expect_ident("node name")?;
        self.expect(TokenKind::Colon, "':' after the node name")?;
        let type_name = self.parse_type_name()?;

        let config = match self.current_kind() {
            TokenKind::Config(text) => {
                let text = text.clone();
                self.advance();
                Some(text)
            }
            _ => None,
        };

        let mut is_controller = false;
        let mut ignores_system = false;
        loop {
            match self.current_kind() {
                TokenKind::Controller => {
                    self.advance();
                    is_controller = true;
                }
                TokenKind::Ignore => {
                    self.advance();
                    self.expect(TokenKind::System, "'system' after 'ignore'")?;
                    ignores_system = true;
                }
                _ => break,
            }
        }
        let header_end = self.previous_span();
        self.expect_line_end()?;

        let mut node = NodeDecl {
            name,
            type_name,
            config,
            is_controller,
            ignores_system,
            topics: Vec::new(),
            requests: Vec::new(),
            listeners: Vec::new(),
            private_funcs: Vec::new(),
            span: start.merge(header_end),
        };

        if self.check(&TokenKind::Indent) {
            self.parse_node_body(&mut node);
        }

        Ok(node)
    }

    fn parse_node_body(&mut self, node: &mut NodeDecl) {
        self.advance(); // Indent

        loop {
            self.skip_newlines();
            if self.match_token(&TokenKind::Dedent) || self.at_end() || self.at_decl_boundary() {
                break;
            }

            let result = match self.current_kind() {
                TokenKind::Topic => self
                    .parse_topic(&node.name.name)
                    .map(|t| node.topics.push(t)),
                TokenKind::OnRequest => self.parse_on_request().map(|r| node.requests.push(r)),
                TokenKind::OnListen => self.parse_on_listen().map(|l| node.listeners.push(l)),
                TokenKind::Func => self.parse_func().map(|f| node.private_funcs.push(f)),
                TokenKind::Indent => Err(self.error("unexpected indentation")),
                _ => Err(self.error_expected("a node entry (topic, onRequest, onListen, func)")),
            };

            if let Err(e) = result {
                self.report(e);
                self.recover_line();
            }
        }
    }

    fn parse_topic(&mut self, node_name: &str) -> PResult<TopicDecl> {
        let start = self.advance().span;
        let handle = self.expect_ident("topic name")?;
        self.expect(TokenKind::Colon, "':' after the topic name")?;
        let ty = self.parse_type()?;

        let path = if self.match_token(&TokenKind::Eq) {
            match self.current_kind() {
                TokenKind::Str(s) => {
                    let s = s.clone();
                    self.advance();
                    s
                }
                _ => return Err(self.error_expected("a quoted topic path")),
            }
        } else {
            format!("/{}/{}", node_name, handle.name)
        };

        let end = self.previous_span();
        self.expect_line_end()?;
        Ok(TopicDecl {
            handle,
            path,
            ty,
            span: start.merge(end),
        })
    }

    fn parse_on_request(&mut self) -> PResult<OnRequestDecl> {
        let start = self.advance().span;
        let sig = self.parse_signature()?;
        let handler = self.parse_handler()?;
        Ok(OnRequestDecl {
            span: start.merge(sig.span),
            sig,
            handler,
        })
    }

    fn parse_on_listen(&mut self) -> PResult<OnListenDecl> {
        let start = self.advance().span;
        let first = self.expect_ident("topic name")?;
        let (source_node, topic) = if self.match_token(&TokenKind::Dot) {
            let topic = self.expect_ident("topic name after '.'")?;
            (Some(first), topic)
        } else {
            (None, first)
        };

        let param = if self.match_token(&TokenKind::LParen) {
            let param = self.parse_param()?;
            self.expect(TokenKind::RParen, "')' after the listener parameter")?;
            Some(param)
        } else {
            None
        };

        let header_end = self.previous_span();
        let handler = self.parse_handler()?;
        Ok(OnListenDecl {
            source_node,
            topic,
            param,
            handler,
            span: start.merge(header_end),
        })
    }

    fn parse_mode(&mut self) -> PResult<ModeDecl> {
        let start = self.advance().span;
        let node = self.expect_ident("node name")?;
        self.expect(TokenKind::Arrow, "'->' after the node name")?;
        let name = self.parse_mode_name()?;

        let ignores_system = if self.match_token(&TokenKind::Ignore) {
            self.expect(TokenKind::System, "'system' after 'ignore'")?;
            true
        } else {
            false
        };

        let mut mode = ModeDecl {
            span: start.merge(name.span),
            node,
            name,
            ignores_system,
            body: Vec::new(),
            listeners: Vec::new(),
            delegate_to: None,
        };

        if self.match_token(&TokenKind::Do) {
            let target = self.parse_mode_name()?;
            mode.delegate_to = Some(target);
            self.expect_line_end()?;
            if self.check(&TokenKind::Indent) {
                let err = self
                    .error("a mode that delegates with 'do' cannot also have a body")
                    .with_help("remove the 'do' clause or the indented block");
                self.report(err);
                self.skip_block();
            }
            return Ok(mode);
        }

        self.expect_line_end()?;
        if self.check(&TokenKind::Indent) {
            let (body, listeners) = self.parse_stmt_block(true);
            mode.body = body;
            mode.listeners = listeners;
        }
        Ok(mode)
    }

    fn parse_func(&mut self) -> PResult<FuncDecl> {
        let start = self.advance().span;
        let sig = self.parse_signature()?;
        self.expect_line_end()?;
        let body = if self.check(&TokenKind::Indent) {
            self.parse_stmt_block(false).0
        } else {
            Vec::new()
        };
        Ok(FuncDecl {
            span: start.merge(sig.span),
            sig,
            body,
        })
    }

    /// `do func` or an end of line followed by an optional indented body.
    fn parse_handler(&mut self) -> PResult<Handler> {
        if self.match_token(&TokenKind::Do) {
            let target = self.expect_ident("function name after 'do'")?;
            self.expect_line_end()?;
            if self.check(&TokenKind::Indent) {
                let err = self
                    .error("a handler that delegates with 'do' cannot also have a body")
                    .with_help("remove the 'do' clause or the indented block");
                self.report(err);
                self.skip_block();
            }
            return Ok(Handler::Delegate(target));
        }

        self.expect_line_end()?;
        if self.check(&TokenKind::Indent) {
            Ok(Handler::Body(self.parse_stmt_block(false).0))
        } else {
            Ok(Handler::Body(Vec::new()))
        }
    }

    fn parse_signature(&mut self) -> PResult<Signature> {
        let name = self.expect_ident("function name")?;
        self.expect(TokenKind::LParen, "'(' after the function name")?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.parse_param()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')' after the parameters")?;

        let return_type = if self.match_token(&TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let end = self.previous_span();
        Ok(Signature {
            span: name.span.merge(end),
            name,
            params,
            return_type,
        })
    }

    fn parse_param(&mut self) -> PResult<Param> {
        let name = self.expect_ident("parameter name")?;
        self.expect(TokenKind::Colon, "':' after the parameter name")?;
        let ty = self.parse_type()?;
        Ok(Param {
            span: name.span.merge(ty.span),
            name,
            ty,
        })
    }

    fn parse_type(&mut self) -> PResult<Type> {
        let span = self.current_span();
        let kind = match self.current_kind() {
            TokenKind::IntType => TypeKind::Int,
            TokenKind::FloatType => TypeKind::Float,
            TokenKind::StringType => TypeKind::String,
            TokenKind::BoolType => TypeKind::Bool,
            TokenKind::Ident(name) => TypeKind::Custom(name.clone()),
            _ => return Err(self.error_expected("a type (int, float, string, bool or a type name)")),
        };
        self.advance();
        Ok(Type { kind, span })
    }

    /// The type after `node Name :` is a free-form component type name.
    fn parse_type_name(&mut self) -> PResult<Ident> {
        let ty = self.parse_type()?;
        Ok(Ident::new(ty.kind.to_string(), ty.span))
    }

    fn parse_mode_name(&mut self) -> PResult<ModeName> {
        let span = self.current_span();
        let (text, quoted) = match self.current_kind() {
            TokenKind::Ident(name) => (name.clone(), false),
            TokenKind::Str(s) => (s.clone(), true),
            _ => return Err(self.error_expected("a mode name (identifier or quoted string)")),
        };
        self.advance();
        Ok(ModeName { text, quoted, span })
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Parse an indented block of statements. Mode bodies may interleave
    /// `onListen` entries; elsewhere they are an error.
    fn parse_stmt_block(&mut self, allow_listeners: bool) -> (Vec<Stmt>, Vec<OnListenDecl>) {
        self.advance(); // Indent
        let mut stmts = Vec::new();
        let mut listeners = Vec::new();

        loop {
            self.skip_newlines();
            if self.match_token(&TokenKind::Dedent) || self.at_end() || self.at_decl_boundary() {
                break;
            }

            let result = if self.check(&TokenKind::OnListen) {
                if allow_listeners {
                    self.parse_on_listen().map(|l| listeners.push(l))
                } else {
                    Err(self.error("'onListen' is only allowed in node and mode blocks"))
                }
            } else {
                self.parse_stmt().map(|s| stmts.push(s))
            };

            if let Err(e) = result {
                self.report(e);
                self.recover_line();
            }
        }

        (stmts, listeners)
    }

    /// An indented block that must follow `if`, `elif` or `else`.
    fn parse_required_block(&mut self, after: &str) -> Vec<Stmt> {
        if self.check(&TokenKind::Indent) {
            self.parse_stmt_block(false).0
        } else {
            let err = self.error(format!("expected an indented block after '{}'", after));
            self.report(err);
            Vec::new()
        }
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        match self.current_kind() {
            TokenKind::If => self.parse_if(),
            TokenKind::Print | TokenKind::Log => self.parse_log(),
            TokenKind::Request => self.parse_request(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Transition => self.parse_transition(),
            TokenKind::Ident(_) => self.parse_ident_stmt(),
            TokenKind::Elif | TokenKind::Else => {
                Err(self.error(format!("'{}' without a matching 'if'", self.current_kind())))
            }
            TokenKind::Indent => Err(self.error("unexpected indentation")),
            _ => Err(self.error_expected("a statement")),
        }
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let start = self.advance().span;
        let condition = self.parse_expr()?;
        self.expect_line_end()?;
        let then_body = self.parse_required_block("if");

        let mut elifs = Vec::new();
        while self.check(&TokenKind::Elif) {
            self.advance();
            let cond = self.parse_expr()?;
            self.expect_line_end()?;
            let body = self.parse_required_block("elif");
            elifs.push((cond, body));
        }

        let else_body = if self.match_token(&TokenKind::Else) {
            self.expect_line_end()?;
            Some(self.parse_required_block("else"))
        } else {
            None
        };

        Ok(Stmt {
            span: start.merge(condition.span),
            kind: StmtKind::If {
                condition,
                then_body,
                elifs,
                else_body,
            },
        })
    }

    fn parse_log(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        let level = if self.match_token(&TokenKind::Print) {
            LogLevel::Print
        } else {
            self.advance(); // log
            let level = match self.current_kind() {
                TokenKind::Error => Some(LogLevel::Error),
                TokenKind::Warn => Some(LogLevel::Warn),
                TokenKind::Info => Some(LogLevel::Info),
                TokenKind::Debug => Some(LogLevel::Debug),
                _ => None,
            };
            match level {
                Some(level) => {
                    self.advance();
                    level
                }
                None => LogLevel::Info,
            }
        };

        let (text, text_span) = match self.current_kind() {
            TokenKind::Str(s) => {
                let s = s.clone();
                let span = self.advance().span;
                (s, span)
            }
            _ => return Err(self.error_expected("a quoted message")),
        };

        if self.check(&TokenKind::Comma) {
            return Err(self
                .error("comma-separated log arguments are a legacy form and no longer accepted")
                .with_help("interpolate values inside the string, e.g. \"value = {x}\""));
        }

        let parts = self.parse_interpolation(&text, text_span);
        self.expect_line_end()?;
        Ok(Stmt {
            kind: StmtKind::Log { level, parts },
            span: start.merge(text_span),
        })
    }

    /// Split a message into literal text and `{expr}` segments. `{{` and
    /// `}}` stand for literal braces.
    fn parse_interpolation(&mut self, text: &str, span: Span) -> Vec<InterpPart> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = text.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            let next = chars.peek().map(|(_, c)| *c);
            match c {
                '{' if next == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if next == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let Some(close) = text[i + 1..].find('}').map(|p| p + i + 1) else {
                        let err = ParseError::new("unclosed '{' in interpolated string", span)
                            .with_help("write '{{' for a literal brace");
                        self.report(err);
                        literal.push_str(&text[i..]);
                        break;
                    };
                    if !literal.is_empty() {
                        parts.push(InterpPart::Text(std::mem::take(&mut literal)));
                    }
                    let fragment = &text[i + 1..close];
                    parts.push(InterpPart::Expr(self.parse_fragment(text, i + 1, fragment, span)));
                    while chars.peek().is_some_and(|(j, _)| *j <= close) {
                        chars.next();
                    }
                }
                '}' => {
                    let err = ParseError::new("unmatched '}' in interpolated string", span)
                        .with_help("write '}}' for a literal brace");
                    self.report(err);
                    literal.push('}');
                }
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            parts.push(InterpPart::Text(literal));
        }
        parts
    }

    /// Parse the expression inside `{...}`, with spans mapped back into the
    /// enclosing string literal.
    fn parse_fragment(&mut self, text: &str, byte_offset: usize, fragment: &str, span: Span) -> Expr {
        // +1 for the opening quote
        let base = Span::new(
            span.start,
            span.end,
            span.line,
            span.column + 1 + text[..byte_offset].chars().count(),
        );
        let file_offset = span.start + 1 + byte_offset;

        if fragment.trim().is_empty() {
            let err = ParseError::new("empty interpolation '{}'", span);
            self.report(err);
            return Expr::error(span);
        }

        let mut tokens = Scanner::inline(fragment).scan_all();
        for token in &mut tokens {
            token.span = token.span.offset_by(base, file_offset);
        }

        let mut sub = Parser::new(&tokens, &mut *self.diags);
        match sub.parse_expr() {
            Ok(expr) => {
                if !sub.at_end() {
                    let err = sub.error_expected("'}' to close the interpolation");
                    sub.report(err);
                }
                expr
            }
            Err(e) => {
                sub.report(e);
                Expr::error(span)
            }
        }
    }

    fn parse_request(&mut self) -> PResult<Stmt> {
        let start = self.advance().span;
        let silent = self.match_token(&TokenKind::Silent);

        let node = match self.expect_ident("target node name") {
            Ok(node) => node,
            Err(e) => {
                let span = e.span;
                self.report(e);
                Ident::new(ERROR_IDENT, span)
            }
        };
        self.expect(TokenKind::Dot, "'.' between node and function")?;
        let func = self.expect_ident("function name")?;
        let args = self.parse_call_args()?;
        let end = self.previous_span();
        self.expect_line_end()?;

        Ok(Stmt {
            kind: StmtKind::Request {
                node,
                func,
                args,
                silent,
            },
            span: start.merge(end),
        })
    }

    fn parse_return(&mut self) -> PResult<Stmt> {
        let start = self.advance().span;
        let value = if self.at_line_end() {
            None
        } else {
            Some(self.parse_expr()?)
        };
        let end = self.previous_span();
        self.expect_line_end()?;
        Ok(Stmt {
            kind: StmtKind::Return(value),
            span: start.merge(end),
        })
    }

    fn parse_transition(&mut self) -> PResult<Stmt> {
        let start = self.advance().span;
        let system = self.match_token(&TokenKind::System);

        let target_node = if matches!(self.current_kind(), TokenKind::Ident(_))
            && self.peek_is(&TokenKind::Arrow)
        {
            let node = self.expect_ident("node name")?;
            self.advance(); // ->
            Some(node)
        } else {
            None
        };

        let state = self.parse_mode_name()?;
        self.expect_line_end()?;
        Ok(Stmt {
            span: start.merge(state.span),
            kind: StmtKind::Transition {
                system,
                target_node,
                state,
            },
        })
    }

    /// `topic.publish(value)` or `helper(args)`.
    fn parse_ident_stmt(&mut self) -> PResult<Stmt> {
        let name = self.expect_ident("identifier")?;

        if self.match_token(&TokenKind::Dot) {
            if !self.match_token(&TokenKind::Publish) {
                return Err(self
                    .error_expected("'publish' after '.'")
                    .with_help("call another node's function with 'request Node.func(...)'"));
            }
            self.expect(TokenKind::LParen, "'(' after 'publish'")?;
            let value = self.parse_expr()?;
            self.expect(TokenKind::RParen, "')' after the published value")?;
            let end = self.previous_span();
            self.expect_line_end()?;
            return Ok(Stmt {
                span: name.span.merge(end),
                kind: StmtKind::Publish { topic: name, value },
            });
        }

        if self.check(&TokenKind::LParen) {
            let args = self.parse_call_args()?;
            let end = self.previous_span();
            self.expect_line_end()?;
            return Ok(Stmt {
                span: name.span.merge(end),
                kind: StmtKind::Call { callee: name, args },
            });
        }

        Err(self.error_expected("'(' or '.publish(...)' after an identifier"))
    }

    /// `( [expr {, expr}] )`. A malformed argument becomes a placeholder
    /// and parsing resumes at the next ',' or ')'.
    fn parse_call_args(&mut self) -> PResult<Vec<Expr>> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if self.match_token(&TokenKind::RParen) {
            return Ok(args);
        }

        loop {
            match self.parse_expr() {
                Ok(arg) => args.push(arg),
                Err(e) => {
                    let span = e.span;
                    self.report(e);
                    args.push(Expr::error(span));
                    while !self.at_line_end()
                        && !self.check(&TokenKind::Comma)
                        && !self.check(&TokenKind::RParen)
                    {
                        self.advance();
                    }
                }
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(TokenKind::RParen, "')' after the arguments")?;
        Ok(args)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_binary(1)
    }

    /// Precedence climbing over left-associative binary operators.
    fn parse_binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut left = self.parse_unary()?;

        while let Some(op) = self.binary_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.advance();
            let right = self.parse_binary(prec + 1)?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(left)
    }

    fn binary_op(&self) -> Option<BinOp> {
        let op = match self.current_kind() {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Percent => BinOp::Rem,
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::BangEq => BinOp::Ne,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::LtEq => BinOp::Le,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::GtEq => BinOp::Ge,
            TokenKind::And => BinOp::And,
            TokenKind::Or => BinOp::Or,
            _ => return None,
        };
        Some(op)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let op = match self.current_kind() {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.parse_primary(),
        };
        let start = self.advance().span;
        let operand = self.parse_unary()?;
        let span = start.merge(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let span = self.current_span();
        let kind = match self.current_kind() {
            TokenKind::Int(n) => ExprKind::Literal(Literal::Int(*n)),
            TokenKind::Float(n) => ExprKind::Literal(Literal::Float(*n)),
            TokenKind::Str(s) => ExprKind::Literal(Literal::String(s.clone())),
            TokenKind::True => ExprKind::Literal(Literal::Bool(true)),
            TokenKind::False => ExprKind::Literal(Literal::Bool(false)),
            TokenKind::Ident(_) => {
                let name = self.expect_ident("identifier")?;
                if self.check(&TokenKind::LParen) {
                    let args = self.parse_call_args()?;
                    let end = self.previous_span();
                    return Ok(Expr::new(ExprKind::Call { callee: name, args }, span.merge(end)));
                }
                return Ok(Expr::new(ExprKind::Ident(name), span));
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')' to close the parenthesized expression")?;
                let end = self.previous_span();
                return Ok(Expr::new(inner.kind, span.merge(end)));
            }
            _ => return Err(self.error_expected("an expression")),
        };
        self.advance();
        Ok(Expr::new(kind, span))
    }

    // ========================================================================
    // Recovery
    // ========================================================================

    /// Skip to the next top-level declaration keyword at column 1.
    fn synchronize(&mut self) {
        if !self.at_end() {
            self.advance();
        }
        while !self.at_end() {
            if self.at_decl_boundary() {
                return;
            }
            self.advance();
        }
    }

    /// Skip the rest of a broken line, including any block nested under it.
    /// Stops before a `Dedent` that closes the enclosing block.
    fn recover_line(&mut self) {
        loop {
            match self.current_kind() {
                TokenKind::Eof | TokenKind::Dedent => return,
                TokenKind::Newline => {
                    self.advance();
                    if self.check(&TokenKind::Indent) {
                        self.skip_block();
                    }
                    return;
                }
                TokenKind::Indent => self.skip_block(),
                _ if self.at_decl_boundary() => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Consume an `Indent` and everything up to its matching `Dedent`.
    fn skip_block(&mut self) {
        let mut depth = 0usize;
        while !self.at_end() {
            match self.advance().kind {
                TokenKind::Indent => depth += 1,
                TokenKind::Dedent => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    fn at_decl_boundary(&self) -> bool {
        let token = self.current();
        token.kind.is_decl_start() && token.span.column == 1
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn current(&self) -> &Token {
        let idx = self.pos.min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn current_span(&self) -> Span {
        self.current().span
    }

    fn previous_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current_kind() == kind
    }

    fn peek_is(&self, kind: &TokenKind) -> bool {
        self.tokens.get(self.pos + 1).is_some_and(|t| &t.kind == kind)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume the current token. `Eof` is never consumed.
    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.check(&TokenKind::Eof)
    }

    fn at_line_end(&self) -> bool {
        matches!(
            self.current_kind(),
            TokenKind::Newline | TokenKind::Dedent | TokenKind::Eof
        )
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> PResult<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.error_expected(what))
        }
    }

    fn expect_ident(&mut self, what: &str) -> PResult<Ident> {
        match self.current_kind() {
            TokenKind::Ident(name) => {
                let name = name.clone();
                let span = self.advance().span;
                Ok(Ident::new(name, span))
            }
            _ => Err(self.error_expected(what)),
        }
    }

    /// A statement or header ends at a newline; the end of a block or of
    /// the file also ends it, without being consumed.
    fn expect_line_end(&mut self) -> PResult<()> {
        match self.current_kind() {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Dedent | TokenKind::Eof => Ok(()),
            _ => Err(self.error_expected("end of line")),
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.current_span())
    }

    fn error_expected(&self, what: &str) -> ParseError {
        let found = match self.current_kind() {
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::Str(_) => "a string".to_string(),
            TokenKind::Config(_) => "a configuration block".to_string(),
            kind if kind.is_layout() => kind.to_string(),
            kind => format!("'{}'", kind),
        };
        self.error(format!("expected {}, found {}", what, found))
    }

    fn report(&mut self, error: ParseError) {
        self.diags.push(error.into());
    }
}

/// Lex and parse a source text in one step.
pub fn parse_source(source: &str, diags: &mut Diagnostics) -> Program {
    let tokens = Scanner::new(source).scan_all();
    Parser::new(&tokens, diags).parse_program()
}
