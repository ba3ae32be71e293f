//! Lexer/Scanner for the Rivet language.
//!
//! This module tokenizes Rivet source code into a stream of tokens,
//! synthesizing `Indent`/`Dedent` layout tokens from leading whitespace.
//! The scanner never fails: anything it cannot make sense of becomes an
//! `Invalid` token for the parser to report.

use std::collections::VecDeque;

use crate::lexer::token::{Span, Token, TokenKind};

/// Columns a tab advances the indentation level by.
const TAB_WIDTH: usize = 4;

/// The lexer that tokenizes Rivet source code.
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,

    // Current position tracking
    start: usize,
    current: usize,
    line: usize,
    column: usize,
    start_line: usize,
    start_column: usize,

    // Indentation tracking
    indent_stack: Vec<usize>,
    pending: VecDeque<Token>,
    at_line_start: bool,
    layout: bool,

    // Kind of the previously returned token, for signed literals
    prev: TokenKind,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
            indent_stack: vec![0],
            pending: VecDeque::new(),
            at_line_start: true,
            layout: true,
            prev: TokenKind::Newline,
        }
    }

    /// A scanner for a single-line fragment, such as an interpolated
    /// expression. No layout tokens are produced.
    pub fn inline(source: &'a str) -> Self {
        let mut scanner = Self::new(source);
        scanner.layout = false;
        scanner.at_line_start = false;
        scanner
    }

    /// Tokenize the entire source and return all tokens, `Eof` included.
    pub fn scan_all(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        tokens
    }

    /// Get the next token from the source.
    pub fn next_token(&mut self) -> Token {
        let token = self.scan_token();
        self.prev = token.kind.clone();
        token
    }

    fn scan_token(&mut self) -> Token {
        if let Some(token) = self.pending.pop_front() {
            return token;
        }

        if self.at_line_start {
            self.at_line_start = false;
            self.handle_indentation();
            if let Some(token) = self.pending.pop_front() {
                return token;
            }
        }

        self.skip_whitespace_and_comments();

        self.start = self.current;
        self.start_line = self.line;
        self.start_column = self.column;

        let Some(c) = self.advance() else {
            // End of file: close every open indentation level, one per call
            if self.indent_stack.len() > 1 {
                self.indent_stack.pop();
                return self.make_token(TokenKind::Dedent);
            }
            return self.make_token(TokenKind::Eof);
        };

        match c {
            '(' => self.make_token(TokenKind::LParen),
            ')' => self.make_token(TokenKind::RParen),
            ',' => self.make_token(TokenKind::Comma),
            '.' => self.make_token(TokenKind::Dot),
            ':' => self.make_token(TokenKind::Colon),
            '+' => self.make_token(TokenKind::Plus),
            '*' => self.make_token(TokenKind::Star),
            '/' => self.make_token(TokenKind::Slash),
            '%' => self.make_token(TokenKind::Percent),
            '{' => self.scan_config(),
            '}' => self.invalid_token("unexpected '}' outside a configuration block"),

            '-' => {
                if self.match_char('>') {
                    self.make_token(TokenKind::Arrow)
                } else if self.peek().is_some_and(|c| c.is_ascii_digit()) && !self.prev.ends_operand() {
                    self.scan_number()
                } else {
                    self.make_token(TokenKind::Minus)
                }
            }
            '=' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::EqEq)
                } else {
                    self.make_token(TokenKind::Eq)
                }
            }
            '!' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::BangEq)
                } else {
                    self.invalid_token("unexpected character '!' (use 'not' for negation)")
                }
            }
            '<' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::LtEq)
                } else {
                    self.make_token(TokenKind::Lt)
                }
            }
            '>' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::GtEq)
                } else {
                    self.make_token(TokenKind::Gt)
                }
            }

            '\n' => {
                self.line += 1;
                self.column = 1;
                if self.layout {
                    self.at_line_start = true;
                }
                self.make_token(TokenKind::Newline)
            }

            '"' => self.scan_string(),
            '0'..='9' => self.scan_number(),
            c if is_ident_start(c) => self.scan_identifier(),

            _ => self.invalid_token(format!("unexpected character '{}'", c)),
        }
    }

    /// Measure the indentation of a new line and queue the layout tokens it
    /// implies. Blank and comment-only lines leave the stack untouched.
    fn handle_indentation(&mut self) {
        let mut indent = 0;
        while let Some(c) = self.peek() {
            match c {
                ' ' => indent += 1,
                '\t' => indent += TAB_WIDTH,
                _ => break,
            }
            self.advance();
        }

        match self.peek() {
            None | Some('\n') | Some('\r') => return,
            Some('/') if self.peek_next() == Some('/') => return,
            _ => {}
        }

        self.start = self.current;
        self.start_line = self.line;
        self.start_column = self.column;

        let current_indent = self.indent_stack.last().copied().unwrap_or(0);
        if indent > current_indent {
            self.indent_stack.push(indent);
            let token = self.make_token(TokenKind::Indent);
            self.pending.push_back(token);
        } else {
            while self.indent_stack.len() > 1 {
                let top = self.indent_stack.last().copied().unwrap_or(0);
                if indent >= top {
                    break;
                }
                self.indent_stack.pop();
                let token = self.make_token(TokenKind::Dedent);
                self.pending.push_back(token);
            }
            // Landing between two levels keeps the shallower one, so a
            // later line at this column would open a block nobody wrote.
            let landed = self.indent_stack.last().copied().unwrap_or(0);
            if indent != landed {
                let token = self.invalid_token(format!(
                    "inconsistent dedent: indentation {} does not match any enclosing block",
                    indent
                ));
                self.pending.push_back(token);
            }
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    self.skip_line_comment();
                }
                _ => break,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn scan_string(&mut self) -> Token {
        let mut value = String::new();

        loop {
            match self.peek() {
                None | Some('\n') => {
                    return self.invalid_token("unterminated string");
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }

        // A CRLF file leaves no '\r' inside a string, since the string
        // must close before the line break.
        self.make_token(TokenKind::Str(value))
    }

    /// Scan an opaque `{...}` configuration blob up to its matching brace.
    fn scan_config(&mut self) -> Token {
        let mut depth = 1usize;

        while depth > 0 {
            match self.peek() {
                None => return self.invalid_token("unterminated configuration block"),
                Some('\n') => {
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                }
                Some('"') => {
                    self.advance();
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                        if c == '"' {
                            break;
                        }
                    }
                }
                Some('{') => {
                    self.advance();
                    depth += 1;
                }
                Some('}') => {
                    self.advance();
                    depth -= 1;
                }
                Some(_) => {
                    self.advance();
                }
            }
        }

        let text = self.current_lexeme().to_string();
        self.make_token(TokenKind::Config(text))
    }

    fn scan_number(&mut self) -> Token {
        self.scan_decimal_digits();

        let is_float = self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit());
        if is_float {
            self.advance(); // consume '.'
            self.scan_decimal_digits();
            match self.current_lexeme().parse::<f64>() {
                Ok(n) => self.make_token(TokenKind::Float(n)),
                Err(_) => self.invalid_token("invalid float literal"),
            }
        } else {
            match self.current_lexeme().parse::<i64>() {
                Ok(n) => self.make_token(TokenKind::Int(n)),
                Err(_) => self.invalid_token("integer literal out of range"),
            }
        }
    }

    fn scan_decimal_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn scan_identifier(&mut self) -> Token {
        while self.peek().is_some_and(is_ident_continue) {
            self.advance();
        }

        let lexeme = self.current_lexeme();

        if let Some(kind) = TokenKind::keyword(lexeme) {
            self.make_token(kind)
        } else {
            self.make_token(TokenKind::Ident(lexeme.to_string()))
        }
    }

    // Helper methods

    fn advance(&mut self) -> Option<char> {
        if let Some((pos, c)) = self.chars.next() {
            self.current = pos + c.len_utf8();
            self.column += 1;
            Some(c)
        } else {
            None
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.current..].chars();
        chars.next();
        chars.next()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn current_lexeme(&self) -> &str {
        &self.source[self.start..self.current]
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(
            kind,
            Span::new(self.start, self.current, self.start_line, self.start_column),
            self.current_lexeme(),
        )
    }

    fn invalid_token(&mut self, message: impl Into<String>) -> Token {
        self.make_token(TokenKind::Invalid(message.into()))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
