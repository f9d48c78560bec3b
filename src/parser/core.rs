//! Core parser state and token navigation helpers.

use crate::ast::Program;
use crate::error::ParserError;
use crate::lexer::{Token, TokenKind};
use crate::span::Span;

pub type ParseResult<T> = Result<T, ParserError>;

/// The parser turns a token stream into an AST.
///
/// Parse errors do not abort the whole parse: after recording one, the
/// parser discards tokens up to the next statement boundary and resumes,
/// so a single pass reports every syntax error in the file.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    /// Parse a complete program, collecting every syntax error found.
    pub fn parse(&mut self) -> Result<Program, Vec<ParserError>> {
        let mut statements = Vec::new();
        let mut errors = Vec::new();

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    errors.push(err);
                    self.synchronize();
                }
            }
        }

        if errors.is_empty() {
            Ok(Program { statements })
        } else {
            Err(errors)
        }
    }

    /// Discard tokens until a likely statement boundary: just past a
    /// semicolon, or just before a keyword that starts a statement.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            if matches!(self.previous().kind, TokenKind::Semicolon) {
                return;
            }
            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    pub(super) fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    pub(super) fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    pub(super) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    pub(super) fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    /// Check the current token against a kind, ignoring any payload.
    pub(super) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    /// Consume the current token if it matches one of the given kinds.
    pub(super) fn match_token(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    /// Consume a token of the given kind or fail with a diagnostic.
    pub(super) fn expect(&mut self, kind: &TokenKind, expected: &str) -> ParseResult<Token> {
        if self.check(kind) {
            return Ok(self.advance().clone());
        }
        if self.is_at_end() {
            return Err(ParserError::unexpected_eof(self.current_span()));
        }
        Err(ParserError::unexpected_token(
            expected,
            self.peek().kind.to_string(),
            self.current_span(),
        ))
    }

    /// Consume an identifier token and return its name and span.
    pub(super) fn expect_identifier(&mut self, expected: &str) -> ParseResult<(String, Span)> {
        if let TokenKind::Identifier(name) = &self.peek().kind {
            let name = name.clone();
            let span = self.peek().span;
            self.advance();
            return Ok((name, span));
        }
        if self.is_at_end() {
            return Err(ParserError::unexpected_eof(self.current_span()));
        }
        Err(ParserError::unexpected_token(
            expected,
            self.peek().kind.to_string(),
            self.current_span(),
        ))
    }

    pub(super) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(super) fn previous_span(&self) -> Span {
        self.previous().span
    }
}
