//! Statement and declaration parsing.

use crate::ast::{Expr, ExprKind, FunctionDecl, Parameter, Stmt, StmtKind};
use crate::error::ParserError;
use crate::lexer::TokenKind;
use crate::parser::core::{ParseResult, Parser};

/// Parameter and argument lists are capped so counts fit in one byte.
pub const MAX_PARAMETERS: usize = 255;

impl Parser {
    pub(super) fn declaration(&mut self) -> ParseResult<Stmt> {
        if self.match_token(&[TokenKind::Class]) {
            return self.class_declaration();
        }
        if self.match_token(&[TokenKind::Fun]) {
            return self.function_declaration();
        }
        if self.match_token(&[TokenKind::Var]) {
            return self.var_declaration();
        }
        self.statement()
    }

    /// classDecl → "class" IDENT "{" "}"
    ///
    /// Class bodies are empty: no methods, constructors, or inheritance.
    fn class_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.previous_span();
        let (name, _) = self.expect_identifier("class name")?;
        self.expect(&TokenKind::LeftBrace, "'{' before class body")?;
        self.expect(&TokenKind::RightBrace, "'}' after class body")?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Class { name }, span))
    }

    /// funDecl → "fun" IDENT "(" params? ")" block
    fn function_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.previous_span();
        let (name, _) = self.expect_identifier("function name")?;
        self.expect(&TokenKind::LeftParen, "'(' after function name")?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_PARAMETERS {
                    return Err(ParserError::too_many(
                        "parameters",
                        MAX_PARAMETERS,
                        self.current_span(),
                    ));
                }
                let (param, span) = self.expect_identifier("parameter name")?;
                params.push(Parameter { name: param, span });
                if !self.match_token(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen, "')' after parameters")?;

        self.expect(&TokenKind::LeftBrace, "'{' before function body")?;
        let body = self.block_statements()?;
        let span = start.merge(self.previous_span());

        Ok(Stmt::new(
            StmtKind::Function(FunctionDecl {
                name,
                params,
                body,
                span,
            }),
            span,
        ))
    }

    /// varDecl → "var" IDENT ( "=" expression )? ";"
    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.previous_span();
        let (name, _) = self.expect_identifier("variable name")?;

        let initializer = if self.match_token(&[TokenKind::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.expect(&TokenKind::Semicolon, "';' after variable declaration")?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Var { name, initializer }, span))
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.match_token(&[TokenKind::Print]) {
            return self.print_statement();
        }
        if self.match_token(&[TokenKind::LeftBrace]) {
            let start = self.previous_span();
            let statements = self.block_statements()?;
            let span = start.merge(self.previous_span());
            return Ok(Stmt::new(StmtKind::Block(statements), span));
        }
        if self.match_token(&[TokenKind::If]) {
            return self.if_statement();
        }
        if self.match_token(&[TokenKind::While]) {
            return self.while_statement();
        }
        if self.match_token(&[TokenKind::For]) {
            return self.for_statement();
        }
        if self.match_token(&[TokenKind::Return]) {
            return self.return_statement();
        }
        self.expression_statement()
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.previous_span();
        let value = self.expression()?;
        self.expect(&TokenKind::Semicolon, "';' after value")?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Print(value), span))
    }

    /// Parse statements up to the closing brace. The opening brace has
    /// already been consumed.
    fn block_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }
        self.expect(&TokenKind::RightBrace, "'}' after block")?;
        Ok(statements)
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.previous_span();
        self.expect(&TokenKind::LeftParen, "'(' after 'if'")?;
        let condition = self.expression()?;
        self.expect(&TokenKind::RightParen, "')' after condition")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_token(&[TokenKind::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        let span = start.merge(self.previous_span());
        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            span,
        ))
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.previous_span();
        self.expect(&TokenKind::LeftParen, "'(' after 'while'")?;
        let condition = self.expression()?;
        self.expect(&TokenKind::RightParen, "')' after condition")?;
        let body = Box::new(self.statement()?);
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::While { condition, body }, span))
    }

    /// forStmt → "for" "(" (varDecl | exprStmt | ";") expr? ";" expr? ")" stmt
    ///
    /// Desugared here into a block wrapping a while loop, so neither the
    /// compiler nor the VM ever sees a for construct.
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.previous_span();
        self.expect(&TokenKind::LeftParen, "'(' after 'for'")?;

        let initializer = if self.match_token(&[TokenKind::Semicolon]) {
            None
        } else if self.match_token(&[TokenKind::Var]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::Semicolon, "';' after loop condition")?;

        let increment = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::RightParen, "')' after for clauses")?;

        let mut body = self.statement()?;
        let span = start.merge(self.previous_span());

        if let Some(increment) = increment {
            let increment_span = increment.span;
            body = Stmt::new(
                StmtKind::Block(vec![
                    body,
                    Stmt::new(StmtKind::Expression(increment), increment_span),
                ]),
                span,
            );
        }

        let condition =
            condition.unwrap_or_else(|| Expr::new(ExprKind::Bool(true), span));
        let mut loop_stmt = Stmt::new(
            StmtKind::While {
                condition,
                body: Box::new(body),
            },
            span,
        );

        if let Some(initializer) = initializer {
            loop_stmt = Stmt::new(StmtKind::Block(vec![initializer, loop_stmt]), span);
        }

        Ok(loop_stmt)
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.previous_span();
        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::Semicolon, "';' after return value")?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Return(value), span))
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.expect(&TokenKind::Semicolon, "';' after expression")?;
        let span = expr.span.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Expression(expr), span))
    }
}
