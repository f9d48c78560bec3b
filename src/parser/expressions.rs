//! Expression parsing, one method per precedence level.

use crate::ast::{BinaryOp, Expr, ExprKind, LogicalOp, UnaryOp};
use crate::error::ParserError;
use crate::lexer::TokenKind;
use crate::parser::core::{ParseResult, Parser};
use crate::parser::statements::MAX_PARAMETERS;

impl Parser {
    pub(super) fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    /// assignment → ( call "." IDENT | call "[" expr "]" | IDENT ) "=" assignment
    ///            | logic_or
    ///
    /// The target is parsed as a normal expression first, then rewritten
    /// into the matching assignment node once `=` shows up.
    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.or_expression()?;

        if self.match_token(&[TokenKind::Equal]) {
            let equals_span = self.previous_span();
            let value = Box::new(self.assignment()?);
            let span = expr.span.merge(value.span);

            return match expr.kind {
                ExprKind::Variable(name) => {
                    Ok(Expr::new(ExprKind::Assign { name, value }, span))
                }
                ExprKind::Get { object, name } => {
                    Ok(Expr::new(ExprKind::Set { object, name, value }, span))
                }
                ExprKind::Index { object, index } => Ok(Expr::new(
                    ExprKind::IndexSet {
                        object,
                        index,
                        value,
                    },
                    span,
                )),
                _ => Err(ParserError::invalid_assignment_target(equals_span)),
            };
        }

        Ok(expr)
    }

    fn or_expression(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and_expression()?;

        while self.match_token(&[TokenKind::Or]) {
            let right = self.and_expression()?;
            let span = expr.span.merge(right.span);
            expr = Expr::new(
                ExprKind::Logical {
                    left: Box::new(expr),
                    operator: LogicalOp::Or,
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(expr)
    }

    fn and_expression(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;

        while self.match_token(&[TokenKind::And]) {
            let right = self.equality()?;
            let span = expr.span.merge(right.span);
            expr = Expr::new(
                ExprKind::Logical {
                    left: Box::new(expr),
                    operator: LogicalOp::And,
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;

        while self.match_token(&[TokenKind::EqualEqual, TokenKind::BangEqual]) {
            let operator = match self.previous().kind {
                TokenKind::EqualEqual => BinaryOp::Equal,
                _ => BinaryOp::NotEqual,
            };
            let right = self.comparison()?;
            expr = Self::binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;

        while self.match_token(&[
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
        ]) {
            let operator = match self.previous().kind {
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                TokenKind::Less => BinaryOp::Less,
                _ => BinaryOp::LessEqual,
            };
            let right = self.term()?;
            expr = Self::binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;

        while self.match_token(&[TokenKind::Plus, TokenKind::Minus]) {
            let operator = match self.previous().kind {
                TokenKind::Plus => BinaryOp::Add,
                _ => BinaryOp::Subtract,
            };
            let right = self.factor()?;
            expr = Self::binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;

        while self.match_token(&[TokenKind::Star, TokenKind::Slash]) {
            let operator = match self.previous().kind {
                TokenKind::Star => BinaryOp::Multiply,
                _ => BinaryOp::Divide,
            };
            let right = self.unary()?;
            expr = Self::binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.match_token(&[TokenKind::Bang, TokenKind::Minus]) {
            let start = self.previous_span();
            let operator = match self.previous().kind {
                TokenKind::Bang => UnaryOp::Not,
                _ => UnaryOp::Negate,
            };
            let operand = Box::new(self.unary()?);
            let span = start.merge(operand.span);
            return Ok(Expr::new(ExprKind::Unary { operator, operand }, span));
        }
        self.call()
    }

    /// call → primary ( "(" args? ")" | "." IDENT | "[" expr "]" )*
    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_token(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_token(&[TokenKind::Dot]) {
                let (name, name_span) = self.expect_identifier("property name after '.'")?;
                let span = expr.span.merge(name_span);
                expr = Expr::new(
                    ExprKind::Get {
                        object: Box::new(expr),
                        name,
                    },
                    span,
                );
            } else if self.match_token(&[TokenKind::LeftBracket]) {
                let index = self.expression()?;
                self.expect(&TokenKind::RightBracket, "']' after index")?;
                let span = expr.span.merge(self.previous_span());
                expr = Expr::new(
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                );
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments = Vec::new();

        if !self.check(&TokenKind::RightParen) {
            loop {
                if arguments.len() >= MAX_PARAMETERS {
                    return Err(ParserError::too_many(
                        "arguments",
                        MAX_PARAMETERS,
                        self.current_span(),
                    ));
                }
                arguments.push(self.expression()?);
                if !self.match_token(&[TokenKind::Comma]) {
                    break;
                }
            }
        }

        self.expect(&TokenKind::RightParen, "')' after arguments")?;
        let span = callee.span.merge(self.previous_span());
        Ok(Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                arguments,
            },
            span,
        ))
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();

        match &token.kind {
            TokenKind::NumberLiteral(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::Number(*n), token.span))
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                Ok(Expr::new(ExprKind::String(s.clone()), token.span))
            }
            TokenKind::BoolLiteral(b) => {
                self.advance();
                Ok(Expr::new(ExprKind::Bool(*b), token.span))
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Expr::new(ExprKind::Nil, token.span))
            }
            TokenKind::This => {
                self.advance();
                Ok(Expr::new(ExprKind::This, token.span))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::new(ExprKind::Variable(name.clone()), token.span))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(&TokenKind::RightParen, "')' after expression")?;
                let span = token.span.merge(self.previous_span());
                Ok(Expr::new(ExprKind::Grouping(Box::new(expr)), span))
            }
            TokenKind::LeftBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(&TokenKind::RightBracket) {
                    loop {
                        elements.push(self.expression()?);
                        if !self.match_token(&[TokenKind::Comma]) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RightBracket, "']' after array elements")?;
                let span = token.span.merge(self.previous_span());
                Ok(Expr::new(ExprKind::Array(elements), span))
            }
            TokenKind::Eof => Err(ParserError::unexpected_eof(token.span)),
            _ => Err(ParserError::unexpected_token(
                "expression",
                token.kind.to_string(),
                token.span,
            )),
        }
    }

    fn binary(left: Expr, operator: BinaryOp, right: Expr) -> Expr {
        let span = left.span.merge(right.span);
        Expr::new(
            ExprKind::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            },
            span,
        )
    }
}
