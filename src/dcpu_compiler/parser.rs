// DCPU Source Recursive Descent Parser

use crate::dcpu_compiler::ast::*;
use crate::dcpu_compiler::error::CompilerError;
use crate::dcpu_compiler::lexer::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::EOF)) {
            let (line, column) = tokens.last().map(|t| (t.line, t.column)).unwrap_or((1, 1));
            tokens.push(Token {
                kind: TokenKind::EOF,
                position: tokens.len(),
                line,
                column,
            });
        }
        Parser { tokens, current: 0 }
    }

    pub fn parse(&mut self) -> Result<Module, CompilerError> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        log::debug!("parsed {} top-level statements", body.len());
        Ok(Module { body })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, CompilerError> {
        self.consume(TokenKind::LeftBrace, "'{'")?;

        let mut statements = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }

        self.consume(TokenKind::RightBrace, "'}'")?;
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Stmt, CompilerError> {
        match &self.peek().kind {
            TokenKind::Function => self.parse_function_def(),
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::For => self.parse_for_stmt(),
            TokenKind::Return => self.parse_return_stmt(),
            _ => {
                let stmt = self.parse_simple_statement()?;
                self.consume(TokenKind::Semicolon, "';'")?;
                Ok(stmt)
            }
        }
    }

    fn parse_function_def(&mut self) -> Result<Stmt, CompilerError> {
        let pos = self.peek().pos();
        self.consume(TokenKind::Function, "'function'")?;
        let name = self.consume_identifier()?;
        self.consume(TokenKind::LeftParen, "'('")?;
        if !self.check(&TokenKind::RightParen) {
            return Err(CompilerError::ParseError(
                format!("Function '{}' cannot declare parameters", name),
                self.peek().pos(),
            ));
        }
        self.consume(TokenKind::RightParen, "')'")?;
        let body = self.parse_block()?;

        Ok(Stmt::new(StmtKind::FunctionDef { name, body }, pos))
    }

    fn parse_if_stmt(&mut self) -> Result<Stmt, CompilerError> {
        let pos = self.peek().pos();
        self.consume(TokenKind::If, "'if'")?;
        let test = self.parse_parenthesized()?;
        let body = self.parse_block()?;

        let orelse = if self.match_token(&[TokenKind::Else]) {
            if self.check(&TokenKind::If) {
                vec![self.parse_if_stmt()?]
            } else {
                self.parse_block()?
            }
        } else {
            Vec::new()
        };

        Ok(Stmt::new(StmtKind::If { test, body, orelse }, pos))
    }

    fn parse_while_stmt(&mut self) -> Result<Stmt, CompilerError> {
        let pos = self.peek().pos();
        self.consume(TokenKind::While, "'while'")?;
        let test = self.parse_parenthesized()?;
        let body = self.parse_block()?;

        Ok(Stmt::new(StmtKind::While { test, body }, pos))
    }

    fn parse_for_stmt(&mut self) -> Result<Stmt, CompilerError> {
        let pos = self.peek().pos();
        self.consume(TokenKind::For, "'for'")?;
        self.consume(TokenKind::LeftParen, "'('")?;
        let init = Box::new(self.parse_simple_statement()?);
        self.consume(TokenKind::Semicolon, "';'")?;
        let test = self.parse_expression()?;
        self.consume(TokenKind::Semicolon, "';'")?;
        let step = Box::new(self.parse_simple_statement()?);
        self.consume(TokenKind::RightParen, "')'")?;
        let body = self.parse_block()?;

        Ok(Stmt::new(
            StmtKind::For {
                init,
                test,
                step,
                body,
            },
            pos,
        ))
    }

    fn parse_return_stmt(&mut self) -> Result<Stmt, CompilerError> {
        let pos = self.peek().pos();
        self.consume(TokenKind::Return, "'return'")?;

        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(TokenKind::Semicolon, "';'")?;

        Ok(Stmt::new(StmtKind::Return(value), pos))
    }

    /// `a = b = value` or a bare expression; no trailing semicolon.
    fn parse_simple_statement(&mut self) -> Result<Stmt, CompilerError> {
        let pos = self.peek().pos();
        let mut exprs = vec![self.parse_expression()?];

        while self.match_token(&[TokenKind::Equal]) {
            exprs.push(self.parse_expression()?);
        }

        let value = exprs.pop().ok_or_else(|| {
            CompilerError::ParseError("Expected an expression".to_string(), pos)
        })?;

        if exprs.is_empty() {
            Ok(Stmt::new(StmtKind::Expr(value), pos))
        } else {
            Ok(Stmt::new(
                StmtKind::Assign {
                    targets: exprs,
                    value,
                },
                pos,
            ))
        }
    }

    fn parse_parenthesized(&mut self) -> Result<Expr, CompilerError> {
        self.consume(TokenKind::LeftParen, "'('")?;
        let expr = self.parse_expression()?;
        self.consume(TokenKind::RightParen, "')'")?;
        Ok(expr)
    }

    fn parse_expression(&mut self) -> Result<Expr, CompilerError> {
        self.parse_logical_or()
    }

    fn parse_logical_or(&mut self) -> Result<Expr, CompilerError> {
        let first = self.parse_logical_and()?;
        self.parse_bool_chain(first, &[TokenKind::Or, TokenKind::OrKeyword], BoolOp::Or)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, CompilerError> {
        let first = self.parse_not()?;
        self.parse_bool_chain(first, &[TokenKind::And, TokenKind::AndKeyword], BoolOp::And)
    }

    /// Flatten `a op b op c` into one node with every operand, left to right.
    fn parse_bool_chain(
        &mut self,
        first: Expr,
        operators: &[TokenKind],
        op: BoolOp,
    ) -> Result<Expr, CompilerError> {
        if !operators.iter().any(|kind| self.check(kind)) {
            return Ok(first);
        }

        let pos = first.pos;
        let mut values = vec![first];
        while self.match_token(operators) {
            let operand = match op {
                BoolOp::Or => self.parse_logical_and()?,
                BoolOp::And => self.parse_not()?,
            };
            values.push(operand);
        }

        Ok(Expr::new(ExprKind::BoolOp { op, values }, pos))
    }

    fn parse_not(&mut self) -> Result<Expr, CompilerError> {
        if self.match_token(&[TokenKind::Not, TokenKind::NotKeyword]) {
            let pos = self.previous().pos();
            let operand = Box::new(self.parse_not()?);
            Ok(Expr::new(
                ExprKind::UnaryOp {
                    op: UnaryOp::Not,
                    operand,
                },
                pos,
            ))
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, CompilerError> {
        let left = self.parse_bit_or()?;
        let mut comparisons = Vec::new();

        while self.match_token(&[
            TokenKind::EqualEqual,
            TokenKind::NotEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
            TokenKind::Greater,
            TokenKind::GreaterEqual,
        ]) {
            let op = match self.previous().kind {
                TokenKind::EqualEqual => CmpOp::Eq,
                TokenKind::NotEqual => CmpOp::NotEq,
                TokenKind::Less => CmpOp::Lt,
                TokenKind::LessEqual => CmpOp::LtE,
                TokenKind::Greater => CmpOp::Gt,
                TokenKind::GreaterEqual => CmpOp::GtE,
                _ => unreachable!(),
            };
            comparisons.push((op, self.parse_bit_or()?));
        }

        if comparisons.is_empty() {
            Ok(left)
        } else {
            let pos = left.pos;
            Ok(Expr::new(
                ExprKind::Compare {
                    left: Box::new(left),
                    comparisons,
                },
                pos,
            ))
        }
    }

    fn parse_bit_or(&mut self) -> Result<Expr, CompilerError> {
        let mut expr = self.parse_bit_xor()?;
        while self.match_token(&[TokenKind::Pipe]) {
            let right = self.parse_bit_xor()?;
            expr = binary(expr, BinOp::BitOr, right);
        }
        Ok(expr)
    }

    fn parse_bit_xor(&mut self) -> Result<Expr, CompilerError> {
        let mut expr = self.parse_bit_and()?;
        while self.match_token(&[TokenKind::Caret]) {
            let right = self.parse_bit_and()?;
            expr = binary(expr, BinOp::BitXor, right);
        }
        Ok(expr)
    }

    fn parse_bit_and(&mut self) -> Result<Expr, CompilerError> {
        let mut expr = self.parse_shift()?;
        while self.match_token(&[TokenKind::Ampersand]) {
            let right = self.parse_shift()?;
            expr = binary(expr, BinOp::BitAnd, right);
        }
        Ok(expr)
    }

    fn parse_shift(&mut self) -> Result<Expr, CompilerError> {
        let mut expr = self.parse_term()?;

        while self.match_token(&[TokenKind::LessLess, TokenKind::GreaterGreater]) {
            let operator = match self.previous().kind {
                TokenKind::LessLess => BinOp::LShift,
                TokenKind::GreaterGreater => BinOp::RShift,
                _ => unreachable!(),
            };
            let right = self.parse_term()?;
            expr = binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, CompilerError> {
        let mut expr = self.parse_factor()?;

        while self.match_token(&[TokenKind::Minus, TokenKind::Plus]) {
            let operator = match self.previous().kind {
                TokenKind::Minus => BinOp::Sub,
                TokenKind::Plus => BinOp::Add,
                _ => unreachable!(),
            };
            let right = self.parse_factor()?;
            expr = binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, CompilerError> {
        let mut expr = self.parse_power()?;

        while self.match_token(&[TokenKind::Slash, TokenKind::Star, TokenKind::Percent]) {
            let operator = match self.previous().kind {
                TokenKind::Slash => BinOp::Div,
                TokenKind::Star => BinOp::Mult,
                TokenKind::Percent => BinOp::Mod,
                _ => unreachable!(),
            };
            let right = self.parse_power()?;
            expr = binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn parse_power(&mut self) -> Result<Expr, CompilerError> {
        let base = self.parse_unary()?;
        if self.match_token(&[TokenKind::StarStar]) {
            let exponent = self.parse_unary()?;
            return Ok(binary(base, BinOp::Pow, exponent));
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompilerError> {
        if self.match_token(&[TokenKind::Minus]) {
            let pos = self.previous().pos();
            let operand = Box::new(self.parse_unary()?);
            Ok(Expr::new(
                ExprKind::UnaryOp {
                    op: UnaryOp::Neg,
                    operand,
                },
                pos,
            ))
        } else {
            self.parse_postfix()
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompilerError> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.match_token(&[TokenKind::LeftBracket]) {
                let index = self.parse_expression()?;
                self.consume(TokenKind::RightBracket, "']'")?;
                let pos = expr.pos;
                expr = Expr::new(
                    ExprKind::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    },
                    pos,
                );
            } else if self.match_token(&[TokenKind::LeftParen]) {
                let paren_pos = self.previous().pos();
                if !self.check(&TokenKind::RightParen) {
                    return Err(CompilerError::ParseError(
                        "Calls take no arguments".to_string(),
                        self.peek().pos(),
                    ));
                }
                self.consume(TokenKind::RightParen, "')'")?;

                expr = match expr.kind {
                    ExprKind::Name(func) => Expr::new(ExprKind::Call { func }, expr.pos),
                    other => {
                        return Err(CompilerError::ParseError(
                            format!("Cannot call {}", other.describe()),
                            paren_pos,
                        ));
                    }
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, CompilerError> {
        let pos = self.peek().pos();
        match &self.peek().kind {
            TokenKind::IntegerLiteral(val) => {
                let value = *val;
                self.advance();
                Ok(Expr::num(value, pos))
            }
            TokenKind::Identifier(name) => {
                let identifier = name.clone();
                self.advance();
                Ok(Expr::new(ExprKind::Name(identifier), pos))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.consume(TokenKind::RightParen, "')'")?;
                Ok(expr)
            }
            other => Err(CompilerError::ExpectedToken(
                "expression".to_string(),
                other.describe(),
                pos,
            )),
        }
    }

    // Helper methods
    fn match_token(&mut self, types: &[TokenKind]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, token_type: &TokenKind) -> bool {
        if self.is_at_end() {
            false
        } else {
            std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(token_type)
        }
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::EOF)
    }

    fn peek(&self) -> &Token {
        // `new` guarantees a trailing EOF token
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn consume(&mut self, token_type: TokenKind, expected: &str) -> Result<(), CompilerError> {
        if self.check(&token_type) {
            self.advance();
            Ok(())
        } else {
            let token = self.peek();
            Err(CompilerError::ExpectedToken(
                expected.to_string(),
                token.kind.describe(),
                token.pos(),
            ))
        }
    }

    fn consume_identifier(&mut self) -> Result<String, CompilerError> {
        if let TokenKind::Identifier(name) = &self.peek().kind {
            let identifier = name.clone();
            self.advance();
            Ok(identifier)
        } else {
            let token = self.peek();
            Err(CompilerError::ExpectedToken(
                "identifier".to_string(),
                token.kind.describe(),
                token.pos(),
            ))
        }
    }
}

fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
    let pos = left.pos;
    Expr::new(
        ExprKind::BinOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        pos,
    )
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
