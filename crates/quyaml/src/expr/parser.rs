//! Whitelist parser for parameter expressions.

use super::lexer::{Token, tokenize};
use super::{BinOp, Expr, ExprScope, MathFn, UnaryOp};
use crate::error::ExprError;

/// Maximum nesting of parentheses and unary operators.
const MAX_NESTING: usize = 64;

type ExprResult<T> = Result<T, ExprError>;

/// Parser state for one expression.
pub(super) struct Parser<'s, 'a> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    scope: &'s ExprScope<'a>,
}

impl<'s, 'a> Parser<'s, 'a> {
    pub(super) fn new(source: &'s str, scope: &'s ExprScope<'a>) -> ExprResult<Self> {
        let tokens = tokenize(source).map_err(|message| ExprError::Syntax {
            expr: source.to_string(),
            message,
        })?;
        Ok(Self {
            source,
            tokens,
            pos: 0,
            depth: 0,
            scope,
        })
    }

    /// Parse the whole input as a single expression.
    pub(super) fn parse(mut self) -> ExprResult<Expr> {
        if self.tokens.is_empty() {
            return Err(self.syntax("empty expression"));
        }
        let expr = self.parse_binary(1)?;
        match self.peek() {
            None => Ok(expr),
            Some(Token::Eq) => Err(self.disallowed("assignment")),
            Some(Token::Comma) => Err(self.disallowed("tuple")),
            Some(token) => {
                let message = format!("unexpected token '{token}'");
                Err(self.syntax(message))
            }
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn consume(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_rparen(&mut self) -> ExprResult<()> {
        match self.advance() {
            Some(Token::RParen) => Ok(()),
            Some(token) => Err(self.syntax(format!("expected ')', found '{token}'"))),
            None => Err(self.syntax("expected ')', found end of input")),
        }
    }

    fn syntax(&self, message: impl Into<String>) -> ExprError {
        ExprError::Syntax {
            expr: self.source.to_string(),
            message: message.into(),
        }
    }

    fn disallowed(&self, construct: impl Into<String>) -> ExprError {
        ExprError::Disallowed {
            expr: self.source.to_string(),
            construct: construct.into(),
        }
    }

    fn enter(&mut self) -> ExprResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.syntax("expression nested too deeply"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Parse a left-associative binary chain with precedence climbing.
    fn parse_binary(&mut self, min_prec: u8) -> ExprResult<Expr> {
        let mut left = self.parse_unary()?;

        while let Some(op) = self.peek_binary_op() {
            let prec = op_precedence(op);
            if prec < min_prec {
                break;
            }
            self.advance();

            let right = self.parse_binary(prec + 1)?;
            left = Expr::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// `-x`, `+x`, or a power. Unary binds looser than `**`, so `-2**2` is `-(2**2)`.
    fn parse_unary(&mut self) -> ExprResult<Expr> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        self.advance();
        self.enter()?;
        let operand = self.parse_unary()?;
        self.leave();
        Ok(Expr::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    /// `primary ("**" unary)?`, right-associative through the unary operand.
    fn parse_power(&mut self) -> ExprResult<Expr> {
        let base = self.parse_postfix()?;
        if self.consume(&Token::Power) {
            self.enter()?;
            let exponent = self.parse_unary()?;
            self.leave();
            return Ok(Expr::BinOp {
                op: BinOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    /// A primary followed by anything that would make it an attribute or subscript.
    fn parse_postfix(&mut self) -> ExprResult<Expr> {
        let expr = self.parse_primary()?;
        match self.peek() {
            Some(Token::Dot) => Err(self.disallowed("attribute access")),
            Some(Token::LBracket) => Err(self.disallowed("subscript")),
            Some(Token::LParen) => Err(self.disallowed("call on a non-function value")),
            _ => Ok(expr),
        }
    }

    fn parse_primary(&mut self) -> ExprResult<Expr> {
        let Some(token) = self.advance() else {
            return Err(self.syntax("unexpected end of input"));
        };

        match token {
            Token::Number(v) => Ok(Expr::Const(v)),
            Token::Param(name) => {
                if self.scope.has_parameter(&name) {
                    Ok(Expr::Name(name))
                } else {
                    Err(ExprError::UndefinedParameter { name })
                }
            }
            Token::Identifier(name) => {
                if self.peek() == Some(&Token::LParen) {
                    self.parse_call(&name)
                } else {
                    self.resolve_name(name)
                }
            }
            Token::LParen => {
                self.enter()?;
                let inner = self.parse_binary(1)?;
                self.expect_rparen()?;
                self.leave();
                Ok(inner)
            }
            Token::StringLiteral(_) => Err(self.disallowed("string literal")),
            Token::LBracket => Err(self.disallowed("list literal")),
            other => Err(self.syntax(format!("unexpected token '{other}'"))),
        }
    }

    /// Bare identifiers: parameters first, then the two constants.
    fn resolve_name(&self, name: String) -> ExprResult<Expr> {
        if self.scope.has_parameter(&name) {
            return Ok(Expr::Name(name));
        }
        match name.as_str() {
            "pi" => Ok(Expr::Const(std::f64::consts::PI)),
            "e" => Ok(Expr::Const(std::f64::consts::E)),
            _ => Err(self.disallowed(format!("name '{name}'"))),
        }
    }

    fn parse_call(&mut self, name: &str) -> ExprResult<Expr> {
        let func = MathFn::from_name(name)
            .filter(|f| self.scope.functions.contains(f))
            .ok_or_else(|| self.disallowed(format!("function '{name}'")))?;

        self.advance(); // (
        if self.peek() == Some(&Token::RParen) {
            return Err(self.syntax(format!("{name}() takes exactly one argument")));
        }
        if matches!(self.peek(), Some(Token::Identifier(_))) && self.peek_at(1) == Some(&Token::Eq)
        {
            return Err(self.disallowed("keyword argument"));
        }

        self.enter()?;
        let arg = self.parse_binary(1)?;
        if self.peek() == Some(&Token::Comma) {
            return Err(self.disallowed(format!("multi-argument call to '{name}'")));
        }
        self.expect_rparen()?;
        self.leave();

        Ok(Expr::Call {
            func,
            arg: Box::new(arg),
        })
    }

    fn peek_binary_op(&self) -> Option<BinOp> {
        match self.peek()? {
            Token::Plus => Some(BinOp::Add),
            Token::Minus => Some(BinOp::Sub),
            Token::Star => Some(BinOp::Mul),
            Token::Slash => Some(BinOp::Div),
            Token::Percent => Some(BinOp::Mod),
            _ => None,
        }
    }
}

fn op_precedence(op: BinOp) -> u8 {
    match op {
        BinOp::Add | BinOp::Sub => 1,
        BinOp::Mul | BinOp::Div | BinOp::Mod => 2,
        BinOp::Pow => 3,
    }
}
