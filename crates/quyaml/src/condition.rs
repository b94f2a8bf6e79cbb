//! Classical conditions for `if` and `while` blocks.
//!
//! ```text
//! cond    := andExpr ("||" andExpr)*
//! andExpr := atom ("&&" atom)*
//! atom    := "(" cond ")" | "c[" INT "]" "==" ("0" | "1") | "c" "==" INT
//! ```
//!
//! Integers are decimal, `0b` binary or `0x` hex, with optional `_`
//! separators. Parsing checks indices and values against the classical
//! register size but never decides truth; that is left to whoever executes
//! the circuit, for which [`Condition::evaluate`] is provided.

use std::fmt;

use logos::Logos;
use serde::Serialize;

use crate::error::ConditionError;

/// Maximum parenthesis nesting.
const MAX_NESTING: usize = 64;

/// A boolean predicate over the classical register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// `c[bit] == value`
    BitEq { bit: usize, value: bool },
    /// `c == value`, comparing the whole register as an unsigned integer.
    RegisterEq { value: u64 },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    /// Evaluate against a register value, where bit `i` holds `c[i]`.
    pub fn evaluate(&self, register: u64) -> bool {
        match self {
            Condition::BitEq { bit, value } => {
                let set = u32::try_from(*bit)
                    .ok()
                    .and_then(|b| register.checked_shr(b))
                    .is_some_and(|v| v & 1 == 1);
                set == *value
            }
            Condition::RegisterEq { value } => register == *value,
            Condition::And(l, r) => l.evaluate(register) && r.evaluate(register),
            Condition::Or(l, r) => l.evaluate(register) || r.evaluate(register),
        }
    }

    /// Highest bit index this condition reads, if any single bit is read.
    pub fn max_bit(&self) -> Option<usize> {
        match self {
            Condition::BitEq { bit, .. } => Some(*bit),
            Condition::RegisterEq { .. } => None,
            Condition::And(l, r) | Condition::Or(l, r) => l.max_bit().max(r.max_bit()),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Condition::Or(..) => 1,
            Condition::And(..) => 2,
            Condition::BitEq { .. } | Condition::RegisterEq { .. } => 3,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min_prec: u8) -> fmt::Result {
        if self.precedence() < min_prec {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::BitEq { bit, value } => write!(f, "c[{bit}] == {}", u8::from(*value)),
            Condition::RegisterEq { value } => write!(f, "c == {value}"),
            Condition::And(l, r) => {
                l.fmt_operand(f, 2)?;
                f.write_str(" && ")?;
                r.fmt_operand(f, 3)
            }
            Condition::Or(l, r) => {
                l.fmt_operand(f, 1)?;
                f.write_str(" || ")?;
                r.fmt_operand(f, 2)
            }
        }
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token {
    #[token("c", priority = 3)]
    Register,

    #[regex(r"0[bB][01_]+", |lex| parse_radix(&lex.slice()[2..], 2))]
    #[regex(r"0[xX][0-9a-fA-F_]+", |lex| parse_radix(&lex.slice()[2..], 16))]
    #[regex(r"[0-9][0-9_]*", |lex| parse_radix(lex.slice(), 10))]
    Int(u64),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("==")]
    EqEq,

    #[token("&&")]
    And,

    #[token("||")]
    Or,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,
}

fn parse_radix(digits: &str, radix: u32) -> Option<u64> {
    let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
    if cleaned.is_empty() {
        return None;
    }
    u64::from_str_radix(&cleaned, radix).ok()
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Register => write!(f, "c"),
            Token::Int(v) => write!(f, "{v}"),
            Token::Identifier(s) => write!(f, "{s}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::EqEq => write!(f, "=="),
            Token::And => write!(f, "&&"),
            Token::Or => write!(f, "||"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

/// Parse condition text, checking it against a register of `bit_count` bits.
pub fn parse_condition(text: &str, bit_count: usize) -> Result<Condition, ConditionError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ConditionError::Empty);
    }
    if bit_count == 0 {
        return Err(ConditionError::NoClassicalBits);
    }

    let mut lexer = Token::lexer(text);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(ConditionError::Syntax {
                    cond: text.to_string(),
                    message: format!("invalid token '{}'", lexer.slice()),
                });
            }
        }
    }

    let mut parser = Parser {
        text,
        tokens,
        pos: 0,
        depth: 0,
        bit_count,
    };
    let cond = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(parser.syntax(format!("unexpected '{token}'")));
    }
    Ok(cond)
}

struct Parser<'s> {
    text: &'s str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    bit_count: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
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

    fn expect(&mut self, token: &Token) -> Result<(), ConditionError> {
        match self.advance() {
            Some(found) if &found == token => Ok(()),
            Some(found) => Err(self.syntax(format!("expected '{token}', found '{found}'"))),
            None => Err(self.syntax(format!("expected '{token}', found end of condition"))),
        }
    }

    fn syntax(&self, message: impl Into<String>) -> ConditionError {
        ConditionError::Syntax {
            cond: self.text.to_string(),
            message: message.into(),
        }
    }

    fn parse_or(&mut self) -> Result<Condition, ConditionError> {
        let mut left = self.parse_and()?;
        while self.consume(&Token::Or) {
            let right = self.parse_and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Condition, ConditionError> {
        let mut left = self.parse_atom()?;
        while self.consume(&Token::And) {
            let right = self.parse_atom()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_atom(&mut self) -> Result<Condition, ConditionError> {
        match self.advance() {
            Some(Token::LParen) => {
                self.depth += 1;
                if self.depth > MAX_NESTING {
                    return Err(self.syntax("parentheses nested too deeply"));
                }
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                self.depth -= 1;
                Ok(inner)
            }
            Some(Token::Register) => {
                if self.consume(&Token::LBracket) {
                    self.parse_bit_eq()
                } else {
                    self.parse_register_eq()
                }
            }
            Some(other) => Err(self.syntax(format!(
                "unsupported atom starting at '{other}'; use 'c[i] == 0/1' or 'c == <int>'"
            ))),
            None => Err(self.syntax("expected a comparison, found end of condition")),
        }
    }

    /// After `c[`: `INT "]" "==" ("0" | "1")`.
    fn parse_bit_eq(&mut self) -> Result<Condition, ConditionError> {
        let index = match self.advance() {
            Some(Token::Int(v)) => v,
            _ => return Err(self.syntax("expected a bit index after 'c['")),
        };
        self.expect(&Token::RBracket)?;
        self.expect(&Token::EqEq)?;
        let value = match self.advance() {
            Some(Token::Int(0)) => false,
            Some(Token::Int(1)) => true,
            _ => return Err(self.syntax("a single bit can only be compared with 0 or 1")),
        };

        let bit = usize::try_from(index).unwrap_or(usize::MAX);
        if bit >= self.bit_count {
            return Err(ConditionError::BitOutOfRange {
                index: bit,
                bit_count: self.bit_count,
            });
        }
        Ok(Condition::BitEq { bit, value })
    }

    /// After `c`: `"==" INT`.
    fn parse_register_eq(&mut self) -> Result<Condition, ConditionError> {
        self.expect(&Token::EqEq)?;
        let value = match self.advance() {
            Some(Token::Int(v)) => v,
            _ => return Err(self.syntax("expected an integer after 'c =='")),
        };

        let fits = u32::try_from(self.bit_count)
            .ok()
            .and_then(|bits| value.checked_shr(bits))
            .is_none_or(|rest| rest == 0);
        if !fits {
            return Err(ConditionError::ValueOutOfRange {
                value,
                bit_count: self.bit_count,
            });
        }
        Ok(Condition::RegisterEq { value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bit(bit: usize, value: bool) -> Condition {
        Condition::BitEq { bit, value }
    }

    #[test]
    fn test_atoms() {
        assert_eq!(parse_condition("c[0] == 1", 2), Ok(bit(0, true)));
        assert_eq!(parse_condition("  c[1]==0 ", 2), Ok(bit(1, false)));
        assert_eq!(
            parse_condition("c == 3", 2),
            Ok(Condition::RegisterEq { value: 3 })
        );
    }

    #[test]
    fn test_register_token_and_identifiers() {
        let tokens: Vec<_> = Token::lexer("c cc creg c[0]").collect();
        assert_eq!(
            tokens,
            vec![
                Ok(Token::Register),
                Ok(Token::Identifier("cc".into())),
                Ok(Token::Identifier("creg".into())),
                Ok(Token::Register),
                Ok(Token::LBracket),
                Ok(Token::Int(0)),
                Ok(Token::RBracket),
            ]
        );
        assert!(parse_condition("creg == 1", 2).is_err());
    }

    #[test]
    fn test_integer_literals() {
        for text in ["c == 5", "c == 0b101", "c == 0x5", "c == 0b1_01", "c == 0X05"] {
            assert_eq!(
                parse_condition(text, 3),
                Ok(Condition::RegisterEq { value: 5 }),
                "{text}"
            );
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let cond = parse_condition("c[0] == 1 || c[1] == 1 && c[2] == 0", 3).unwrap();
        assert_eq!(
            cond,
            Condition::Or(
                Box::new(bit(0, true)),
                Box::new(Condition::And(
                    Box::new(bit(1, true)),
                    Box::new(bit(2, false))
                ))
            )
        );
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let cond = parse_condition("(c[0] == 1 || c[1] == 1) && c[2] == 0", 3).unwrap();
        assert!(matches!(cond, Condition::And(..)));
    }

    #[test]
    fn test_left_associative() {
        let cond = parse_condition("c[0] == 1 && c[1] == 1 && c[2] == 1", 3).unwrap();
        let Condition::And(left, right) = cond else {
            panic!("expected And");
        };
        assert!(matches!(*left, Condition::And(..)));
        assert_eq!(*right, bit(2, true));
    }

    #[test]
    fn test_range_errors() {
        assert_eq!(
            parse_condition("c[1] == 1", 1),
            Err(ConditionError::BitOutOfRange {
                index: 1,
                bit_count: 1
            })
        );
        assert_eq!(
            parse_condition("c == 4", 2),
            Err(ConditionError::ValueOutOfRange {
                value: 4,
                bit_count: 2
            })
        );
        assert_eq!(
            parse_condition("c == 3", 2),
            Ok(Condition::RegisterEq { value: 3 })
        );
        assert_eq!(
            parse_condition("c == 18446744073709551615", 64),
            Ok(Condition::RegisterEq { value: u64::MAX })
        );
        assert_eq!(
            parse_condition("c[0] == 1", 0),
            Err(ConditionError::NoClassicalBits)
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(parse_condition("   ", 2), Err(ConditionError::Empty));
        for text in [
            "c[0] == 2",
            "c[0] = 1",
            "d == 1",
            "c ==",
            "(c == 1",
            "c == 1)",
            "c == 1 &&",
            "c == 1 and c == 2",
            "c == -1",
            "c == 0b",
        ] {
            assert!(
                matches!(parse_condition(text, 4), Err(ConditionError::Syntax { .. })),
                "{text} should be a syntax error"
            );
        }
    }

    #[test]
    fn test_evaluate() {
        let cond = parse_condition("c[0] == 1 && c[2] == 0", 3).unwrap();
        assert!(cond.evaluate(0b001));
        assert!(!cond.evaluate(0b101));
        assert!(!cond.evaluate(0b000));

        let cond = parse_condition("c == 2 || c[0] == 1", 2).unwrap();
        assert!(cond.evaluate(2));
        assert!(cond.evaluate(3));
        assert!(!cond.evaluate(0));
    }

    #[test]
    fn test_display_round_trip() {
        for text in [
            "c[0] == 1",
            "c == 3",
            "c[0] == 1 || c[1] == 0 && c == 2",
            "(c[0] == 1 || c[1] == 0) && c == 2",
            "c[0] == 1 || (c[1] == 0 || c == 2)",
        ] {
            let cond = parse_condition(text, 3).unwrap();
            let rendered = cond.to_string();
            assert_eq!(parse_condition(&rendered, 3).unwrap(), cond, "{rendered}");
        }
    }

    #[test]
    fn test_max_bit() {
        let cond = parse_condition("c[2] == 1 || c == 1", 3).unwrap();
        assert_eq!(cond.max_bit(), Some(2));
        assert_eq!(parse_condition("c == 1", 3).unwrap().max_bit(), None);
    }
}
