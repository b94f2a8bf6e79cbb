//! Lexer for parameter expressions.

use std::fmt;

use logos::Logos;

/// Tokens of the expression language.
///
/// Strings, brackets, dots and `=` are lexed only so the parser can reject
/// them by name instead of reporting a generic syntax error.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // Literals
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""[^"]*""#, |lex| lex.slice().to_string())]
    #[regex(r"'[^']*'", |lex| lex.slice().to_string())]
    StringLiteral(String),

    // Identifiers
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    #[regex(r"\$[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice()[1..].to_string())]
    Param(String),

    // Operators
    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("**")]
    Power,

    // Punctuation
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token(",")]
    Comma,

    #[token(".")]
    Dot,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("=")]
    Eq,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(v) => write!(f, "{v}"),
            Token::StringLiteral(s) | Token::Identifier(s) => write!(f, "{s}"),
            Token::Param(s) => write!(f, "${s}"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Power => write!(f, "**"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Eq => write!(f, "="),
        }
    }
}

/// Tokenize an expression, failing on the first character that starts no token.
pub(super) fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push(token),
            Err(()) => {
                let span = lexer.span();
                return Err(format!(
                    "invalid token '{}' at position {}",
                    &source[span.clone()],
                    span.start
                ));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers() {
        let tokens = tokenize("1 2.5 .5 3e2 1.5e-1").unwrap();
        let values: Vec<f64> = tokens
            .iter()
            .map(|t| match t {
                Token::Number(v) => *v,
                other => panic!("unexpected token {other:?}"),
            })
            .collect();
        assert_eq!(values, vec![1.0, 2.5, 0.5, 300.0, 0.15]);
    }

    #[test]
    fn test_power_is_one_token() {
        let tokens = tokenize("2**3*4").unwrap();
        assert_eq!(tokens[1], Token::Power);
        assert_eq!(tokens[3], Token::Star);
    }

    #[test]
    fn test_param_and_identifier() {
        let tokens = tokenize("$theta * pi").unwrap();
        assert_eq!(tokens[0], Token::Param("theta".into()));
        assert_eq!(tokens[2], Token::Identifier("pi".into()));
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize("1 ; 2").unwrap_err();
        assert!(err.contains("';'"));
    }
}
