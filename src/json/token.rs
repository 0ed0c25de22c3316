//! Lexer token kinds.
//!
//! Mirrors `util::json::lexer::JsonToken` / `JsonTokenType` from the original
//! OpenKit implementation: structural single-character tokens plus four
//! literal/value kinds.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    Null,
    Bool(bool),
    String(String),
    /// Keeps the original lexeme so the parser can hand it to `JsonNumber`
    /// without a second round of formatting loss.
    Number(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LeftBrace => write!(f, "{{"),
            Token::RightBrace => write!(f, "}}"),
            Token::LeftBracket => write!(f, "["),
            Token::RightBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Null => write!(f, "null"),
            Token::Bool(b) => write!(f, "{b}"),
            Token::String(s) => write!(f, "\"{s}\""),
            Token::Number(n) => write!(f, "{n}"),
        }
    }
}
