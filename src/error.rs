//! Crate-wide error vocabulary.
//!
//! Collapses the two error vocabularies of the original implementation
//! (C-style return codes for threading, C++ exceptions for parsing) into one
//! sum type, per spec.md's "two error vocabularies" Design Note.

use thiserror::Error;

/// Errors surfaced by the JSON lexer (C1).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexerError {
    #[error("Unexpected literal \"{0}\"")]
    UnexpectedLiteral(String),
    #[error("Invalid number literal \"{0}\"")]
    InvalidNumber(String),
    #[error("Unterminated string literal \"{0}\"")]
    UnterminatedString(String),
    #[error("Invalid escape sequence \"\\{0}\"")]
    InvalidEscape(char),
    #[error("Invalid control character in string literal")]
    InvalidControlCharacter,
    #[error("Invalid UTF-16 surrogate pair \"\\u{0}\"")]
    InvalidSurrogatePair(String),
    #[error("JSON Lexer is in erroneous state")]
    LexerInErrorState,
}

/// Errors surfaced by the JSON parser (C1).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParserError {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error("Unexpected token \"{token}\" {context}")]
    UnexpectedToken { token: String, context: String },
    #[error("No JSON value could be decoded")]
    NoValue,
    #[error("internal parser error: {0}")]
    Internal(String),
}

/// Top-level error type for the agent, covering §7 of the specification.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Parser(#[from] ParserError),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("transport failure: {0}")]
    TransportFailure(String),
    #[error("server throttled, retry after {retry_after_ms} ms")]
    ServerThrottled { retry_after_ms: u64 },
    #[error("server rejected request with status {status}")]
    ServerRejected { status: u16 },
    #[error("shutdown requested")]
    ShutdownRequested,
}
