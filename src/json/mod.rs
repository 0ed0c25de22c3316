//! Hand-rolled JSON codec (component C1).
//!
//! Read-only reimplementation of the subset of RFC 8259 the original
//! implementation's `util::json` package supports: no comments, no trailing
//! commas, duplicate object keys replace earlier ones.

mod lexer;
mod parser;
mod token;
mod value;
mod writer;

pub use parser::{parse, Parser};
pub use token::Token;
pub use value::{JsonNumber, JsonObject, JsonValue};
pub use writer::write;
