//! JSON parser: a hand-written pushdown automaton.
//!
//! Directly follows `util::json::JsonParser` from the original OpenKit
//! implementation — same state names (`Init`, `InArrayStart`, ...,
//! `InObjectDelimiter`, `End`, `Error`), same two-stack design (a stack of
//! suspended states for nested composites, and a stack of partially built
//! composites), same "duplicate object keys replace" and
//! "second `parse()` call returns the cached root" behavior.

use crate::error::ParserError;
use crate::json::lexer::Lexer;
use crate::json::token::Token;
use crate::json::value::{JsonObject, JsonValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    InArrayStart,
    InArrayValue,
    InArrayDelimiter,
    InObjectStart,
    InObjectKey,
    InObjectColon,
    InObjectValue,
    InObjectDelimiter,
    End,
    Error,
}

/// A partially built composite value, still open for more elements.
enum Container {
    Array(Vec<JsonValue>),
    Object {
        map: JsonObject,
        pending_key: Option<String>,
        pending_value: Option<JsonValue>,
    },
}

/// Parses a JSON text into a [`JsonValue`] tree.
pub struct Parser {
    lexer: Lexer,
    state: State,
    parsed: Option<JsonValue>,
    value_stack: Vec<Container>,
    state_stack: Vec<State>,
}

impl Parser {
    pub fn new(input: &str) -> Self {
        Parser {
            lexer: Lexer::new(input),
            state: State::Init,
            parsed: None,
            value_stack: Vec::new(),
            state_stack: Vec::new(),
        }
    }

    /// Parses the whole input and returns the root value.
    ///
    /// Calling `parse()` again after a successful parse returns the cached
    /// root without re-lexing (spec.md §4.1).
    pub fn parse(&mut self) -> Result<JsonValue, ParserError> {
        if self.state == State::End {
            return Ok(self.parsed.clone().expect("End state always has a value"));
        }
        if self.state == State::Error {
            return Err(ParserError::Internal(
                "JSON parser is in erroneous state".to_string(),
            ));
        }

        loop {
            let token = self.lexer.next_token()?;
            let is_end = token.is_none();
            self.step(token)?;
            if self.state == State::End && is_end {
                break;
            }
            if is_end && self.state != State::End {
                // The only state allowed to see a `None` token without
                // erroring is `End`; `step` already raised on every other
                // state, so this is unreachable in practice.
                break;
            }
        }

        self.value_stack_is_empty_check()?;
        Ok(self.parsed.clone().expect("parse loop always produces a value"))
    }

    fn value_stack_is_empty_check(&self) -> Result<(), ParserError> {
        if self.parsed.is_none() {
            return Err(ParserError::NoValue);
        }
        Ok(())
    }

    fn step(&mut self, token: Option<Token>) -> Result<(), ParserError> {
        match self.state {
            State::Init => self.step_init(token),
            State::InArrayStart => self.step_in_array_start(token),
            State::InArrayValue => self.step_in_array_value(token),
            State::InArrayDelimiter => self.step_in_array_delimiter(token),
            State::InObjectStart => self.step_in_object_start(token),
            State::InObjectKey => self.step_in_object_key(token),
            State::InObjectColon => self.step_in_object_colon(token),
            State::InObjectValue => self.step_in_object_value(token),
            State::InObjectDelimiter => self.step_in_object_delimiter(token),
            State::End => self.step_end(token),
            State::Error => unreachable!("error transitions return before reaching step again"),
        }
    }

    fn fail(&mut self, err: ParserError) -> Result<(), ParserError> {
        self.state = State::Error;
        Err(err)
    }

    fn unexpected(&mut self, token: Option<Token>, context: &str) -> Result<(), ParserError> {
        let message = match token {
            Some(t) => t.to_string(),
            None => "<end of input>".to_string(),
        };
        self.fail(ParserError::UnexpectedToken {
            token: message,
            context: context.to_string(),
        })
    }

    fn step_init(&mut self, token: Option<Token>) -> Result<(), ParserError> {
        let token = match token {
            Some(t) => t,
            None => return self.fail(ParserError::NoValue),
        };
        match simple_value(&token) {
            Some(value) => {
                self.parsed = Some(value);
                self.state = State::End;
            }
            None => match token {
                Token::LeftBracket => {
                    self.value_stack.push(Container::Array(Vec::new()));
                    self.state = State::InArrayStart;
                }
                Token::LeftBrace => {
                    self.value_stack.push(Container::Object {
                        map: JsonObject::new(),
                        pending_key: None,
                        pending_value: None,
                    });
                    self.state = State::InObjectStart;
                }
                other => return self.unexpected(Some(other), "at start of input"),
            },
        }
        Ok(())
    }

    fn step_in_array_start(&mut self, token: Option<Token>) -> Result<(), ParserError> {
        let token = match token {
            Some(t) => t,
            None => return self.fail(ParserError::UnexpectedToken {
                token: "<end of input>".to_string(),
                context: "unterminated array".to_string(),
            }),
        };
        if let Some(value) = simple_value(&token) {
            self.push_array_value(value);
            self.state = State::InArrayValue;
            return Ok(());
        }
        match token {
            Token::LeftBracket => self.open_nested(Container::Array(Vec::new()), State::InArrayValue, State::InArrayStart),
            Token::LeftBrace => self.open_nested(
                Container::Object {
                    map: JsonObject::new(),
                    pending_key: None,
                    pending_value: None,
                },
                State::InArrayValue,
                State::InObjectStart,
            ),
            Token::RightBracket => self.close_composite()?,
            other => return self.unexpected(Some(other), "at beginning of array"),
        }
        Ok(())
    }

    fn step_in_array_value(&mut self, token: Option<Token>) -> Result<(), ParserError> {
        match token {
            Some(Token::Comma) => {
                self.state = State::InArrayDelimiter;
                Ok(())
            }
            Some(Token::RightBracket) => self.close_composite(),
            other => self.unexpected(other, "in array after value was parsed"),
        }
    }

    fn step_in_array_delimiter(&mut self, token: Option<Token>) -> Result<(), ParserError> {
        let token = match token {
            Some(t) => t,
            None => return self.fail(ParserError::UnexpectedToken {
                token: "<end of input>".to_string(),
                context: "unterminated array".to_string(),
            }),
        };
        if let Some(value) = simple_value(&token) {
            self.push_array_value(value);
            self.state = State::InArrayValue;
            return Ok(());
        }
        match token {
            Token::LeftBracket => self.open_nested(Container::Array(Vec::new()), State::InArrayValue, State::InArrayStart),
            Token::LeftBrace => self.open_nested(
                Container::Object {
                    map: JsonObject::new(),
                    pending_key: None,
                    pending_value: None,
                },
                State::InArrayValue,
                State::InObjectStart,
            ),
            other => return self.unexpected(Some(other), "in array after delimiter"),
        }
        Ok(())
    }

    fn step_in_object_start(&mut self, token: Option<Token>) -> Result<(), ParserError> {
        let token = match token {
            Some(t) => t,
            None => return self.fail(ParserError::UnexpectedToken {
                token: "<end of input>".to_string(),
                context: "unterminated object".to_string(),
            }),
        };
        match token {
            Token::RightBrace => self.close_composite(),
            Token::String(s) => {
                self.set_pending_key(s);
                self.state = State::InObjectKey;
                Ok(())
            }
            other => self.unexpected(Some(other), "encountered - object key expected"),
        }
    }

    fn step_in_object_key(&mut self, token: Option<Token>) -> Result<(), ParserError> {
        match token {
            Some(Token::Colon) => {
                self.state = State::InObjectColon;
                Ok(())
            }
            other => self.unexpected(other, "encountered - key-value delimiter expected"),
        }
    }

    fn step_in_object_colon(&mut self, token: Option<Token>) -> Result<(), ParserError> {
        let token = match token {
            Some(t) => t,
            None => return self.fail(ParserError::UnexpectedToken {
                token: "<end of input>".to_string(),
                context: "unterminated object".to_string(),
            }),
        };
        if let Some(value) = simple_value(&token) {
            self.set_pending_value(value);
            self.state = State::InObjectValue;
            return Ok(());
        }
        match token {
            Token::LeftBrace => self.open_nested(
                Container::Object {
                    map: JsonObject::new(),
                    pending_key: None,
                    pending_value: None,
                },
                State::InObjectValue,
                State::InObjectStart,
            ),
            Token::LeftBracket => self.open_nested(Container::Array(Vec::new()), State::InObjectValue, State::InArrayStart),
            other => return self.unexpected(Some(other), "after key-value pair encountered"),
        }
        Ok(())
    }

    fn step_in_object_value(&mut self, token: Option<Token>) -> Result<(), ParserError> {
        match token {
            Some(Token::RightBrace) => {
                self.commit_pending_entry()?;
                self.close_composite()
            }
            Some(Token::Comma) => {
                self.commit_pending_entry()?;
                self.state = State::InObjectDelimiter;
                Ok(())
            }
            other => self.unexpected(other, "after key-value pair encountered"),
        }
    }

    fn step_in_object_delimiter(&mut self, token: Option<Token>) -> Result<(), ParserError> {
        match token {
            Some(Token::String(s)) => {
                self.set_pending_key(s);
                self.state = State::InObjectKey;
                Ok(())
            }
            other => self.unexpected(other, "encountered - object key expected"),
        }
    }

    fn step_end(&mut self, token: Option<Token>) -> Result<(), ParserError> {
        match token {
            None => Ok(()),
            Some(t) => self.unexpected(Some(t), "at end of input"),
        }
    }

    // -- helpers ----------------------------------------------------------

    fn push_array_value(&mut self, value: JsonValue) {
        if let Some(Container::Array(items)) = self.value_stack.last_mut() {
            items.push(value);
        }
    }

    fn set_pending_key(&mut self, key: String) {
        if let Some(Container::Object { pending_key, .. }) = self.value_stack.last_mut() {
            *pending_key = Some(key);
        }
    }

    fn set_pending_value(&mut self, value: JsonValue) {
        if let Some(Container::Object { pending_value, .. }) = self.value_stack.last_mut() {
            *pending_value = Some(value);
        }
    }

    fn commit_pending_entry(&mut self) -> Result<(), ParserError> {
        if let Some(Container::Object {
            map,
            pending_key,
            pending_value,
        }) = self.value_stack.last_mut()
        {
            let key = pending_key.take().ok_or_else(|| {
                ParserError::Internal("object key missing before commit".to_string())
            })?;
            let value = pending_value.take().ok_or_else(|| {
                ParserError::Internal("object value missing before commit".to_string())
            })?;
            map.insert(key, value);
        }
        Ok(())
    }

    fn open_nested(&mut self, container: Container, resume_state: State, enter_state: State) {
        self.state_stack.push(resume_state);
        self.value_stack.push(container);
        self.state = enter_state;
    }

    fn close_composite(&mut self) -> Result<(), ParserError> {
        let container = self
            .value_stack
            .pop()
            .ok_or_else(|| ParserError::Internal("value stack underflow".to_string()))?;
        let value = match container {
            Container::Array(items) => JsonValue::Array(items),
            Container::Object { map, .. } => JsonValue::Object(map),
        };

        if self.value_stack.is_empty() {
            self.parsed = Some(value);
            self.state = State::End;
            return Ok(());
        }

        match self.value_stack.last_mut() {
            Some(Container::Array(items)) => items.push(value),
            Some(Container::Object { pending_value, .. }) => {
                *pending_value = Some(value);
            }
            None => unreachable!("checked non-empty above"),
        }

        self.state = self
            .state_stack
            .pop()
            .ok_or_else(|| ParserError::Internal("state stack underflow".to_string()))?;
        Ok(())
    }
}

fn simple_value(token: &Token) -> Option<JsonValue> {
    match token {
        Token::Null => Some(JsonValue::Null),
        Token::Bool(b) => Some(JsonValue::Bool(*b)),
        Token::String(s) => Some(JsonValue::String(s.clone())),
        Token::Number(lexeme) => Some(JsonValue::Number(crate::json::value::JsonNumber::from_literal(
            lexeme.clone(),
        ))),
        _ => None,
    }
}

/// Convenience one-shot parse, used by response decoding (C2).
pub fn parse(input: &str) -> Result<JsonValue, ParserError> {
    Parser::new(input).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::value::JsonNumber;

    #[test]
    fn parses_nested_object_with_duplicate_keys_collapsing_to_last() {
        let value = parse(r#"{"a":null,"b":false,"a":true,"c":123.5,"a":"foobar"}"#).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(obj.get("a"), Some(&JsonValue::String("foobar".to_string())));
        assert_eq!(obj.get("b"), Some(&JsonValue::Bool(false)));
        assert_eq!(
            obj.get("c"),
            Some(&JsonValue::Number(JsonNumber::from_literal("123.5")))
        );
    }

    #[test]
    fn parses_arrays_of_mixed_values() {
        let value = parse(r#"[1, "two", true, null, [3, 4]]"#).unwrap();
        match value {
            JsonValue::Array(items) => assert_eq!(items.len(), 5),
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn second_parse_call_returns_cached_root() {
        let mut parser = Parser::new("42");
        let first = parser.parse().unwrap();
        let second = parser.parse().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn trailing_tokens_after_root_value_fail() {
        let mut parser = Parser::new("42 43");
        assert!(parser.parse().is_err());
    }

    #[test]
    fn unterminated_object_fails() {
        assert!(parse(r#"{"a":1"#).is_err());
    }

    #[test]
    fn empty_object_and_array_parse() {
        assert_eq!(parse("{}").unwrap().as_object().unwrap().len(), 0);
        assert!(matches!(parse("[]").unwrap(), JsonValue::Array(v) if v.is_empty()));
    }
}
