//! Textual format for values.
//!
//! The format is whitespace-separated and line-friendly:
//! `#nil`, `#t`/`#f`, decimal integers, `[0x.. 0x..]` blobs, `"..."`
//! strings with `\\` and `\"` escapes, bare identifiers for symbols, and
//! parenthesized proper lists. Every constructible value parses back to an
//! equal value, with one caveat: a symbol whose text is all digits reads
//! back as an integer.

use crate::symbol::{Symbol, SymbolError};
use crate::value::Value;
use thiserror::Error;

/// Error while parsing value text. Carries the byte offset of the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueParseError {
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },

    #[error("unknown special token {token:?} at offset {offset}")]
    UnknownSpecial { token: String, offset: usize },

    #[error("malformed blob byte {token:?} at offset {offset}")]
    MalformedByte { token: String, offset: usize },

    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("integer out of range at offset {offset}: {token:?}")]
    IntOutOfRange { token: String, offset: usize },

    #[error("trailing input at offset {offset}")]
    TrailingInput { offset: usize },

    #[error("invalid symbol at offset {offset}: {source}")]
    BadSymbol {
        offset: usize,
        #[source]
        source: SymbolError,
    },
}

pub type ParseResult<T> = Result<T, ValueParseError>;

/// Parse exactly one value from `text`, requiring only whitespace after it.
pub fn parse_value(text: &str) -> ParseResult<Value> {
    let mut scanner = Scanner::new(text);
    let v = scanner.parse_value()?;
    scanner.finish()?;
    Ok(v)
}

/// Cursor over value text. Used directly by the corpus reader, which
/// interleaves value parsing with its own line structure.
pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Scanner<'a> {
        Scanner { src, pos: 0 }
    }

    /// Current byte offset into the source.
    pub fn offset(&self) -> usize {
        self.pos
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    pub fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos == self.src.len()
    }

    /// Require end of input (modulo trailing whitespace).
    pub fn finish(&mut self) -> ParseResult<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(ValueParseError::TrailingInput { offset: self.pos })
        }
    }

    /// Require and consume `expected` as the next non-whitespace character.
    pub fn expect(&mut self, expected: char) -> ParseResult<()> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c == expected => {
                self.advance();
                Ok(())
            }
            Some(c) => Err(ValueParseError::UnexpectedChar {
                found: c,
                offset: self.pos,
            }),
            None => Err(ValueParseError::UnexpectedEof { offset: self.pos }),
        }
    }

    fn is_ident_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_'
    }

    /// Read a bare `[A-Za-z0-9_]+` token.
    fn ident_token(&mut self) -> ParseResult<&'a str> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if Self::is_ident_char(c) {
                self.advance();
            } else {
                break;
            }
        }
        if self.pos == start {
            return match self.peek() {
                Some(c) => Err(ValueParseError::UnexpectedChar {
                    found: c,
                    offset: self.pos,
                }),
                None => Err(ValueParseError::UnexpectedEof { offset: self.pos }),
            };
        }
        Ok(&self.src[start..self.pos])
    }

    /// Parse a bare identifier as a symbol.
    pub fn parse_symbol(&mut self) -> ParseResult<Symbol> {
        let start = self.pos;
        let token = self.ident_token()?;
        Symbol::new(token).map_err(|source| ValueParseError::BadSymbol {
            offset: start,
            source,
        })
    }

    /// Parse one value.
    pub fn parse_value(&mut self) -> ParseResult<Value> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(ValueParseError::UnexpectedEof { offset: self.pos }),
            Some('(') => self.parse_list(),
            Some('[') => self.parse_blob(),
            Some('"') => self.parse_string(),
            Some('#') => self.parse_special(),
            Some(c) if c == '-' || Self::is_ident_char(c) => self.parse_atom(),
            Some(c) => Err(ValueParseError::UnexpectedChar {
                found: c,
                offset: self.pos,
            }),
        }
    }

    fn parse_list(&mut self) -> ParseResult<Value> {
        self.expect('(')?;
        let mut elems = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(')') => {
                    self.advance();
                    return Ok(Value::list(elems));
                }
                Some(_) => elems.push(self.parse_value()?),
                None => return Err(ValueParseError::UnexpectedEof { offset: self.pos }),
            }
        }
    }

    fn parse_blob(&mut self) -> ParseResult<Value> {
        self.expect('[')?;
        let mut bytes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(']') => {
                    self.advance();
                    return Ok(Value::blob(bytes));
                }
                Some(_) => bytes.push(self.parse_byte()?),
                None => return Err(ValueParseError::UnexpectedEof { offset: self.pos }),
            }
        }
    }

    fn parse_byte(&mut self) -> ParseResult<u8> {
        let start = self.pos;
        let token = self.ident_token()?;
        let malformed = || ValueParseError::MalformedByte {
            token: token.to_string(),
            offset: start,
        };
        let digits = token.strip_prefix("0x").ok_or_else(malformed)?;
        if digits.is_empty() || digits.len() > 2 {
            return Err(malformed());
        }
        u8::from_str_radix(digits, 16).map_err(|_| malformed())
    }

    fn parse_string(&mut self) -> ParseResult<Value> {
        let start = self.pos;
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(Value::string(out)),
                Some('\\') => match self.advance() {
                    Some(escaped) => out.push(escaped),
                    None => return Err(ValueParseError::UnterminatedString { offset: start }),
                },
                Some(c) => out.push(c),
                None => return Err(ValueParseError::UnterminatedString { offset: start }),
            }
        }
    }

    fn parse_special(&mut self) -> ParseResult<Value> {
        let start = self.pos;
        self.advance(); // consume '#'
        let mut token = String::from("#");
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() {
                token.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match token.as_str() {
            "#t" => Ok(Value::bool(true)),
            "#f" => Ok(Value::bool(false)),
            "#nil" => Ok(Value::nil()),
            _ => Err(ValueParseError::UnknownSpecial {
                token,
                offset: start,
            }),
        }
    }

    /// An integer or a symbol: read the full token, then decide.
    fn parse_atom(&mut self) -> ParseResult<Value> {
        let start = self.pos;
        let negative = self.peek() == Some('-');
        if negative {
            self.advance();
        }
        let token = self.ident_token()?;
        let is_integer = token.chars().all(|c| c.is_ascii_digit());
        if is_integer {
            let full = &self.src[start..self.pos];
            return full
                .parse::<i64>()
                .map(Value::int64)
                .map_err(|_| ValueParseError::IntOutOfRange {
                    token: full.to_string(),
                    offset: start,
                });
        }
        if negative {
            return Err(ValueParseError::UnexpectedChar {
                found: '-',
                offset: start,
            });
        }
        Symbol::new(token)
            .map(Value::sym)
            .map_err(|source| ValueParseError::BadSymbol {
                offset: start,
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: &Value) {
        let text = v.to_string();
        let parsed = parse_value(&text).unwrap_or_else(|e| panic!("parse {:?}: {}", text, e));
        assert_eq!(&parsed, v, "round-trip of {}", text);
    }

    #[test]
    fn test_scalar_roundtrips() {
        roundtrip(&Value::nil());
        roundtrip(&Value::bool(true));
        roundtrip(&Value::bool(false));
        roundtrip(&Value::int64(0));
        roundtrip(&Value::int64(-93));
        roundtrip(&Value::int64(i64::MAX));
        roundtrip(&Value::int64(i64::MIN));
        roundtrip(&Value::sym(Symbol::new("a_b_9").unwrap()));
        roundtrip(&Value::blob(Vec::<u8>::new()));
        roundtrip(&Value::blob(vec![0, 1, 0x7f, 0xff]));
        roundtrip(&Value::string(""));
        roundtrip(&Value::string("with \"quotes\" and \\slashes\\"));
    }

    #[test]
    fn test_nested_roundtrip() {
        let inner = Value::list([
            Value::sym(Symbol::new("add").unwrap()),
            Value::int64(1),
            Value::nil(),
        ]);
        let outer = Value::list([
            Value::sym(Symbol::new("expr").unwrap()),
            inner,
            Value::string("x"),
            Value::blob(vec![0xab]),
        ]);
        roundtrip(&outer);
    }

    #[test]
    fn test_whitespace_insensitive() {
        let a = parse_value("(add 1 2)").unwrap();
        let b = parse_value("  ( add\n  1\t2 )\n").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_digit_leading_symbol() {
        // A token with a leading digit but later letters is a symbol.
        let v = parse_value("0abc").unwrap();
        assert_eq!(v.as_sym().unwrap().as_str(), "0abc");
    }

    #[test]
    fn test_parse_errors_carry_offset() {
        match parse_value("(add 1") {
            Err(ValueParseError::UnexpectedEof { offset }) => assert_eq!(offset, 6),
            other => panic!("expected eof error, got {:?}", other),
        }
        match parse_value("#maybe") {
            Err(ValueParseError::UnknownSpecial { token, offset }) => {
                assert_eq!(token, "#maybe");
                assert_eq!(offset, 0);
            }
            other => panic!("expected special error, got {:?}", other),
        }
        match parse_value("[0xgg]") {
            Err(ValueParseError::MalformedByte { .. }) => {}
            other => panic!("expected byte error, got {:?}", other),
        }
        match parse_value("1 2") {
            Err(ValueParseError::TrailingInput { .. }) => {}
            other => panic!("expected trailing error, got {:?}", other),
        }
    }

    #[test]
    fn test_int_out_of_range() {
        match parse_value("99999999999999999999") {
            Err(ValueParseError::IntOutOfRange { .. }) => {}
            other => panic!("expected range error, got {:?}", other),
        }
    }

    #[test]
    fn test_scanner_symbol_then_value() {
        let mut s = Scanner::new("  res = (expr 3) ");
        let name = s.parse_symbol().unwrap();
        assert_eq!(name.as_str(), "res");
        s.expect('=').unwrap();
        let v = s.parse_value().unwrap();
        assert_eq!(v.to_string(), "(expr 3)");
        s.finish().unwrap();
    }
}
