//! Materializes a single JSON value from a byte slice.
//!
//! The scanner only finds where values begin and end; this module turns one
//! such range into a [`Value`], validating it completely on the way. All
//! offsets in returned errors are absolute, i.e. `base` plus the position
//! inside the slice.

use std::str;

use crate::{
    error::{ParseError, SyntaxError},
    value::{Map, Number, Value},
};

/// Decodes exactly one value from `bytes`, allowing surrounding whitespace.
///
/// # Errors
///
/// A [`ParseError`] for anything that is not a single well-formed value.
pub(crate) fn decode_value(bytes: &[u8], base: usize, max_depth: usize) -> Result<Value, ParseError> {
    let mut decoder = Decoder {
        bytes,
        pos: 0,
        base,
        max_depth,
    };
    decoder.skip_ws();
    let value = decoder.value(0)?;
    decoder.skip_ws();
    if decoder.pos != bytes.len() {
        return Err(decoder.error(SyntaxError::TrailingCharacters));
    }
    Ok(value)
}

/// Decodes the body of a string literal (without its quotes).
pub(crate) fn unescape(body: &[u8], base: usize) -> Result<String, ParseError> {
    let mut decoder = Decoder {
        bytes: body,
        pos: 0,
        base,
        max_depth: 0,
    };
    decoder.string_body(None)
}

pub(crate) fn is_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: usize,
    max_depth: usize,
}

impl Decoder<'_> {
    fn error(&self, kind: SyntaxError) -> ParseError {
        ParseError::new(self.base + self.pos, kind)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn next(&mut self) -> Result<u8, ParseError> {
        let b = self
            .peek()
            .ok_or_else(|| self.error(SyntaxError::UnexpectedEndOfInput))?;
        self.pos += 1;
        Ok(b)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(is_ws) {
            self.pos += 1;
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, ParseError> {
        match self.peek() {
            None => Err(self.error(SyntaxError::UnexpectedEndOfInput)),
            Some(b'{') => self.object(depth + 1),
            Some(b'[') => self.array(depth + 1),
            Some(b'"') => {
                self.pos += 1;
                Ok(Value::String(self.string_body(Some(b'"'))?))
            }
            Some(b't') => self.literal(b"true", Value::Boolean(true)),
            Some(b'f') => self.literal(b"false", Value::Boolean(false)),
            Some(b'n') => self.literal(b"null", Value::Null),
            Some(b'-' | b'0'..=b'9') => self.number().map(Value::Number),
            Some(b) => Err(self.error(SyntaxError::UnexpectedByte(b))),
        }
    }

    fn enter(&self, depth: usize) -> Result<(), ParseError> {
        if depth > self.max_depth {
            return Err(self.error(SyntaxError::NestingTooDeep(self.max_depth)));
        }
        Ok(())
    }

    fn object(&mut self, depth: usize) -> Result<Value, ParseError> {
        self.enter(depth)?;
        self.pos += 1;
        let mut map = Map::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(Value::Object(map));
        }
        loop {
            self.skip_ws();
            if self.peek() != Some(b'"') {
                return Err(self.error(match self.peek() {
                    None => SyntaxError::UnexpectedEndOfInput,
                    Some(_) => SyntaxError::ExpectedKey,
                }));
            }
            self.pos += 1;
            let key = self.string_body(Some(b'"'))?;
            self.skip_ws();
            if self.peek() != Some(b':') {
                return Err(self.error(SyntaxError::ExpectedColon));
            }
            self.pos += 1;
            self.skip_ws();
            let value = self.value(depth)?;
            // Last write wins for repeated keys.
            map.insert(key, value);
            self.skip_ws();
            match self.next()? {
                b',' => {}
                b'}' => return Ok(Value::Object(map)),
                b => {
                    self.pos -= 1;
                    return Err(self.error(SyntaxError::UnexpectedByte(b)));
                }
            }
        }
    }

    fn array(&mut self, depth: usize) -> Result<Value, ParseError> {
        self.enter(depth)?;
        self.pos += 1;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(Value::Array(items));
        }
        loop {
            self.skip_ws();
            items.push(self.value(depth)?);
            self.skip_ws();
            match self.next()? {
                b',' => {}
                b']' => return Ok(Value::Array(items)),
                b => {
                    self.pos -= 1;
                    return Err(self.error(SyntaxError::UnexpectedByte(b)));
                }
            }
        }
    }

    fn literal(&mut self, word: &[u8], value: Value) -> Result<Value, ParseError> {
        if self.bytes[self.pos..].starts_with(word) {
            self.pos += word.len();
            Ok(value)
        } else {
            Err(self.error(SyntaxError::InvalidLiteral))
        }
    }

    fn digits(&mut self) -> usize {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn number(&mut self) -> Result<Number, ParseError> {
        let start = self.pos;
        let invalid = |d: &Self| ParseError::new(d.base + start, SyntaxError::InvalidNumber);

        let negative = self.peek() == Some(b'-');
        if negative {
            self.pos += 1;
        }
        match self.peek() {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => {
                self.digits();
            }
            _ => return Err(invalid(self)),
        }

        let mut integral = true;
        if self.peek() == Some(b'.') {
            integral = false;
            self.pos += 1;
            if self.digits() == 0 {
                return Err(invalid(self));
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            integral = false;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if self.digits() == 0 {
                return Err(invalid(self));
            }
        }

        // The lexeme is ASCII by construction.
        let lexeme = str::from_utf8(&self.bytes[start..self.pos]).map_err(|_| invalid(self))?;
        if integral {
            let exact = if negative {
                lexeme.parse::<i64>().ok().map(Number::from)
            } else {
                lexeme.parse::<u64>().ok().map(Number::PosInt)
            };
            if let Some(n) = exact {
                return Ok(n);
            }
        }
        match lexeme.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Number::Float(n)),
            _ => Err(invalid(self)),
        }
    }

    fn hex4(&mut self) -> Result<u32, ParseError> {
        let mut acc = 0u32;
        for _ in 0..4 {
            let b = self.next()?;
            let d = match b {
                b'0'..=b'9' => b - b'0',
                b'a'..=b'f' => b - b'a' + 10,
                b'A'..=b'F' => b - b'A' + 10,
                _ => {
                    self.pos -= 1;
                    return Err(self.error(SyntaxError::InvalidUnicodeEscapeChar(b)));
                }
            };
            acc = (acc << 4) | u32::from(d);
        }
        Ok(acc)
    }

    /// Decodes a `\u` escape (the `\u` already consumed), joining surrogate
    /// pairs.
    fn unicode_escape(&mut self) -> Result<char, ParseError> {
        let at = self.pos;
        let high = self.hex4()?;
        let code = match high {
            0xD800..=0xDBFF => {
                if self.bytes[self.pos..].starts_with(b"\\u") {
                    self.pos += 2;
                    let low = self.hex4()?;
                    if !(0xDC00..=0xDFFF).contains(&low) {
                        return Err(ParseError::new(
                            self.base + at,
                            SyntaxError::InvalidUnicodeEscapeSequence(high),
                        ));
                    }
                    0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    return Err(ParseError::new(
                        self.base + at,
                        SyntaxError::InvalidUnicodeEscapeSequence(high),
                    ));
                }
            }
            code => code,
        };
        char::from_u32(code).ok_or_else(|| {
            ParseError::new(self.base + at, SyntaxError::InvalidUnicodeEscapeSequence(code))
        })
    }

    /// Decodes string content up to `terminator` (consumed), or to the end of
    /// input when `terminator` is `None`.
    fn string_body(&mut self, terminator: Option<u8>) -> Result<String, ParseError> {
        let mut out = String::new();
        let mut run = self.pos;
        loop {
            let Some(b) = self.peek() else {
                if terminator.is_some() {
                    return Err(self.error(SyntaxError::UnexpectedEndOfInput));
                }
                self.push_run(&mut out, run)?;
                return Ok(out);
            };
            match b {
                b if Some(b) == terminator => {
                    self.push_run(&mut out, run)?;
                    self.pos += 1;
                    return Ok(out);
                }
                b'\\' => {
                    self.push_run(&mut out, run)?;
                    self.pos += 1;
                    let esc = self.next()?;
                    match esc {
                        b'"' => out.push('"'),
                        b'\\' => out.push('\\'),
                        b'/' => out.push('/'),
                        b'b' => out.push('\u{8}'),
                        b'f' => out.push('\u{c}'),
                        b'n' => out.push('\n'),
                        b'r' => out.push('\r'),
                        b't' => out.push('\t'),
                        b'u' => out.push(self.unicode_escape()?),
                        other => {
                            self.pos -= 1;
                            return Err(self.error(SyntaxError::InvalidEscape(other)));
                        }
                    }
                    run = self.pos;
                }
                b if b < 0x20 => return Err(self.error(SyntaxError::ControlCharacterInString(b))),
                _ => self.pos += 1,
            }
        }
    }

    fn push_run(&self, out: &mut String, run: usize) -> Result<(), ParseError> {
        let text = str::from_utf8(&self.bytes[run..self.pos]).map_err(|e| {
            ParseError::new(self.base + run + e.valid_up_to(), SyntaxError::InvalidUtf8)
        })?;
        out.push_str(text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn decode(text: &str) -> Result<Value, ParseError> {
        decode_value(text.as_bytes(), 0, 8)
    }

    #[rstest]
    #[case("1", Value::from(1u64))]
    #[case(" -0 ", Value::from(0i64))]
    #[case("-17", Value::from(-17i64))]
    #[case("18446744073709551615", Value::from(u64::MAX))]
    #[case("18446744073709551616", Value::from(18_446_744_073_709_551_616.0))]
    #[case("2.5e-3", Value::from(0.0025))]
    #[case("1E2", Value::from(100.0))]
    #[case("true", Value::from(true))]
    #[case("null", Value::Null)]
    #[case(r#""two""#, Value::from("two"))]
    #[case(r#""é\n\/""#, Value::from("é\n/"))]
    #[case(r#""😀""#, Value::from("\u{1F600}"))]
    fn scalars(#[case] text: &str, #[case] expected: Value) {
        assert_eq!(decode(text).unwrap(), expected);
    }

    #[test]
    fn nested_duplicates_keep_last() {
        let v = decode(r#"{ "B1": 10, "B2": "abcd", "B1": [ {} , [] ] }"#).unwrap();
        assert_eq!(v.to_string(), r#"{"B1":[{},[]],"B2":"abcd"}"#);
    }

    #[rstest]
    #[case("", SyntaxError::UnexpectedEndOfInput, 0)]
    #[case("tru", SyntaxError::InvalidLiteral, 0)]
    #[case("01", SyntaxError::TrailingCharacters, 1)]
    #[case("1.", SyntaxError::InvalidNumber, 0)]
    #[case("-", SyntaxError::InvalidNumber, 0)]
    #[case("1e400", SyntaxError::InvalidNumber, 0)]
    #[case("[1,]", SyntaxError::UnexpectedByte(b']'), 3)]
    #[case("[1 2]", SyntaxError::UnexpectedByte(b'2'), 3)]
    #[case(r#"{"a" 1}"#, SyntaxError::ExpectedColon, 5)]
    #[case(r#"{1:2}"#, SyntaxError::ExpectedKey, 1)]
    #[case(r#""a\x""#, SyntaxError::InvalidEscape(b'x'), 3)]
    #[case(r#""\u12g4""#, SyntaxError::InvalidUnicodeEscapeChar(b'g'), 5)]
    #[case(r#""\ud800x""#, SyntaxError::InvalidUnicodeEscapeSequence(0xD800), 3)]
    #[case("\"a\tb\"", SyntaxError::ControlCharacterInString(b'\t'), 2)]
    #[case("[[[[[[[[[1]]]]]]]]]", SyntaxError::NestingTooDeep(8), 8)]
    fn malformed(#[case] text: &str, #[case] kind: SyntaxError, #[case] offset: usize) {
        assert_eq!(decode(text).unwrap_err(), ParseError::new(offset, kind));
    }

    #[test]
    fn offsets_are_absolute() {
        let err = decode_value(b"[true, nul]", 100, 8).unwrap_err();
        assert_eq!(err, ParseError::new(107, SyntaxError::InvalidLiteral));
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let err = decode_value(b"\"ab\xFF\"", 0, 8).unwrap_err();
        assert_eq!(err, ParseError::new(3, SyntaxError::InvalidUtf8));
    }

    #[test]
    fn unescape_key_bodies() {
        assert_eq!(unescape(br"aA\\", 0).unwrap(), "aA\\");
        assert_eq!(
            unescape(br"\q", 10).unwrap_err(),
            ParseError::new(11, SyntaxError::InvalidEscape(b'q'))
        );
    }
}
