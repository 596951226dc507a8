//! Scanner: resumable walk over the top-level keys of a document.
//!
//! The scanner recognizes just enough structure to find each top-level key
//! and the byte range of its value: strings are skipped with escape
//! awareness, brackets are matched, scalars are skipped to the next
//! delimiter. Values are not decoded here; [`Scanner::decode_range`] does
//! that on request, from the recorded range.
//!
//! State
//! - `pos` is the absolute byte offset of the next unread byte.
//! - `state` says what the top-level structure expects at `pos`.
//! - A parse error is sticky: the scanner stays parked before the malformed
//!   key and reports the same error on every further call. Keys returned
//!   before the error remain valid.
//!
//! A document whose root is not an object yields a single key, `""`, whose
//! range covers the whole root value.

mod window;

#[cfg(test)]
mod tests;

use std::ops::Range;

use tracing::trace;
use window::Window;

use crate::{
    decode::{self, is_ws},
    error::{Error, ParseError, SyntaxError},
    source::ByteSource,
    value::Value,
};

/// What the top-level structure expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Nothing read yet.
    Start,
    /// Just after the root `{`: a key or `}`.
    FirstKey,
    /// After a value: `,` or `}`.
    NextKey,
    /// The root value has been fully read.
    Finished,
}

/// A resumable scan position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub offset: usize,
    pub state: ScanState,
}

/// One top-level key and where its raw value lives in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedKey {
    pub key: String,
    pub range: Range<usize>,
}

#[derive(Debug)]
pub struct Scanner {
    pos: usize,
    state: ScanState,
    failure: Option<ParseError>,
    max_depth: usize,
    window: Window,
}

impl Scanner {
    pub fn new(window_size: usize, max_depth: usize) -> Self {
        Self {
            pos: 0,
            state: ScanState::Start,
            failure: None,
            max_depth,
            window: Window::new(window_size),
        }
    }

    pub fn cursor(&self) -> Cursor {
        Cursor {
            offset: self.pos,
            state: self.state,
        }
    }

    /// `true` once the root value has been read to its end.
    pub fn is_finished(&self) -> bool {
        self.state == ScanState::Finished
    }

    /// The error that stopped scanning, if any.
    pub fn failure(&self) -> Option<&ParseError> {
        self.failure.as_ref()
    }

    /// Advances to the next top-level key.
    ///
    /// Returns `Ok(None)` once the root value is exhausted.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] for malformed structure (sticky), or
    /// [`Error::Source`] if reading fails. On error the cursor is left where
    /// this call started.
    pub fn scan_next_key(&mut self, src: &mut dyn ByteSource) -> Result<Option<ScannedKey>, Error> {
        if let Some(err) = &self.failure {
            return Err(err.clone().into());
        }
        let saved = (self.pos, self.state);
        let result = self.step(src);
        if let Err(err) = &result {
            (self.pos, self.state) = saved;
            if let Error::Parse(parse) = err {
                self.failure = Some(parse.clone());
            }
        }
        result
    }

    /// Reads the bytes of `range` and decodes them into a [`Value`].
    ///
    /// # Errors
    ///
    /// [`Error::Source`] if the range is out of bounds or unreadable, and
    /// [`Error::Parse`] if the bytes are not exactly one JSON value.
    pub fn decode_range(&self, src: &mut dyn ByteSource, range: Range<usize>) -> Result<Value, Error> {
        let bytes = src.read(range.start, range.len())?;
        let value = decode::decode_value(&bytes, range.start, self.max_depth)?;
        trace!(start = range.start, end = range.end, "decoded value");
        Ok(value)
    }

    /// Releases the scratch window.
    pub fn release(&mut self) {
        self.window.clear();
    }

    /// Skips leading whitespace and reports whether any byte follows it.
    ///
    /// Only meaningful before the first key has been scanned.
    ///
    /// # Errors
    ///
    /// [`Error::Source`] if reading fails.
    pub fn has_content(&mut self, src: &mut dyn ByteSource) -> Result<bool, Error> {
        if self.state != ScanState::Start {
            return Ok(true);
        }
        self.skip_ws(src)?;
        Ok(self.peek(src)?.is_some())
    }

    fn step(&mut self, src: &mut dyn ByteSource) -> Result<Option<ScannedKey>, Error> {
        match self.state {
            ScanState::Finished => Ok(None),
            ScanState::Start => {
                self.skip_ws(src)?;
                match self.peek(src)? {
                    None => Err(self.error(SyntaxError::UnexpectedEndOfInput)),
                    Some(b'{') => {
                        self.pos += 1;
                        self.state = ScanState::FirstKey;
                        self.step(src)
                    }
                    Some(_) => {
                        let start = self.pos;
                        self.skip_value(src)?;
                        let range = start..self.pos;
                        self.finish_root(src)?;
                        Ok(Some(ScannedKey {
                            key: String::new(),
                            range,
                        }))
                    }
                }
            }
            ScanState::FirstKey => {
                self.skip_ws(src)?;
                if self.peek(src)? == Some(b'}') {
                    self.pos += 1;
                    self.finish_root(src)?;
                    return Ok(None);
                }
                self.entry(src).map(Some)
            }
            ScanState::NextKey => {
                self.skip_ws(src)?;
                match self.peek(src)? {
                    Some(b',') => {
                        self.pos += 1;
                        self.skip_ws(src)?;
                        self.entry(src).map(Some)
                    }
                    Some(b'}') => {
                        self.pos += 1;
                        self.finish_root(src)?;
                        Ok(None)
                    }
                    Some(b) => Err(self.error(SyntaxError::UnexpectedByte(b))),
                    None => Err(self.error(SyntaxError::UnexpectedEndOfInput)),
                }
            }
        }
    }

    /// Reads `"key" : value` with `pos` at the opening quote.
    fn entry(&mut self, src: &mut dyn ByteSource) -> Result<ScannedKey, Error> {
        match self.peek(src)? {
            Some(b'"') => {}
            Some(_) => return Err(self.error(SyntaxError::ExpectedKey)),
            None => return Err(self.error(SyntaxError::UnexpectedEndOfInput)),
        }
        let body_start = self.pos + 1;
        let mut raw = Vec::new();
        self.skip_string(src, Some(&mut raw))?;
        let key = decode::unescape(&raw, body_start)?;

        self.skip_ws(src)?;
        if self.peek(src)? != Some(b':') {
            return Err(self.error(SyntaxError::ExpectedColon));
        }
        self.pos += 1;
        self.skip_ws(src)?;

        let start = self.pos;
        self.skip_value(src)?;
        self.state = ScanState::NextKey;
        trace!(%key, start, end = self.pos, "indexed key");
        Ok(ScannedKey {
            key,
            range: start..self.pos,
        })
    }

    fn finish_root(&mut self, src: &mut dyn ByteSource) -> Result<(), Error> {
        self.skip_ws(src)?;
        if self.peek(src)?.is_some() {
            return Err(self.error(SyntaxError::TrailingCharacters));
        }
        self.state = ScanState::Finished;
        Ok(())
    }

    /// Skips one complete value, matching brackets without decoding content.
    fn skip_value(&mut self, src: &mut dyn ByteSource) -> Result<(), Error> {
        let mut closers: Vec<u8> = Vec::new();
        loop {
            self.skip_ws(src)?;
            let Some(b) = self.peek(src)? else {
                return Err(self.error(SyntaxError::UnexpectedEndOfInput));
            };
            match b {
                b'"' => self.skip_string(src, None)?,
                b'{' | b'[' => {
                    if closers.len() >= self.max_depth {
                        return Err(self.error(SyntaxError::NestingTooDeep(self.max_depth)));
                    }
                    closers.push(if b == b'{' { b'}' } else { b']' });
                    self.pos += 1;
                    continue;
                }
                b'}' | b']' if !closers.is_empty() => {
                    if closers.pop() != Some(b) {
                        return Err(self.error(SyntaxError::MismatchedDelimiter));
                    }
                    self.pos += 1;
                }
                b',' | b':' if !closers.is_empty() => {
                    self.pos += 1;
                    continue;
                }
                b'-' | b'0'..=b'9' | b't' | b'f' | b'n' => self.skip_scalar(src)?,
                _ => return Err(self.error(SyntaxError::UnexpectedByte(b))),
            }
            if closers.is_empty() {
                return Ok(());
            }
        }
    }

    fn skip_scalar(&mut self, src: &mut dyn ByteSource) -> Result<(), Error> {
        while let Some(b) = self.peek(src)? {
            if is_ws(b) || matches!(b, b',' | b':' | b'}' | b']' | b'{' | b'[' | b'"') {
                break;
            }
            self.pos += 1;
        }
        Ok(())
    }

    /// Skips a string literal with `pos` at its opening quote, optionally
    /// capturing the raw body.
    fn skip_string(&mut self, src: &mut dyn ByteSource, mut capture: Option<&mut Vec<u8>>) -> Result<(), Error> {
        self.pos += 1;
        loop {
            let Some(b) = self.peek(src)? else {
                return Err(self.error(SyntaxError::UnexpectedEndOfInput));
            };
            match b {
                b'"' => {
                    self.pos += 1;
                    return Ok(());
                }
                b'\\' => {
                    self.pos += 1;
                    let Some(esc) = self.peek(src)? else {
                        return Err(self.error(SyntaxError::UnexpectedEndOfInput));
                    };
                    if let Some(raw) = capture.as_deref_mut() {
                        raw.extend_from_slice(&[b'\\', esc]);
                    }
                }
                b if b < 0x20 => return Err(self.error(SyntaxError::ControlCharacterInString(b))),
                b => {
                    if let Some(raw) = capture.as_deref_mut() {
                        raw.push(b);
                    }
                }
            }
            self.pos += 1;
        }
    }

    fn skip_ws(&mut self, src: &mut dyn ByteSource) -> Result<(), Error> {
        while self.peek(src)?.is_some_and(is_ws) {
            self.pos += 1;
        }
        Ok(())
    }

    #[inline]
    fn peek(&mut self, src: &mut dyn ByteSource) -> Result<Option<u8>, Error> {
        Ok(self.window.byte_at(src, self.pos)?)
    }

    fn error(&self, kind: SyntaxError) -> Error {
        ParseError::new(self.pos, kind).into()
    }
}
