use std::io;

use thiserror::Error;

/// Everything that can go wrong while operating a [`Document`].
///
/// [`Document`]: crate::Document
#[derive(Error, Debug)]
pub enum Error {
    /// The source could not be opened, or held no JSON at all.
    #[error("cannot initialize document: {reason}")]
    Initialization {
        reason: String,
        #[source]
        source: Option<SourceError>,
    },
    /// Malformed JSON was reached while scanning or decoding.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The key was never cached, or has been unloaded since.
    #[error("key {key:?} is not cached")]
    NotCached { key: String },
    /// The document was closed; no further operations are possible.
    #[error("document has been closed")]
    Closed,
    /// A read against the byte source failed.
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl Error {
    pub(crate) fn init(reason: impl Into<String>) -> Self {
        Self::Initialization {
            reason: reason.into(),
            source: None,
        }
    }
}

/// Failures of the positional byte source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("read of {len} bytes at offset {offset} exceeds source length {source_len}")]
    OutOfRange {
        offset: usize,
        len: usize,
        source_len: usize,
    },
}

/// Malformed JSON, located by absolute byte offset in the source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} at byte {offset}")]
pub struct ParseError {
    pub offset: usize,
    pub kind: SyntaxError,
}

impl ParseError {
    pub(crate) fn new(offset: usize, kind: SyntaxError) -> Self {
        Self { offset, kind }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("unexpected byte {}", show_byte(.0))]
    UnexpectedByte(u8),
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    #[error("invalid literal")]
    InvalidLiteral,
    #[error("invalid number")]
    InvalidNumber,
    #[error("invalid escape character {}", show_byte(.0))]
    InvalidEscape(u8),
    #[error("invalid unicode escape sequence at character {}", show_byte(.0))]
    InvalidUnicodeEscapeChar(u8),
    #[error("invalid unicode escape sequence \\u{0:04X}")]
    InvalidUnicodeEscapeSequence(u32),
    #[error("unescaped control character {} in string", show_byte(.0))]
    ControlCharacterInString(u8),
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,
    #[error("mismatched closing delimiter")]
    MismatchedDelimiter,
    #[error("nesting deeper than {0} levels")]
    NestingTooDeep(usize),
    #[error("trailing characters after value")]
    TrailingCharacters,
    #[error("expected ':' after object key")]
    ExpectedColon,
    #[error("expected string key")]
    ExpectedKey,
}

fn show_byte(byte: &u8) -> String {
    if byte.is_ascii_graphic() {
        format!("'{}'", *byte as char)
    } else {
        format!("0x{byte:02X}")
    }
}
