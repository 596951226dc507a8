//! Lazy, key-indexed reader for JSON documents too large to decode at once.
//!
//! A [`Document`] wraps a byte source (memory, a memory map, or a file read
//! window by window) and walks its top-level object only as far as the caller
//! asks. Keys are indexed with the byte range of their raw value as they are
//! discovered; values are decoded and cached on demand and can be unloaded
//! again, so memory use follows what the caller keeps rather than the size of
//! the document.
//!
//! ```
//! use vastjson::{Document, Value};
//!
//! let mut doc = Document::open(r#"{"id":7,"tags":["a","b"],"blob":{"x":[1,2]}}"#)?;
//! doc.cache_until(Some("tags"), None)?;
//! assert_eq!(doc.value("id")?, &Value::from(7u64));
//! assert_eq!(doc.at_cache("tags")?.as_deref(), Some(r#"["a","b"]"#));
//! assert!(doc.at_cache("blob")?.is_none());
//! # Ok::<(), vastjson::Error>(())
//! ```

#![allow(missing_docs)]

mod cache;
mod decode;
mod document;
mod error;
mod index;
mod options;
mod scanner;
pub mod source;
mod value;

#[cfg(test)]
mod tests;

pub use cache::{EvictionPolicy, Fifo, Manual};
pub use document::{CacheOutcome, Document};
pub use error::{Error, ParseError, SourceError, SyntaxError};
pub use options::{DocumentOptions, OpenMode};
pub use scanner::{Cursor, ScanState};
pub use source::{ByteSource, MemorySource};
pub use value::{Array, Map, Number, Value};
