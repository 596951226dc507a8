//! The document handle: one byte source, its scanner, key index and entry
//! cache, with a single owner.
//!
//! A [`Document`] is open from the moment a constructor returns `Ok` until
//! [`Document::close`] is called or it is dropped. Every operation on a
//! closed document fails with [`Error::Closed`]; closing twice is a no-op.
//!
//! Keys are visited in document order. `cache_until` keeps a walk position in
//! that order: keys behind it have been offered to the cache once already and
//! are only decoded again when named explicitly as the target.

use std::path::Path;

use bstr::BString;
use tracing::{debug, trace, warn};

use crate::{
    cache::{EntryCache, EvictionPolicy},
    error::{Error, ParseError},
    index::{KeyIndex, Recorded},
    options::DocumentOptions,
    scanner::{Cursor, Scanner},
    source::{self, ByteSource, MemorySource},
    value::Value,
};

/// Result of a [`Document::cache_until`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheOutcome {
    /// Entries decoded and added to the cache by this call.
    pub cached: usize,
    /// Whether the end of the document was reached.
    pub exhausted: bool,
}

/// A lazily parsed JSON document.
///
/// # Examples
///
/// ```
/// use vastjson::Document;
///
/// let mut doc = Document::open(r#"{"a":1,"b":"two","c":[1,2,3]}"#)?;
/// assert_eq!(doc.size()?, 3);
///
/// doc.cache_until(None, Some(1))?;
/// assert_eq!(doc.cache_size()?, 1);
/// assert_eq!(doc.at_cache("a")?.as_deref(), Some("1"));
/// assert_eq!(doc.at_cache("b")?, None);
///
/// doc.cache_until(Some("c"), None)?;
/// assert_eq!(doc.at_cache("c")?.as_deref(), Some("[1,2,3]"));
/// assert_eq!(doc.cache_size()?, 3);
///
/// doc.unload("a")?;
/// assert_eq!(doc.cache_size()?, 2);
/// assert_eq!(doc.size()?, 3);
/// # Ok::<(), vastjson::Error>(())
/// ```
#[derive(Debug)]
pub struct Document {
    inner: Option<Open>,
}

#[derive(Debug)]
struct Open {
    source: Box<dyn ByteSource>,
    scanner: Scanner,
    index: KeyIndex,
    cache: EntryCache,
    /// Position in `index` order up to which `cache_until` has walked.
    walked: usize,
}

impl Document {
    /// Opens in-memory JSON text with default options.
    ///
    /// # Errors
    ///
    /// [`Error::Initialization`] if `text` is empty or only whitespace.
    pub fn open(text: impl Into<Vec<u8>>) -> Result<Self, Error> {
        Self::open_with(text, DocumentOptions::default())
    }

    /// Opens in-memory JSON text.
    ///
    /// # Errors
    ///
    /// See [`Document::open`].
    pub fn open_with(text: impl Into<Vec<u8>>, options: DocumentOptions) -> Result<Self, Error> {
        Self::from_source(MemorySource::new(text.into()), options)
    }

    /// Opens a file using the access policy in `options.mode`.
    ///
    /// # Errors
    ///
    /// [`Error::Initialization`] if the file is missing, unreadable or holds
    /// no JSON.
    pub fn open_path(path: impl AsRef<Path>, options: DocumentOptions) -> Result<Self, Error> {
        let source = source::open_file(path.as_ref(), options.mode)?;
        Self::from_boxed(source, options)
    }

    /// Opens any [`ByteSource`].
    ///
    /// # Errors
    ///
    /// See [`Document::open`].
    pub fn from_source(source: impl ByteSource + 'static, options: DocumentOptions) -> Result<Self, Error> {
        Self::from_boxed(Box::new(source), options)
    }

    fn from_boxed(mut source: Box<dyn ByteSource>, options: DocumentOptions) -> Result<Self, Error> {
        if source.is_empty() {
            return Err(Error::init("source is empty"));
        }
        let mut scanner = Scanner::new(options.window_size, options.max_depth);
        let has_content = scanner.has_content(source.as_mut()).map_err(|err| match err {
            Error::Source(source) => Error::Initialization {
                reason: "source is unreadable".into(),
                source: Some(source),
            },
            other => other,
        })?;
        if !has_content {
            return Err(Error::init("source holds only whitespace"));
        }
        debug!(
            source = source.kind(),
            len = source.len(),
            window = options.window_size,
            "opened document"
        );
        Ok(Self {
            inner: Some(Open {
                source,
                scanner,
                index: KeyIndex::new(),
                cache: EntryCache::default(),
                walked: 0,
            }),
        })
    }

    /// Replaces the eviction policy. The default never evicts.
    ///
    /// Entries already cached are admitted to the new policy in the order
    /// they were cached, so it may evict the oldest of them right away.
    #[must_use]
    pub fn with_policy(mut self, policy: Box<dyn EvictionPolicy>) -> Self {
        if let Some(open) = &mut self.inner {
            for victim in open.cache.set_policy(policy) {
                open.index.set_decoded(&victim, false);
                debug!(key = %victim, "evicted by policy");
            }
        }
        self
    }

    /// Releases the source and all cached and indexed data. Closing an
    /// already closed document does nothing.
    pub fn close(&mut self) {
        if let Some(open) = self.inner.take() {
            debug!(
                source = open.source.kind(),
                indexed = open.index.count(),
                cached = open.cache.size(),
                "closed document"
            );
        }
    }

    /// `true` once [`close`](Document::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    fn open_ref(&self) -> Result<&Open, Error> {
        self.inner.as_ref().ok_or(Error::Closed)
    }

    fn open_mut(&mut self) -> Result<&mut Open, Error> {
        self.inner.as_mut().ok_or(Error::Closed)
    }

    /// Number of top-level keys in the document.
    ///
    /// Scans the rest of the document on first call, indexing keys without
    /// decoding their values. A document whose root is not an object has
    /// size 1.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] if malformed structure is reached before the end.
    pub fn size(&mut self) -> Result<usize, Error> {
        let open = self.open_mut()?;
        while let Some((key, recorded)) = open.scan_one()? {
            if recorded == (Recorded::Replaced { was_decoded: true }) {
                open.decode_key(&key)?;
            }
        }
        Ok(open.index.count())
    }

    /// Number of entries currently cached. Never exceeds [`size`].
    ///
    /// [`size`]: Document::size
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] only.
    pub fn cache_size(&self) -> Result<usize, Error> {
        Ok(self.open_ref()?.cache.size())
    }

    /// Decodes and caches keys in document order until a bound is hit.
    ///
    /// - `target`: stop once this key has been cached.
    /// - `count`: stop once this many keys have been newly cached.
    ///
    /// With both bounds set, whichever is reached first wins; with neither,
    /// the rest of the document is cached. Keys already cached are skipped
    /// and do not count. A target the walk has already passed (for example
    /// one that was unloaded) is decoded straight from its recorded range.
    /// Reaching the end of the document first is not an error.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] if malformed JSON is reached before a bound is
    /// satisfied. Entries cached before the error stay cached.
    pub fn cache_until(&mut self, target: Option<&str>, count: Option<usize>) -> Result<CacheOutcome, Error> {
        let open = self.open_mut()?;
        let mut outcome = CacheOutcome::default();
        if count == Some(0) {
            outcome.exhausted = open.scanner.is_finished() && open.walked == open.index.count();
            return Ok(outcome);
        }

        if let Some(key) = target {
            if open.index.position(key).is_some_and(|pos| pos < open.walked) {
                if !open.index.is_decoded(key) {
                    open.decode_key(key)?;
                    outcome.cached = 1;
                }
                outcome.exhausted = open.scanner.is_finished() && open.walked == open.index.count();
                return Ok(outcome);
            }
        }

        loop {
            if count.is_some_and(|n| outcome.cached >= n) {
                break;
            }
            let (key, advances) = if let Some((key, _)) = open.index.get_index(open.walked) {
                (key.to_string(), true)
            } else {
                match open.scan_one()? {
                    Some((key, recorded)) => (key, recorded == Recorded::New),
                    None => {
                        outcome.exhausted = true;
                        break;
                    }
                }
            };
            if !open.index.is_decoded(&key) {
                open.decode_key(&key)?;
                outcome.cached += 1;
            }
            if advances {
                open.walked += 1;
            }
            if target == Some(key.as_str()) {
                break;
            }
        }

        debug!(
            key = ?target,
            ?count,
            cached = outcome.cached,
            exhausted = outcome.exhausted,
            "cache_until finished"
        );
        Ok(outcome)
    }

    /// The cached value of `key` as compact JSON text, or `None` if it is not
    /// cached. Never scans.
    ///
    /// The returned string is a copy; the cache keeps its own value.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] only.
    pub fn at_cache(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.open_ref()?.cache.get(key).map(Value::to_string))
    }

    /// The cached structured value of `key`. Never scans.
    ///
    /// # Errors
    ///
    /// [`Error::NotCached`] if the key is not cached.
    pub fn value(&self, key: &str) -> Result<&Value, Error> {
        self.open_ref()?
            .cache
            .get(key)
            .ok_or_else(|| Error::NotCached { key: key.into() })
    }

    /// Like [`value`], but caches the key first if needed.
    ///
    /// Returns `Ok(None)` if the document has no such key.
    ///
    /// [`value`]: Document::value
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] if malformed JSON is reached while looking for it.
    pub fn fetch(&mut self, key: &str) -> Result<Option<&Value>, Error> {
        if self.open_ref()?.cache.get(key).is_none() {
            self.cache_until(Some(key), None)?;
        }
        Ok(self.open_ref()?.cache.get(key))
    }

    /// Evicts `key` from the cache. Its index entry is kept, so caching it
    /// again reads straight from its recorded range. Unloading a key that is
    /// not cached does nothing.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] only.
    pub fn unload(&mut self, key: &str) -> Result<(), Error> {
        let open = self.open_mut()?;
        if open.cache.evict(key).is_some() {
            open.index.set_decoded(key, false);
            trace!(%key, "unloaded");
        }
        Ok(())
    }

    /// `true` until the scanner has reached the end of the document.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] only.
    pub fn is_pending(&self) -> Result<bool, Error> {
        Ok(!self.open_ref()?.scanner.is_finished())
    }

    /// The parse error that stopped scanning, if one was hit.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] only.
    pub fn parse_failure(&self) -> Result<Option<&ParseError>, Error> {
        Ok(self.open_ref()?.scanner.failure())
    }

    /// Where scanning will resume.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] only.
    pub fn cursor(&self) -> Result<Cursor, Error> {
        Ok(self.open_ref()?.scanner.cursor())
    }

    /// Keys indexed so far, in the order they were discovered.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] only.
    pub fn keys(&self) -> Result<impl Iterator<Item = &str>, Error> {
        Ok(self.open_ref()?.index.keys())
    }

    /// Cached entries, ordered by key.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] only.
    pub fn cached(&self) -> Result<impl Iterator<Item = (&str, &Value)>, Error> {
        Ok(self.open_ref()?.cache.iter())
    }

    /// The undecoded source bytes of an indexed key, or `None` if the key
    /// has not been indexed. Never scans.
    ///
    /// # Errors
    ///
    /// [`Error::Source`] if the read fails.
    pub fn raw(&mut self, key: &str) -> Result<Option<BString>, Error> {
        let open = self.open_mut()?;
        let Some(entry) = open.index.lookup(key) else {
            return Ok(None);
        };
        let range = entry.range.clone();
        let bytes = open.source.read(range.start, range.len())?;
        Ok(Some(BString::from(bytes.into_owned())))
    }
}

impl Open {
    /// Advances the scanner by one key and records it in the index.
    fn scan_one(&mut self) -> Result<Option<(String, Recorded)>, Error> {
        let found = match self.scanner.scan_next_key(self.source.as_mut()) {
            Ok(Some(found)) => found,
            Ok(None) => {
                self.scanner.release();
                return Ok(None);
            }
            Err(err) => {
                if let Error::Parse(parse) = &err {
                    warn!(offset = parse.offset, error = %parse.kind, "scanning stopped");
                }
                return Err(err);
            }
        };
        let recorded = self.index.record(found.key.clone(), found.range);
        if let Recorded::Replaced { was_decoded } = recorded {
            warn!(key = %found.key, "duplicate key, the later value wins");
            if was_decoded {
                self.cache.evict(&found.key);
            }
        }
        Ok(Some((found.key, recorded)))
    }

    /// Decodes an indexed key from its range into the cache.
    fn decode_key(&mut self, key: &str) -> Result<(), Error> {
        let Some(entry) = self.index.lookup(key) else {
            return Ok(());
        };
        let range = entry.range.clone();
        let value = self.scanner.decode_range(self.source.as_mut(), range)?;
        for victim in self.cache.populate(key.to_string(), value) {
            self.index.set_decoded(&victim, false);
            debug!(key = %victim, "evicted by policy");
        }
        self.index.set_decoded(key, true);
        Ok(())
    }
}
