//! Key index: where each discovered top-level key lives in the source.
//!
//! Entries are kept in discovery order and are never removed. Recording a key
//! that is already present overwrites its range (last write wins) and clears
//! its decoded flag, since the cached value no longer matches the range.

use std::ops::Range;

use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub range: Range<usize>,
    pub decoded: bool,
}

/// Outcome of [`KeyIndex::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    New,
    /// The key was already indexed; its earlier range was replaced.
    Replaced {
        /// Whether the earlier value had been decoded.
        was_decoded: bool,
    },
}

#[derive(Debug, Default)]
pub struct KeyIndex {
    entries: IndexMap<String, IndexEntry>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: String, range: Range<usize>) -> Recorded {
        let entry = IndexEntry {
            range,
            decoded: false,
        };
        match self.entries.insert(key, entry) {
            None => Recorded::New,
            Some(old) => Recorded::Replaced {
                was_decoded: old.decoded,
            },
        }
    }

    /// Discovery position of `key`.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.entries.get_index_of(key)
    }

    pub fn lookup(&self, key: &str) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    /// Key and entry at discovery position `i`.
    pub fn get_index(&self, i: usize) -> Option<(&str, &IndexEntry)> {
        self.entries.get_index(i).map(|(k, e)| (k.as_str(), e))
    }

    /// Sets the decoded flag of an indexed key; unknown keys are ignored.
    pub fn set_decoded(&mut self, key: &str, decoded: bool) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.decoded = decoded;
        }
    }

    pub fn is_decoded(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|e| e.decoded)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
