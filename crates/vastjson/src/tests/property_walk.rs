use quickcheck::QuickCheck;

use super::arbitrary::Object;
use crate::{Document, DocumentOptions, Value};

fn tests() -> u64 {
    #[cfg(not(miri))]
    let tests = if is_ci::cached() { 2_000 } else { 300 };
    #[cfg(miri)]
    let tests = 10;
    tests
}

fn options(window: u8) -> DocumentOptions {
    DocumentOptions {
        window_size: usize::from(window % 16) + 1,
        ..Default::default()
    }
}

/// Property: caching an object in batches of any size, through any window
/// size, yields exactly the entries of the object it was rendered from.
#[test]
fn batched_walk_reproduces_object() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(object: Object, window: u8, batch: u8) -> bool {
        let text = Value::Object(object.0.clone()).to_string();
        let mut doc = Document::open_with(text, options(window)).unwrap();
        let batch = usize::from(batch % 4) + 1;

        loop {
            let outcome = doc.cache_until(None, Some(batch)).unwrap();
            assert!(outcome.cached <= batch);
            assert!(doc.cache_size().unwrap() <= doc.keys().unwrap().count());
            if outcome.exhausted {
                break;
            }
        }
        let cached: Vec<(String, Value)> = doc
            .cached()
            .unwrap()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let expected: Vec<(String, Value)> = object.0.into_iter().collect();
        !doc.is_pending().unwrap() && cached == expected && doc.size().unwrap() == expected.len()
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Object, u8, u8) -> bool);
}

/// Property: unloading a key and caching it again by name restores the same
/// value and leaves the index untouched.
#[test]
fn unload_then_recache_is_stable() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(object: Object, pick: usize) -> bool {
        if object.0.is_empty() {
            return true;
        }
        let text = Value::Object(object.0.clone()).to_string();
        let mut doc = Document::open(text).unwrap();
        let size = doc.size().unwrap();
        doc.cache_until(None, None).unwrap();

        let (key, value) = object.0.iter().nth(pick % object.0.len()).unwrap();
        let before = doc.at_cache(key).unwrap();
        doc.unload(key).unwrap();
        if doc.at_cache(key).unwrap().is_some() || doc.cache_size().unwrap() != size - 1 {
            return false;
        }

        let outcome = doc.cache_until(Some(key), None).unwrap();
        outcome.cached == 1
            && doc.at_cache(key).unwrap() == before
            && doc.value(key).unwrap() == value
            && doc.size().unwrap() == size
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Object, usize) -> bool);
}

/// Property: a root that is not an object is a single entry under `""`.
#[test]
fn non_object_root_is_single_entry() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(value: Value) -> bool {
        if matches!(value, Value::Object(_)) {
            return true;
        }
        let mut doc = Document::open(value.to_string()).unwrap();
        doc.size().unwrap() == 1 && doc.fetch("").unwrap() == Some(&value)
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Value) -> bool);
}

#[quickcheck_macros::quickcheck]
fn at_cache_is_idempotent(object: Object) -> bool {
    let text = Value::Object(object.0.clone()).to_string();
    let mut doc = Document::open(text).unwrap();
    doc.cache_until(None, None).unwrap();
    object.0.keys().all(|key| {
        let first = doc.at_cache(key).unwrap();
        first.is_some() && doc.at_cache(key).unwrap() == first
    })
}
