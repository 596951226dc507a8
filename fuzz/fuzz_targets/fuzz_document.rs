#![no_main]
use std::cell::RefCell;

use arbitrary::Arbitrary;
use libfuzzer_sys::{fuzz_mutator, fuzz_target, fuzzer_mutate};
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use serde_json::{Map, Value};
use vastjson::{Document, DocumentOptions, Error};

const HEADER: usize = 5; // 1 window byte + 4-byte op seed

thread_local! {
    static RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

static WS_TABLE: &[&[u8]] = &[b" ", b"\t", b"\n", b"\r"];

fn with_rng<F, R>(f: F) -> R
where
    F: FnOnce(&mut SmallRng) -> R,
{
    RNG.with(|cell| f(&mut cell.borrow_mut()))
}

/// Mostly writes a header followed by a top-level object of arbitrary
/// entries; otherwise defers to the stock byte mutator.
fn mutator(data: &mut [u8], size: usize, max_size: usize, seed: u32) -> usize {
    if size < HEADER || seed.is_multiple_of(10) {
        data[0] = with_rng(|rng| rng.next_u32() as u8);
        data[1..5].copy_from_slice(&with_rng(|rng| rng.next_u32().to_le_bytes()));

        let mut prefix = HEADER;
        prefix += append_whitespace(&mut data[prefix..], max_size - prefix);
        prefix += append_object(&mut data[prefix..], size.max(HEADER * 4), max_size - prefix);
        prefix += append_whitespace(&mut data[prefix..], max_size - prefix);
        prefix
    } else {
        fuzzer_mutate(data, size, max_size)
    }
}

fn append_whitespace(buf: &mut [u8], limit: usize) -> usize {
    with_rng(|rng| {
        if limit == 0 {
            return 0;
        }
        let n = rng.random_range(1..=limit.min(8));
        let mut written = 0;
        for _ in 0..n {
            let w = WS_TABLE[rng.random_range(0..WS_TABLE.len())];
            if written + w.len() > limit {
                break;
            }
            buf[written..written + w.len()].copy_from_slice(w);
            written += w.len();
        }
        written
    })
}

fn append_object(data: &mut [u8], size: usize, limit: usize) -> usize {
    let entries = loop {
        let s = with_rng(|rng| rng.random_range(size / 2..size * 2).min(limit));
        let bytes: Vec<u8> = with_rng(|rng| (0..s).map(|_| rng.random::<u8>()).collect());
        let mut u = arbitrary::Unstructured::new(&bytes);
        if let Ok(entries) = Vec::<(String, ArbitraryValue)>::arbitrary(&mut u) {
            break entries;
        }
    };
    let object = Value::Object(Map::from_iter(entries.into_iter().map(|(k, v)| (k, v.0))));
    let serialized = serde_json::to_vec(&object).expect("Failed to serialize arbitrary value");

    let len = serialized.len().min(limit);
    data[..len].copy_from_slice(&serialized[..len]);
    len
}

fuzz_mutator!(|data: &mut [u8], size: usize, max_size: usize, seed: u32| {
    mutator(data, size, max_size, seed)
});

#[derive(Debug)]
struct ArbitraryValue(Value);

impl<'a> Arbitrary<'a> for ArbitraryValue {
    fn arbitrary(u: &mut arbitrary::Unstructured<'_>) -> arbitrary::Result<Self> {
        let value = match u.choose_index(21)? {
            0 => Value::Null,
            1 => Value::Bool(u.arbitrary()?),
            2 => {
                let n: f64 = u.arbitrary()?;
                Value::Number(
                    serde_json::Number::from_f64(n).ok_or(arbitrary::Error::IncorrectFormat)?,
                )
            }
            3 => Value::Number(u.arbitrary::<i64>()?.into()),
            4..=10 => Value::String(u.arbitrary()?),
            11..=15 => {
                let elems: Vec<ArbitraryValue> = u.arbitrary()?;
                Value::Array(elems.into_iter().map(|v| v.0).collect())
            }
            _ => {
                let m: Vec<(String, ArbitraryValue)> = u.arbitrary()?;
                Value::Object(Map::from_iter(m.into_iter().map(|(k, v)| (k, v.0))))
            }
        };
        Ok(ArbitraryValue(value))
    }
}

/// One step of the operation script, chosen from the op seed.
fn step(doc: &mut Document, rng: &mut SmallRng, known: &[String]) -> Result<(), Error> {
    let pick = |rng: &mut SmallRng| -> Option<String> {
        if known.is_empty() || rng.random_bool(0.1) {
            None
        } else {
            Some(known[rng.random_range(0..known.len())].clone())
        }
    };
    match rng.random_range(0..8) {
        0 => {
            doc.size()?;
        }
        1 => {
            let count = rng.random_bool(0.5).then(|| rng.random_range(0..4));
            let target = pick(rng);
            doc.cache_until(target.as_deref(), count)?;
        }
        2 => {
            if let Some(key) = pick(rng) {
                doc.unload(&key)?;
            }
        }
        3 => {
            if let Some(key) = pick(rng) {
                doc.at_cache(&key)?;
                doc.raw(&key)?;
            }
        }
        4 => {
            if let Some(key) = pick(rng) {
                doc.fetch(&key)?;
            }
        }
        5 => {
            let cached = doc.cache_size()?;
            let indexed = doc.keys()?.count();
            assert!(cached <= indexed, "{cached} cached but {indexed} indexed");
        }
        6 => {
            if rng.random_bool(0.05) {
                doc.close();
            }
        }
        _ => {
            doc.cache_until(None, None)?;
        }
    }
    Ok(())
}

fn document(data: &[u8]) {
    if data.len() < HEADER {
        return;
    }
    let window_size = usize::from(data[0]) + 1;
    let op_seed = u32::from_le_bytes(data[1..5].try_into().unwrap());
    let text = &data[5..];

    let options = DocumentOptions {
        window_size,
        max_depth: 64,
        ..Default::default()
    };
    let Ok(mut doc) = Document::open_with(text, options) else {
        return;
    };

    // Whatever serde_json accepts as an object, the index must agree on.
    let reference = serde_json::from_slice::<Value>(text).ok();
    let mut known: Vec<String> = match &reference {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    };
    known.push("not-a-key".to_string());

    let mut rng = SmallRng::seed_from_u64(u64::from(op_seed));
    for _ in 0..32 {
        match step(&mut doc, &mut rng, &known) {
            Ok(()) | Err(Error::Parse(_)) => {}
            Err(Error::Closed) => return,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    if doc.is_closed() {
        return;
    }
    if let Some(Value::Object(map)) = reference {
        let nested_ok = map.values().all(|v| depth(v) < 64);
        if nested_ok {
            let size = doc.size().expect("serde_json accepted this document");
            assert_eq!(size, map.len());
            doc.cache_until(None, None).expect("serde_json accepted every value");
            let mut keys: Vec<&str> = doc.keys().unwrap().collect();
            keys.sort_unstable();
            assert!(keys.iter().copied().eq(map.keys().map(String::as_str)));
        }
    }
}

fn depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}

fuzz_target!(|data: &[u8]| document(data));
