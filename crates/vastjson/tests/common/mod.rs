#![allow(dead_code)]

use std::{io::Write, sync::Once};

use tempfile::NamedTempFile;

static INIT: Once = Once::new();

/// Routes the crate's tracing output to the test harness. Only the first
/// call installs the subscriber.
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::TRACE)
            .with_target(false)
            .init();
    });
}

pub const CATALOG: &str = r#"
{
    "moderation": {
        "decision": "allow",
        "reason": null
    },
    "request": {
        "filename": "example.rs",
        "language": "rust",
        "options": { "opt_level": "2", "features": ["serde", "tokio"] }
    },
    "snippets": ["fn main() {}", "println!(\"hi\")", "tab\there", "é😀"],
    "counts": [0, -1, 18446744073709551615, -9223372036854775808, 2.5, -0.125, 1e300, 6.02E23],
    "flags": [true, false, null],
    "empty": {},
    "nested": [[[]], [{}], {"a": [{"b": {"c": "}]\"[{"}}]}],
    "last": "done"
}
"#;

pub const CATALOG_KEYS: [&str; 8] = [
    "moderation",
    "request",
    "snippets",
    "counts",
    "flags",
    "empty",
    "nested",
    "last",
];

pub fn write_temp(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
