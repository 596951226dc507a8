//! Indexes a large JSON file, then walks it in bounded batches, printing
//! each top-level key with the size of its value and unloading the batch
//! before the next one.
//!
//! ```text
//! RUST_LOG=vastjson=debug cargo run --example walk_file -- big.json [batch] [preload|mmap|stream]
//! ```
#![allow(missing_docs)]

use std::{env, error::Error, num::NonZeroUsize, process::ExitCode};

use tracing::info;
use tracing_subscriber::EnvFilter;
use vastjson::{Document, DocumentOptions, OpenMode};

fn parse_mode(arg: Option<&str>) -> Result<OpenMode, String> {
    match arg {
        None | Some("mmap") => Ok(OpenMode::Mmap),
        Some("preload") => Ok(OpenMode::Preload),
        Some("stream") => Ok(OpenMode::Stream),
        Some(other) => Err(format!("unknown mode {other:?}")),
    }
}

/// Keys cached per batch. Zero is rejected.
fn parse_batch(arg: Option<&str>) -> Result<NonZeroUsize, String> {
    arg.unwrap_or("1000")
        .parse()
        .map_err(|err| format!("invalid batch size {:?}: {err}", arg.unwrap_or_default()))
}

fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    let path = args.first().ok_or("usage: walk_file <path> [batch] [mode]")?;
    let batch = parse_batch(args.get(1).map(String::as_str))?;
    let mode = parse_mode(args.get(2).map(String::as_str))?;

    let options = DocumentOptions {
        mode,
        ..Default::default()
    };
    let mut doc = Document::open_path(path, options)?;
    info!(keys = doc.size()?, "indexed");

    let mut total = 0;
    loop {
        let outcome = doc.cache_until(None, Some(batch.get()))?;
        let entries: Vec<(String, usize)> = doc
            .cached()?
            .map(|(key, value)| (key.to_string(), value.to_string().len()))
            .collect();
        for (key, len) in &entries {
            println!("{key}\t{len}");
            doc.unload(key)?;
        }
        total += entries.len();
        info!(batch = entries.len(), total, "batch done");
        if outcome.exhausted {
            break;
        }
    }
    doc.close();
    info!(total, "walk finished");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
