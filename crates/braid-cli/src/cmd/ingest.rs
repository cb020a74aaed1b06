//! `braid ingest`: load JSONL records into a SQLite store.
//!
//! One record per line:
//! `{"id": 1, "text": "...", "metadata": {...}, "embedding": [...], "sparse": {"12": 0.5}}`.
//! Only `id` and `text` are required. Existing ids are replaced.

use anyhow::{Context, Result, bail};
use braid_sqlite::{FtsTokenizer, SqliteStore, StoreOptions, StoredRecord};
use clap::Args;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing::info;

use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
#[command(
    about = "Load JSONL records into a store",
    after_help = "EXAMPLES:\n    # Ingest a file\n    braid ingest --db docs.sqlite3 --input docs.jsonl\n\n\
                  # Ingest from a pipe with a trigram index\n    cat docs.jsonl | braid ingest --db docs.sqlite3 --tokenizer trigram"
)]
pub struct IngestArgs {
    /// Store file; created if missing.
    #[arg(long, value_name = "PATH")]
    pub db: PathBuf,

    /// JSONL input; omit to read from stdin.
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// FTS5 tokenizer for a new store: unicode61, porter, ascii or trigram.
    #[arg(long, value_name = "NAME")]
    pub tokenizer: Option<String>,
}

#[derive(Debug, Serialize)]
struct IngestReport {
    ingested: usize,
    total: u64,
    tokenizer: String,
}

/// Execute `braid ingest`.
///
/// # Errors
///
/// Fails on an unknown tokenizer, an unreadable input, a malformed line or a
/// store write error. Nothing is written when any line is malformed.
pub fn run_ingest(args: &IngestArgs, output: OutputMode) -> Result<()> {
    let tokenizer = args
        .tokenizer
        .as_deref()
        .map(|name| {
            FtsTokenizer::from_name(name).with_context(|| {
                format!("unknown tokenizer {name:?}; expected unicode61, porter, ascii or trigram")
            })
        })
        .transpose()?;

    let records = match &args.input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("open input {}", path.display()))?;
            read_records(BufReader::new(file))?
        }
        None => read_records(io::stdin().lock())?,
    };

    let store = SqliteStore::open(
        &args.db,
        StoreOptions {
            tokenizer,
            ..StoreOptions::default()
        },
    )?;
    let ingested = store.upsert_all(records)?;
    let report = IngestReport {
        ingested,
        total: store.count()?,
        tokenizer: store.tokenizer().to_string(),
    };
    info!(ingested, total = report.total, "ingest complete");

    render(output, &report, |report, w| render_ingest_text(report, w))
}

fn read_records(reader: impl BufRead) -> Result<Vec<StoredRecord>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("read input line {line_no}"))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<StoredRecord>(&line) {
            Ok(record) => records.push(record),
            Err(err) => bail!("invalid record on line {line_no}: {err}"),
        }
    }
    Ok(records)
}

fn render_ingest_text(report: &IngestReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "ingested {} records ({} total, tokenizer {})",
        report.ingested, report.total, report.tokenizer
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_skipped() {
        let input = "{\"id\": 1, \"text\": \"a\"}\n\n   \n{\"id\": 2, \"text\": \"b\"}\n";
        let records = read_records(input.as_bytes()).expect("read");
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn malformed_line_names_its_number() {
        let input = "{\"id\": 1, \"text\": \"a\"}\n{\"id\": \"x\"}\n";
        let err = read_records(input.as_bytes()).expect_err("malformed");
        assert!(err.to_string().contains("line 2"), "{err}");
    }
}
