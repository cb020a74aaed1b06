//! `braid search`: one hybrid query against a SQLite store.
//!
//! The store backs all three paths. Engine settings come from the TOML config
//! (`~/.config/braid/config.toml` unless `--config` is given), with
//! `--metric` and `--dimension` overriding it.

use anyhow::{Context, Result, bail};
use braid_core::{
    DispatchReport, EngineBuilder, EngineConfig, Filter, PathKind, PathStatus, SearchRequest,
    SearchResult, SparseVector, load_engine_config,
};
use braid_sqlite::{SqliteStore, StoreOptions};
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::output::{CliError, OutputMode, render, render_error};

#[derive(Args, Debug)]
#[command(
    about = "Run a hybrid search",
    long_about = "Run one hybrid query: dense, full-text and sparse retrieval over the store, \
                  fused into a single ranked list.\n\n\
                  Paths without query input are skipped: no --vector skips dense search, \
                  no --sparse skips sparse search.",
    after_help = "EXAMPLES:\n    # Text only\n    braid search --db docs.sqlite3 --dimension 384 'green tea'\n\n\
                  # Text and dense vector\n    braid search --db docs.sqlite3 'green tea' --vector '[0.1, 0.9]'\n\n\
                  # Filtered, thresholded, machine-readable\n    \
                  braid --json search --db docs.sqlite3 tea --filter lang=en --min-quality 0.3"
)]
pub struct SearchArgs {
    /// Query text for full-text search.
    pub query: String,

    /// Store file.
    #[arg(long, value_name = "PATH")]
    pub db: PathBuf,

    /// Engine config (TOML).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Dense query vector as a JSON array.
    #[arg(long, value_name = "JSON")]
    pub vector: Option<String>,

    /// Sparse query as `{id:weight,...}/dim`. Enables the sparse path.
    #[arg(long, value_name = "LITERAL")]
    pub sparse: Option<String>,

    /// Metadata equality filter `field=value`; repeatable. Values parse as
    /// JSON when they can, otherwise as strings.
    #[arg(long = "filter", value_name = "FIELD=VALUE")]
    pub filters: Vec<String>,

    /// Maximum number of results to return.
    #[arg(short = 'n', long, default_value = "10")]
    pub limit: usize,

    /// Drop results whose quality score is below this.
    #[arg(long, value_name = "SCORE")]
    pub min_quality: Option<f64>,

    /// Override the configured metric: l2, cosine or inner_product.
    #[arg(long)]
    pub metric: Option<String>,

    /// Override the configured vector dimension.
    #[arg(long)]
    pub dimension: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SearchOutput {
    query: String,
    count: usize,
    paths: DispatchReport,
    results: Vec<SearchResult>,
}

/// Execute `braid search`.
///
/// # Errors
///
/// Fails when the store is missing, an argument does not parse or the engine
/// configuration is invalid. Path failures during the query do not fail it.
pub fn run_search(args: &SearchArgs, output: OutputMode) -> Result<()> {
    if !args.db.exists() {
        render_error(
            output,
            &CliError::with_details(
                format!("store {} not found", args.db.display()),
                "run `braid ingest` first",
                "store_missing",
            ),
        )?;
        bail!("store not found");
    }

    let vector = args
        .vector
        .as_deref()
        .map(parse_vector)
        .transpose()?
        .unwrap_or_default();
    let mut config = resolve_config(args, vector.len())?;

    let store = Arc::new(SqliteStore::open(&args.db, StoreOptions::default())?);
    let sparse = args
        .sparse
        .as_deref()
        .map(|literal| parse_sparse(literal, store.sparse_dimension()))
        .transpose()?;
    config.sparse |= sparse.is_some();

    let engine = EngineBuilder::new(config, store.clone())
        .with_text_index(store.clone())
        .with_sparse_index(store)
        .build()?;

    let mut request = SearchRequest::new(args.query.clone(), vector, args.limit)
        .with_filter(parse_filters(&args.filters)?);
    if let Some(sparse) = sparse {
        request = request.with_sparse(sparse);
    }
    if let Some(threshold) = args.min_quality {
        request = request.with_min_quality(threshold);
    }

    let response = engine.search(&request);
    let search_output = SearchOutput {
        query: args.query.clone(),
        count: response.results.len(),
        paths: response.report,
        results: response.results,
    };

    render(output, &search_output, |out, w| render_search_text(out, w))
}

fn resolve_config(args: &SearchArgs, vector_len: usize) -> Result<EngineConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut config = load_engine_config(&path)?;
    if let Some(metric) = &args.metric {
        config.metric.clone_from(metric);
    }
    if let Some(dimension) = args.dimension {
        config.vector_dimension = Some(dimension);
    }
    if config.vector_dimension.is_none() && vector_len > 0 {
        config.vector_dimension = Some(vector_len);
    }
    Ok(config)
}

fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("braid").join("config.toml"))
        .context("no config directory on this platform; pass --config")
}

fn parse_vector(json: &str) -> Result<Vec<f32>> {
    serde_json::from_str(json)
        .with_context(|| format!("--vector must be a JSON array of numbers, got {json:?}"))
}

fn parse_sparse(literal: &str, store_dimension: usize) -> Result<SparseVector> {
    let (weights, dimension) = SparseVector::parse_literal(literal)
        .with_context(|| format!("invalid --sparse literal {literal:?}"))?;
    if dimension != store_dimension {
        bail!("--sparse dimension {dimension} does not match store dimension {store_dimension}");
    }
    Ok(weights)
}

fn parse_filters(raw: &[String]) -> Result<Filter> {
    raw.iter().try_fold(Filter::new(), |filter, entry| {
        let Some((field, value)) = entry.split_once('=') else {
            bail!("--filter expects FIELD=VALUE, got {entry:?}");
        };
        let field = field.trim();
        if field.is_empty() {
            bail!("--filter field must not be empty in {entry:?}");
        }
        let value = serde_json::from_str::<Value>(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        Ok(filter.field_eq(field, value))
    })
}

fn render_search_text(out: &SearchOutput, w: &mut dyn Write) -> io::Result<()> {
    for kind in PathKind::ALL {
        match out.paths.status(kind) {
            PathStatus::Failed { error } => writeln!(w, "# {kind}: failed ({error})")?,
            PathStatus::Fallback { hits } => {
                writeln!(w, "# {kind}: substring fallback, {hits} hits")?;
            }
            _ => {}
        }
    }
    if out.results.is_empty() {
        return writeln!(w, "no results for {:?}", out.query);
    }
    for (idx, result) in out.results.iter().enumerate() {
        writeln!(
            w,
            "{:>3}. [{}] score={:.4} quality={:.3}  {}",
            idx + 1,
            result.id,
            result.score,
            result.quality_score().unwrap_or_default(),
            snippet(result.text().unwrap_or_default(), 80),
        )?;
    }
    Ok(())
}

fn snippet(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= max_chars {
        line.to_string()
    } else {
        let cut: String = line.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
