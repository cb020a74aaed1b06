//! Concurrent dispatch of the three search paths.
//!
//! Each runnable path gets its own scoped thread and builds its own result
//! list; nothing is shared between them but read-only query inputs. The
//! dispatcher blocks until every thread has finished or failed. A path that
//! errors or panics becomes an empty [`PathOutput`] with
//! [`PathStatus::Failed`]; the others are unaffected. There are no retries and
//! no cancellation.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::thread::{self, Scope, ScopedJoinHandle};
use tracing::{debug, warn};

use crate::filter::Filter;
use crate::paths::{
    FullTextSearchPath, PathKind, PathOutput, PathStatus, SparseSearchPath, SparseVector,
    TextSearchOutcome, VectorSearchPath,
};
use crate::record::SearchResult;

/// Inputs shared read-only by every path.
#[derive(Debug, Clone, Copy)]
pub struct PathQuery<'a> {
    pub text: &'a str,
    pub vector: &'a [f32],
    pub sparse: Option<&'a SparseVector>,
    pub filter: &'a Filter,
    /// Per-path result cap (the candidate limit).
    pub limit: usize,
}

/// Per-path participation for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub vector: PathStatus,
    pub fts: PathStatus,
    pub sparse: PathStatus,
}

impl DispatchReport {
    #[must_use]
    pub const fn status(&self, kind: PathKind) -> &PathStatus {
        match kind {
            PathKind::Vector => &self.vector,
            PathKind::FullText => &self.fts,
            PathKind::Sparse => &self.sparse,
        }
    }

    /// Whether any path that should have run did not.
    #[must_use]
    pub fn degraded(&self) -> bool {
        PathKind::ALL.iter().any(|&kind| {
            matches!(
                self.status(kind),
                PathStatus::Failed { .. } | PathStatus::Fallback { .. }
            )
        })
    }
}

/// The three best-first lists, any of which may be empty.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutput {
    pub vector: PathOutput,
    pub full_text: PathOutput,
    pub sparse: PathOutput,
}

impl DispatchOutput {
    #[must_use]
    pub fn report(&self) -> DispatchReport {
        DispatchReport {
            vector: self.vector.status.clone(),
            fts: self.full_text.status.clone(),
            sparse: self.sparse.status.clone(),
        }
    }
}

/// Runs the configured paths concurrently.
#[derive(Clone)]
pub struct PathDispatcher {
    vector: VectorSearchPath,
    full_text: Option<FullTextSearchPath>,
    sparse: Option<SparseSearchPath>,
}

impl PathDispatcher {
    /// `None` for full text or sparse means the path is disabled.
    #[must_use]
    pub const fn new(
        vector: VectorSearchPath,
        full_text: Option<FullTextSearchPath>,
        sparse: Option<SparseSearchPath>,
    ) -> Self {
        Self {
            vector,
            full_text,
            sparse,
        }
    }

    /// Report for a query that dispatched nothing.
    #[must_use]
    pub const fn idle_report(&self) -> DispatchReport {
        DispatchReport {
            vector: PathStatus::NoQuery,
            fts: idle_status(self.full_text.is_some()),
            sparse: idle_status(self.sparse.is_some()),
        }
    }

    /// Dispatch every runnable path and wait for all of them.
    #[must_use]
    pub fn dispatch(&self, query: &PathQuery<'_>) -> DispatchOutput {
        thread::scope(|scope| {
            let vector = if query.vector.is_empty() {
                Pending::Done(PathOutput::skipped(PathKind::Vector, PathStatus::NoQuery))
            } else {
                let path = &self.vector;
                launch(scope, PathKind::Vector, move || {
                    let results = path.search(query.vector, query.filter, query.limit)?;
                    Ok(completed(PathKind::Vector, results, false))
                })
            };

            let full_text = match &self.full_text {
                None => Pending::Done(PathOutput::skipped(PathKind::FullText, PathStatus::Disabled)),
                Some(_) if query.text.trim().is_empty() => {
                    Pending::Done(PathOutput::skipped(PathKind::FullText, PathStatus::NoQuery))
                }
                Some(path) => launch(scope, PathKind::FullText, move || {
                    let outcome = path.search(query.text, query.filter, query.limit)?;
                    let fallback = outcome.is_fallback();
                    Ok(completed(
                        PathKind::FullText,
                        TextSearchOutcome::into_results(outcome),
                        fallback,
                    ))
                }),
            };

            let sparse = match (&self.sparse, query.sparse) {
                (None, _) => Pending::Done(PathOutput::skipped(PathKind::Sparse, PathStatus::Disabled)),
                (Some(_), None) => {
                    Pending::Done(PathOutput::skipped(PathKind::Sparse, PathStatus::NoQuery))
                }
                (Some(_), Some(weights)) if weights.is_empty() => {
                    Pending::Done(PathOutput::skipped(PathKind::Sparse, PathStatus::NoQuery))
                }
                (Some(path), Some(weights)) => launch(scope, PathKind::Sparse, move || {
                    let results = path.search(weights, query.filter, query.limit)?;
                    Ok(completed(PathKind::Sparse, results, false))
                }),
            };

            DispatchOutput {
                vector: settle(PathKind::Vector, vector),
                full_text: settle(PathKind::FullText, full_text),
                sparse: settle(PathKind::Sparse, sparse),
            }
        })
    }
}

const fn idle_status(enabled: bool) -> PathStatus {
    if enabled {
        PathStatus::NoQuery
    } else {
        PathStatus::Disabled
    }
}

enum Pending<'scope> {
    Running(ScopedJoinHandle<'scope, Result<PathOutput>>),
    Done(PathOutput),
}

fn launch<'scope, F>(scope: &'scope Scope<'scope, '_>, kind: PathKind, run: F) -> Pending<'scope>
where
    F: FnOnce() -> Result<PathOutput> + Send + 'scope,
{
    match thread::Builder::new()
        .name(format!("braid-{kind}"))
        .spawn_scoped(scope, run)
    {
        Ok(handle) => Pending::Running(handle),
        Err(err) => Pending::Done(failed(kind, &anyhow!(err).context("failed to spawn search thread"))),
    }
}

fn settle(kind: PathKind, pending: Pending<'_>) -> PathOutput {
    match pending {
        Pending::Done(output) => output,
        Pending::Running(handle) => match handle.join() {
            Ok(Ok(output)) => {
                debug!(path = %kind, hits = output.results.len(), "search path completed");
                output
            }
            Ok(Err(err)) => failed(kind, &err),
            Err(panic) => failed(kind, &anyhow!("search path panicked: {}", panic_message(&*panic))),
        },
    }
}

fn completed(kind: PathKind, results: Vec<SearchResult>, fallback: bool) -> PathOutput {
    let hits = results.len();
    let status = if fallback {
        PathStatus::Fallback { hits }
    } else {
        PathStatus::Completed { hits }
    };
    PathOutput {
        kind,
        results,
        status,
    }
}

fn failed(kind: PathKind, err: &anyhow::Error) -> PathOutput {
    warn!(path = %kind, "search path failed, continuing without it: {err:#}");
    PathOutput::skipped(
        kind,
        PathStatus::Failed {
            error: format!("{err:#}"),
        },
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
