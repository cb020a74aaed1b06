//! Sparse inner-product search over stored token-weight maps.

use anyhow::{Context, Result, bail};
use braid_core::{BoundedTopK, Filter, RecordRow, SparseIndex, SparseVector};
use rusqlite::params_from_iter;
use tracing::debug;

use crate::filter_sql::WhereClause;
use crate::store::{RECORD_COLUMNS, SqliteStore, read_row};

impl SparseIndex for SqliteStore {
    fn dimension(&self) -> usize {
        self.sparse_dimension()
    }

    /// Rows sharing at least one token with the query, best-first, carrying
    /// the negated inner product.
    fn sparse_search(
        &self,
        literal: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<RecordRow>> {
        let (query, dimension) = SparseVector::parse_literal(literal)
            .with_context(|| format!("parse sparse query literal {literal:?}"))?;
        if dimension != self.sparse_dimension() {
            bail!(
                "sparse query dimension {dimension} does not match store dimension {}",
                self.sparse_dimension()
            );
        }
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let clause = WhereClause::from_filter(filter)?;
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {RECORD_COLUMNS}, sparse_json FROM records
             WHERE sparse_json IS NOT NULL AND {}",
            clause.sql()
        );
        let mut stmt = conn.prepare(&sql).context("prepare sparse scan")?;
        let rows = stmt
            .query_map(params_from_iter(clause.params.iter()), |row| {
                Ok((read_row(row)?, row.get::<_, String>(5)?))
            })
            .context("scan sparse weights")?;

        let mut top = BoundedTopK::new(limit);
        for row in rows {
            let (record, sparse_json) = row.context("read sparse row")?;
            let stored: SparseVector = match serde_json::from_str(&sparse_json) {
                Ok(stored) => stored,
                Err(err) => {
                    debug!(id = record.id(), "skipping undecodable sparse weights: {err}");
                    continue;
                }
            };
            let (inner_product, overlap) = query.dot(&stored);
            if overlap {
                top.push(inner_product, record.id(), record);
            }
        }

        top.into_sorted_vec()
            .into_iter()
            .map(|(inner_product, _, record)| record.into_row(Some(-inner_product)))
            .collect()
    }
}
