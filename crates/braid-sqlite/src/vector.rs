//! Dense nearest-neighbour search over stored embeddings.
//!
//! L2 and cosine try sqlite-vec first; when the extension is missing or the
//! query fails, an exact in-process scan takes over. Inner product always
//! scans. Distances follow [`MetricType`]: Euclidean for L2, `1 - cos` for
//! cosine, `-(a · b)` for inner product.

use anyhow::{Context, Result};
use braid_core::{BoundedTopK, Filter, MetricType, RecordRow, VectorIndex};
use rusqlite::{Connection, params_from_iter, types::Value as SqlValue};
use tracing::debug;

use crate::filter_sql::WhereClause;
use crate::store::{RECORD_COLUMNS, SqliteStore, read_row};

impl VectorIndex for SqliteStore {
    fn ann_search(
        &self,
        query: &[f32],
        metric: MetricType,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<RecordRow>> {
        if limit == 0 || query.is_empty() {
            return Ok(Vec::new());
        }
        let clause = WhereClause::from_filter(filter)?;
        let conn = self.lock()?;

        if self.vec_enabled() {
            if let Some(rows) = try_sqlite_vec(&conn, query, metric, &clause, limit)? {
                return Ok(rows);
            }
        }
        scan(&conn, query, metric, &clause, limit)
    }
}

fn try_sqlite_vec(
    conn: &Connection,
    query: &[f32],
    metric: MetricType,
    clause: &WhereClause,
    limit: usize,
) -> Result<Option<Vec<RecordRow>>> {
    let function = match metric {
        MetricType::L2 => "vec_distance_l2",
        MetricType::Cosine => "vec_distance_cosine",
        MetricType::InnerProduct => return Ok(None),
    };
    let query_json = serde_json::to_string(query).context("encode query embedding")?;
    let sql = format!(
        "SELECT {RECORD_COLUMNS}, {function}(vec_f32(embedding_json), vec_f32(?)) AS distance
         FROM records
         WHERE embedding_json IS NOT NULL
           AND json_array_length(embedding_json) = ?
           AND {}
         ORDER BY distance ASC, id ASC
         LIMIT ?",
        clause.sql()
    );

    let mut params = vec![
        SqlValue::Text(query_json),
        SqlValue::Integer(i64::try_from(query.len()).unwrap_or(i64::MAX)),
    ];
    params.extend(clause.params.iter().cloned());
    params.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

    let mut stmt = match conn.prepare(&sql) {
        Ok(stmt) => stmt,
        Err(err) => {
            debug!("sqlite-vec ANN unavailable, falling back to exact scan: {err}");
            return Ok(None);
        }
    };
    let rows = stmt.query_map(params_from_iter(params), |row| {
        Ok((read_row(row)?, row.get::<_, Option<f64>>(5)?))
    });
    let raw = match rows.and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>()) {
        Ok(raw) => raw,
        Err(err) => {
            debug!("sqlite-vec ANN query failed, falling back to exact scan: {err}");
            return Ok(None);
        }
    };

    raw.into_iter()
        .map(|(record, distance)| record.into_row(distance))
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn scan(
    conn: &Connection,
    query: &[f32],
    metric: MetricType,
    clause: &WhereClause,
    limit: usize,
) -> Result<Vec<RecordRow>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS}, embedding_json FROM records
         WHERE embedding_json IS NOT NULL AND {}",
        clause.sql()
    );
    let mut stmt = conn.prepare(&sql).context("prepare embedding scan")?;
    let rows = stmt
        .query_map(params_from_iter(clause.params.iter()), |row| {
            Ok((read_row(row)?, row.get::<_, String>(5)?))
        })
        .context("scan embeddings")?;

    let mut top = BoundedTopK::new(limit);
    let mut skipped = 0_usize;
    for row in rows {
        let (record, embedding_json) = row.context("read embedding row")?;
        let embedding: Vec<f32> = match serde_json::from_str(&embedding_json) {
            Ok(embedding) => embedding,
            Err(err) => {
                debug!(id = record.id(), "skipping undecodable embedding: {err}");
                skipped += 1;
                continue;
            }
        };
        if embedding.len() != query.len() {
            skipped += 1;
            continue;
        }
        let d = distance(metric, query, &embedding);
        top.push(-d, record.id(), record);
    }
    if skipped > 0 {
        debug!(skipped, "embedding scan skipped rows with mismatched dimension");
    }

    top.into_sorted_vec()
        .into_iter()
        .map(|(neg_distance, _, record)| record.into_row(Some(-neg_distance)))
        .collect()
}

/// Distance between two equal-length vectors under `metric`.
#[must_use]
pub(crate) fn distance(metric: MetricType, a: &[f32], b: &[f32]) -> f64 {
    let pairs = a.iter().zip(b).map(|(&x, &y)| (f64::from(x), f64::from(y)));
    match metric {
        MetricType::L2 => pairs.map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt(),
        MetricType::InnerProduct => -pairs.map(|(x, y)| x * y).sum::<f64>(),
        MetricType::Cosine => {
            let (dot, na, nb) = pairs.fold((0.0, 0.0, 0.0), |(dot, na, nb), (x, y)| {
                (dot + x * y, na + x * x, nb + y * y)
            });
            let norm = (na * nb).sqrt();
            if norm > 0.0 { 1.0 - dot / norm } else { 1.0 }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances_follow_metric_conventions() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!((distance(MetricType::L2, &a, &b) - 2.0_f64.sqrt()).abs() < 1e-12);
        assert!((distance(MetricType::Cosine, &a, &b) - 1.0).abs() < 1e-12);
        assert!((distance(MetricType::Cosine, &a, &[-2.0, 0.0]) - 2.0).abs() < 1e-12);
        assert!((distance(MetricType::InnerProduct, &a, &[3.0, 5.0]) + 3.0).abs() < 1e-12);
    }

    #[test]
    fn zero_vector_has_neutral_cosine_distance() {
        assert!((distance(MetricType::Cosine, &[0.0, 0.0], &[1.0, 1.0]) - 1.0).abs() < 1e-12);
    }
}
