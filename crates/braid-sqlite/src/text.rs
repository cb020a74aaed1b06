//! FTS5 relevance search and `LIKE` substring matching.

use anyhow::{Context, Result, bail};
use braid_core::{Filter, RecordRow, TextIndex};
use rusqlite::{Connection, params_from_iter, types::Value as SqlValue};

use crate::filter_sql::WhereClause;
use crate::schema::FtsTokenizer;
use crate::store::{RECORD_COLUMNS, SqliteStore, read_row};

impl TextIndex for SqliteStore {
    fn supports_parser(&self, parser: &str) -> bool {
        FtsTokenizer::from_name(parser) == Some(self.tokenizer())
    }

    fn relevance_search(
        &self,
        query: &str,
        parser: Option<&str>,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<RecordRow>> {
        if let Some(parser) = parser.filter(|p| !self.supports_parser(p)) {
            bail!(
                "text parser {parser:?} does not match index tokenizer {}",
                self.tokenizer()
            );
        }
        let Some(expression) = match_expression(query) else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }
        let clause = WhereClause::from_filter(filter)?;
        let conn = self.lock()?;
        search_bm25(&conn, &expression, &clause, limit)
    }

    fn substring_search(
        &self,
        query: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<RecordRow>> {
        let needle = query.trim();
        if needle.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let clause = WhereClause::from_filter(filter)?;
        let conn = self.lock()?;
        search_substring(&conn, needle, &clause, limit)
    }
}

/// Map a BM25 score to `[0, 1]`.
///
/// FTS5 reports BM25 negated (more negative is better), so `s = -bm25` and
/// the relevance is `s / (1 + s)`.
#[must_use]
pub fn bm25_relevance(bm25: f64) -> f64 {
    let s = (-bm25).max(0.0);
    s / (1.0 + s)
}

/// Quote every token and `OR` them so punctuation in user text never reaches
/// the FTS5 query grammar. `None` when the query has no tokens.
fn match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

fn search_bm25(
    conn: &Connection,
    expression: &str,
    clause: &WhereClause,
    limit: usize,
) -> Result<Vec<RecordRow>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS}, bm25(records_fts) AS score
         FROM records_fts
         JOIN records ON records.id = records_fts.rowid
         WHERE records_fts MATCH ? AND {}
         ORDER BY score ASC, records.id ASC
         LIMIT ?",
        clause.sql()
    );
    let mut params = vec![SqlValue::Text(expression.to_string())];
    params.extend(clause.params.iter().cloned());
    params.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

    let mut stmt = conn
        .prepare(&sql)
        .context("prepare FTS5 BM25 search query")?;
    let rows = stmt
        .query_map(params_from_iter(params), |row| {
            Ok((read_row(row)?, row.get::<_, f64>(5)?))
        })
        .context("execute FTS5 BM25 search")?;

    let mut out = Vec::new();
    for row in rows {
        let (record, bm25) = row.context("read FTS5 search row")?;
        out.push(record.into_row(Some(bm25_relevance(bm25)))?);
    }
    Ok(out)
}

fn search_substring(
    conn: &Connection,
    needle: &str,
    clause: &WhereClause,
    limit: usize,
) -> Result<Vec<RecordRow>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM records
         WHERE text LIKE ? ESCAPE '\\' AND {}
         ORDER BY id ASC
         LIMIT ?",
        clause.sql()
    );
    let mut params = vec![SqlValue::Text(format!("%{}%", escape_like(needle)))];
    params.extend(clause.params.iter().cloned());
    params.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

    let mut stmt = conn.prepare(&sql).context("prepare substring search")?;
    let rows = stmt
        .query_map(params_from_iter(params), read_row)
        .context("execute substring search")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("read substring row")?.into_row(None)?);
    }
    Ok(out)
}

fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
