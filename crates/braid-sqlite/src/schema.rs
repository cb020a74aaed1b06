//! Record store schema and migrations.
//!
//! - `records` holds one row per document: primary text, metadata object,
//!   optional dense embedding and optional sparse token weights, all JSON.
//! - `records_fts` is an FTS5 index over `records.text`, kept in sync by
//!   INSERT/UPDATE/DELETE triggers. Its tokenizer is fixed when the table is
//!   created.

use rusqlite::{Connection, types::Type};
use std::fmt;

/// Latest schema version understood by this crate.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

/// Migration v1: the record table.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY,
    text TEXT NOT NULL,
    metadata_json TEXT NOT NULL DEFAULT '{}' CHECK (json_valid(metadata_json)),
    embedding_json TEXT,
    sparse_json TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_has_embedding
    ON records(id) WHERE embedding_json IS NOT NULL;

CREATE INDEX IF NOT EXISTS idx_records_has_sparse
    ON records(id) WHERE sparse_json IS NOT NULL;
";

/// Migration v2: FTS5 table and triggers. `{tokenize}` is substituted with
/// [`FtsTokenizer::tokenize_clause`].
const MIGRATION_V2_TEMPLATE: &str = r"
CREATE VIRTUAL TABLE IF NOT EXISTS records_fts USING fts5(
    text,
    content='records',
    content_rowid='id',
    tokenize='{tokenize}'
);

CREATE TRIGGER IF NOT EXISTS records_ai
AFTER INSERT ON records
BEGIN
    INSERT INTO records_fts(rowid, text) VALUES (new.id, new.text);
END;

CREATE TRIGGER IF NOT EXISTS records_au
AFTER UPDATE OF text ON records
BEGIN
    INSERT INTO records_fts(records_fts, rowid, text) VALUES ('delete', old.id, old.text);
    INSERT INTO records_fts(rowid, text) VALUES (new.id, new.text);
END;

CREATE TRIGGER IF NOT EXISTS records_ad
AFTER DELETE ON records
BEGIN
    INSERT INTO records_fts(records_fts, rowid, text) VALUES ('delete', old.id, old.text);
END;

INSERT INTO records_fts(records_fts) VALUES ('rebuild');
";

/// FTS5 tokenizers the store can build its index with. These are the text
/// parsers a [`crate::SqliteStore`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FtsTokenizer {
    /// Unicode word breaking, no stemming.
    Unicode61,
    /// Porter stemming over `unicode61`.
    #[default]
    Porter,
    /// ASCII-only word breaking.
    Ascii,
    /// Character trigrams; matches substrings of three or more characters.
    Trigram,
}

impl FtsTokenizer {
    pub const ALL: [Self; 4] = [Self::Unicode61, Self::Porter, Self::Ascii, Self::Trigram];

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unicode61 => "unicode61",
            Self::Porter => "porter",
            Self::Ascii => "ascii",
            Self::Trigram => "trigram",
        }
    }

    /// Value of the FTS5 `tokenize` option.
    #[must_use]
    pub const fn tokenize_clause(self) -> &'static str {
        match self {
            Self::Unicode61 => "unicode61",
            Self::Porter => "porter unicode61",
            Self::Ascii => "ascii",
            Self::Trigram => "trigram",
        }
    }
}

impl fmt::Display for FtsTokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read `PRAGMA user_version` as a `u32`.
///
/// # Errors
///
/// Returns an error if the pragma query fails or the value is out of range.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Apply pending migrations in ascending order.
///
/// `tokenizer` only matters the first time v2 runs; an existing FTS table
/// keeps the tokenizer it was built with.
///
/// # Errors
///
/// Returns an error if any migration fails.
pub fn migrate(conn: &mut Connection, tokenizer: FtsTokenizer) -> rusqlite::Result<u32> {
    let v2 = MIGRATION_V2_TEMPLATE.replace("{tokenize}", tokenizer.tokenize_clause());
    let migrations: [(u32, &str); 2] = [(1, MIGRATION_V1_SQL), (2, &v2)];
    let mut current = current_schema_version(conn)?;

    for (version, sql) in migrations {
        if version <= current {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(version))?;
        tx.commit()?;
        current = version;
    }

    Ok(current)
}

/// Tokenizer the existing `records_fts` table was created with, if any.
///
/// # Errors
///
/// Returns an error if `sqlite_master` cannot be read.
pub fn fts_tokenizer(conn: &Connection) -> rusqlite::Result<Option<FtsTokenizer>> {
    let sql: Option<String> = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'records_fts'",
            [],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    Ok(sql.and_then(|sql| {
        FtsTokenizer::ALL
            .into_iter()
            .find(|t| sql.contains(&format!("tokenize='{}'", t.tokenize_clause())))
    }))
}
