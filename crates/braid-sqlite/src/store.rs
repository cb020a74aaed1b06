//! SQLite record store.
//!
//! Runtime defaults follow the usual projection setup:
//! - `journal_mode = WAL` so readers keep working while ingest appends
//! - `busy_timeout = 5s` to ride out transient lock contention

use anyhow::{Context, Result, anyhow};
use braid_core::{DocId, RecordRow, SparseVector};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use crate::schema::{self, FtsTokenizer};
use crate::vec_ext;

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Vocabulary size of the usual WordPiece sparse encoders.
pub const DEFAULT_SPARSE_DIMENSION: usize = 30_522;

/// Columns read by every search query, in [`read_row`] order.
pub(crate) const RECORD_COLUMNS: &str =
    "records.id, records.text, records.metadata_json, records.created_at, records.updated_at";

/// Options fixed when a store is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Tokenizer for a newly created FTS index (porter when unset). An
    /// existing index keeps its own.
    pub tokenizer: Option<FtsTokenizer>,
    /// Dimension carried in sparse query literals.
    pub sparse_dimension: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            tokenizer: None,
            sparse_dimension: DEFAULT_SPARSE_DIMENSION,
        }
    }
}

/// One ingestable record. This is also the JSONL line format.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: DocId,
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse: Option<SparseVector>,
}

impl StoredRecord {
    #[must_use]
    pub fn new(id: DocId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    #[must_use]
    pub fn with_sparse(mut self, sparse: SparseVector) -> Self {
        self.sparse = Some(sparse);
        self
    }
}

/// Record table plus FTS5, dense and sparse search over it.
///
/// Implements [`braid_core::VectorIndex`], [`braid_core::TextIndex`] and
/// [`braid_core::SparseIndex`], so one store can back every path.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    tokenizer: FtsTokenizer,
    sparse_dimension: usize,
    vec_enabled: bool,
}

impl SqliteStore {
    /// Open (or create) a store file, apply pragmas and migrate.
    ///
    /// # Errors
    ///
    /// Returns an error if opening, configuring or migrating the database fails.
    pub fn open(path: &Path, options: StoreOptions) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create store directory {}", parent.display()))?;
        }
        register_vec();
        let conn = Connection::open(path)
            .with_context(|| format!("open record store {}", path.display()))?;
        Self::from_connection(conn, options)
    }

    /// Open a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory(options: StoreOptions) -> Result<Self> {
        register_vec();
        let conn = Connection::open_in_memory().context("open in-memory record store")?;
        Self::from_connection(conn, options)
    }

    fn from_connection(mut conn: Connection, options: StoreOptions) -> Result<Self> {
        configure_connection(&conn).context("configure sqlite pragmas")?;
        let requested = options.tokenizer.unwrap_or_default();
        schema::migrate(&mut conn, requested).context("apply store migrations")?;

        let tokenizer = match schema::fts_tokenizer(&conn).context("read fts tokenizer")? {
            Some(existing) => {
                if options.tokenizer.is_some_and(|t| t != existing) {
                    warn!(
                        requested = %requested,
                        existing = %existing,
                        "store already indexed with a different tokenizer; keeping existing"
                    );
                }
                existing
            }
            None => requested,
        };
        let vec_enabled = vec_ext::vec_available(&conn);
        debug!(%tokenizer, vec_enabled, "record store ready");

        Ok(Self {
            conn: Mutex::new(conn),
            tokenizer,
            sparse_dimension: options.sparse_dimension,
            vec_enabled,
        })
    }

    #[must_use]
    pub const fn tokenizer(&self) -> FtsTokenizer {
        self.tokenizer
    }

    #[must_use]
    pub const fn sparse_dimension(&self) -> usize {
        self.sparse_dimension
    }

    /// Whether sqlite-vec distance functions are loaded on this connection.
    #[must_use]
    pub const fn vec_enabled(&self) -> bool {
        self.vec_enabled
    }

    /// Insert or replace one record.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn upsert(&self, record: &StoredRecord) -> Result<()> {
        let conn = self.lock()?;
        upsert_on(&conn, record)
    }

    /// Insert or replace many records in one transaction. Returns the count.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is committed in that case.
    pub fn upsert_all<I>(&self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = StoredRecord>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context("begin ingest transaction")?;
        let mut written = 0_usize;
        for record in records {
            upsert_on(&tx, &record)?;
            written += 1;
        }
        tx.commit().context("commit ingest transaction")?;
        Ok(written)
    }

    /// Remove a record. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete(&self, id: DocId) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM records WHERE id = ?1", [id])
            .with_context(|| format!("delete record {id}"))?;
        Ok(changed > 0)
    }

    /// Fetch one record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or stored JSON is malformed.
    pub fn get(&self, id: DocId) -> Result<Option<StoredRecord>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT id, text, metadata_json, embedding_json, sparse_json FROM records WHERE id = ?1",
                [id],
                |row| {
                    Ok((
                        row.get::<_, DocId>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()
            .with_context(|| format!("read record {id}"))?;

        let Some((id, text, metadata, embedding, sparse)) = raw else {
            return Ok(None);
        };
        Ok(Some(StoredRecord {
            id,
            text,
            metadata: parse_metadata(id, &metadata)?,
            embedding: embedding
                .map(|json| serde_json::from_str(&json))
                .transpose()
                .with_context(|| format!("decode embedding of record {id}"))?,
            sparse: sparse
                .map(|json| serde_json::from_str(&json))
                .transpose()
                .with_context(|| format!("decode sparse weights of record {id}"))?,
        }))
    }

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .context("count records")?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("record store connection lock poisoned"))
    }
}

fn register_vec() {
    if let Err(err) = vec_ext::register_auto_extension() {
        debug!("sqlite-vec not registered, dense search uses the in-process scan: {err:#}");
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

fn upsert_on(conn: &Connection, record: &StoredRecord) -> Result<()> {
    let metadata = serde_json::to_string(&record.metadata).context("encode metadata")?;
    let embedding = record
        .embedding
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("encode embedding")?;
    let sparse = record
        .sparse
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("encode sparse weights")?;
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO records (id, text, metadata_json, embedding_json, sparse_json, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(id) DO UPDATE SET
             text = excluded.text,
             metadata_json = excluded.metadata_json,
             embedding_json = excluded.embedding_json,
             sparse_json = excluded.sparse_json,
             updated_at = excluded.updated_at",
        params![record.id, record.text, metadata, embedding, sparse, now],
    )
    .with_context(|| format!("upsert record {}", record.id))?;
    Ok(())
}

fn parse_metadata(id: DocId, json: &str) -> Result<Map<String, Value>> {
    serde_json::from_str(json).with_context(|| format!("decode metadata of record {id}"))
}

/// Raw [`RECORD_COLUMNS`] values, decoded outside the rusqlite row callback.
#[derive(Debug)]
pub(crate) struct RawRecord {
    id: DocId,
    text: String,
    metadata_json: String,
    created_at: String,
    updated_at: String,
}

impl RawRecord {
    #[must_use]
    pub(crate) const fn id(&self) -> DocId {
        self.id
    }

    /// Decode into a [`RecordRow`] carrying `distance`. Timestamps land in
    /// [`RecordRow::fields`].
    pub(crate) fn into_row(self, distance: Option<f64>) -> Result<RecordRow> {
        let metadata = parse_metadata(self.id, &self.metadata_json)?;
        let mut row = RecordRow::new(self.id, self.text, distance).with_metadata(metadata);
        row.fields
            .insert("created_at".to_string(), Value::String(self.created_at));
        row.fields
            .insert("updated_at".to_string(), Value::String(self.updated_at));
        Ok(row)
    }
}

/// Read [`RECORD_COLUMNS`] starting at column 0.
pub(crate) fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        id: row.get(0)?,
        text: row.get(1)?,
        metadata_json: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}
