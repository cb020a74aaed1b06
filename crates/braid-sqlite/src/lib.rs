//! SQLite storage for braid.
//!
//! [`SqliteStore`] keeps records (text, metadata, optional dense embedding,
//! optional sparse weights) in one table and answers all three retrieval
//! primitives the engine needs:
//!
//! - dense ANN through sqlite-vec when loaded, otherwise an exact scan
//! - FTS5 BM25 relevance, plus a `LIKE` substring fallback
//! - sparse inner product over stored token weights
//!
//! Metadata filters become `json_extract` predicates and are applied before
//! ranking.

mod filter_sql;
pub mod schema;
mod sparse;
mod store;
mod text;
pub mod vec_ext;
mod vector;

pub use schema::FtsTokenizer;
pub use store::{
    DEFAULT_BUSY_TIMEOUT, DEFAULT_SPARSE_DIMENSION, SqliteStore, StoreOptions, StoredRecord,
};
pub use text::bm25_relevance;
