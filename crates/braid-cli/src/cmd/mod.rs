pub mod ingest;
pub mod search;
