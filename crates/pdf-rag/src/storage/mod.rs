//! Storage module for persistent data storage
//!
//! Provides the SQLite file behind a persisted vector index.

mod database;

pub use database::{
    decode_vector, encode_vector, IndexDb, IndexEntry, IndexManifest, FORMAT_VERSION,
    METRIC_COSINE,
};
