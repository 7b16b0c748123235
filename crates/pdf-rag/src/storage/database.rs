//! SQLite file backing a persisted vector index
//!
//! One file holds the chunk rows, their embeddings and a key/value manifest
//! describing the embedding space the vectors live in.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::Chunk;

/// Current on-disk layout version
pub const FORMAT_VERSION: u32 = 1;

/// Similarity metric recorded in every manifest
pub const METRIC_COSINE: &str = "cosine";

/// Describes the embedding space and contents of a persisted index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexManifest {
    /// Embedding model that produced the vectors
    pub embedding_model: String,
    /// Vector dimensionality
    pub dimensions: usize,
    /// SHA-256 over model name and dimensions
    pub fingerprint: String,
    /// Similarity metric used at search time
    pub metric: String,
    /// Number of stored entries
    pub entry_count: usize,
    /// When the index was built
    pub created_at: DateTime<Utc>,
    /// Layout version
    pub format_version: u32,
}

/// A chunk and its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// SQLite database holding one vector index
pub struct IndexDb {
    conn: Connection,
}

impl IndexDb {
    /// Create a fresh database at the given path
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Internal(format!("Failed to create index database: {}", e)))?;

        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an existing database read-only
    pub fn open_existing<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| Error::Internal(format!("Failed to open index database: {}", e)))?;

        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Internal(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Create tables
    fn migrate(&self) -> Result<()> {
        // Rollback journal keeps the index in a single file so it can be renamed into place
        self.conn
            .execute_batch(
                r#"
            PRAGMA journal_mode=DELETE;
            PRAGMA synchronous=FULL;
            PRAGMA temp_store=MEMORY;
        "#,
            )
            .map_err(|e| Error::Internal(format!("Failed to set pragmas: {}", e)))?;

        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS entries (
                idx INTEGER PRIMARY KEY,
                page INTEGER NOT NULL,
                source_label TEXT NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS manifest (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
        "#,
            )
            .map_err(|e| Error::Internal(format!("Failed to create tables: {}", e)))?;

        Ok(())
    }

    /// Write the manifest and every entry in one transaction
    pub fn write_all(&mut self, manifest: &IndexManifest, entries: &[IndexEntry]) -> Result<()> {
        let tx = self.conn.transaction()?;

        {
            let mut insert_entry = tx.prepare(
                "INSERT INTO entries (idx, page, source_label, text, embedding) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for entry in entries {
                insert_entry.execute(params![
                    entry.chunk.index(),
                    entry.chunk.page(),
                    entry.chunk.source_label(),
                    entry.chunk.text(),
                    encode_vector(&entry.embedding),
                ])?;
            }

            let mut insert_key =
                tx.prepare("INSERT OR REPLACE INTO manifest (key, value) VALUES (?1, ?2)")?;
            for (key, value) in manifest_rows(manifest) {
                insert_key.execute(params![key, value])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Read the manifest
    pub fn read_manifest(&self) -> Result<IndexManifest> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM manifest")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;

        parse_manifest(&rows)
    }

    /// Read every entry in chunk order
    pub fn read_entries(&self) -> Result<Vec<IndexEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT idx, page, source_label, text, embedding FROM entries ORDER BY idx")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Vec<u8>>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(idx, page, label, text, blob)| {
                Ok(IndexEntry {
                    chunk: Chunk::restore(idx, page, label, text)?,
                    embedding: decode_vector(&blob)?,
                })
            })
            .collect()
    }
}

fn manifest_rows(manifest: &IndexManifest) -> Vec<(&'static str, String)> {
    vec![
        ("embedding_model", manifest.embedding_model.clone()),
        ("dimensions", manifest.dimensions.to_string()),
        ("fingerprint", manifest.fingerprint.clone()),
        ("metric", manifest.metric.clone()),
        ("entry_count", manifest.entry_count.to_string()),
        ("created_at", manifest.created_at.to_rfc3339()),
        ("format_version", manifest.format_version.to_string()),
    ]
}

fn parse_manifest(rows: &HashMap<String, String>) -> Result<IndexManifest> {
    let get = |key: &str| {
        rows.get(key)
            .ok_or_else(|| Error::Internal(format!("Index manifest is missing '{}'", key)))
    };
    let number = |key: &str| -> Result<usize> {
        get(key)?
            .parse()
            .map_err(|_| Error::Internal(format!("Index manifest has a bad '{}'", key)))
    };

    let created_at = DateTime::parse_from_rfc3339(get("created_at")?)
        .map_err(|e| Error::Internal(format!("Index manifest has a bad 'created_at': {}", e)))?
        .with_timezone(&Utc);

    let format_version = number("format_version")? as u32;
    if format_version != FORMAT_VERSION {
        return Err(Error::Internal(format!(
            "Unsupported index format version {} (expected {})",
            format_version, FORMAT_VERSION
        )));
    }

    Ok(IndexManifest {
        embedding_model: get("embedding_model")?.clone(),
        dimensions: number("dimensions")?,
        fingerprint: get("fingerprint")?.clone(),
        metric: get("metric")?.clone(),
        entry_count: number("entry_count")?,
        created_at,
        format_version,
    })
}

/// Pack a vector as little-endian f32 bytes
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Unpack little-endian f32 bytes
pub fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::Internal(format!(
            "Embedding blob of {} bytes is not a whole number of f32 values",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
