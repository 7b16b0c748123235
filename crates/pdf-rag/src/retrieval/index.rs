//! Vector index for chunk storage and similarity search
//!
//! Entries are persisted to a single SQLite file and held in memory for
//! exact cosine k-NN search.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::storage::{IndexDb, IndexEntry, IndexManifest, FORMAT_VERSION, METRIC_COSINE};
use crate::types::{Chunk, ScoredResult};

/// File name of the index inside its directory
pub const INDEX_FILE: &str = "index.sqlite";

/// Prefix of the file a build writes before renaming it into place
const TEMP_PREFIX: &str = "index.sqlite.tmp-";

/// Immutable, searchable set of embedded chunks
pub struct VectorIndex {
    location: PathBuf,
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
    /// Precomputed L2 norm of each entry's embedding
    norms: Vec<f32>,
}

impl VectorIndex {
    /// Path of the index file for a location
    pub fn index_path(location: &Path) -> PathBuf {
        location.join(INDEX_FILE)
    }

    /// Whether a persisted index exists at `location`
    pub fn exists(location: &Path) -> bool {
        Self::index_path(location).is_file()
    }

    /// Embed `chunks` and persist them as a new index at `location`
    ///
    /// An existing index at the same location is replaced only once the new
    /// one is completely written.
    pub async fn build(
        location: &Path,
        chunks: &[Chunk],
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::EmptyInput);
        }

        tracing::info!(
            "Embedding {} chunks with {} ({})",
            chunks.len(),
            embedder.name(),
            embedder.model()
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text().to_string()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let dimensions = embeddings[0].len();
        if dimensions == 0 {
            return Err(Error::embedding("Embedder returned an empty vector"));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimensions) {
            return Err(Error::EmbeddingMismatch {
                expected: format!("{} dimensions", dimensions),
                actual: format!("{} dimensions", bad.len()),
            });
        }
        if embedder.dimensions() != dimensions {
            tracing::warn!(
                "Embedder reports {} dimensions but produced {}; using {}",
                embedder.dimensions(),
                dimensions,
                dimensions
            );
        }

        let manifest = IndexManifest {
            embedding_model: embedder.model().to_string(),
            dimensions,
            fingerprint: fingerprint(embedder.model(), dimensions),
            metric: METRIC_COSINE.to_string(),
            entry_count: chunks.len(),
            created_at: Utc::now(),
            format_version: FORMAT_VERSION,
        };

        let entries: Vec<IndexEntry> = chunks
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        let location_owned = location.to_path_buf();
        let manifest_owned = manifest.clone();
        let entries = tokio::task::spawn_blocking(move || {
            persist(&location_owned, &manifest_owned, &entries)?;
            Ok::<_, Error>(entries)
        })
        .await
        .map_err(|e| Error::internal(format!("Index write task failed: {}", e)))??;

        tracing::info!(
            "Built index with {} entries at {}",
            entries.len(),
            location.display()
        );

        Ok(Self::from_parts(location.to_path_buf(), manifest, entries))
    }

    /// Open the index persisted at `location` without re-embedding
    pub async fn load(location: &Path, embedder: &dyn EmbeddingProvider) -> Result<Self> {
        if !Self::exists(location) {
            return Err(Error::IndexNotFound(location.to_path_buf()));
        }

        let path = Self::index_path(location);
        let (manifest, entries) = tokio::task::spawn_blocking(move || {
            let db = IndexDb::open_existing(&path)?;
            Ok::<_, Error>((db.read_manifest()?, db.read_entries()?))
        })
        .await
        .map_err(|e| Error::internal(format!("Index read task failed: {}", e)))??;

        if manifest.embedding_model != embedder.model() {
            return Err(Error::EmbeddingMismatch {
                expected: manifest.embedding_model,
                actual: embedder.model().to_string(),
            });
        }
        if manifest.metric != METRIC_COSINE {
            return Err(Error::internal(format!(
                "Unsupported index metric '{}' (expected '{}')",
                manifest.metric, METRIC_COSINE
            )));
        }
        if manifest.fingerprint != fingerprint(&manifest.embedding_model, manifest.dimensions) {
            return Err(Error::internal("Index fingerprint does not match its manifest"));
        }
        if entries.len() != manifest.entry_count {
            return Err(Error::internal(format!(
                "Index manifest lists {} entries but {} were stored",
                manifest.entry_count,
                entries.len()
            )));
        }
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != manifest.dimensions) {
            return Err(Error::internal(format!(
                "Stored embedding for chunk {} has {} dimensions, expected {}",
                bad.chunk.index(),
                bad.embedding.len(),
                manifest.dimensions
            )));
        }

        tracing::info!(
            "Loaded index with {} entries from {}",
            entries.len(),
            location.display()
        );

        Ok(Self::from_parts(location.to_path_buf(), manifest, entries))
    }

    fn from_parts(location: PathBuf, manifest: IndexManifest, entries: Vec<IndexEntry>) -> Self {
        let norms = entries.iter().map(|e| l2_norm(&e.embedding)).collect();
        Self {
            location,
            manifest,
            entries,
            norms,
        }
    }

    /// Return up to `k` entries most similar to `query`, best first
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<ScoredResult>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be at least 1".to_string()));
        }

        let query_vector = embedder.embed_query(query).await?;
        if query_vector.len() != self.manifest.dimensions {
            return Err(Error::EmbeddingMismatch {
                expected: format!("{} dimensions", self.manifest.dimensions),
                actual: format!("{} dimensions", query_vector.len()),
            });
        }

        let query_norm = l2_norm(&query_vector);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(i, (entry, &norm))| {
                (i, cosine_similarity(&query_vector, query_norm, &entry.embedding, norm))
            })
            .collect();

        rank_descending(&mut scored, k);

        tracing::debug!(
            "Search returned {} of {} entries (k={})",
            scored.len(),
            self.entries.len(),
            k
        );

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredResult {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }

    /// Number of stored entries
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Manifest describing the embedding space
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// Directory the index lives in
    pub fn location(&self) -> &Path {
        &self.location
    }
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("location", &self.location)
            .field("manifest", &self.manifest)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Write to a sibling temp file, then rename over the final path
fn persist(location: &Path, manifest: &IndexManifest, entries: &[IndexEntry]) -> Result<()> {
    std::fs::create_dir_all(location)?;

    remove_stale_temp_files(location)?;

    let final_path = VectorIndex::index_path(location);
    let temp_path = location.join(format!("{}{}", TEMP_PREFIX, std::process::id()));

    let written = IndexDb::create(&temp_path).and_then(|mut db| db.write_all(manifest, entries));
    let renamed = written.and_then(|()| std::fs::rename(&temp_path, &final_path).map_err(Error::from));

    if renamed.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    renamed
}

/// Delete temp files left by interrupted builds
fn remove_stale_temp_files(location: &Path) -> Result<()> {
    for entry in std::fs::read_dir(location)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
            tracing::debug!("Removing stale index temp file {}", entry.path().display());
            std::fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

/// Keep the `k` best scores, highest first
///
/// The sort is stable, so equal scores keep insertion order.
fn rank_descending(scored: &mut Vec<(usize, f32)>, k: usize) {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);
}

/// Identity of an embedding space
fn fingerprint(model: &str, dimensions: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update(b":");
    hasher.update(dimensions.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity; zero-length vectors and overflowing products score 0
fn cosine_similarity(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let score = dot / (a_norm * b_norm);
    if score.is_finite() {
        score
    } else {
        0.0
    }
}
