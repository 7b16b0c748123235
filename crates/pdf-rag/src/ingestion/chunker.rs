//! Sentence-packing text chunker with page tracking

use std::path::Path;

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::{Chunk, PageText};

/// Text chunker with configurable size and overlap
///
/// Page text is normalized to single-spaced prose, cut into sentence units at
/// every `". "`, and the units are packed greedily into chunks of at most
/// `chunk_size` characters. A sentence longer than `chunk_size` becomes a
/// chunk of its own; it is never truncated.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Target chunk size in characters
    chunk_size: usize,
    /// Characters of trailing sentences repeated at the start of the next chunk
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap,
        }
    }

    /// Create a chunker from configuration
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Chunk pages in order; blank pages contribute nothing
    pub fn chunk_pages(&self, pages: &[PageText]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in pages {
            if page.is_blank() {
                tracing::debug!("Page {} has no extractable text, skipping", page.page_number);
                continue;
            }
            self.chunk_page(page, &mut chunks);
        }

        chunks
    }

    /// Collapse newlines and whitespace runs to single spaces
    pub fn normalize(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn chunk_page(&self, page: &PageText, chunks: &mut Vec<Chunk>) {
        let normalized = Self::normalize(&page.text);
        let sentences = Self::split_into_sentences(&normalized);

        let mut buffer: Vec<&str> = Vec::new();
        let mut buffer_len = 0usize;

        for sentence in sentences {
            let sentence_len = sentence.chars().count();

            // If adding this sentence exceeds chunk size, save current chunk
            if !buffer.is_empty() && buffer_len + sentence_len > self.chunk_size {
                Self::emit(&buffer, page.page_number, chunks);

                buffer = self.overlap_units(&buffer, sentence_len);
                buffer_len = Self::packed_len(&buffer);
            }

            buffer.push(sentence);
            buffer_len = if buffer.len() == 1 {
                Self::packed_len(&buffer)
            } else {
                buffer_len + sentence_len
            };
        }

        if !buffer.is_empty() {
            Self::emit(&buffer, page.page_number, chunks);
        }
    }

    fn emit(buffer: &[&str], page_number: u32, chunks: &mut Vec<Chunk>) {
        let text = buffer.concat();
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        match Chunk::new(chunks.len() as u32, page_number, text) {
            Ok(chunk) => chunks.push(chunk),
            Err(e) => tracing::warn!("Dropping chunk on page {}: {}", page_number, e),
        }
    }

    /// Split normalized text into sentence units
    ///
    /// Each unit keeps its trailing period; the following space starts the
    /// next unit, so concatenating the units reproduces the input.
    fn split_into_sentences(text: &str) -> Vec<&str> {
        let mut sentences = Vec::new();
        let mut start = 0usize;

        for (pos, _) in text.match_indices(". ") {
            let end = pos + 1;
            sentences.push(&text[start..end]);
            start = end;
        }

        if start < text.len() {
            sentences.push(&text[start..]);
        }

        sentences
    }

    /// Trailing whole sentences of a flushed buffer to seed the next one
    fn overlap_units<'a>(&self, flushed: &[&'a str], next_len: usize) -> Vec<&'a str> {
        if self.overlap == 0 {
            return Vec::new();
        }

        let mut carried: Vec<&'a str> = Vec::new();
        let mut carried_len = 0usize;

        for &sentence in flushed.iter().rev() {
            let len = sentence.chars().count();
            if carried_len + len > self.overlap {
                break;
            }
            carried.push(sentence);
            carried_len += len;
        }
        carried.reverse();

        // Carry must leave room for the sentence that forced the flush
        while !carried.is_empty() && Self::packed_len(&carried) + next_len > self.chunk_size {
            carried.remove(0);
        }

        carried
    }

    /// Length of the units once emitted, i.e. without the first unit's leading space
    fn packed_len(units: &[&str]) -> usize {
        let total: usize = units.iter().map(|s| s.chars().count()).sum();
        let leading = units
            .first()
            .map_or(0, |u| u.chars().take_while(|c| c.is_whitespace()).count());
        total - leading
    }
}

/// Write each chunk to `chunk_{i}.txt` under `dir` for inspection
pub fn write_chunk_files(dir: &Path, chunks: &[Chunk]) -> Result<usize> {
    std::fs::create_dir_all(dir)?;

    for (i, chunk) in chunks.iter().enumerate() {
        std::fs::write(dir.join(format!("chunk_{}.txt", i)), chunk.text())?;
    }

    tracing::debug!("Wrote {} chunk files to {}", chunks.len(), dir.display());
    Ok(chunks.len())
}
