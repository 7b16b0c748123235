//! Page and chunk types with source tracking for citations

use crate::error::{Error, Result};

/// Raw text extracted from a single page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Extracted text, possibly empty
    pub text: String,
}

impl PageText {
    /// Create page text
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }

    /// Whether the page yielded any usable text
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A chunk of text from the source document
///
/// Chunks are immutable once built; fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    index: u32,
    page: u32,
    source_label: String,
    text: String,
}

impl Chunk {
    /// Create a chunk, validating page number and content
    pub fn new(index: u32, page: u32, text: impl Into<String>) -> Result<Self> {
        let text = text.into();

        if page == 0 {
            return Err(Error::InvalidChunk("page numbers start at 1".to_string()));
        }
        if text.trim().is_empty() {
            return Err(Error::InvalidChunk(format!(
                "chunk {} on page {} has no text",
                index, page
            )));
        }

        Ok(Self {
            index,
            page,
            source_label: Self::label_for_page(page),
            text,
        })
    }

    /// Rebuild a chunk from persisted columns
    pub(crate) fn restore(index: u32, page: u32, source_label: String, text: String) -> Result<Self> {
        let mut chunk = Self::new(index, page, text)?;
        chunk.source_label = source_label;
        Ok(chunk)
    }

    /// Human-readable provenance for a page
    pub fn label_for_page(page: u32) -> String {
        format!("Page {}", page)
    }

    /// Position in document-wide emission order
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Source page (1-indexed)
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Provenance label, e.g. "Page 3"
    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    /// Chunk text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Character count of the chunk text
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
