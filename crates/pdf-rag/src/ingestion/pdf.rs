//! Page-by-page PDF text extraction

use async_trait::async_trait;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::PageText;

/// Source of ordered page text for a document
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Extract every page in order; pages without text yield an empty string
    async fn load_pages(&self, path: &Path) -> Result<Vec<PageText>>;

    /// Get loader name for logging
    fn name(&self) -> &str;
}

/// PDF loader backed by lopdf
#[derive(Debug, Default, Clone)]
pub struct PdfLoader;

impl PdfLoader {
    /// Create a new PDF loader
    pub fn new() -> Self {
        Self
    }

    /// Extract page text from in-memory PDF bytes
    pub fn extract_pages(filename: &str, data: &[u8]) -> Result<Vec<PageText>> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse(filename, format!("Failed to load PDF: {}", e)))?;

        let mut pages = Vec::new();

        for page_number in doc.get_pages().keys().copied() {
            let text = match doc.extract_text(&[page_number]) {
                Ok(text) => cleanup_pdf_text(&text),
                Err(e) => {
                    tracing::warn!("Could not extract text from page {}: {}", page_number, e);
                    String::new()
                }
            };
            pages.push(PageText::new(page_number, text));
        }

        tracing::debug!(
            "Extracted {} pages ({} with text) from {}",
            pages.len(),
            pages.iter().filter(|p| !p.is_blank()).count(),
            filename
        );

        Ok(pages)
    }
}

#[async_trait]
impl DocumentLoader for PdfLoader {
    async fn load_pages(&self, path: &Path) -> Result<Vec<PageText>> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::SourceNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());

        tokio::task::spawn_blocking(move || Self::extract_pages(&filename, &data))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    fn name(&self) -> &str {
        "lopdf"
    }
}

/// Replace typographic glyphs PDF fonts commonly emit with plain equivalents
fn cleanup_pdf_text(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '\0' => {}
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' => result.push('-'),
            '\u{2014}' => result.push_str("--"),
            '\u{2018}' | '\u{2019}' => result.push('\''),
            '\u{201C}' | '\u{201D}' => result.push('"'),
            '\u{2022}' => result.push_str("* "),
            '\u{2026}' => result.push_str("..."),
            '\u{00A0}' => result.push(' '),
            '\u{FB00}' => result.push_str("ff"),
            '\u{FB01}' => result.push_str("fi"),
            '\u{FB02}' => result.push_str("fl"),
            '\u{FB03}' => result.push_str("ffi"),
            '\u{FB04}' => result.push_str("ffl"),
            _ => result.push(c),
        }
    }

    result
}
