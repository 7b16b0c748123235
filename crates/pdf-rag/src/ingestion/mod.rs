//! Document ingestion: page extraction and chunking

mod chunker;
mod pdf;

pub use chunker::{write_chunk_files, TextChunker};
pub use pdf::{DocumentLoader, PdfLoader};
