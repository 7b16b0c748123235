//! Retrieval: the persisted vector index and similarity search

mod index;

pub use index::{VectorIndex, INDEX_FILE};
