//! Document index consulted by the retriever.
//!
//! The retriever only sees the [`DocumentIndex`] trait. The bundled
//! implementation is [`SqliteIndex`], a parent/child store that embeds
//! small child chunks for matching and returns their larger parents.

pub mod chunking;
pub mod embedding;
pub mod store;

use async_trait::async_trait;

use crate::error::IndexError;

pub use chunking::TextSplitter;
pub use embedding::{Embedder, EmbeddingConfig, HashEmbedder, OpenAiEmbedder, create_embedder};
pub use store::{ChunkingConfig, IndexStats, IngestReport, SqliteIndex};

/// Similarity search over stored passages.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Returns up to `top_k` passages most relevant to `query`, best first.
    ///
    /// Identical queries against an unchanged index return identical results.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if the query cannot be embedded or the store
    /// cannot be read.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>, IndexError>;
}
