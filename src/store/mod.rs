//! Similarity-searchable chunk collections.
//!
//! The [`VectorStore`] trait is what the index builder writes to and the
//! answering pipeline reads from. Two backends:
//!
//! | Backend | Type | Lifetime |
//! |---------|------|----------|
//! | `sqlite` | [`SqliteVectorStore`] | `index.sqlite` under the session directory, recreated per session |
//! | `memory` | [`InMemoryVectorStore`] | process |
//!
//! Search is brute-force cosine similarity over every stored vector.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, ScoredChunk};

pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Drop everything and store `chunks` with their `vectors`, in order.
    async fn replace_all(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Remove every record.
    async fn clear(&self) -> Result<()>;

    /// The `k` most similar chunks, best first. Equal scores keep insertion order.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    async fn count(&self) -> Result<usize>;

    /// Release backing resources. The store is unusable afterwards.
    async fn close(&self) {}
}

/// Sort best-first (stable) and keep the top `k`.
pub(crate) fn top_k(mut scored: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}

pub(crate) fn check_lengths(chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
    if chunks.len() != vectors.len() {
        anyhow::bail!(
            "{} chunks but {} vectors; refusing to build a partial index",
            chunks.len(),
            vectors.len()
        );
    }
    Ok(())
}
