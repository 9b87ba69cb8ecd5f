//! Index builder: chunks in, similarity-searchable collection out.
//!
//! Every chunk is embedded before the store is touched. A batch is indexed
//! completely or not at all: if any embedding request fails, the store is
//! cleared and the error is returned, so a failed upload never leaves a
//! partial or stale index behind.

use anyhow::Result;

use crate::embedding::{embed_batched, embed_query, Embedder};
use crate::models::{Chunk, ScoredChunk};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::store::VectorStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexStats {
    pub chunks: usize,
}

/// Replace the store's contents with `chunks`.
pub async fn rebuild(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    chunks: &[Chunk],
    batch_size: usize,
    progress: &dyn ProgressReporter,
) -> Result<IndexStats> {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

    let vectors = match embed_batched(embedder, &texts, batch_size, |n, total| {
        progress.report(ProgressEvent::Embedding {
            n: n as u64,
            total: total as u64,
        })
    })
    .await
    {
        Ok(v) => v,
        Err(e) => {
            if let Err(clear_err) = store.clear().await {
                tracing::warn!(error = %clear_err, "failed to clear index after embedding error");
            }
            return Err(e);
        }
    };

    store.replace_all(chunks, &vectors).await?;
    tracing::info!(chunks = chunks.len(), model = embedder.model_name(), "index rebuilt");

    Ok(IndexStats {
        chunks: chunks.len(),
    })
}

/// Embed `query` and return the `k` nearest chunks.
pub async fn top_k(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
) -> Result<Vec<ScoredChunk>> {
    let vector = embed_query(embedder, query).await?;
    store.search(&vector, k).await
}
