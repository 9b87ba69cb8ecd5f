//! SQLite-backed [`VectorStore`].
//!
//! Chunks live in the `session_chunks` table with their embedding stored as
//! a little-endian f32 BLOB. `seq` records insertion order so that search
//! ties resolve the same way as the in-memory backend.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{Chunk, ScoredChunk};

use super::{check_lengths, top_k, VectorStore};

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Wrap a pool whose session schema is already in place.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn replace_all(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        check_lengths(chunks, vectors)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM session_chunks")
            .execute(&mut *tx)
            .await?;

        for (seq, (chunk, vector)) in chunks.iter().zip(vectors).enumerate() {
            sqlx::query(
                r#"
                INSERT INTO session_chunks (seq, id, source, source_index, chunk_index, text,
                                            first_page, last_page, start_char, end_char,
                                            hash, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(seq as i64)
            .bind(&chunk.id)
            .bind(&chunk.source)
            .bind(chunk.source_index as i64)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.text)
            .bind(chunk.first_page as i64)
            .bind(chunk.last_page as i64)
            .bind(chunk.start_char as i64)
            .bind(chunk.end_char as i64)
            .bind(&chunk.hash)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM session_chunks")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, source, source_index, chunk_index, text, first_page, last_page,
                   start_char, end_char, hash, embedding
            FROM session_chunks
            ORDER BY seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.get("embedding");
            let score = cosine_similarity(query, &blob_to_vec(&blob));
            let source_index: i64 = row.get("source_index");
            let chunk_index: i64 = row.get("chunk_index");
            let first_page: i64 = row.get("first_page");
            let last_page: i64 = row.get("last_page");
            let start_char: i64 = row.get("start_char");
            let end_char: i64 = row.get("end_char");
            scored.push(ScoredChunk {
                chunk: Chunk {
                    id: row.get("id"),
                    source: row.get("source"),
                    source_index: source_index as usize,
                    chunk_index: chunk_index as usize,
                    text: row.get("text"),
                    first_page: first_page as u32,
                    last_page: last_page as u32,
                    start_char: start_char as usize,
                    end_char: end_char as usize,
                    hash: row.get("hash"),
                },
                score,
            });
        }

        Ok(top_k(scored, k))
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM session_chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
