//! Core data models used throughout docqa.
//!
//! These types represent the uploads, pages, chunks and history entries
//! that flow through the ingestion and answering pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const MIME_PDF: &str = "application/pdf";

/// Raw upload before extraction.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn pdf(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: MIME_PDF.to_string(),
            bytes,
        }
    }
}

/// One extracted PDF page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    /// File name as uploaded.
    pub source: String,
    /// Position of the file within its upload batch.
    pub source_index: usize,
    /// 1-based page number.
    pub page: u32,
    pub page_count: u32,
}

/// A bounded slice of one source file's text, the unit of retrieval.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub id: String,
    pub source: String,
    pub source_index: usize,
    /// Position within its source, contiguous from 0.
    pub chunk_index: usize,
    pub text: String,
    pub first_page: u32,
    pub last_page: u32,
    /// Character offsets into the joined source text.
    pub start_char: usize,
    pub end_char: usize,
    pub hash: String,
}

/// A retrieved chunk with its similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Fixed type tag on every history row.
pub const HISTORY_KIND_QA: &str = "qa";

/// One persisted question/answer exchange.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub query: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    pub kind: String,
}

impl HistoryEntry {
    /// Text that gets embedded for similarity lookups over past exchanges.
    pub fn embedding_text(query: &str, answer: &str) -> String {
        format!("Q: {}\nA: {}", query, answer)
    }
}
