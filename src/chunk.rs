//! Fixed-window text chunker with exact character overlap.
//!
//! Pages from the same upload are joined with a blank line and cut into
//! windows of at most `chunk_size` characters. Each window after the first
//! starts exactly `chunk_overlap` characters before the previous one ended,
//! so adjacent chunks share a character-identical overlap region.
//!
//! # Algorithm
//!
//! 1. Join the non-empty pages of one source with `"\n\n"`, remembering
//!    where each page starts.
//! 2. If the remaining text fits in one window, emit it and stop.
//! 3. Otherwise take `chunk_size` characters. If whitespace occurs in the
//!    last quarter of the stride, end the window just after the last such
//!    whitespace so chunks tend to stop on word boundaries.
//! 4. Start the next window `chunk_overlap` characters before that end.
//!
//! Lengths and offsets are counted in `char`s, never bytes. The output is a
//! pure function of the input apart from the random chunk ids.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::error::QaError;
use crate::models::{Chunk, Document};

const PAGE_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, QaError> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(QaError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self, QaError> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split page documents into chunks, one source file at a time.
    ///
    /// Chunks never span two source files. Chunk indices restart at 0 for
    /// every source.
    pub fn split_documents(&self, docs: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < docs.len() {
            let source_index = docs[start].source_index;
            let end = docs[start..]
                .iter()
                .position(|d| d.source_index != source_index)
                .map(|offset| start + offset)
                .unwrap_or(docs.len());
            chunks.extend(self.split_source(&docs[start..end]));
            start = end;
        }
        chunks
    }

    fn split_source(&self, pages: &[Document]) -> Vec<Chunk> {
        let Some(first) = pages.first() else {
            return Vec::new();
        };

        let mut joined = String::new();
        // (first char of the page in `joined`, page number)
        let mut page_starts: Vec<(usize, u32)> = Vec::new();
        let mut char_len = 0usize;
        for page in pages {
            if page.text.trim().is_empty() {
                continue;
            }
            if !joined.is_empty() {
                joined.push_str(PAGE_SEPARATOR);
                char_len += PAGE_SEPARATOR.chars().count();
            }
            page_starts.push((char_len, page.page));
            joined.push_str(&page.text);
            char_len += page.text.chars().count();
        }

        if page_starts.is_empty() {
            tracing::warn!(source = %first.source, "no extractable text, nothing to index");
            return Vec::new();
        }

        let page_at = |pos: usize| -> u32 {
            let idx = page_starts.partition_point(|(start, _)| *start <= pos);
            page_starts[idx.saturating_sub(1)].1
        };

        let bounds = char_byte_offsets(&joined);
        self.split_spans(&joined)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (start, end))| {
                let text = &joined[bounds[start]..bounds[end]];
                make_chunk(
                    first,
                    chunk_index,
                    text,
                    (start, end),
                    (page_at(start), page_at(end - 1)),
                )
            })
            .collect()
    }

    /// Character spans `[start, end)` covering `text`.
    ///
    /// Empty or whitespace-only text yields no spans.
    pub fn split_spans(&self, text: &str) -> Vec<(usize, usize)> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let chars: Vec<char> = text.chars().collect();
        let n = chars.len();
        let lookback = (self.chunk_size - self.chunk_overlap) / 4;

        let mut spans = Vec::new();
        let mut start = 0usize;
        loop {
            if n - start <= self.chunk_size {
                spans.push((start, n));
                break;
            }
            let hard_end = start + self.chunk_size;
            let end = (hard_end - lookback + 1..=hard_end)
                .rev()
                .find(|&e| chars[e - 1].is_whitespace())
                .unwrap_or(hard_end);
            spans.push((start, end));
            start = end - self.chunk_overlap;
        }
        spans
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let bounds = char_byte_offsets(text);
        self.split_spans(text)
            .into_iter()
            .map(|(s, e)| text[bounds[s]..bounds[e]].to_string())
            .collect()
    }
}

/// Byte offset of every char boundary, plus `text.len()` at the end.
fn char_byte_offsets(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}

fn make_chunk(
    source: &Document,
    chunk_index: usize,
    text: &str,
    (start_char, end_char): (usize, usize),
    (first_page, last_page): (u32, u32),
) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        source: source.source.clone(),
        source_index: source.source_index,
        chunk_index,
        text: text.to_string(),
        first_page,
        last_page,
        start_char,
        end_char,
        hash,
    }
}
